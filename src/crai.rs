//! `.crai` index: one line per slice, naming the reference range it covers and where its
//! container and slice begin in the file.

use std::io::{BufRead, BufReader, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// No reference sequence; the record's slice holds only unplaced reads.
pub const UNMAPPED_REFERENCE_SEQUENCE_ID: i32 = -1;

/// One `.crai` line: a slice's reference span and its location in the CRAM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Record {
    /// The reference sequence id, or [`UNMAPPED_REFERENCE_SEQUENCE_ID`].
    pub reference_sequence_id: i32,
    /// 1-based alignment start of the slice's reference span.
    pub alignment_start: i32,
    /// The length of the slice's reference span.
    pub alignment_span: i32,
    /// The byte offset of the slice's container, from the start of the file.
    pub container_offset: u64,
    /// The byte offset of the slice header block, relative to the start of its container's
    /// data (i.e. just past the container header).
    pub slice_offset: u64,
    /// The size, in bytes, of the slice (header block plus all its data blocks).
    pub slice_size: u64,
}

/// A parsed `.crai` index: every slice's record, in file order.
#[derive(Debug, Clone, Default)]
pub struct Index {
    records: Vec<Record>,
}

impl Index {
    /// Wraps an already-built record list.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// The index's records, in file order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Reads a gzip-compressed `.crai` index.
    pub fn read<R>(reader: R) -> Result<Self>
    where
        R: Read,
    {
        let decoder = GzDecoder::new(reader);
        let mut lines = BufReader::new(decoder).lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next().transpose()? {
            if line.is_empty() {
                continue;
            }
            records.push(parse_record(&line)?);
        }

        Ok(Self { records })
    }

    /// Writes a gzip-compressed `.crai` index.
    pub fn write<W>(&self, writer: W) -> Result<()>
    where
        W: Write,
    {
        let mut encoder = GzEncoder::new(writer, Compression::default());

        for record in &self.records {
            writeln!(
                encoder,
                "{}\t{}\t{}\t{}\t{}\t{}",
                record.reference_sequence_id,
                record.alignment_start,
                record.alignment_span,
                record.container_offset,
                record.slice_offset,
                record.slice_size,
            )?;
        }

        encoder.finish()?;
        Ok(())
    }

    /// Finds the slice covering `position` on `reference_sequence_id`: the entry compares
    /// greatest under `(reference_sequence_id, alignment_start)` lexicographic order without
    /// exceeding `(reference_sequence_id, position)`, i.e. an exact start match or the nearest
    /// preceding entry on the same reference sequence. Entries must be in ascending
    /// `(reference_sequence_id, alignment_start)` order, as produced by [`Self::write`].
    ///
    /// For [`UNMAPPED_REFERENCE_SEQUENCE_ID`], instead returns the last unmapped entry (scanning
    /// from the end, since unmapped slices carry no meaningful alignment start to bisect on).
    ///
    /// Returns `None` if no entry on `reference_sequence_id` precedes or matches the query.
    pub fn query(&self, reference_sequence_id: i32, position: i32) -> Option<&Record> {
        if reference_sequence_id == UNMAPPED_REFERENCE_SEQUENCE_ID {
            return self
                .records
                .iter()
                .rposition(|r| r.reference_sequence_id == UNMAPPED_REFERENCE_SEQUENCE_ID)
                .map(|i| &self.records[i]);
        }

        let idx = self
            .records
            .partition_point(|r| (r.reference_sequence_id, r.alignment_start) <= (reference_sequence_id, position));

        if idx == 0 {
            return None;
        }

        let candidate = &self.records[idx - 1];
        (candidate.reference_sequence_id == reference_sequence_id).then_some(candidate)
    }
}

fn parse_record(line: &str) -> Result<Record> {
    let mut fields = line.split('\t');

    let mut next_i32 = || -> Result<i32> {
        fields
            .next()
            .ok_or_else(|| Error::MalformedIndex("truncated .crai record".into()))?
            .parse()
            .map_err(|e: std::num::ParseIntError| Error::MalformedIndex(e.to_string()))
    };

    let reference_sequence_id = next_i32()?;
    let alignment_start = next_i32()?;
    let alignment_span = next_i32()?;

    let mut next_u64 = || -> Result<u64> {
        fields
            .next()
            .ok_or_else(|| Error::MalformedIndex("truncated .crai record".into()))?
            .parse()
            .map_err(|e: std::num::ParseIntError| Error::MalformedIndex(e.to_string()))
    };

    let container_offset = next_u64()?;
    let slice_offset = next_u64()?;
    let slice_size = next_u64()?;

    Ok(Record {
        reference_sequence_id,
        alignment_start,
        alignment_span,
        container_offset,
        slice_offset,
        slice_size,
    })
}
