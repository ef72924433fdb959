//! `.gzi` index: a bgzip block table mapping uncompressed offsets to compressed (virtual)
//! offsets, used to seek a bgzipped CRAM stream without decompressing everything before the
//! target position.

use std::io::{Read, Seek, SeekFrom, Write};

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// Entry counts at or above this bound are rejected as corrupt before any allocation is
/// attempted, mirroring the load-time sanity check of the format this index is modeled on.
const MAX_ENTRIES: u64 = (i32::MAX as u64) / 8 - 1;

/// One bgzip block boundary: where it starts in the compressed stream, and how many
/// uncompressed bytes precede it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// The block's starting offset in the compressed (bgzip) stream.
    pub compressed_offset: u64,
    /// The number of uncompressed bytes preceding this block.
    pub uncompressed_offset: u64,
}

/// A parsed `.gzi` index: bgzip block boundaries, in ascending order.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<Entry>,
}

impl Index {
    /// Wraps an already-built, ascending-order entry list.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// The index's entries, in ascending order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Reads a `.gzi` index: a little-endian `u64` entry count followed by that many
    /// `(compressed_offset, uncompressed_offset)` pairs of little-endian `u64`s.
    pub fn read<R>(mut reader: R) -> Result<Self>
    where
        R: Read,
    {
        let n = read_u64(&mut reader)?;
        if n >= MAX_ENTRIES {
            return Err(Error::MalformedIndex(format!(
                "`.gzi` entry count {n} is implausibly large"
            )));
        }
        let mut entries = Vec::with_capacity(n as usize);

        for _ in 0..n {
            let compressed_offset = read_u64(&mut reader)?;
            let uncompressed_offset = read_u64(&mut reader)?;
            entries.push(Entry {
                compressed_offset,
                uncompressed_offset,
            });
        }

        Ok(Self { entries })
    }

    /// Writes a `.gzi` index.
    pub fn write<W>(&self, mut writer: W) -> Result<()>
    where
        W: Write,
    {
        writer.write_all(&(self.entries.len() as u64).to_le_bytes())?;

        for entry in &self.entries {
            writer.write_all(&entry.compressed_offset.to_le_bytes())?;
            writer.write_all(&entry.uncompressed_offset.to_le_bytes())?;
        }

        Ok(())
    }

    /// Converts `uncompressed_pos` to a virtual offset, by bisecting the block boundary table
    /// for the greatest entry whose `uncompressed_offset` does not exceed it. Block 0 (offset
    /// 0) is implicit and always covers `[0, entries[0].uncompressed_offset)` even though the
    /// index carries no entry for it.
    ///
    /// Fails if the block covering `uncompressed_pos` cannot be determined to hold it within
    /// 64 KiB of uncompressed data, i.e. `uncompressed_pos` is not actually within the bounds
    /// of its covering block (an uncompressed bgzip block never exceeds 64 KiB).
    pub fn query(&self, uncompressed_pos: u64) -> Result<u64> {
        let (compressed_offset, uncompressed_offset) = match self
            .entries
            .partition_point(|e| e.uncompressed_offset <= uncompressed_pos)
        {
            0 => (0, 0),
            n => {
                let e = self.entries[n - 1];
                (e.compressed_offset, e.uncompressed_offset)
            }
        };

        let delta = uncompressed_pos - uncompressed_offset;
        if delta >= 1 << 16 {
            return Err(Error::Corrupt(format!(
                "uncompressed offset {uncompressed_pos} is not within 64 KiB of its covering bgzip block"
            )));
        }

        Ok(virtual_offset(compressed_offset, delta as u16))
    }

    /// Reads the uncompressed bytes in `[ustart, uend]` (inclusive) from a bgzipped stream.
    ///
    /// Seeks `reader` to the bgzip block covering `ustart`, decodes forward through as many
    /// concatenated gzip members as needed, discards the leading `ustart & 0xffff` bytes of
    /// the first member, and returns exactly `uend - ustart + 1` bytes. `uend` is validated
    /// against the index the same way `ustart` is, so a range past the end of the indexed
    /// file is rejected rather than silently truncated.
    pub fn range_load<R>(&self, mut reader: R, ustart: u64, uend: u64) -> Result<Vec<u8>>
    where
        R: Read + Seek,
    {
        let vstart = self.query(ustart)?;
        self.query(uend)?;

        let (compressed_start, prefix) = split_virtual_offset(vstart);
        reader.seek(SeekFrom::Start(compressed_start))?;

        let mut decoder = MultiGzDecoder::new(reader);

        if prefix > 0 {
            let mut discard = vec![0u8; usize::from(prefix)];
            decoder.read_exact(&mut discard)?;
        }

        let len = usize::try_from(uend - ustart + 1)?;
        let mut out = vec![0u8; len];
        decoder.read_exact(&mut out)?;

        Ok(out)
    }
}

fn read_u64<R>(reader: &mut R) -> Result<u64>
where
    R: Read,
{
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Packs a bgzip block's compressed start offset and a within-block uncompressed byte
/// position into a single virtual file offset, as used by `.crai` container/slice pointers
/// over a bgzipped stream.
pub fn virtual_offset(compressed_offset: u64, uncompressed_offset_in_block: u16) -> u64 {
    (compressed_offset << 16) | u64::from(uncompressed_offset_in_block)
}

/// Splits a virtual file offset back into its compressed block start and within-block
/// uncompressed byte position.
pub fn split_virtual_offset(virtual_offset: u64) -> (u64, u16) {
    (virtual_offset >> 16, (virtual_offset & 0xffff) as u16)
}
