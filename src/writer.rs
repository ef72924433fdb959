//! The top-level writing facade: file definition, file header, and a statistics-driven
//! record encoder that lays containers and slices out according to [`WriterOptions`].

use std::io::Write;

use indexmap::IndexMap;

use crate::bitio::BitWriter;
use crate::block::{self, Block, CompressionMethod, ContentType};
use crate::codec::{Codec, ExternalWriters};
use crate::compression_header::{
    self, CompressionHeader, DataSeriesEncodings, PreservationMap, TagEncodings,
};
use crate::config::WriterOptions;
use crate::container::{self, FileDefinition, Header, ReferenceSequenceContext};
use crate::error::Result;
use crate::record::{encode_record, Flags, Record, SliceState};
use crate::slice;
use crate::stats::Stats;

mod field_content_id {
    pub const BF: i32 = 1;
    pub const CF: i32 = 2;
    pub const RI: i32 = 3;
    pub const RL: i32 = 4;
    pub const AP: i32 = 5;
    pub const RG: i32 = 6;
    pub const RN: i32 = 7;
    pub const MF: i32 = 8;
    pub const NS: i32 = 9;
    pub const NP: i32 = 10;
    pub const TS: i32 = 11;
    pub const NF: i32 = 12;
    pub const TL: i32 = 13;
    pub const FN: i32 = 14;
    pub const FC: i32 = 15;
    pub const FP: i32 = 16;
    pub const DL: i32 = 17;
    pub const BS: i32 = 18;
    pub const IN: i32 = 19;
    pub const MQ: i32 = 20;
    pub const BA: i32 = 21;
    pub const QS: i32 = 22;
    pub const TAG_BASE: i32 = 100;
}

/// Writes CRAM containers and records to an underlying stream.
pub struct Writer<W> {
    inner: W,
    options: WriterOptions,
    record_counter: u64,
}

impl<W> Writer<W>
where
    W: Write,
{
    /// Wraps `inner` with the default writer options.
    pub fn new(inner: W) -> Self {
        Self::with_options(inner, WriterOptions::default())
    }

    /// Wraps `inner` with explicit writer options.
    pub fn with_options(inner: W, options: WriterOptions) -> Self {
        Self {
            inner,
            options,
            record_counter: 0,
        }
    }

    /// The writer's options.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Writes the file definition.
    pub fn write_file_definition(&mut self, definition: &FileDefinition) -> Result<()> {
        container::write_file_definition(&mut self.inner, definition)
    }

    /// Writes the file header container, wrapping `header` (opaque, unparsed bytes) in its
    /// own block and container, with no slices.
    pub fn write_file_header(&mut self, header: &[u8]) -> Result<()> {
        let block = Block::encode(ContentType::FileHeader, 0, CompressionMethod::None, header)?;

        let mut body = Vec::new();
        block::write_block(&mut body, &block)?;

        let container_header = Header {
            reference_sequence_context: ReferenceSequenceContext::None,
            record_count: 0,
            record_counter: self.record_counter,
            base_count: 0,
            block_count: 1,
            landmarks: Vec::new(),
        };

        container::write_header(&mut self.inner, &container_header, body.len())?;
        self.inner.write_all(&body)?;
        Ok(())
    }

    /// Encodes and writes `records` as one or more containers, grouping them into slices of
    /// at most `options.records_per_slice` records and containers of at most
    /// `options.slices_per_container` slices.
    ///
    /// `tag_sets` is the shared tag dictionary every record's `tag_set_id` indexes into; it is
    /// carried unchanged into every container's preservation map.
    pub fn write_records(
        &mut self,
        reference_sequence_context: ReferenceSequenceContext,
        tag_sets: &[Vec<([u8; 2], u8)>],
        records: &[Record],
    ) -> Result<()> {
        for container_records in records.chunks(
            self.options.records_per_slice * self.options.slices_per_container.max(1),
        ) {
            self.write_container(reference_sequence_context, tag_sets, container_records)?;
        }

        Ok(())
    }

    fn write_container(
        &mut self,
        reference_sequence_context: ReferenceSequenceContext,
        tag_sets: &[Vec<([u8; 2], u8)>],
        records: &[Record],
    ) -> Result<()> {
        let compression_header = build_compression_header(tag_sets, records);

        let mut compression_header_bytes = Vec::new();
        compression_header::write_compression_header(
            &mut compression_header_bytes,
            &compression_header,
        )?;
        let compression_header_block = Block::encode(
            ContentType::CompressionHeader,
            0,
            CompressionMethod::None,
            &compression_header_bytes,
        )?;

        let mut body = Vec::new();
        block::write_block(&mut body, &compression_header_block)?;

        let mut landmarks = Vec::new();
        let base_count: u64 = records.iter().map(|r| u64::try_from(r.read_length.max(0)).unwrap_or(0)).sum();
        let record_counter_at_start = self.record_counter;
        let mut block_count = 1; // the compression header block

        for slice_records in records.chunks(self.options.records_per_slice.max(1)) {
            landmarks.push(body.len());
            block_count += self.write_slice(
                &mut body,
                reference_sequence_context,
                &compression_header,
                slice_records,
            )?;
            self.record_counter += slice_records.len() as u64;
        }

        let header = Header {
            reference_sequence_context,
            record_count: records.len(),
            record_counter: record_counter_at_start,
            base_count,
            block_count,
            landmarks,
        };

        container::write_header(&mut self.inner, &header, body.len())?;
        self.inner.write_all(&body)?;
        Ok(())
    }

    fn write_slice(
        &self,
        out: &mut Vec<u8>,
        reference_sequence_context: ReferenceSequenceContext,
        compression_header: &CompressionHeader,
        records: &[Record],
    ) -> Result<usize> {
        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        let mut state = SliceState::default();
        if let ReferenceSequenceContext::Some { alignment_start, .. } = reference_sequence_context {
            state.previous_alignment_start = alignment_start;
        }

        for record in records {
            encode_record(
                &mut core_out,
                &mut writers,
                &compression_header.data_series_encodings,
                &compression_header.tag_encodings,
                &compression_header.preservation_map.tag_sets,
                compression_header.preservation_map.records_have_names,
                compression_header.preservation_map.alignment_starts_are_deltas,
                &mut state,
                record,
            )?;
        }

        let core_bytes = core_out.finish()?;
        let external_blocks = writers.into_blocks();

        let slice_header = slice::Header {
            reference_sequence_context,
            record_count: records.len(),
            record_counter: self.record_counter,
            block_count: 1 + external_blocks.len(),
            block_content_ids: external_blocks.keys().copied().collect(),
            embedded_reference_bases_block_content_id: None,
            reference_md5: None,
            optional_tags: Vec::new(),
        };

        let mut slice_header_bytes = Vec::new();
        slice::write_header(&mut slice_header_bytes, &slice_header)?;
        let slice_header_block = Block::encode(
            ContentType::SliceHeader,
            0,
            CompressionMethod::None,
            &slice_header_bytes,
        )?;
        block::write_block(out, &slice_header_block)?;

        let core_block = Block::encode(
            ContentType::CoreData,
            0,
            self.options.core_data_compression,
            &core_bytes,
        )?;
        block::write_block(out, &core_block)?;

        for (id, data) in &external_blocks {
            let block = Block::encode(
                ContentType::ExternalData,
                *id,
                self.options.external_data_compression,
                data,
            )?;
            block::write_block(out, &block)?;
        }

        Ok(1 + 1 + external_blocks.len())
    }

    /// Writes the terminal EOF container and returns the underlying stream.
    pub fn finish(mut self) -> Result<W> {
        container::write_eof_container(&mut self.inner)?;
        Ok(self.inner)
    }

    /// Consumes the writer, returning the underlying stream without writing an EOF container.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn build_compression_header(
    tag_sets: &[Vec<([u8; 2], u8)>],
    records: &[Record],
) -> CompressionHeader {
    use field_content_id::*;

    let mut bam_flags_stats = Stats::new();
    let mut cram_flags_stats = Stats::new();
    let mut read_lengths_stats = Stats::new();
    let mut alignment_start_delta_stats = Stats::new();
    let mut read_group_stats = Stats::new();
    let mut mate_flags_stats = Stats::new();
    let mut mate_reference_id_stats = Stats::new();
    let mut mate_alignment_start_stats = Stats::new();
    let mut template_length_stats = Stats::new();
    let mut mate_distance_stats = Stats::new();
    let mut tag_set_id_stats = Stats::new();
    let mut feature_count_stats = Stats::new();
    let mut feature_code_stats = Stats::new();
    let mut feature_position_delta_stats = Stats::new();
    let mut deletion_length_stats = Stats::new();
    let mut base_substitution_stats = Stats::new();
    let mut mapping_quality_stats = Stats::new();
    let mut reference_id_stats = Stats::new();

    let mut previous_alignment_start = 0;

    for record in records {
        bam_flags_stats.add(i32::from(record.bam_flags.bits()));
        cram_flags_stats.add(i32::from(record.cram_flags.bits()));
        read_lengths_stats.add(record.read_length);
        alignment_start_delta_stats.add(record.alignment_start - previous_alignment_start);
        previous_alignment_start = record.alignment_start;
        read_group_stats.add(record.read_group_id);
        tag_set_id_stats.add(record.tag_set_id);

        if let Some(id) = record.reference_sequence_id {
            reference_id_stats.add(id);
        }

        if let Some(mate) = &record.mate {
            mate_flags_stats.add(i32::from(mate.mate_flags));
            mate_reference_id_stats.add(mate.reference_sequence_id);
            mate_alignment_start_stats.add(mate.alignment_start);
            template_length_stats.add(mate.template_length);
        }
        if let Some(offset) = record.next_fragment_offset {
            mate_distance_stats.add(offset);
        }

        if !record.bam_flags.contains(Flags::UNMAPPED) {
            feature_count_stats.add(record.features.len() as i32);
            let mut position = 0;
            for feature in &record.features {
                feature_code_stats.add(i32::from(feature_code(feature)));
                feature_position_delta_stats.add(feature_position(feature) - position);
                position = feature_position(feature);

                match feature {
                    crate::record::Feature::Substitution { code, .. } => {
                        base_substitution_stats.add(i32::from(*code))
                    }
                    crate::record::Feature::Deletion { len, .. } => {
                        deletion_length_stats.add(*len)
                    }
                    _ => {}
                }
            }
            mapping_quality_stats.add(i32::from(record.mapping_quality));
        }
    }

    let mut encodings = DataSeriesEncodings::default();
    encodings.bam_flags = Some(bam_flags_stats.choose_encoding(BF));
    encodings.cram_flags = Some(cram_flags_stats.choose_encoding(CF));
    encodings.read_lengths = Some(read_lengths_stats.choose_encoding(RL));
    encodings.alignment_starts = Some(alignment_start_delta_stats.choose_encoding(AP));
    encodings.read_group_ids = Some(read_group_stats.choose_encoding(RG));
    encodings.names = Some(Codec::ByteArrayStop {
        stop_byte: 0,
        block_content_id: RN,
    });
    encodings.mate_flags = Some(mate_flags_stats.choose_encoding(MF));
    encodings.mate_reference_ids = Some(mate_reference_id_stats.choose_encoding(NS));
    encodings.mate_alignment_starts = Some(mate_alignment_start_stats.choose_encoding(NP));
    encodings.template_lengths = Some(template_length_stats.choose_encoding(TS));
    encodings.mate_distances = Some(mate_distance_stats.choose_encoding(NF));
    encodings.tag_set_ids = Some(tag_set_id_stats.choose_encoding(TL));
    encodings.feature_counts = Some(feature_count_stats.choose_encoding(FN));
    encodings.feature_codes = Some(feature_code_stats.choose_encoding(FC));
    encodings.feature_position_deltas = Some(feature_position_delta_stats.choose_encoding(FP));
    encodings.deletion_lengths = Some(deletion_length_stats.choose_encoding(DL));
    encodings.base_substitution_codes = Some(base_substitution_stats.choose_encoding(BS));
    encodings.insertion_bases = Some(Codec::ByteArrayStop {
        stop_byte: 0,
        block_content_id: IN,
    });
    encodings.mapping_qualities = Some(mapping_quality_stats.choose_encoding(MQ));
    encodings.bases = Some(Codec::External { block_content_id: BA });
    encodings.quality_scores = Some(Codec::External { block_content_id: QS });
    if reference_id_stats.n_samples() > 0 {
        encodings.reference_ids = Some(reference_id_stats.choose_encoding(RI));
    }

    let mut tag_encodings: TagEncodings = IndexMap::new();
    let mut next_tag_content_id = TAG_BASE;
    for line in tag_sets {
        for &key in line {
            tag_encodings.entry(key).or_insert_with(|| {
                let id = next_tag_content_id;
                next_tag_content_id += 1;
                Codec::ByteArrayStop {
                    stop_byte: 0,
                    block_content_id: id,
                }
            });
        }
    }

    CompressionHeader {
        preservation_map: PreservationMap {
            tag_sets: tag_sets.to_vec(),
            ..PreservationMap::default()
        },
        data_series_encodings: encodings,
        tag_encodings,
    }
}

fn feature_code(feature: &crate::record::Feature) -> u8 {
    match feature {
        crate::record::Feature::SoftClip { .. } => b'S',
        crate::record::Feature::Substitution { .. } => b'X',
        crate::record::Feature::Deletion { .. } => b'D',
        crate::record::Feature::Insertion { .. } => b'I',
        crate::record::Feature::InsertionBase { .. } => b'i',
        crate::record::Feature::ReadBase { .. } => b'B',
        crate::record::Feature::QualityScore { .. } => b'Q',
    }
}

fn feature_position(feature: &crate::record::Feature) -> i32 {
    match feature {
        crate::record::Feature::SoftClip { position, .. }
        | crate::record::Feature::Substitution { position, .. }
        | crate::record::Feature::Deletion { position, .. }
        | crate::record::Feature::Insertion { position, .. }
        | crate::record::Feature::InsertionBase { position, .. }
        | crate::record::Feature::ReadBase { position, .. }
        | crate::record::Feature::QualityScore { position, .. } => *position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use bstr::BString;

    #[test]
    fn test_write_then_read_roundtrip() {
        let records = vec![
            Record {
                bam_flags: Flags::UNMAPPED,
                read_length: 4,
                name: Some(BString::from("r1")),
                bases: Some(b"ACGT".to_vec()),
                ..Record::default()
            },
            Record {
                bam_flags: Flags::UNMAPPED,
                read_length: 3,
                name: Some(BString::from("r2")),
                bases: Some(b"TTT".to_vec()),
                ..Record::default()
            },
        ];

        let mut buf = Vec::new();
        {
            let mut writer = Writer::new(&mut buf);
            writer
                .write_file_definition(&FileDefinition {
                    major_version: 3,
                    minor_version: 0,
                    file_id: [0u8; 20],
                })
                .unwrap();
            writer.write_file_header(b"@HD\tVN:1.6\n").unwrap();
            writer
                .write_records(ReferenceSequenceContext::None, &[Vec::new()], &records)
                .unwrap();
            writer.finish().unwrap();
        }

        let mut reader = Reader::new(&buf[..]);
        reader.read_file_definition().unwrap();
        let header_text = reader.read_file_header().unwrap();
        assert_eq!(header_text, b"@HD\tVN:1.6\n");

        let decoded: Vec<_> = std::iter::from_fn(|| reader.next_record().transpose())
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name, Some(BString::from("r1")));
        assert_eq!(decoded[1].name, Some(BString::from("r2")));
        assert_eq!(decoded[0].bases, Some(b"ACGT".to_vec()));
        assert_eq!(decoded[1].bases, Some(b"TTT".to_vec()));
    }
}
