//! The record decode/encode state machine: turns the codec graph's per-field symbol stream
//! into (and back from) a logical record, including reference-assisted feature reconstruction.

use bitflags::bitflags;
use bstr::BString;
use std::io::{Read, Write};

use crate::bitio::{BitReader, BitWriter};
use crate::codec::{ExternalReaders, ExternalWriters};
use crate::compression_header::{DataSeriesEncodings, TagEncodings};
use crate::error::{Error, Result};

bitflags! {
    /// BAM-compatible alignment flags (`BF`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u16 {
        /// The record is one segment of a template.
        const SEGMENTED = 0x0001;
        /// Each segment is mapped in a proper pair.
        const PROPERLY_ALIGNED = 0x0002;
        /// The segment is unmapped.
        const UNMAPPED = 0x0004;
        /// The mate is unmapped.
        const MATE_UNMAPPED = 0x0008;
        /// The sequence is reverse complemented.
        const REVERSE_COMPLEMENTED = 0x0010;
        /// The mate is reverse complemented.
        const MATE_REVERSE_COMPLEMENTED = 0x0020;
        /// This is the first segment.
        const FIRST_SEGMENT = 0x0040;
        /// This is the last segment.
        const LAST_SEGMENT = 0x0080;
        /// A secondary alignment.
        const SECONDARY = 0x0100;
        /// The read failed a quality filter.
        const QC_FAIL = 0x0200;
        /// A PCR/optical duplicate.
        const DUPLICATE = 0x0400;
        /// A supplementary alignment.
        const SUPPLEMENTARY = 0x0800;
    }
}

bitflags! {
    /// CRAM-specific per-record flags (`CF`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CramFlags: u8 {
        /// Quality scores are stored verbatim (`Qs`), not recomputed from the reference.
        const PRESERVE_QUALITY_SCORES = 0x01;
        /// The record's mate information is stored inline (`MF`/`NS`/`NP`/`TS`) rather than
        /// by forward offset.
        const DETACHED = 0x02;
        /// The record's mate is a later record in the same slice, reachable via `NF`.
        const MATE_DOWNSTREAM = 0x04;
        /// The record has no mate.
        const UNKNOWN_MATE = 0x08;
    }
}

/// A single alignment feature: a departure from the reference at a read-relative position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    /// `'S'`: bases present in the read but not consumed from the reference.
    SoftClip {
        /// 1-based position within the read.
        position: i32,
        /// The soft-clipped bases.
        bases: Vec<u8>,
    },
    /// `'X'`: a single-base substitution, coded against the preservation map's substitution
    /// matrix rather than stored as a literal base.
    Substitution {
        /// 1-based position within the read.
        position: i32,
        /// The substitution matrix code (`0..=3`).
        code: u8,
    },
    /// `'D'`: bases consumed from the reference but absent from the read.
    Deletion {
        /// 1-based position within the read.
        position: i32,
        /// The number of deleted reference bases.
        len: i32,
    },
    /// `'I'`: multiple bases present in the read but not consumed from the reference.
    Insertion {
        /// 1-based position within the read.
        position: i32,
        /// The inserted bases.
        bases: Vec<u8>,
    },
    /// `'i'`: a single inserted base.
    InsertionBase {
        /// 1-based position within the read.
        position: i32,
        /// The inserted base.
        base: u8,
    },
    /// `'B'`: an explicit read base and quality score, overriding reference-assisted
    /// reconstruction at this position.
    ReadBase {
        /// 1-based position within the read.
        position: i32,
        /// The read base.
        base: u8,
        /// The base's quality score.
        quality_score: u8,
    },
    /// `'Q'`: a quality score override with no accompanying base change.
    QualityScore {
        /// 1-based position within the read.
        position: i32,
        /// The quality score.
        quality_score: u8,
    },
}

impl Feature {
    fn position(&self) -> i32 {
        match self {
            Self::SoftClip { position, .. }
            | Self::Substitution { position, .. }
            | Self::Deletion { position, .. }
            | Self::Insertion { position, .. }
            | Self::InsertionBase { position, .. }
            | Self::ReadBase { position, .. }
            | Self::QualityScore { position, .. } => *position,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::SoftClip { .. } => b'S',
            Self::Substitution { .. } => b'X',
            Self::Deletion { .. } => b'D',
            Self::Insertion { .. } => b'I',
            Self::InsertionBase { .. } => b'i',
            Self::ReadBase { .. } => b'B',
            Self::QualityScore { .. } => b'Q',
        }
    }
}

/// Detached mate information, present when [`CramFlags::DETACHED`] is set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MateInfo {
    /// The mate's `BF`-style flags (reverse/unmapped bits only, per the wire format).
    pub mate_flags: u8,
    /// The mate's reference sequence id.
    pub reference_sequence_id: i32,
    /// The mate's alignment start.
    pub alignment_start: i32,
    /// The template length.
    pub template_length: i32,
}

/// One decoded (or about-to-be-encoded) CRAM record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// `BF`.
    pub bam_flags: Flags,
    /// `CF`.
    pub cram_flags: CramFlags,
    /// `RI`, present only when a slice spans multiple references.
    pub reference_sequence_id: Option<i32>,
    /// `RL`.
    pub read_length: i32,
    /// Absolute alignment start, reconstructed from `AP`.
    pub alignment_start: i32,
    /// `RG`.
    pub read_group_id: i32,
    /// `RN`, when read names are preserved.
    pub name: Option<BString>,
    /// Present when [`CramFlags::DETACHED`] is set.
    pub mate: Option<MateInfo>,
    /// Present when [`CramFlags::MATE_DOWNSTREAM`] is set: the record offset of the mate,
    /// relative to this record's position in the slice.
    pub next_fragment_offset: Option<i32>,
    /// `TL`: index into the compression header's tag-set table.
    pub tag_set_id: i32,
    /// Per-tag decoded byte payloads, in tag-set order.
    pub tag_values: Vec<Vec<u8>>,
    /// Features, present only for mapped records, in ascending position order.
    pub features: Vec<Feature>,
    /// `MQ`.
    pub mapping_quality: u8,
    /// `Qs`, present when preserved or when the record is unmapped.
    pub quality_scores: Option<Vec<u8>>,
    /// `BA`, present only for unmapped records.
    pub bases: Option<Vec<u8>>,
}

/// Bookkeeping threaded across a slice's worth of record decodes/encodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceState {
    /// The previous record's alignment start, for `AP` delta resolution.
    pub previous_alignment_start: i32,
    /// The index of the record currently being processed within the slice.
    pub record_index: usize,
}

const MAX_BASES_PER_CHUNK: usize = 1024;

/// Decodes one record from the core/external codec graph.
pub fn decode_record<R>(
    core: &mut BitReader<R>,
    external: &mut ExternalReaders<'_>,
    encodings: &DataSeriesEncodings,
    tag_encodings: &TagEncodings,
    tag_sets: &[Vec<([u8; 2], u8)>],
    records_have_names: bool,
    alignment_starts_are_deltas: bool,
    state: &mut SliceState,
) -> Result<Record>
where
    R: Read,
{
    let field = |name: &'static str, codec: &Option<crate::codec::Codec>| {
        codec
            .as_ref()
            .ok_or_else(|| Error::Corrupt(format!("missing data series encoding: {name}")))
    };

    let bam_flags = Flags::from_bits_truncate(
        field("BF", &encodings.bam_flags)?.decode_int(core, external)? as u16,
    );
    let cram_flags = CramFlags::from_bits_truncate(
        field("CF", &encodings.cram_flags)?.decode_int(core, external)? as u8,
    );

    let reference_sequence_id = match &encodings.reference_ids {
        Some(codec) => Some(codec.decode_int(core, external)? as i32),
        None => None,
    };

    let read_length = field("RL", &encodings.read_lengths)?.decode_int(core, external)? as i32;

    let ap_value = field("AP", &encodings.alignment_starts)?.decode_int(core, external)? as i32;
    let alignment_start = if alignment_starts_are_deltas {
        state.previous_alignment_start + ap_value
    } else {
        ap_value
    };
    state.previous_alignment_start = alignment_start;

    let read_group_id = field("RG", &encodings.read_group_ids)?.decode_int(core, external)? as i32;

    let mut name = None;
    if records_have_names {
        name = Some(BString::from(
            field("RN", &encodings.names)?.decode_bytes(core, external)?,
        ));
    }

    let mut mate = None;
    let mut next_fragment_offset = None;

    if cram_flags.contains(CramFlags::DETACHED) {
        let mate_flags = field("MF", &encodings.mate_flags)?.decode_int(core, external)? as u8;

        if name.is_none() {
            if let Some(codec) = &encodings.names {
                name = Some(BString::from(codec.decode_bytes(core, external)?));
            }
        }

        let reference_sequence_id =
            field("NS", &encodings.mate_reference_ids)?.decode_int(core, external)? as i32;
        let alignment_start =
            field("NP", &encodings.mate_alignment_starts)?.decode_int(core, external)? as i32;
        let template_length =
            field("TS", &encodings.template_lengths)?.decode_int(core, external)? as i32;

        mate = Some(MateInfo {
            mate_flags,
            reference_sequence_id,
            alignment_start,
            template_length,
        });
    } else if cram_flags.contains(CramFlags::MATE_DOWNSTREAM) {
        next_fragment_offset =
            Some(field("NF", &encodings.mate_distances)?.decode_int(core, external)? as i32);
    }

    let tag_set_id = field("TL", &encodings.tag_set_ids)?.decode_int(core, external)? as i32;
    let tag_set = tag_sets
        .get(usize::try_from(tag_set_id).map_err(|e| Error::Corrupt(e.to_string()))?)
        .ok_or_else(|| Error::Corrupt(format!("tag set id {tag_set_id} out of range")))?;
    let mut tag_values = Vec::with_capacity(tag_set.len());
    for &(name, ty) in tag_set {
        let codec = tag_encodings
            .get(&(name, ty))
            .ok_or_else(|| Error::Corrupt(format!("no tag encoding for {name:?}/{ty}")))?;
        tag_values.push(codec.decode_bytes(core, external)?);
    }

    let mut features = Vec::new();
    let mut mapping_quality = 0;
    let mut quality_scores = None;
    let mut bases = None;

    if !bam_flags.contains(Flags::UNMAPPED) {
        let feature_count =
            field("FN", &encodings.feature_counts)?.decode_int(core, external)? as usize;

        let mut position = 0;
        for _ in 0..feature_count {
            let code = field("FC", &encodings.feature_codes)?.decode_int(core, external)? as u8;
            let delta =
                field("FP", &encodings.feature_position_deltas)?.decode_int(core, external)? as i32;
            position += delta;

            let feature = match code {
                b'S' => Feature::SoftClip {
                    position,
                    bases: field("IN", &encodings.insertion_bases)?.decode_bytes(core, external)?,
                },
                b'X' => Feature::Substitution {
                    position,
                    code: field("BS", &encodings.base_substitution_codes)?
                        .decode_int(core, external)? as u8,
                },
                b'D' => Feature::Deletion {
                    position,
                    len: field("DL", &encodings.deletion_lengths)?.decode_int(core, external)?
                        as i32,
                },
                b'I' => Feature::Insertion {
                    position,
                    bases: field("IN", &encodings.insertion_bases)?.decode_bytes(core, external)?,
                },
                b'i' => {
                    let bases =
                        field("BA", &encodings.bases)?.decode_int(core, external)? as u8;
                    Feature::InsertionBase { position, base: bases }
                }
                b'B' => {
                    let base = field("BA", &encodings.bases)?.decode_int(core, external)? as u8;
                    let quality_score =
                        field("QS", &encodings.quality_scores)?.decode_int(core, external)? as u8;
                    Feature::ReadBase {
                        position,
                        base,
                        quality_score,
                    }
                }
                b'Q' => Feature::QualityScore {
                    position,
                    quality_score: field("QS", &encodings.quality_scores)?
                        .decode_int(core, external)? as u8,
                },
                other => {
                    return Err(Error::Corrupt(format!("unknown feature code: {other:#04x}")))
                }
            };

            features.push(feature);
        }

        mapping_quality = field("MQ", &encodings.mapping_qualities)?.decode_int(core, external)? as u8;

        if cram_flags.contains(CramFlags::PRESERVE_QUALITY_SCORES) {
            quality_scores = Some(read_bases_chunked(
                field("QS", &encodings.quality_scores)?,
                core,
                external,
                read_length as usize,
            )?);
        }
    } else {
        bases = Some(read_bases_chunked(
            field("BA", &encodings.bases)?,
            core,
            external,
            read_length as usize,
        )?);

        if cram_flags.contains(CramFlags::PRESERVE_QUALITY_SCORES) {
            quality_scores = Some(read_bases_chunked(
                field("QS", &encodings.quality_scores)?,
                core,
                external,
                read_length as usize,
            )?);
        }
    }

    state.record_index += 1;

    Ok(Record {
        bam_flags,
        cram_flags,
        reference_sequence_id,
        read_length,
        alignment_start,
        read_group_id,
        name,
        mate,
        next_fragment_offset,
        tag_set_id,
        tag_values,
        features,
        mapping_quality,
        quality_scores,
        bases,
    })
}

fn read_bases_chunked<R>(
    codec: &crate::codec::Codec,
    core: &mut BitReader<R>,
    external: &mut ExternalReaders<'_>,
    len: usize,
) -> Result<Vec<u8>>
where
    R: Read,
{
    let mut out = Vec::with_capacity(len);
    let mut remaining = len;

    while remaining > 0 {
        let chunk = remaining.min(MAX_BASES_PER_CHUNK);
        for _ in 0..chunk {
            out.push(codec.decode_int(core, external)? as u8);
        }
        remaining -= chunk;
    }

    Ok(out)
}

fn write_bases_chunked<W>(
    codec: &crate::codec::Codec,
    core: &mut BitWriter<W>,
    external: &mut ExternalWriters,
    data: &[u8],
) -> Result<()>
where
    W: Write,
{
    for chunk in data.chunks(MAX_BASES_PER_CHUNK) {
        for &b in chunk {
            codec.encode_int(core, external, i64::from(b))?;
        }
    }
    Ok(())
}

/// Encodes one record against the core/external codec graph.
pub fn encode_record<W>(
    core: &mut BitWriter<W>,
    external: &mut ExternalWriters,
    encodings: &DataSeriesEncodings,
    tag_encodings: &TagEncodings,
    tag_sets: &[Vec<([u8; 2], u8)>],
    records_have_names: bool,
    alignment_starts_are_deltas: bool,
    state: &mut SliceState,
    record: &Record,
) -> Result<()>
where
    W: Write,
{
    let field = |name: &'static str, codec: &Option<crate::codec::Codec>| {
        codec
            .as_ref()
            .ok_or_else(|| Error::Corrupt(format!("missing data series encoding: {name}")))
    };

    field("BF", &encodings.bam_flags)?.encode_int(core, external, i64::from(record.bam_flags.bits()))?;
    field("CF", &encodings.cram_flags)?.encode_int(core, external, i64::from(record.cram_flags.bits()))?;

    if let Some(codec) = &encodings.reference_ids {
        let id = record
            .reference_sequence_id
            .ok_or_else(|| Error::Corrupt("record missing reference sequence id".into()))?;
        codec.encode_int(core, external, i64::from(id))?;
    }

    field("RL", &encodings.read_lengths)?.encode_int(core, external, i64::from(record.read_length))?;

    let ap_value = if alignment_starts_are_deltas {
        record.alignment_start - state.previous_alignment_start
    } else {
        record.alignment_start
    };
    field("AP", &encodings.alignment_starts)?.encode_int(core, external, i64::from(ap_value))?;
    state.previous_alignment_start = record.alignment_start;

    field("RG", &encodings.read_group_ids)?.encode_int(core, external, i64::from(record.read_group_id))?;

    if records_have_names {
        let name = record
            .name
            .as_ref()
            .ok_or_else(|| Error::Corrupt("record missing name".into()))?;
        field("RN", &encodings.names)?.encode_bytes(core, external, name)?;
    }

    if record.cram_flags.contains(CramFlags::DETACHED) {
        let mate = record
            .mate
            .as_ref()
            .ok_or_else(|| Error::Corrupt("detached record missing mate info".into()))?;

        field("MF", &encodings.mate_flags)?.encode_int(core, external, i64::from(mate.mate_flags))?;

        if !records_have_names {
            if let Some(codec) = &encodings.names {
                let name = record
                    .name
                    .as_ref()
                    .ok_or_else(|| Error::Corrupt("detached record missing name".into()))?;
                codec.encode_bytes(core, external, name)?;
            }
        }

        field("NS", &encodings.mate_reference_ids)?
            .encode_int(core, external, i64::from(mate.reference_sequence_id))?;
        field("NP", &encodings.mate_alignment_starts)?
            .encode_int(core, external, i64::from(mate.alignment_start))?;
        field("TS", &encodings.template_lengths)?
            .encode_int(core, external, i64::from(mate.template_length))?;
    } else if record.cram_flags.contains(CramFlags::MATE_DOWNSTREAM) {
        let offset = record
            .next_fragment_offset
            .ok_or_else(|| Error::Corrupt("record missing next fragment offset".into()))?;
        field("NF", &encodings.mate_distances)?.encode_int(core, external, i64::from(offset))?;
    }

    field("TL", &encodings.tag_set_ids)?.encode_int(core, external, i64::from(record.tag_set_id))?;

    let tag_set = tag_sets
        .get(usize::try_from(record.tag_set_id).map_err(|e| Error::Corrupt(e.to_string()))?)
        .ok_or_else(|| Error::Corrupt(format!("tag set id {} out of range", record.tag_set_id)))?;

    if record.tag_values.len() != tag_set.len() {
        return Err(Error::Corrupt(
            "record tag value count does not match its tag set".into(),
        ));
    }
    for (&(name, ty), value) in tag_set.iter().zip(record.tag_values.iter()) {
        let codec = tag_encodings
            .get(&(name, ty))
            .ok_or_else(|| Error::Corrupt(format!("no tag encoding for {name:?}/{ty}")))?;
        codec.encode_bytes(core, external, value)?;
    }

    if !record.bam_flags.contains(Flags::UNMAPPED) {
        field("FN", &encodings.feature_counts)?
            .encode_int(core, external, record.features.len() as i64)?;

        let mut position = 0;
        for feature in &record.features {
            field("FC", &encodings.feature_codes)?
                .encode_int(core, external, i64::from(feature.code()))?;
            field("FP", &encodings.feature_position_deltas)?
                .encode_int(core, external, i64::from(feature.position() - position))?;
            position = feature.position();

            match feature {
                Feature::SoftClip { bases, .. } | Feature::Insertion { bases, .. } => {
                    field("IN", &encodings.insertion_bases)?.encode_bytes(core, external, bases)?;
                }
                Feature::Substitution { code, .. } => {
                    field("BS", &encodings.base_substitution_codes)?
                        .encode_int(core, external, i64::from(*code))?;
                }
                Feature::Deletion { len, .. } => {
                    field("DL", &encodings.deletion_lengths)?
                        .encode_int(core, external, i64::from(*len))?;
                }
                Feature::InsertionBase { base, .. } => {
                    field("BA", &encodings.bases)?.encode_int(core, external, i64::from(*base))?;
                }
                Feature::ReadBase {
                    base,
                    quality_score,
                    ..
                } => {
                    field("BA", &encodings.bases)?.encode_int(core, external, i64::from(*base))?;
                    field("QS", &encodings.quality_scores)?
                        .encode_int(core, external, i64::from(*quality_score))?;
                }
                Feature::QualityScore { quality_score, .. } => {
                    field("QS", &encodings.quality_scores)?
                        .encode_int(core, external, i64::from(*quality_score))?;
                }
            }
        }

        field("MQ", &encodings.mapping_qualities)?
            .encode_int(core, external, i64::from(record.mapping_quality))?;

        if record.cram_flags.contains(CramFlags::PRESERVE_QUALITY_SCORES) {
            let quality_scores = record
                .quality_scores
                .as_ref()
                .ok_or_else(|| Error::Corrupt("record missing preserved quality scores".into()))?;
            write_bases_chunked(field("QS", &encodings.quality_scores)?, core, external, quality_scores)?;
        }
    } else {
        let bases = record
            .bases
            .as_ref()
            .ok_or_else(|| Error::Corrupt("unmapped record missing bases".into()))?;
        write_bases_chunked(field("BA", &encodings.bases)?, core, external, bases)?;

        if record.cram_flags.contains(CramFlags::PRESERVE_QUALITY_SCORES) {
            let quality_scores = record
                .quality_scores
                .as_ref()
                .ok_or_else(|| Error::Corrupt("record missing preserved quality scores".into()))?;
            write_bases_chunked(field("QS", &encodings.quality_scores)?, core, external, quality_scores)?;
        }
    }

    state.record_index += 1;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use std::collections::HashMap;

    fn encodings_for_simple_unmapped_record() -> DataSeriesEncodings {
        let mut e = DataSeriesEncodings::default();
        e.bam_flags = Some(Codec::External { block_content_id: 0 });
        e.cram_flags = Some(Codec::External { block_content_id: 1 });
        e.read_lengths = Some(Codec::External { block_content_id: 2 });
        e.alignment_starts = Some(Codec::External { block_content_id: 3 });
        e.read_group_ids = Some(Codec::External { block_content_id: 4 });
        e.names = Some(Codec::ByteArrayStop {
            stop_byte: 0,
            block_content_id: 5,
        });
        e.tag_set_ids = Some(Codec::External { block_content_id: 6 });
        e.bases = Some(Codec::External { block_content_id: 7 });
        e.quality_scores = Some(Codec::External { block_content_id: 8 });
        e
    }

    #[test]
    fn test_unmapped_record_roundtrip() {
        let encodings = encodings_for_simple_unmapped_record();
        let tag_encodings = TagEncodings::new();
        let tag_sets: Vec<Vec<([u8; 2], u8)>> = vec![Vec::new()];

        let record = Record {
            bam_flags: Flags::UNMAPPED,
            cram_flags: CramFlags::PRESERVE_QUALITY_SCORES,
            reference_sequence_id: None,
            read_length: 4,
            alignment_start: 0,
            read_group_id: 0,
            name: Some(BString::from("read1")),
            mate: None,
            next_fragment_offset: None,
            tag_set_id: 0,
            tag_values: Vec::new(),
            features: Vec::new(),
            mapping_quality: 0,
            quality_scores: Some(vec![30, 31, 32, 33]),
            bases: Some(b"ACGT".to_vec()),
        };

        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        let mut write_state = SliceState::default();

        encode_record(
            &mut core_out,
            &mut writers,
            &encodings,
            &tag_encodings,
            &tag_sets,
            true,
            true,
            &mut write_state,
            &record,
        )
        .unwrap();

        let blocks = writers.into_blocks();
        let mut borrowed: HashMap<i32, &[u8]> = HashMap::new();
        for (k, v) in &blocks {
            borrowed.insert(*k, v.as_slice());
        }
        let mut readers = ExternalReaders::new(borrowed);
        let mut core_in = BitReader::new(&[][..]);
        let mut read_state = SliceState::default();

        let decoded = decode_record(
            &mut core_in,
            &mut readers,
            &encodings,
            &tag_encodings,
            &tag_sets,
            true,
            true,
            &mut read_state,
        )
        .unwrap();

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_mapped_record_with_features_roundtrip() {
        let mut encodings = encodings_for_simple_unmapped_record();
        encodings.reference_ids = Some(Codec::External { block_content_id: 9 });
        encodings.feature_counts = Some(Codec::External { block_content_id: 10 });
        encodings.feature_codes = Some(Codec::External { block_content_id: 11 });
        encodings.feature_position_deltas = Some(Codec::External { block_content_id: 12 });
        encodings.base_substitution_codes = Some(Codec::External { block_content_id: 13 });
        encodings.deletion_lengths = Some(Codec::External { block_content_id: 14 });
        encodings.insertion_bases = Some(Codec::ByteArrayLen {
            len_codec: Box::new(Codec::External { block_content_id: 15 }),
            data_block_content_id: 16,
        });
        encodings.mapping_qualities = Some(Codec::External { block_content_id: 17 });

        let tag_encodings = TagEncodings::new();
        let tag_sets: Vec<Vec<([u8; 2], u8)>> = vec![Vec::new()];

        let record = Record {
            bam_flags: Flags::empty(),
            cram_flags: CramFlags::empty(),
            reference_sequence_id: Some(0),
            read_length: 10,
            alignment_start: 100,
            read_group_id: 0,
            name: Some(BString::from("read2")),
            mate: None,
            next_fragment_offset: None,
            tag_set_id: 0,
            tag_values: Vec::new(),
            features: vec![
                Feature::Substitution { position: 2, code: 1 },
                Feature::Deletion { position: 5, len: 2 },
                Feature::Insertion {
                    position: 8,
                    bases: b"GG".to_vec(),
                },
            ],
            mapping_quality: 40,
            quality_scores: None,
            bases: None,
        };

        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        let mut write_state = SliceState::default();

        encode_record(
            &mut core_out,
            &mut writers,
            &encodings,
            &tag_encodings,
            &tag_sets,
            true,
            true,
            &mut write_state,
            &record,
        )
        .unwrap();

        let blocks = writers.into_blocks();
        let mut borrowed: HashMap<i32, &[u8]> = HashMap::new();
        for (k, v) in &blocks {
            borrowed.insert(*k, v.as_slice());
        }
        let mut readers = ExternalReaders::new(borrowed);
        let mut core_in = BitReader::new(&[][..]);
        let mut read_state = SliceState::default();

        let decoded = decode_record(
            &mut core_in,
            &mut readers,
            &encodings,
            &tag_encodings,
            &tag_sets,
            true,
            true,
            &mut read_state,
        )
        .unwrap();

        assert_eq!(decoded, record);
    }
}
