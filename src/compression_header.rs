//! The compression header: per-container preservation flags, substitution matrix, and the
//! per-data-series and per-tag encodings records are built from.

use std::collections::HashMap;
use std::io::{Read, Write};

use indexmap::IndexMap;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::itf8::{self, read_itf8_as};

/// A 2-byte preservation-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreservationKey {
    /// `RN`: whether read names are stored.
    RecordsHaveNames,
    /// `AP`: whether alignment starts are delta-encoded against the previous record.
    AlignmentStartsAreDeltas,
    /// `RR`: whether records assume access to the reference sequence.
    ExternalReferenceSequenceIsRequired,
    /// `SM`: the base substitution code matrix.
    SubstitutionMatrix,
    /// `TD`: the set of distinct tag-dictionary lines used by this container.
    TagSets,
}

impl TryFrom<[u8; 2]> for PreservationKey {
    type Error = Error;

    fn try_from(b: [u8; 2]) -> Result<Self> {
        match &b {
            b"RN" => Ok(Self::RecordsHaveNames),
            b"AP" => Ok(Self::AlignmentStartsAreDeltas),
            b"RR" => Ok(Self::ExternalReferenceSequenceIsRequired),
            b"SM" => Ok(Self::SubstitutionMatrix),
            b"TD" => Ok(Self::TagSets),
            _ => Err(Error::MalformedHeader(format!(
                "invalid preservation map key: {:?}",
                b
            ))),
        }
    }
}

impl From<PreservationKey> for [u8; 2] {
    fn from(key: PreservationKey) -> Self {
        match key {
            PreservationKey::RecordsHaveNames => *b"RN",
            PreservationKey::AlignmentStartsAreDeltas => *b"AP",
            PreservationKey::ExternalReferenceSequenceIsRequired => *b"RR",
            PreservationKey::SubstitutionMatrix => *b"SM",
            PreservationKey::TagSets => *b"TD",
        }
    }
}

/// The 4x4 base substitution code matrix (reference base -> read base, excluding the
/// identity substitution), used by the `BS` feature code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionMatrix {
    /// `codes[reference_base][code]` is the substituted read base, where base indices are
    /// `A=0, C=1, G=2, T=3, N=4` and `code` is `0..=3`.
    pub codes: [[u8; 4]; 5],
}

impl Default for SubstitutionMatrix {
    fn default() -> Self {
        // The conventional default ordering used when no empirical ranking is computed.
        const BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];
        let mut codes = [[0u8; 4]; 5];

        for (i, row) in codes.iter_mut().enumerate() {
            let mut others: Vec<u8> = BASES.iter().copied().filter(|&b| b != BASES[i]).collect();
            others.truncate(4);
            row.copy_from_slice(&others);
        }

        Self { codes }
    }
}

impl SubstitutionMatrix {
    fn to_bytes(self) -> [u8; 5] {
        let base_index = |b: u8| match b {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => 4,
        };

        let mut out = [0u8; 5];
        for (i, row) in self.codes.iter().enumerate() {
            let mut byte = 0u8;
            for (code, &base) in row.iter().enumerate() {
                byte |= (base_index(base) as u8) << ((3 - code) * 2);
            }
            out[i] = byte;
        }
        out
    }

    fn from_bytes(bytes: [u8; 5]) -> Self {
        const BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];
        let mut codes = [[0u8; 4]; 5];

        for (i, &byte) in bytes.iter().enumerate() {
            for code in 0..4 {
                let idx = (byte >> ((3 - code) * 2)) & 0x3;
                codes[i][code] = BASES[idx as usize];
            }
        }

        Self { codes }
    }
}

/// Per-container bookkeeping that affects how records are decoded/encoded.
#[derive(Debug, Clone)]
pub struct PreservationMap {
    /// `RN`.
    pub records_have_names: bool,
    /// `AP`.
    pub alignment_starts_are_deltas: bool,
    /// `RR`.
    pub external_reference_sequence_is_required: bool,
    /// `SM`.
    pub substitution_matrix: SubstitutionMatrix,
    /// `TD`: tag dictionary lines, each a sequence of `(tag name, value type)` pairs.
    pub tag_sets: Vec<Vec<([u8; 2], u8)>>,
}

impl Default for PreservationMap {
    fn default() -> Self {
        Self {
            records_have_names: true,
            alignment_starts_are_deltas: true,
            external_reference_sequence_is_required: true,
            substitution_matrix: SubstitutionMatrix::default(),
            tag_sets: Vec::new(),
        }
    }
}

fn write_sized<W, F>(writer: &mut W, f: F) -> Result<()>
where
    W: Write,
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut buf = Vec::new();
    f(&mut buf)?;
    itf8::write_itf8(writer, buf.len() as i32)?;
    writer.write_all(&buf)?;
    Ok(())
}

fn read_sized<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: Read,
{
    let len: usize = read_itf8_as(reader)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes the preservation map.
pub fn write_preservation_map<W>(writer: &mut W, map: &PreservationMap) -> Result<()>
where
    W: Write,
{
    write_sized(writer, |buf| {
        let n_entries = 4 + usize::from(!map.tag_sets.is_empty() || true);
        itf8::write_itf8(buf, n_entries as i32)?;

        write_entry(buf, PreservationKey::RecordsHaveNames, &[map.records_have_names as u8])?;
        write_entry(
            buf,
            PreservationKey::AlignmentStartsAreDeltas,
            &[map.alignment_starts_are_deltas as u8],
        )?;
        write_entry(
            buf,
            PreservationKey::ExternalReferenceSequenceIsRequired,
            &[map.external_reference_sequence_is_required as u8],
        )?;
        write_entry(
            buf,
            PreservationKey::SubstitutionMatrix,
            &map.substitution_matrix.to_bytes(),
        )?;

        let mut td = Vec::new();
        for line in &map.tag_sets {
            for &(name, ty) in line {
                td.push(name[0]);
                td.push(name[1]);
                td.push(ty);
            }
            td.push(0);
        }
        write_entry(buf, PreservationKey::TagSets, &td)?;

        Ok(())
    })
}

fn write_entry<W>(writer: &mut W, key: PreservationKey, value: &[u8]) -> Result<()>
where
    W: Write,
{
    let key_bytes: [u8; 2] = key.into();
    writer.write_all(&key_bytes)?;
    itf8::write_itf8(writer, value.len() as i32)?;
    writer.write_all(value)?;
    Ok(())
}

/// Reads the preservation map.
pub fn read_preservation_map<R>(reader: &mut R) -> Result<PreservationMap>
where
    R: Read,
{
    let body = read_sized(reader)?;
    let mut cursor = &body[..];

    let n_entries: usize = read_itf8_as(&mut cursor)?;
    let mut map = PreservationMap::default();

    for _ in 0..n_entries {
        let mut key_bytes = [0u8; 2];
        cursor.read_exact(&mut key_bytes)?;
        let key = PreservationKey::try_from(key_bytes)?;

        let value = read_sized(&mut cursor)?;

        match key {
            PreservationKey::RecordsHaveNames => map.records_have_names = value[0] != 0,
            PreservationKey::AlignmentStartsAreDeltas => {
                map.alignment_starts_are_deltas = value[0] != 0
            }
            PreservationKey::ExternalReferenceSequenceIsRequired => {
                map.external_reference_sequence_is_required = value[0] != 0
            }
            PreservationKey::SubstitutionMatrix => {
                let bytes: [u8; 5] = value
                    .try_into()
                    .map_err(|_| Error::MalformedHeader("invalid substitution matrix".into()))?;
                map.substitution_matrix = SubstitutionMatrix::from_bytes(bytes);
            }
            PreservationKey::TagSets => {
                let mut lines = Vec::new();
                let mut line = Vec::new();
                let mut i = 0;
                while i < value.len() {
                    if value[i] == 0 {
                        lines.push(std::mem::take(&mut line));
                        i += 1;
                        continue;
                    }
                    if i + 3 > value.len() {
                        return Err(Error::MalformedHeader("truncated tag set entry".into()));
                    }
                    line.push(([value[i], value[i + 1]], value[i + 2]));
                    i += 3;
                }
                map.tag_sets = lines;
            }
        }
    }

    Ok(map)
}

/// The per-data-series encodings, keyed by their 2-letter field codes.
#[derive(Debug, Clone, Default)]
pub struct DataSeriesEncodings {
    /// `BF`: BAM-compatible flags.
    pub bam_flags: Option<Codec>,
    /// `CF`: CRAM-specific compression flags.
    pub cram_flags: Option<Codec>,
    /// `RI`: reference sequence ids.
    pub reference_ids: Option<Codec>,
    /// `RL`: read lengths.
    pub read_lengths: Option<Codec>,
    /// `AP`: alignment start positions.
    pub alignment_starts: Option<Codec>,
    /// `RG`: read group ids.
    pub read_group_ids: Option<Codec>,
    /// `RN`: read names.
    pub names: Option<Codec>,
    /// `MF`: mate flags.
    pub mate_flags: Option<Codec>,
    /// `NS`: mate reference sequence ids.
    pub mate_reference_ids: Option<Codec>,
    /// `NP`: mate alignment starts.
    pub mate_alignment_starts: Option<Codec>,
    /// `TS`: template lengths.
    pub template_lengths: Option<Codec>,
    /// `NF`: mate distances.
    pub mate_distances: Option<Codec>,
    /// `TL`: tag line ids (index into the preservation map's tag sets).
    pub tag_set_ids: Option<Codec>,
    /// `FN`: feature counts.
    pub feature_counts: Option<Codec>,
    /// `FC`: feature codes.
    pub feature_codes: Option<Codec>,
    /// `FP`: feature position deltas.
    pub feature_position_deltas: Option<Codec>,
    /// `DL`: deletion lengths.
    pub deletion_lengths: Option<Codec>,
    /// `BB`: stretches of raw bases.
    pub bases_stretches: Option<Codec>,
    /// `QQ`: stretches of raw quality scores.
    pub quality_scores_stretches: Option<Codec>,
    /// `BS`: base substitution codes.
    pub base_substitution_codes: Option<Codec>,
    /// `IN`: insertion bases.
    pub insertion_bases: Option<Codec>,
    /// `RS`: reference skip lengths.
    pub reference_skip_lengths: Option<Codec>,
    /// `PD`: padding lengths.
    pub padding_lengths: Option<Codec>,
    /// `HC`: hard clip lengths.
    pub hard_clip_lengths: Option<Codec>,
    /// `SC`: soft clip bases.
    pub soft_clip_bases: Option<Codec>,
    /// `MQ`: mapping qualities.
    pub mapping_qualities: Option<Codec>,
    /// `BA`: bases.
    pub bases: Option<Codec>,
    /// `QS`: quality scores.
    pub quality_scores: Option<Codec>,
}

impl DataSeriesEncodings {
    fn fields(&self) -> Vec<(&'static [u8; 2], Option<&Codec>)> {
        vec![
            (b"BF", self.bam_flags.as_ref()),
            (b"CF", self.cram_flags.as_ref()),
            (b"RI", self.reference_ids.as_ref()),
            (b"RL", self.read_lengths.as_ref()),
            (b"AP", self.alignment_starts.as_ref()),
            (b"RG", self.read_group_ids.as_ref()),
            (b"RN", self.names.as_ref()),
            (b"MF", self.mate_flags.as_ref()),
            (b"NS", self.mate_reference_ids.as_ref()),
            (b"NP", self.mate_alignment_starts.as_ref()),
            (b"TS", self.template_lengths.as_ref()),
            (b"NF", self.mate_distances.as_ref()),
            (b"TL", self.tag_set_ids.as_ref()),
            (b"FN", self.feature_counts.as_ref()),
            (b"FC", self.feature_codes.as_ref()),
            (b"FP", self.feature_position_deltas.as_ref()),
            (b"DL", self.deletion_lengths.as_ref()),
            (b"BB", self.bases_stretches.as_ref()),
            (b"QQ", self.quality_scores_stretches.as_ref()),
            (b"BS", self.base_substitution_codes.as_ref()),
            (b"IN", self.insertion_bases.as_ref()),
            (b"RS", self.reference_skip_lengths.as_ref()),
            (b"PD", self.padding_lengths.as_ref()),
            (b"HC", self.hard_clip_lengths.as_ref()),
            (b"SC", self.soft_clip_bases.as_ref()),
            (b"MQ", self.mapping_qualities.as_ref()),
            (b"BA", self.bases.as_ref()),
            (b"QS", self.quality_scores.as_ref()),
        ]
    }

    fn field_mut(&mut self, code: [u8; 2]) -> Option<&mut Option<Codec>> {
        Some(match &code {
            b"BF" => &mut self.bam_flags,
            b"CF" => &mut self.cram_flags,
            b"RI" => &mut self.reference_ids,
            b"RL" => &mut self.read_lengths,
            b"AP" => &mut self.alignment_starts,
            b"RG" => &mut self.read_group_ids,
            b"RN" => &mut self.names,
            b"MF" => &mut self.mate_flags,
            b"NS" => &mut self.mate_reference_ids,
            b"NP" => &mut self.mate_alignment_starts,
            b"TS" => &mut self.template_lengths,
            b"NF" => &mut self.mate_distances,
            b"TL" => &mut self.tag_set_ids,
            b"FN" => &mut self.feature_counts,
            b"FC" => &mut self.feature_codes,
            b"FP" => &mut self.feature_position_deltas,
            b"DL" => &mut self.deletion_lengths,
            b"BB" => &mut self.bases_stretches,
            b"QQ" => &mut self.quality_scores_stretches,
            b"BS" => &mut self.base_substitution_codes,
            b"IN" => &mut self.insertion_bases,
            b"RS" => &mut self.reference_skip_lengths,
            b"PD" => &mut self.padding_lengths,
            b"HC" => &mut self.hard_clip_lengths,
            b"SC" => &mut self.soft_clip_bases,
            b"MQ" => &mut self.mapping_qualities,
            b"BA" => &mut self.bases,
            b"QS" => &mut self.quality_scores,
            _ => return None,
        })
    }
}

/// An encoded integer encoding descriptor, as it appears in the compression header: a kind
/// tag followed by kind-specific arguments, all ITF-8 encoded.
fn write_codec<W>(writer: &mut W, codec: &Codec) -> Result<()>
where
    W: Write,
{
    write_sized(writer, |buf| {
        match codec {
            Codec::External { block_content_id } => {
                itf8::write_itf8(buf, 0)?;
                write_sized(buf, |args| itf8::write_itf8(args, *block_content_id))?;
            }
            Codec::Huffman { alphabet, bit_lens } => {
                itf8::write_itf8(buf, 1)?;
                write_sized(buf, |args| {
                    itf8::write_itf8(args, alphabet.len() as i32)?;
                    for &s in alphabet {
                        itf8::write_itf8(args, s)?;
                    }
                    itf8::write_itf8(args, bit_lens.len() as i32)?;
                    for &l in bit_lens {
                        itf8::write_itf8(args, l as i32)?;
                    }
                    Ok(())
                })?;
            }
            Codec::Beta { offset, len } => {
                itf8::write_itf8(buf, 2)?;
                write_sized(buf, |args| {
                    itf8::write_itf8(args, *offset)?;
                    itf8::write_itf8(args, *len as i32)
                })?;
            }
            Codec::Gamma { offset } => {
                itf8::write_itf8(buf, 4)?;
                write_sized(buf, |args| itf8::write_itf8(args, *offset))?;
            }
            Codec::Subexp { offset, k } => {
                itf8::write_itf8(buf, 5)?;
                write_sized(buf, |args| {
                    itf8::write_itf8(args, *offset)?;
                    itf8::write_itf8(args, *k as i32)
                })?;
            }
            Codec::ByteArrayLen {
                len_codec,
                data_block_content_id,
            } => {
                itf8::write_itf8(buf, 6)?;
                write_sized(buf, |args| {
                    write_codec(args, len_codec)?;
                    itf8::write_itf8(args, *data_block_content_id)
                })?;
            }
            Codec::ByteArrayStop {
                stop_byte,
                block_content_id,
            } => {
                itf8::write_itf8(buf, 7)?;
                write_sized(buf, |args| {
                    args.push(*stop_byte);
                    itf8::write_itf8(args, *block_content_id)
                })?;
            }
        }
        Ok(())
    })
}

fn read_codec<R>(reader: &mut R) -> Result<Codec>
where
    R: Read,
{
    let body = read_sized(reader)?;
    let mut cursor = &body[..];
    let kind: i32 = read_itf8_as(&mut cursor)?;
    let args = read_sized(&mut cursor)?;
    let mut args_cursor = &args[..];

    Ok(match kind {
        0 => Codec::External {
            block_content_id: read_itf8_as(&mut args_cursor)?,
        },
        1 => {
            let n_alphabet: usize = read_itf8_as(&mut args_cursor)?;
            let mut alphabet = Vec::with_capacity(n_alphabet);
            for _ in 0..n_alphabet {
                alphabet.push(read_itf8_as(&mut args_cursor)?);
            }
            let n_bit_lens: usize = read_itf8_as(&mut args_cursor)?;
            let mut bit_lens = Vec::with_capacity(n_bit_lens);
            for _ in 0..n_bit_lens {
                let l: i32 = read_itf8_as(&mut args_cursor)?;
                bit_lens.push(l as u32);
            }
            Codec::Huffman { alphabet, bit_lens }
        }
        2 => {
            let offset = read_itf8_as(&mut args_cursor)?;
            let len: i32 = read_itf8_as(&mut args_cursor)?;
            Codec::Beta { offset, len: len as u32 }
        }
        4 => Codec::Gamma {
            offset: read_itf8_as(&mut args_cursor)?,
        },
        5 => {
            let offset = read_itf8_as(&mut args_cursor)?;
            let k: i32 = read_itf8_as(&mut args_cursor)?;
            Codec::Subexp { offset, k: k as u32 }
        }
        6 => {
            let len_codec = Box::new(read_codec(&mut args_cursor)?);
            let data_block_content_id = read_itf8_as(&mut args_cursor)?;
            Codec::ByteArrayLen {
                len_codec,
                data_block_content_id,
            }
        }
        7 => {
            let mut stop_byte_buf = [0u8; 1];
            args_cursor.read_exact(&mut stop_byte_buf)?;
            Codec::ByteArrayStop {
                stop_byte: stop_byte_buf[0],
                block_content_id: read_itf8_as(&mut args_cursor)?,
            }
        }
        other => {
            return Err(Error::MalformedHeader(format!(
                "unknown encoding kind: {other}"
            )))
        }
    })
}

/// Writes the data-series encoding map.
pub fn write_data_series_encodings<W>(
    writer: &mut W,
    encodings: &DataSeriesEncodings,
) -> Result<()>
where
    W: Write,
{
    write_sized(writer, |buf| {
        let present: Vec<_> = encodings.fields().into_iter().filter(|(_, c)| c.is_some()).collect();
        itf8::write_itf8(buf, present.len() as i32)?;
        for (code, codec) in present {
            buf.write_all(code)?;
            write_codec(buf, codec.unwrap())?;
        }
        Ok(())
    })
}

/// Reads the data-series encoding map.
pub fn read_data_series_encodings<R>(reader: &mut R) -> Result<DataSeriesEncodings>
where
    R: Read,
{
    let body = read_sized(reader)?;
    let mut cursor = &body[..];
    let n: usize = read_itf8_as(&mut cursor)?;

    let mut encodings = DataSeriesEncodings::default();
    for _ in 0..n {
        let mut code = [0u8; 2];
        cursor.read_exact(&mut code)?;
        let codec = read_codec(&mut cursor)?;

        if let Some(slot) = encodings.field_mut(code) {
            *slot = Some(codec);
        }
    }

    Ok(encodings)
}

/// Tag encodings, keyed by `(tag name, value type)`.
pub type TagEncodings = IndexMap<([u8; 2], u8), Codec>;

/// Writes the tag encoding map.
pub fn write_tag_encodings<W>(writer: &mut W, encodings: &TagEncodings) -> Result<()>
where
    W: Write,
{
    write_sized(writer, |buf| {
        itf8::write_itf8(buf, encodings.len() as i32)?;
        for (&(name, ty), codec) in encodings {
            let id = (i32::from(name[0]) << 16) | (i32::from(name[1]) << 8) | i32::from(ty);
            itf8::write_itf8(buf, id)?;
            write_codec(buf, codec)?;
        }
        Ok(())
    })
}

/// Reads the tag encoding map.
pub fn read_tag_encodings<R>(reader: &mut R) -> Result<TagEncodings>
where
    R: Read,
{
    let body = read_sized(reader)?;
    let mut cursor = &body[..];
    let n: usize = read_itf8_as(&mut cursor)?;

    let mut encodings = IndexMap::new();
    for _ in 0..n {
        let id: i32 = read_itf8_as(&mut cursor)?;
        let name = [((id >> 16) & 0xff) as u8, ((id >> 8) & 0xff) as u8];
        let ty = (id & 0xff) as u8;
        let codec = read_codec(&mut cursor)?;
        encodings.insert((name, ty), codec);
    }

    Ok(encodings)
}

/// A container's compression header: the preservation map plus the data-series and tag
/// encodings every slice in the container decodes its records against.
#[derive(Debug, Clone)]
pub struct CompressionHeader {
    /// The preservation map.
    pub preservation_map: PreservationMap,
    /// The data-series encodings.
    pub data_series_encodings: DataSeriesEncodings,
    /// The tag encodings.
    pub tag_encodings: TagEncodings,
}

/// Writes a full compression header body (without the enclosing block framing).
pub fn write_compression_header<W>(writer: &mut W, header: &CompressionHeader) -> Result<()>
where
    W: Write,
{
    write_preservation_map(writer, &header.preservation_map)?;
    write_data_series_encodings(writer, &header.data_series_encodings)?;
    write_tag_encodings(writer, &header.tag_encodings)?;
    Ok(())
}

/// Reads a full compression header body (without the enclosing block framing).
pub fn read_compression_header<R>(reader: &mut R) -> Result<CompressionHeader>
where
    R: Read,
{
    let preservation_map = read_preservation_map(reader)?;
    let data_series_encodings = read_data_series_encodings(reader)?;
    let tag_encodings = read_tag_encodings(reader)?;

    Ok(CompressionHeader {
        preservation_map,
        data_series_encodings,
        tag_encodings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preservation_map_roundtrip() {
        let map = PreservationMap {
            records_have_names: false,
            alignment_starts_are_deltas: true,
            external_reference_sequence_is_required: false,
            substitution_matrix: SubstitutionMatrix::default(),
            tag_sets: vec![vec![(*b"NM", b'i'), (*b"MD", b'Z')]],
        };

        let mut buf = Vec::new();
        write_preservation_map(&mut buf, &map).unwrap();
        let decoded = read_preservation_map(&mut &buf[..]).unwrap();

        assert_eq!(decoded.records_have_names, map.records_have_names);
        assert_eq!(
            decoded.alignment_starts_are_deltas,
            map.alignment_starts_are_deltas
        );
        assert_eq!(decoded.tag_sets, map.tag_sets);
        assert_eq!(decoded.substitution_matrix, map.substitution_matrix);
    }

    #[test]
    fn test_data_series_encodings_roundtrip() {
        let mut encodings = DataSeriesEncodings::default();
        encodings.bam_flags = Some(Codec::External { block_content_id: 1 });
        encodings.read_lengths = Some(Codec::Beta { offset: 0, len: 16 });

        let mut buf = Vec::new();
        write_data_series_encodings(&mut buf, &encodings).unwrap();
        let decoded = read_data_series_encodings(&mut &buf[..]).unwrap();

        assert!(matches!(decoded.bam_flags, Some(Codec::External { block_content_id: 1 })));
        assert!(matches!(decoded.read_lengths, Some(Codec::Beta { offset: 0, len: 16 })));
        assert!(decoded.quality_scores.is_none());
    }

    #[test]
    fn test_tag_encodings_roundtrip() {
        let mut encodings: TagEncodings = IndexMap::new();
        encodings.insert((*b"NM", b'i'), Codec::External { block_content_id: 3 });

        let mut buf = Vec::new();
        write_tag_encodings(&mut buf, &encodings).unwrap();
        let decoded = read_tag_encodings(&mut &buf[..]).unwrap();

        assert!(matches!(
            decoded.get(&(*b"NM", b'i')),
            Some(Codec::External { block_content_id: 3 })
        ));
    }

    #[test]
    fn test_substitution_matrix_roundtrip() {
        let matrix = SubstitutionMatrix::default();
        let bytes = matrix.to_bytes();
        let decoded = SubstitutionMatrix::from_bytes(bytes);
        assert_eq!(matrix, decoded);
    }
}
