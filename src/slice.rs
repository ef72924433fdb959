//! Slice headers: the per-slice framing naming a slice's reference range, its record count,
//! and the content ids of the blocks its records decode against.

use std::io::{Read, Write};

use md5::{Digest, Md5};

use crate::container::ReferenceSequenceContext;
use crate::error::{Error, Result};
use crate::itf8::{self, read_itf8_as, read_ltf8_as};

/// A slice header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    /// The reference span this slice's records cover.
    pub reference_sequence_context: ReferenceSequenceContext,
    /// The number of records in this slice.
    pub record_count: usize,
    /// The running count of records preceding this slice in the stream.
    pub record_counter: u64,
    /// The number of blocks in this slice, including the core data block.
    pub block_count: usize,
    /// The content ids of this slice's blocks, in storage order.
    pub block_content_ids: Vec<i32>,
    /// The content id of an embedded reference bases block, if this slice carries one.
    pub embedded_reference_bases_block_content_id: Option<i32>,
    /// The MD5 digest of the reference bases this slice's records span, if recorded.
    pub reference_md5: Option<[u8; 16]>,
    /// Raw, unparsed optional tag bytes trailing the header's fixed fields.
    pub optional_tags: Vec<u8>,
}

const EMBEDDED_REFERENCE_BASES_BLOCK_CONTENT_ID_NONE: i32 = -1;

/// Reads a slice header body (already extracted from its enclosing block).
pub fn read_header<R>(reader: &mut R) -> Result<Header>
where
    R: Read,
{
    let reference_sequence_id: i32 = read_itf8_as(reader)?;
    let alignment_start: i32 = read_itf8_as(reader)?;
    let alignment_span: i32 = read_itf8_as(reader)?;

    let reference_sequence_context = match reference_sequence_id {
        -1 => ReferenceSequenceContext::None,
        -2 => ReferenceSequenceContext::Many,
        id => ReferenceSequenceContext::Some {
            reference_sequence_id: id,
            alignment_start,
            alignment_span,
        },
    };

    let record_count: usize = read_itf8_as(reader)?;
    let record_counter: u64 = read_ltf8_as(reader)?;
    let block_count: usize = read_itf8_as(reader)?;

    let n_block_content_ids: usize = read_itf8_as(reader)?;
    let mut block_content_ids = Vec::with_capacity(n_block_content_ids);
    for _ in 0..n_block_content_ids {
        block_content_ids.push(read_itf8_as(reader)?);
    }

    let embedded_reference_bases_block_content_id =
        match read_itf8_as::<_, i32>(reader)? {
            EMBEDDED_REFERENCE_BASES_BLOCK_CONTENT_ID_NONE => None,
            id => Some(id),
        };

    let mut md5_buf = [0u8; 16];
    reader.read_exact(&mut md5_buf)?;
    let reference_md5 = if md5_buf.iter().all(|&b| b == 0) {
        None
    } else {
        Some(md5_buf)
    };

    let mut optional_tags = Vec::new();
    reader.read_to_end(&mut optional_tags)?;

    Ok(Header {
        reference_sequence_context,
        record_count,
        record_counter,
        block_count,
        block_content_ids,
        embedded_reference_bases_block_content_id,
        reference_md5,
        optional_tags,
    })
}

/// Writes a slice header body (without the enclosing block framing).
pub fn write_header<W>(writer: &mut W, header: &Header) -> Result<()>
where
    W: Write,
{
    let (reference_sequence_id, alignment_start, alignment_span) = match header.reference_sequence_context {
        ReferenceSequenceContext::Some {
            reference_sequence_id,
            alignment_start,
            alignment_span,
        } => (reference_sequence_id, alignment_start, alignment_span),
        ReferenceSequenceContext::None => (-1, 0, 0),
        ReferenceSequenceContext::Many => (-2, 0, 0),
    };

    itf8::write_itf8(writer, reference_sequence_id)?;
    itf8::write_itf8(writer, alignment_start)?;
    itf8::write_itf8(writer, alignment_span)?;
    itf8::write_itf8(writer, i32::try_from(header.record_count)?)?;
    itf8::write_ltf8(writer, i64::try_from(header.record_counter)?)?;
    itf8::write_itf8(writer, i32::try_from(header.block_count)?)?;

    itf8::write_itf8(writer, i32::try_from(header.block_content_ids.len())?)?;
    for &id in &header.block_content_ids {
        itf8::write_itf8(writer, id)?;
    }

    itf8::write_itf8(
        writer,
        header
            .embedded_reference_bases_block_content_id
            .unwrap_or(EMBEDDED_REFERENCE_BASES_BLOCK_CONTENT_ID_NONE),
    )?;

    writer.write_all(&header.reference_md5.unwrap_or([0u8; 16]))?;
    writer.write_all(&header.optional_tags)?;

    Ok(())
}

/// Computes the MD5 digest of a span of reference bases, as stored in a slice header.
pub fn reference_md5(bases: &[u8]) -> [u8; 16] {
    let upper: Vec<u8> = bases.iter().map(|b| b.to_ascii_uppercase()).collect();
    let digest = Md5::digest(&upper);
    digest.into()
}

/// Verifies `bases` (the reference range a slice claims to span) against the digest
/// recorded in its header, if any.
pub fn verify_reference_md5(header: &Header, bases: &[u8]) -> Result<()> {
    let Some(expected) = header.reference_md5 else {
        return Ok(());
    };

    let actual = reference_md5(bases);
    if actual != expected {
        return Err(Error::Corrupt(format!(
            "slice reference MD5 mismatch: expected {}, computed {}",
            hex(&expected),
            hex(&actual)
        )));
    }

    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_header() {
        let src = [
            0x02, // reference sequence ID = 2
            0x03, // alignment start = 3
            0x05, // alignment span = 5
            0x08, // number of records = 8
            0x0d, // record counter = 13
            0x01, // number of blocks = 1
            0x01, // block content ID count = 1
            0x15, // block content IDs[0] = 21
            0xff, 0xff, 0xff, 0xff, 0x0f, // embedded reference bases block content ID = -1
            0x57, 0xb2, 0x96, 0xa3, 0x16, 0x0a, 0x2c, 0xac, 0x9c, 0x83, 0x33, 0x12, 0x6f, 0xf2,
            0x7e, 0xf7, // reference MD5
        ];

        let actual = read_header(&mut &src[..]).unwrap();

        assert_eq!(
            actual.reference_sequence_context,
            ReferenceSequenceContext::Some {
                reference_sequence_id: 2,
                alignment_start: 3,
                alignment_span: 5,
            }
        );
        assert_eq!(actual.record_count, 8);
        assert_eq!(actual.record_counter, 13);
        assert_eq!(actual.block_count, 1);
        assert_eq!(actual.block_content_ids, vec![21]);
        assert_eq!(actual.embedded_reference_bases_block_content_id, None);
        assert!(actual.reference_md5.is_some());
        assert!(actual.optional_tags.is_empty());
    }

    #[test]
    fn test_header_roundtrip() {
        let header = Header {
            reference_sequence_context: ReferenceSequenceContext::Many,
            record_count: 42,
            record_counter: 100,
            block_count: 3,
            block_content_ids: vec![5, 6, 7],
            embedded_reference_bases_block_content_id: Some(8),
            reference_md5: Some([9u8; 16]),
            optional_tags: vec![1, 2, 3],
        };

        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();

        let decoded = read_header(&mut &buf[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_reference_md5_matches_known_vector() {
        // MD5("ACGTA") uppercased.
        let digest = reference_md5(b"ACGTA");
        assert_eq!(
            digest,
            [
                0x57, 0xb2, 0x96, 0xa3, 0x16, 0x0a, 0x2c, 0xac, 0x9c, 0x83, 0x33, 0x12, 0x6f, 0xf2,
                0x7e, 0xf7,
            ]
        );
    }

    #[test]
    fn test_verify_reference_md5_detects_mismatch() {
        let header = Header {
            reference_md5: Some([0u8; 16]),
            ..Default::default()
        };
        let result = verify_reference_md5(&header, b"ACGTA");
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }
}
