//! Container headers: the per-container framing that names the reference span a container
//! covers and locates its compression header and slices.
//!
//! Also covers the file definition: the four-byte magic, version pair, and file id that
//! precede the first container in every CRAM stream.

use std::io::{Read, Write};

use flate2::{CrcReader, CrcWriter};

use crate::error::{Error, Result};
use crate::itf8::{self, read_itf8_as, read_ltf8_as};

/// The four-byte magic every CRAM stream begins with.
pub const MAGIC: [u8; 4] = *b"CRAM";

/// The length, in bytes, of the file definition's file id field.
pub const FILE_ID_LEN: usize = 20;

/// The CRAM major/minor version and file id preceding the first container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDefinition {
    /// The CRAM major version.
    pub major_version: u8,
    /// The CRAM minor version.
    pub minor_version: u8,
    /// An opaque, implementation-defined file identifier.
    pub file_id: [u8; FILE_ID_LEN],
}

/// The classic CRAM 3.0 version this crate reads and writes.
pub const SUPPORTED_MAJOR_VERSION: u8 = 3;
/// The classic CRAM 3.0 minor version this crate reads and writes.
pub const SUPPORTED_MINOR_VERSION: u8 = 0;

/// Reads the file definition.
pub fn read_file_definition<R>(reader: &mut R) -> Result<FileDefinition>
where
    R: Read,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::MalformedHeader("missing CRAM magic number".into()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;

    if version[0] != SUPPORTED_MAJOR_VERSION {
        return Err(Error::UnsupportedVersion {
            major: version[0],
            minor: version[1],
        });
    }

    let mut file_id = [0u8; FILE_ID_LEN];
    reader.read_exact(&mut file_id)?;

    Ok(FileDefinition {
        major_version: version[0],
        minor_version: version[1],
        file_id,
    })
}

/// Writes the file definition.
pub fn write_file_definition<W>(writer: &mut W, definition: &FileDefinition) -> Result<()>
where
    W: Write,
{
    writer.write_all(&MAGIC)?;
    writer.write_all(&[definition.major_version, definition.minor_version])?;
    writer.write_all(&definition.file_id)?;
    Ok(())
}

/// The reference sequence a container's records are aligned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceSequenceContext {
    /// All records align to `reference_sequence_id`, spanning
    /// `[alignment_start, alignment_start + alignment_span)`.
    Some {
        /// The reference sequence id.
        reference_sequence_id: i32,
        /// 1-based inclusive start position.
        alignment_start: i32,
        /// The length of the covered reference range.
        alignment_span: i32,
    },
    /// Every record is unmapped.
    #[default]
    None,
    /// Records align to more than one reference sequence (or mix mapped/unmapped records).
    Many,
}

const UNMAPPED_REFERENCE_SEQUENCE_ID: i32 = -1;
const MULTIREF_REFERENCE_SEQUENCE_ID: i32 = -2;

const EOF_LENGTH: usize = 15;
const EOF_REFERENCE_SEQUENCE_ID: i32 = -1;
const EOF_ALIGNMENT_START: i32 = 4_542_278;
const EOF_BLOCK_COUNT: usize = 1;
const EOF_CRC32: u32 = 0x4f_d9_bd_05;

/// A container header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// The reference span this container's records cover.
    pub reference_sequence_context: ReferenceSequenceContext,
    /// The number of records across all slices.
    pub record_count: usize,
    /// The running count of records preceding this container in the stream.
    pub record_counter: u64,
    /// The total number of bases across all records.
    pub base_count: u64,
    /// The number of blocks, including the compression header block.
    pub block_count: usize,
    /// Byte offsets of each slice, relative to the end of the container header.
    pub landmarks: Vec<usize>,
}

/// Reads a container header. Returns `None` if the stream is positioned at the terminal
/// EOF container (or ends immediately, as legacy streams with no EOF marker do).
pub fn read_header<R>(reader: &mut R) -> Result<Option<(Header, usize)>>
where
    R: Read,
{
    let mut crc_reader = CrcReader::new(reader);

    let len = match read_i32_le(&mut crc_reader) {
        Ok(n) => usize::try_from(n).map_err(|e| Error::Corrupt(e.to_string()))?,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    let reference_sequence_id: i32 = read_itf8_as(&mut crc_reader)?;
    let alignment_start: i32 = read_itf8_as(&mut crc_reader)?;
    let alignment_span: i32 = read_itf8_as(&mut crc_reader)?;
    let record_count: usize = read_itf8_as(&mut crc_reader)?;
    let record_counter: u64 = read_ltf8_as(&mut crc_reader)?;
    let base_count: u64 = read_ltf8_as(&mut crc_reader)?;
    let block_count: usize = read_itf8_as(&mut crc_reader)?;
    let landmarks = read_landmarks(&mut crc_reader)?;

    let actual_crc32 = crc_reader.crc().sum();
    let reader = crc_reader.into_inner();
    let mut crc32_bytes = [0u8; 4];
    reader.read_exact(&mut crc32_bytes)?;
    let expected_crc32 = u32::from_le_bytes(crc32_bytes);

    if actual_crc32 != expected_crc32 {
        return Err(Error::Corrupt(format!(
            "container header checksum mismatch: expected {expected_crc32:08x}, got {actual_crc32:08x}"
        )));
    }

    if is_eof(len, reference_sequence_id, alignment_start, block_count, expected_crc32) {
        return Ok(None);
    }

    let reference_sequence_context = match reference_sequence_id {
        UNMAPPED_REFERENCE_SEQUENCE_ID => ReferenceSequenceContext::None,
        MULTIREF_REFERENCE_SEQUENCE_ID => ReferenceSequenceContext::Many,
        id => ReferenceSequenceContext::Some {
            reference_sequence_id: id,
            alignment_start,
            alignment_span,
        },
    };

    let header = Header {
        reference_sequence_context,
        record_count,
        record_counter,
        base_count,
        block_count,
        landmarks,
    };

    Ok(Some((header, len)))
}

fn read_landmarks<R>(reader: &mut R) -> Result<Vec<usize>>
where
    R: Read,
{
    let n: usize = read_itf8_as(reader)?;
    let mut landmarks = Vec::with_capacity(n);
    for _ in 0..n {
        landmarks.push(read_itf8_as(reader)?);
    }
    Ok(landmarks)
}

fn read_i32_le<R>(reader: &mut R) -> Result<i32>
where
    R: Read,
{
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn is_eof(length: usize, reference_sequence_id: i32, alignment_start: i32, block_count: usize, crc32: u32) -> bool {
    length == EOF_LENGTH
        && reference_sequence_id == EOF_REFERENCE_SEQUENCE_ID
        && alignment_start == EOF_ALIGNMENT_START
        && block_count == EOF_BLOCK_COUNT
        && crc32 == EOF_CRC32
}

/// Writes a container header, where `len` is the byte length of everything that follows the
/// header (the compression header block and all slices).
pub fn write_header<W>(writer: &mut W, header: &Header, len: usize) -> Result<()>
where
    W: Write,
{
    let mut crc_writer = CrcWriter::new(writer);
    write_header_body(&mut crc_writer, header, len)?;
    let crc32 = crc_writer.crc().sum();
    crc_writer.get_mut().write_all(&crc32.to_le_bytes())?;
    Ok(())
}

fn write_header_body<W>(writer: &mut W, header: &Header, len: usize) -> Result<()>
where
    W: Write,
{
    let length = i32::try_from(len)?;
    writer.write_all(&length.to_le_bytes())?;

    let (reference_sequence_id, alignment_start, alignment_span) = match header.reference_sequence_context {
        ReferenceSequenceContext::Some {
            reference_sequence_id,
            alignment_start,
            alignment_span,
        } => (reference_sequence_id, alignment_start, alignment_span),
        ReferenceSequenceContext::None => (UNMAPPED_REFERENCE_SEQUENCE_ID, 0, 0),
        ReferenceSequenceContext::Many => (MULTIREF_REFERENCE_SEQUENCE_ID, 0, 0),
    };

    itf8::write_itf8(writer, reference_sequence_id)?;
    itf8::write_itf8(writer, alignment_start)?;
    itf8::write_itf8(writer, alignment_span)?;
    itf8::write_itf8(writer, i32::try_from(header.record_count)?)?;
    itf8::write_ltf8(writer, i64::try_from(header.record_counter)?)?;
    itf8::write_ltf8(writer, i64::try_from(header.base_count)?)?;
    itf8::write_itf8(writer, i32::try_from(header.block_count)?)?;

    itf8::write_itf8(writer, i32::try_from(header.landmarks.len())?)?;
    for &pos in &header.landmarks {
        itf8::write_itf8(writer, i32::try_from(pos)?)?;
    }

    Ok(())
}

/// Writes the terminal EOF container.
pub fn write_eof_container<W>(writer: &mut W) -> Result<()>
where
    W: Write,
{
    let header = Header {
        reference_sequence_context: ReferenceSequenceContext::Some {
            reference_sequence_id: EOF_REFERENCE_SEQUENCE_ID,
            alignment_start: EOF_ALIGNMENT_START,
            alignment_span: 0,
        },
        record_count: 0,
        record_counter: 0,
        base_count: 0,
        block_count: EOF_BLOCK_COUNT,
        landmarks: Vec::new(),
    };

    write_header(writer, &header, EOF_LENGTH)
}
