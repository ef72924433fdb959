//! Blocks: the CRC-framed, optionally compressed byte ranges that containers and slices are
//! built from.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::itf8::{self, read_itf8_as};
use crate::rans::{self, Order};

/// How a block's body is transformed before it reaches the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No transform; `src` is stored as-is.
    None,
    /// DEFLATE via gzip framing.
    Gzip,
    /// Burrows-Wheeler block-sort compression.
    Bzip2,
    /// LZMA2/XZ compression.
    Lzma,
    /// Static rANS (4x8), order carried as the first byte of the block body.
    Rans4x8(rans::Order),
    /// A method recognized by the format but not implemented here (e.g. `fqzcomp`, `bsc`,
    /// name tokenization). Reading one of these blocks is an [`Error::UnsupportedMethod`].
    Unsupported(u8),
}

impl CompressionMethod {
    fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Bzip2 => 2,
            Self::Lzma => 3,
            Self::Rans4x8(_) => 4,
            Self::Unsupported(b) => b,
        }
    }

    // `Rans4x8`'s order is not recoverable from the method byte alone; callers reading a
    // block must inspect its body's leading order byte (see `read_block`) to tell which one
    // applies.
    fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Gzip,
            2 => Self::Bzip2,
            3 => Self::Lzma,
            4 => Self::Rans4x8(rans::Order::Zero),
            other => Self::Unsupported(other),
        }
    }
}

/// What kind of data a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// The file header block.
    FileHeader,
    /// A container's compression header block.
    CompressionHeader,
    /// A slice header block.
    SliceHeader,
    /// Core (bit-packed) data.
    CoreData,
    /// An external data series or tag block.
    ExternalData,
}

impl ContentType {
    fn to_byte(self) -> u8 {
        match self {
            Self::FileHeader => 0,
            Self::CompressionHeader => 1,
            Self::SliceHeader => 2,
            Self::CoreData => 4,
            Self::ExternalData => 5,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::FileHeader),
            1 => Ok(Self::CompressionHeader),
            2 => Ok(Self::SliceHeader),
            4 => Ok(Self::CoreData),
            5 => Ok(Self::ExternalData),
            other => Err(Error::MalformedHeader(format!(
                "invalid block content type: {other}"
            ))),
        }
    }
}

/// A single block: one compressed/uncompressed byte range plus its framing metadata.
#[derive(Debug, Clone)]
pub struct Block {
    /// The transform applied to `data`.
    pub compression_method: CompressionMethod,
    /// What the block's (decompressed) bytes contain.
    pub content_type: ContentType,
    /// The id external encodings reference this block by.
    pub content_id: i32,
    /// The decompressed size, in bytes.
    pub uncompressed_size: usize,
    /// The possibly-compressed body.
    pub data: Vec<u8>,
}

impl Block {
    /// Builds a block by applying `method` to `src`.
    pub fn encode(
        content_type: ContentType,
        content_id: i32,
        method: CompressionMethod,
        src: &[u8],
    ) -> Result<Self> {
        let data = match method {
            CompressionMethod::None => src.to_vec(),
            CompressionMethod::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(src)?;
                encoder.finish()?
            }
            CompressionMethod::Bzip2 => {
                let mut encoder =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                encoder.write_all(src)?;
                encoder.finish()?
            }
            CompressionMethod::Lzma => return Err(Error::UnsupportedMethod("lzma encode".into())),
            CompressionMethod::Rans4x8(order) => {
                let mut body = vec![match order {
                    Order::Zero => 0u8,
                    Order::One => 1u8,
                }];
                body.extend(rans::encode(src, order));
                body
            }
            CompressionMethod::Unsupported(m) => {
                return Err(Error::UnsupportedMethod(format!("compression method {m}")))
            }
        };

        Ok(Self {
            compression_method: method,
            content_type,
            content_id,
            uncompressed_size: src.len(),
            data,
        })
    }

    /// Returns the block's decompressed body.
    pub fn decompressed(&self) -> Result<Vec<u8>> {
        match self.compression_method {
            CompressionMethod::None => Ok(self.data.clone()),
            CompressionMethod::Gzip => {
                let mut decoder = GzDecoder::new(&self.data[..]);
                let mut out = Vec::with_capacity(self.uncompressed_size);
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionMethod::Bzip2 => {
                let mut decoder = bzip2::read::BzDecoder::new(&self.data[..]);
                let mut out = Vec::with_capacity(self.uncompressed_size);
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionMethod::Lzma => Err(Error::UnsupportedMethod("lzma decode".into())),
            CompressionMethod::Rans4x8(_) => {
                let (&order_byte, body) = self
                    .data
                    .split_first()
                    .ok_or_else(|| Error::Corrupt("empty rANS block body".into()))?;
                let order = match order_byte {
                    0 => Order::Zero,
                    1 => Order::One,
                    other => {
                        return Err(Error::Corrupt(format!("invalid rANS order byte: {other}")))
                    }
                };
                rans::decode(body, order)
            }
            CompressionMethod::Unsupported(m) => {
                Err(Error::UnsupportedMethod(format!("compression method {m}")))
            }
        }
    }
}

/// Writes a block, including its CRC32 trailer.
pub fn write_block<W>(writer: &mut W, block: &Block) -> Result<()>
where
    W: Write,
{
    let mut crc_writer = flate2::CrcWriter::new(writer);
    write_block_body(&mut crc_writer, block)?;
    let crc32 = crc_writer.crc().sum();
    crc_writer.get_mut().write_all(&crc32.to_le_bytes())?;
    Ok(())
}

fn write_block_body<W>(writer: &mut W, block: &Block) -> Result<()>
where
    W: Write,
{
    writer.write_all(&[block.compression_method.to_byte()])?;
    writer.write_all(&[block.content_type.to_byte()])?;
    itf8::write_itf8(writer, block.content_id)?;
    itf8::write_itf8(writer, block.data.len() as i32)?;
    itf8::write_itf8(writer, block.uncompressed_size as i32)?;
    writer.write_all(&block.data)?;
    Ok(())
}

/// Reads a block, verifying its CRC32 trailer.
pub fn read_block<R>(reader: &mut R) -> Result<Block>
where
    R: Read,
{
    let mut crc_reader = flate2::CrcReader::new(reader);

    let mut method_byte = [0u8; 1];
    crc_reader.read_exact(&mut method_byte)?;

    let mut content_type_byte = [0u8; 1];
    crc_reader.read_exact(&mut content_type_byte)?;
    let content_type = ContentType::from_byte(content_type_byte[0])?;

    let content_id: i32 = read_itf8_as(&mut crc_reader)?;
    let compressed_size: usize = read_itf8_as(&mut crc_reader)?;
    let uncompressed_size: usize = read_itf8_as(&mut crc_reader)?;

    let mut data = vec![0u8; compressed_size];
    crc_reader.read_exact(&mut data)?;

    let actual_crc32 = crc_reader.crc().sum();
    let reader = crc_reader.into_inner();

    let mut expected_crc32_bytes = [0u8; 4];
    reader.read_exact(&mut expected_crc32_bytes)?;
    let expected_crc32 = u32::from_le_bytes(expected_crc32_bytes);

    if actual_crc32 != expected_crc32 {
        return Err(Error::Corrupt(format!(
            "block CRC32 mismatch: expected {expected_crc32:08x}, computed {actual_crc32:08x}"
        )));
    }

    let compression_method = CompressionMethod::from_byte(method_byte[0]);

    Ok(Block {
        compression_method,
        content_type,
        content_id,
        uncompressed_size,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_block_uncompressed() {
        let block = Block {
            compression_method: CompressionMethod::None,
            content_type: ContentType::ExternalData,
            content_id: 1,
            uncompressed_size: 4,
            data: b"ndls".to_vec(),
        };

        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();

        let expected = [
            0x00, // compression method = none
            0x05, // content type = external data
            0x01, // content ID = 1
            0x04, // compressed size = 4
            0x04, // uncompressed size = 4
            b'n', b'd', b'l', b's', // data
            0xd7, 0x12, 0x46, 0x3e, // CRC32
        ];

        assert_eq!(buf, expected);
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        let block = Block::encode(ContentType::CoreData, 0, CompressionMethod::None, b"hello").unwrap();
        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();

        let decoded = read_block(&mut &buf[..]).unwrap();
        assert_eq!(decoded.decompressed().unwrap(), b"hello");
    }

    #[test]
    fn test_roundtrip_gzip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let block = Block::encode(ContentType::ExternalData, 3, CompressionMethod::Gzip, &data).unwrap();
        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();

        let decoded = read_block(&mut &buf[..]).unwrap();
        assert_eq!(decoded.decompressed().unwrap(), data);
    }

    #[test]
    fn test_roundtrip_rans0() {
        let data = b"aaaabbbbccccdddd".repeat(50);
        let block = Block::encode(
            ContentType::ExternalData,
            7,
            CompressionMethod::Rans4x8(Order::Zero),
            &data,
        )
        .unwrap();
        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();

        let decoded = read_block(&mut &buf[..]).unwrap();
        assert_eq!(decoded.decompressed().unwrap(), data);
    }

    #[test]
    fn test_corrupt_crc_is_detected() {
        let block = Block::encode(ContentType::ExternalData, 0, CompressionMethod::None, b"abc").unwrap();
        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let result = read_block(&mut &buf[..]);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }
}
