//! Per-field encoding descriptors: the primitive codecs a compression header's data-series
//! and tag encodings are built from.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::huffman;

/// Read-side access to a slice's external (byte-aligned) blocks, keyed by block content id.
pub struct ExternalReaders<'a> {
    blocks: HashMap<i32, Cursor<&'a [u8]>>,
}

impl<'a> ExternalReaders<'a> {
    /// Builds a reader set from decoded block bodies.
    pub fn new(blocks: HashMap<i32, &'a [u8]>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|(k, v)| (k, Cursor::new(v))).collect(),
        }
    }

    fn get_mut(&mut self, id: i32) -> Result<&mut Cursor<&'a [u8]>> {
        self.blocks
            .get_mut(&id)
            .ok_or_else(|| Error::Corrupt(format!("missing external block {id}")))
    }
}

/// Write-side accumulation of a slice's external blocks, keyed by block content id.
#[derive(Default)]
pub struct ExternalWriters {
    blocks: HashMap<i32, Vec<u8>>,
}

impl ExternalWriters {
    /// Creates an empty writer set.
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, id: i32) -> &mut Vec<u8> {
        self.blocks.entry(id).or_default()
    }

    /// Consumes the writer set, returning the accumulated block bodies.
    pub fn into_blocks(self) -> HashMap<i32, Vec<u8>> {
        self.blocks
    }
}

/// A primitive integer- or byte-array-valued encoding.
#[derive(Clone, Debug)]
pub enum Codec {
    /// Values are read/written whole from a named external block, as ITF-8.
    External {
        /// The external block's content id.
        block_content_id: i32,
    },
    /// Values are Huffman-coded against a fixed alphabet in the bit-packed core stream.
    Huffman {
        /// Symbol alphabet, in encounter order (not canonical order).
        alphabet: Vec<i32>,
        /// Per-symbol bit lengths, parallel to `alphabet`.
        bit_lens: Vec<u32>,
    },
    /// A fixed-width (`len`-bit) unsigned value plus `offset`, in the core stream.
    Beta {
        /// Value bias subtracted on decode / added on encode.
        offset: i32,
        /// Fixed bit width.
        len: u32,
    },
    /// Elias-gamma coded value plus `offset`, in the core stream.
    Gamma {
        /// Value bias.
        offset: i32,
    },
    /// Subexponential coded value plus `offset`, in the core stream.
    Subexp {
        /// Value bias.
        offset: i32,
        /// Subexponential order parameter.
        k: u32,
    },
    /// A byte array whose length is itself encoded by `len_codec`, with raw bytes read from
    /// an external block.
    ByteArrayLen {
        /// Encoding of the array length.
        len_codec: Box<Codec>,
        /// External block holding the raw byte payloads.
        data_block_content_id: i32,
    },
    /// A byte array read from an external block up to (and consuming) a sentinel byte.
    ByteArrayStop {
        /// The sentinel byte.
        stop_byte: u8,
        /// External block holding the raw byte payloads.
        block_content_id: i32,
    },
}

impl Codec {
    /// Builds a canonical Huffman code book for `Self::Huffman`, or `None` otherwise.
    fn huffman_book(&self) -> Option<huffman::CodeBook> {
        match self {
            Self::Huffman {
                alphabet,
                bit_lens,
            } => {
                let entries = alphabet
                    .iter()
                    .zip(bit_lens.iter())
                    .map(|(&s, &l)| (s, l))
                    .collect();
                huffman::CodeBook::new(entries).ok()
            }
            _ => None,
        }
    }

    /// Decodes one integer value.
    pub fn decode_int(
        &self,
        core: &mut BitReader<impl Read>,
        external: &mut ExternalReaders<'_>,
    ) -> Result<i64> {
        match self {
            Self::External { block_content_id } => {
                let src = external.get_mut(*block_content_id)?;
                crate::itf8::read_itf8(src).map(i64::from)
            }
            Self::Huffman { alphabet, .. } => {
                if alphabet.len() == 1 {
                    return Ok(i64::from(alphabet[0]));
                }
                let book = self
                    .huffman_book()
                    .ok_or_else(|| Error::Corrupt("invalid Huffman code book".into()))?;
                let decoder = huffman::Decoder::new(&book);
                decoder.read(core).map(i64::from)
            }
            Self::Beta { offset, len } => core
                .read_i32(*len)
                .map(|v| i64::from(v) - i64::from(*offset)),
            Self::Gamma { offset } => {
                let mut n = 0;
                while core.read_bit()? == 0 {
                    n += 1;
                }
                let m = core.read_i32(n)?;
                let x = (1i64 << n) + i64::from(m);
                Ok(x - i64::from(*offset))
            }
            Self::Subexp { offset, k } => {
                let i = core.read_unary()?;
                let value = if i == 0 {
                    core.read_i32(*k)?
                } else {
                    let bits = k + i - 1;
                    let extra = core.read_i32(bits)?;
                    extra + (1i32 << bits)
                };
                Ok(i64::from(value) - i64::from(*offset))
            }
            Self::ByteArrayLen { .. } | Self::ByteArrayStop { .. } => Err(Error::Corrupt(
                "byte-array codec used in integer decode position".into(),
            )),
        }
    }

    /// Encodes one integer value.
    pub fn encode_int(
        &self,
        core: &mut BitWriter<impl Write>,
        external: &mut ExternalWriters,
        value: i64,
    ) -> Result<()> {
        match self {
            Self::External { block_content_id } => {
                let dst = external.get_mut(*block_content_id);
                let v = i32::try_from(value)?;
                crate::itf8::write_itf8(dst, v)
            }
            Self::Huffman { alphabet, .. } => {
                if alphabet.len() == 1 {
                    return Ok(());
                }
                let book = self
                    .huffman_book()
                    .ok_or_else(|| Error::Corrupt("invalid Huffman code book".into()))?;
                let encoder = huffman::Encoder::new(&book);
                let symbol = i32::try_from(value)?;
                encoder.write(core, symbol)
            }
            Self::Beta { offset, len } => {
                let v = i32::try_from(value + i64::from(*offset))?;
                core.write_u32(v as u32, *len)
            }
            Self::Gamma { offset } => {
                let x = value + i64::from(*offset);
                let x = u32::try_from(x)?;
                if x == 0 {
                    return Err(Error::Corrupt(
                        "Gamma codec requires value + offset >= 1".into(),
                    ));
                }
                let n = 31 - x.leading_zeros();
                for _ in 0..n {
                    core.write_bit(0)?;
                }
                core.write_bit(1)?;
                let m = x - (1 << n);
                core.write_u32(m, n)
            }
            Self::Subexp { offset, k } => {
                let x = value + i64::from(*offset);
                let x = u32::try_from(x)?;
                let k = *k;

                if x < (1 << k) {
                    core.write_unary(0)?;
                    core.write_u32(x, k)
                } else {
                    let mut n = 1u32;
                    while x >= (1u32 << (k + n)) {
                        n += 1;
                    }
                    let bits = k + n - 1;
                    core.write_unary(n)?;
                    core.write_u32(x - (1u32 << bits), bits)
                }
            }
            Self::ByteArrayLen { .. } | Self::ByteArrayStop { .. } => Err(Error::Corrupt(
                "byte-array codec used in integer encode position".into(),
            )),
        }
    }

    /// Decodes one byte-array value.
    pub fn decode_bytes(
        &self,
        core: &mut BitReader<impl Read>,
        external: &mut ExternalReaders<'_>,
    ) -> Result<Vec<u8>> {
        match self {
            Self::ByteArrayLen {
                len_codec,
                data_block_content_id,
            } => {
                let len = len_codec.decode_int(core, external)?;
                let len = usize::try_from(len)?;
                let src = external.get_mut(*data_block_content_id)?;
                let mut buf = vec![0u8; len];
                src.read_exact(&mut buf)?;
                Ok(buf)
            }
            Self::ByteArrayStop {
                stop_byte,
                block_content_id,
            } => {
                let src = external.get_mut(*block_content_id)?;
                let mut buf = Vec::new();
                let mut byte = [0u8; 1];
                loop {
                    src.read_exact(&mut byte)?;
                    if byte[0] == *stop_byte {
                        break;
                    }
                    buf.push(byte[0]);
                }
                Ok(buf)
            }
            _ => Err(Error::Corrupt(
                "integer codec used in byte-array decode position".into(),
            )),
        }
    }

    /// Encodes one byte-array value.
    pub fn encode_bytes(
        &self,
        core: &mut BitWriter<impl Write>,
        external: &mut ExternalWriters,
        value: &[u8],
    ) -> Result<()> {
        match self {
            Self::ByteArrayLen {
                len_codec,
                data_block_content_id,
            } => {
                len_codec.encode_int(core, external, value.len() as i64)?;
                external.get_mut(*data_block_content_id).extend_from_slice(value);
                Ok(())
            }
            Self::ByteArrayStop {
                stop_byte,
                block_content_id,
            } => {
                let dst = external.get_mut(*block_content_id);
                if value.contains(stop_byte) {
                    return Err(Error::Corrupt(
                        "byte-array value contains its own stop byte".into(),
                    ));
                }
                dst.extend_from_slice(value);
                dst.push(*stop_byte);
                Ok(())
            }
            _ => Err(Error::Corrupt(
                "integer codec used in byte-array encode position".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_readers<'a>(id: i32, data: &'a [u8]) -> ExternalReaders<'a> {
        let mut map = HashMap::new();
        map.insert(id, data);
        ExternalReaders::new(map)
    }

    #[test]
    fn test_external_int_roundtrip() {
        let codec = Codec::External { block_content_id: 5 };
        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        for &v in &[0i64, 1, 127, 128, 99999] {
            codec.encode_int(&mut core_out, &mut writers, v).unwrap();
        }
        let blocks = writers.into_blocks();
        let body = blocks.get(&5).unwrap();

        let mut readers = external_readers(5, body);
        let mut core_in = BitReader::new(&[][..]);
        for &expected in &[0i64, 1, 127, 128, 99999] {
            assert_eq!(codec.decode_int(&mut core_in, &mut readers).unwrap(), expected);
        }
    }

    #[test]
    fn test_beta_roundtrip() {
        let codec = Codec::Beta { offset: 0, len: 8 };
        let mut writers = ExternalWriters::new();
        let mut buf = Vec::new();
        {
            let mut core_out = BitWriter::new(&mut buf);
            for &v in &[0i64, 1, 255] {
                codec.encode_int(&mut core_out, &mut writers, v).unwrap();
            }
            core_out.flush().unwrap();
        }

        let mut core_in = BitReader::new(&buf[..]);
        let mut readers = ExternalReaders::new(HashMap::new());
        for &expected in &[0i64, 1, 255] {
            assert_eq!(codec.decode_int(&mut core_in, &mut readers).unwrap(), expected);
        }
    }

    #[test]
    fn test_gamma_roundtrip() {
        let codec = Codec::Gamma { offset: 1 };
        let mut writers = ExternalWriters::new();
        let mut buf = Vec::new();
        {
            let mut core_out = BitWriter::new(&mut buf);
            for &v in &[0i64, 1, 5, 100, 1000] {
                codec.encode_int(&mut core_out, &mut writers, v).unwrap();
            }
            core_out.flush().unwrap();
        }

        let mut core_in = BitReader::new(&buf[..]);
        let mut readers = ExternalReaders::new(HashMap::new());
        for &expected in &[0i64, 1, 5, 100, 1000] {
            assert_eq!(codec.decode_int(&mut core_in, &mut readers).unwrap(), expected);
        }
    }

    #[test]
    fn test_subexp_roundtrip() {
        let codec = Codec::Subexp { offset: 0, k: 3 };
        let mut writers = ExternalWriters::new();
        let mut buf = Vec::new();
        let values = [0i64, 1, 7, 8, 15, 16, 31, 32, 63, 1000];
        {
            let mut core_out = BitWriter::new(&mut buf);
            for &v in &values {
                codec.encode_int(&mut core_out, &mut writers, v).unwrap();
            }
            core_out.flush().unwrap();
        }

        let mut core_in = BitReader::new(&buf[..]);
        let mut readers = ExternalReaders::new(HashMap::new());
        for &expected in &values {
            assert_eq!(codec.decode_int(&mut core_in, &mut readers).unwrap(), expected);
        }
    }

    #[test]
    fn test_subexp_prefix_boundaries() {
        // k = 3: i = 0 covers [0, 7], i = 1 covers [8, 15], i = 2 covers [16, 31].
        let codec = Codec::Subexp { offset: 0, k: 3 };

        let encode = |v: i64| -> Vec<u8> {
            let mut writers = ExternalWriters::new();
            let mut buf = Vec::new();
            {
                let mut core_out = BitWriter::new(&mut buf);
                codec.encode_int(&mut core_out, &mut writers, v).unwrap();
                core_out.flush().unwrap();
            }
            buf
        };

        // i = 0: a single 0 stop bit followed by exactly k = 3 value bits -> 4 bits -> 1 byte.
        assert_eq!(encode(0).len(), 1);
        assert_eq!(encode(7).len(), 1);

        // i = 1: a 1-bit then a 0 stop bit, then k + 1 - 1 = 3 value bits -> 5 bits.
        let buf = encode(8);
        let mut core_in = BitReader::new(&buf[..]);
        let mut readers = ExternalReaders::new(HashMap::new());
        assert_eq!(codec.decode_int(&mut core_in, &mut readers).unwrap(), 8);
    }

    #[test]
    fn test_byte_array_stop() {
        let codec = Codec::ByteArrayStop {
            stop_byte: 0,
            block_content_id: 9,
        };
        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        codec.encode_bytes(&mut core_out, &mut writers, b"hello").unwrap();
        codec.encode_bytes(&mut core_out, &mut writers, b"world").unwrap();

        let blocks = writers.into_blocks();
        let body = blocks.get(&9).unwrap();
        assert_eq!(body, b"hello\0world\0");

        let mut readers = external_readers(9, body);
        let mut core_in = BitReader::new(&[][..]);
        assert_eq!(codec.decode_bytes(&mut core_in, &mut readers).unwrap(), b"hello");
        assert_eq!(codec.decode_bytes(&mut core_in, &mut readers).unwrap(), b"world");
    }

    #[test]
    fn test_byte_array_len() {
        let codec = Codec::ByteArrayLen {
            len_codec: Box::new(Codec::External { block_content_id: 1 }),
            data_block_content_id: 2,
        };
        let mut writers = ExternalWriters::new();
        let mut core_out = BitWriter::new(Vec::new());
        codec.encode_bytes(&mut core_out, &mut writers, b"AC").unwrap();
        codec.encode_bytes(&mut core_out, &mut writers, b"GGT").unwrap();

        let blocks = writers.into_blocks();
        let len_block = blocks.get(&1).unwrap().clone();
        let data_block = blocks.get(&2).unwrap().clone();

        let mut map = HashMap::new();
        map.insert(1, &len_block[..]);
        map.insert(2, &data_block[..]);
        let mut readers = ExternalReaders::new(map);
        let mut core_in = BitReader::new(&[][..]);

        assert_eq!(codec.decode_bytes(&mut core_in, &mut readers).unwrap(), b"AC");
        assert_eq!(codec.decode_bytes(&mut core_in, &mut readers).unwrap(), b"GGT");
    }
}
