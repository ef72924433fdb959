//! Canonical Huffman code-book construction, encoding, and decoding.

use std::collections::HashMap;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// A canonical Huffman code book: parallel `symbols`/`bit_lens` arrays, sorted by
/// `(bit_len, symbol)`, from which both the encoder and decoder tables are derived.
#[derive(Debug, Clone)]
pub struct CodeBook {
    symbols: Vec<i32>,
    bit_lens: Vec<u32>,
}

impl CodeBook {
    /// Builds a canonical code book from `(symbol, bit_len)` pairs.
    ///
    /// Symbols with a bit length of 0 are dropped. Ties in bit length are broken by
    /// ascending symbol value, which is what makes the resulting codes canonical.
    pub fn new(mut entries: Vec<(i32, u32)>) -> Result<Self> {
        entries.retain(|&(_, len)| len > 0);
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

        let symbols = entries.iter().map(|&(s, _)| s).collect();
        let bit_lens = entries.iter().map(|&(_, l)| l).collect();

        Ok(Self { symbols, bit_lens })
    }

    fn codes(&self) -> Vec<u32> {
        let mut codes = Vec::with_capacity(self.symbols.len());
        let mut code = 0u32;
        let mut prev_len = 0u32;

        for &len in &self.bit_lens {
            code <<= len - prev_len;
            codes.push(code);
            code += 1;
            prev_len = len;
        }

        codes
    }

    /// Returns the number of symbols in the book.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the book has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Encodes symbols against a [`CodeBook`], writing canonical Huffman codes bit-by-bit.
pub struct Encoder {
    code_by_symbol: HashMap<i32, (u32, u32)>,
}

impl Encoder {
    /// Builds an encoder from a code book.
    pub fn new(book: &CodeBook) -> Self {
        let codes = book.codes();
        let code_by_symbol = book
            .symbols
            .iter()
            .zip(book.bit_lens.iter())
            .zip(codes.iter())
            .map(|((&s, &len), &code)| (s, (code, len)))
            .collect();

        Self { code_by_symbol }
    }

    /// Writes one symbol's code.
    pub fn write<W>(&self, writer: &mut BitWriter<W>, symbol: i32) -> Result<()>
    where
        W: std::io::Write,
    {
        let &(code, len) = self
            .code_by_symbol
            .get(&symbol)
            .ok_or_else(|| Error::Corrupt(format!("symbol {symbol} not in Huffman code book")))?;

        writer.write_u32(code, len)
    }
}

/// Decodes symbols against a [`CodeBook`] using a per-length decode table, mirroring a
/// canonical-Huffman decode loop: read one bit at a time, extending the candidate code,
/// until it falls within the range of assigned codes for the current bit length.
pub struct Decoder {
    // Indexed by bit length (1-based via `len - 1`); `None` for unused lengths.
    first_code: Vec<Option<u32>>,
    first_symbol_index: Vec<usize>,
    symbols: Vec<i32>,
    max_len: u32,
}

impl Decoder {
    /// Builds a decoder from a code book.
    pub fn new(book: &CodeBook) -> Self {
        let codes = book.codes();
        let max_len = book.bit_lens.iter().copied().max().unwrap_or(0);

        let mut first_code = vec![None; max_len as usize];
        let mut first_symbol_index = vec![0; max_len as usize];

        for (i, (&len, &code)) in book.bit_lens.iter().zip(codes.iter()).enumerate() {
            let idx = (len - 1) as usize;
            if first_code[idx].is_none() {
                first_code[idx] = Some(code);
                first_symbol_index[idx] = i;
            }
        }

        Self {
            first_code,
            first_symbol_index,
            symbols: book.symbols.clone(),
            max_len,
        }
    }

    /// Reads one symbol.
    pub fn read<R>(&self, reader: &mut BitReader<R>) -> Result<i32>
    where
        R: std::io::Read,
    {
        if self.symbols.is_empty() {
            return Err(Error::Corrupt("empty Huffman code book".into()));
        }

        let mut code = 0u32;

        for len in 1..=self.max_len {
            code = (code << 1) | reader.read_bit()?;

            if let Some(first_code) = self.first_code[(len - 1) as usize] {
                let offset = code.wrapping_sub(first_code);
                let count_at_len = self.count_at_len(len);

                if offset < count_at_len as u32 {
                    let idx = self.first_symbol_index[(len - 1) as usize] + offset as usize;
                    return Ok(self.symbols[idx]);
                }
            }
        }

        Err(Error::Corrupt(
            "bit stream does not match any Huffman code".into(),
        ))
    }

    fn count_at_len(&self, len: u32) -> usize {
        let start = self.first_symbol_index[(len - 1) as usize];
        let end = if (len as usize) < self.first_code.len() {
            match self.first_code[len as usize..]
                .iter()
                .position(Option::is_some)
            {
                Some(rel) => self.first_symbol_index[len as usize + rel],
                None => self.symbols.len(),
            }
        } else {
            self.symbols.len()
        };
        end - start
    }
}

/// Builds a single-symbol degenerate code book (bit length 0), used when a data series
/// is constant across a slice.
pub fn single_symbol_book(symbol: i32) -> CodeBook {
    CodeBook {
        symbols: vec![symbol],
        bit_lens: vec![0],
    }
}
