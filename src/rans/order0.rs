//! Order-0 static rANS: a single frequency table shared across 4 interleaved states.

use super::model::FreqTable;
use super::state::{Cursor, DecState, EncState};
use crate::error::{Error, Result};

const N_STATES: usize = 4;

/// Compresses `data` with order-0 static rANS, returning `[len:u32 LE][freq table][body]`.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut header = (data.len() as u32).to_le_bytes().to_vec();

    if data.is_empty() {
        header.push(0);
        return header;
    }

    let table = FreqTable::build(data);
    table.write(&mut header);

    let mut body = Vec::new();
    let mut states = [EncState::new(); N_STATES];

    let tail = data.len() % N_STATES;
    let main_len = data.len() - tail;

    // Encode the trailing remainder first (it is the head of the stream once reversed).
    for (i, &b) in data[main_len..].iter().enumerate().rev() {
        let sym = b as usize;
        states[i].put(&mut body, table.cum_freq[sym], table.freq[sym]);
    }

    // Walk the bulk of the input from the end backward in groups of N_STATES, emitting
    // states in descending order so the forward decoder can read them 0..N_STATES.
    let mut i = main_len;
    while i > 0 {
        for s in (0..N_STATES).rev() {
            let b = data[i - N_STATES + s];
            let sym = b as usize;
            states[s].put(&mut body, table.cum_freq[sym], table.freq[sym]);
        }
        i -= N_STATES;
    }

    for s in (0..N_STATES).rev() {
        states[s].flush(&mut body);
    }
    body.reverse();

    header.extend_from_slice(&body);
    header
}

/// Decompresses an order-0 static rANS stream produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(Error::Corrupt("rANS order-0 stream too short".into()));
    }

    let out_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    if out_len == 0 {
        return Ok(Vec::new());
    }

    let mut cursor = Cursor::new(&data[4..]);
    let (table, lut) = FreqTable::read(&mut cursor)?;

    let body = &data[4 + cursor.position()..];
    let mut body_cursor = Cursor::new(body);

    let mut states = [
        DecState::new(&mut body_cursor)?,
        DecState::new(&mut body_cursor)?,
        DecState::new(&mut body_cursor)?,
        DecState::new(&mut body_cursor)?,
    ];

    let mut out = Vec::with_capacity(out_len);
    let main_len = out_len - (out_len % N_STATES);
    let mut produced = 0;

    while produced < main_len {
        for s in &mut states {
            let slot = s.get();
            let sym = lut[slot as usize];
            out.push(sym);
            s.advance(table.cum_freq[sym as usize], table.freq[sym as usize]);
            s.renorm(&mut body_cursor)?;
        }
        produced += N_STATES;
    }

    for s in states.iter_mut().take(out_len - main_len) {
        let slot = s.get();
        let sym = lut[slot as usize];
        out.push(sym);
        s.advance(table.cum_freq[sym as usize], table.freq[sym as usize]);
        s.renorm(&mut body_cursor)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_text() {
        let data = b"the quick brown fox jumps over the lazy dog, the quick brown fox again";
        let encoded = encode(data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let encoded = encode(&[]);
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_roundtrip_single_symbol_repeated() {
        let data = vec![7u8; 5000];
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_roundtrip_not_multiple_of_four() {
        for len in 1..16 {
            let data: Vec<u8> = (0..len as u8).collect();
            let encoded = encode(&data);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded, data, "len = {len}");
        }
    }
}
