//! Order-1 static rANS: one frequency table per preceding-byte context, shared across 8
//! interleaved states.
//!
//! Each position's context is the byte immediately before it (0 for the first position).
//! The original offset-striding interleaving used for SIMD decode throughput is simplified
//! here to plain consecutive-block lanes: lane `s` of a group always holds the position
//! immediately after lane `s - 1`, so decode can thread the running context across lanes
//! the same way a sequential order-1 decoder would.

use super::model::FreqTable;
use super::state::{Cursor, DecState, EncState};
use crate::error::{Error, Result};

const N_STATES: usize = 8;

fn contexts(data: &[u8]) -> Vec<u8> {
    let mut ctx = vec![0u8; data.len()];
    for i in 1..data.len() {
        ctx[i] = data[i - 1];
    }
    ctx
}

fn build_tables(data: &[u8], ctx: &[u8]) -> Vec<FreqTable> {
    let mut counts = vec![[0u32; 256]; 256];
    let mut totals = [0u32; 256];

    for (&c, &b) in ctx.iter().zip(data.iter()) {
        counts[c as usize][b as usize] += 1;
        totals[c as usize] += 1;
    }

    counts
        .into_iter()
        .zip(totals.iter())
        .map(|(raw, &total)| FreqTable::normalize(raw, total))
        .collect()
}

/// Compresses `data` with order-1 static rANS.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut header = (data.len() as u32).to_le_bytes().to_vec();

    if data.is_empty() {
        header.push(0);
        return header;
    }

    let ctx = contexts(data);
    let tables = build_tables(data, &ctx);

    for (i, table) in tables.iter().enumerate() {
        if table.freq.iter().any(|&f| f != 0) {
            header.push(i as u8);
            table.write(&mut header);
        }
    }
    header.push(0);

    let mut body = Vec::new();
    let mut states = [EncState::new(); N_STATES];

    let tail = data.len() % N_STATES;
    let main_len = data.len() - tail;

    for s in (0..tail).rev() {
        let p = main_len + s;
        let sym = data[p] as usize;
        let table = &tables[ctx[p] as usize];
        states[s].put(&mut body, table.cum_freq[sym], table.freq[sym]);
    }

    let mut i = main_len;
    while i > 0 {
        for s in (0..N_STATES).rev() {
            let p = i - N_STATES + s;
            let sym = data[p] as usize;
            let table = &tables[ctx[p] as usize];
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

/// Decompresses an order-1 static rANS stream produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(Error::Corrupt("rANS order-1 stream too short".into()));
    }

    let out_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    if out_len == 0 {
        return Ok(Vec::new());
    }

    let mut cursor = Cursor::new(&data[4..]);
    let mut rows: Vec<Option<(FreqTable, Vec<u8>)>> = (0..256).map(|_| None).collect();

    let mut ctx = cursor.read_u8()?;
    loop {
        let entry = FreqTable::read(&mut cursor)?;
        rows[ctx as usize] = Some(entry);

        let next = cursor.read_u8()?;
        if next == 0 {
            break;
        }
        ctx = next;
    }

    let body = &data[4 + cursor.position()..];
    let mut body_cursor = Cursor::new(body);

    let mut states = Vec::with_capacity(N_STATES);
    for _ in 0..N_STATES {
        states.push(DecState::new(&mut body_cursor)?);
    }

    let mut out = Vec::with_capacity(out_len);
    let main_len = out_len - (out_len % N_STATES);
    let mut last = 0u8;
    let mut produced = 0;

    while produced < main_len {
        for s in &mut states {
            let (table, lut) = rows[last as usize]
                .as_ref()
                .ok_or_else(|| Error::Corrupt(format!("no rANS context for byte {last}")))?;
            let slot = s.get();
            let sym = lut[slot as usize];
            out.push(sym);
            s.advance(table.cum_freq[sym as usize], table.freq[sym as usize]);
            s.renorm(&mut body_cursor)?;
            last = sym;
        }
        produced += N_STATES;
    }

    for s in states.iter_mut().take(out_len - main_len) {
        let (table, lut) = rows[last as usize]
            .as_ref()
            .ok_or_else(|| Error::Corrupt(format!("no rANS context for byte {last}")))?;
        let slot = s.get();
        let sym = lut[slot as usize];
        out.push(sym);
        s.advance(table.cum_freq[sym as usize], table.freq[sym as usize]);
        s.renorm(&mut body_cursor)?;
        last = sym;
    }

    Ok(out)
}
