//! The byte-aligned rANS entropy coder, in its order-0 and order-1 static forms.

mod model;
mod order0;
mod order1;
mod state;

pub use state::{SCALE_BITS, TOTFREQ};

use crate::error::Result;

/// rANS model order: a single global frequency table, or one per preceding-byte context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// One shared frequency table (4 interleaved rANS states).
    Zero,
    /// One frequency table per previous byte (8 interleaved rANS states).
    One,
}

/// Compresses `data` with static rANS at the given model order.
pub fn encode(data: &[u8], order: Order) -> Vec<u8> {
    match order {
        Order::Zero => order0::encode(data),
        Order::One => order1::encode(data),
    }
}

/// Decompresses a static rANS stream produced by [`encode`] at the given model order.
pub fn decode(data: &[u8], order: Order) -> Result<Vec<u8>> {
    match order {
        Order::Zero => order0::decode(data),
        Order::One => order1::decode(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order0_dispatch() {
        let data = b"aaaabbbbcccc";
        let encoded = encode(data, Order::Zero);
        assert_eq!(decode(&encoded, Order::Zero).unwrap(), data);
    }

    #[test]
    fn test_order1_dispatch() {
        let data = b"abababababab";
        let encoded = encode(data, Order::One);
        assert_eq!(decode(&encoded, Order::One).unwrap(), data);
    }
}
