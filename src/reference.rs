//! Byte-oriented access to reference sequences.
//!
//! This crate does not parse FASTA; callers supply reference bases through
//! [`ReferenceSequence`], however they loaded them.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Supplies reference bases by 1-based, half-open-free query.
pub trait ReferenceSequence {
    /// Returns the bases covering `[start, start + len)` (1-based, inclusive `start`) of
    /// `reference_sequence_id`, uppercased.
    fn bases(&self, reference_sequence_id: i32, start: i32, len: i32) -> Result<Vec<u8>>;

    /// The length of the named reference sequence, if known.
    fn length(&self, reference_sequence_id: i32) -> Result<i32>;
}

/// An in-memory reference sequence store, keyed by reference sequence id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceSequences {
    sequences: HashMap<i32, Vec<u8>>,
}

impl InMemoryReferenceSequences {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the bases for `reference_sequence_id`.
    pub fn insert(&mut self, reference_sequence_id: i32, bases: Vec<u8>) {
        self.sequences.insert(reference_sequence_id, bases);
    }
}

impl ReferenceSequence for InMemoryReferenceSequences {
    fn bases(&self, reference_sequence_id: i32, start: i32, len: i32) -> Result<Vec<u8>> {
        let sequence = self.sequences.get(&reference_sequence_id).ok_or_else(|| {
            Error::ReferenceMissing(format!("no such reference sequence: {reference_sequence_id}"))
        })?;

        let start = usize::try_from(start - 1)?;
        let len = usize::try_from(len)?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| Error::Corrupt("reference range overflow".into()))?;

        sequence
            .get(start..end)
            .map(|bases| bases.iter().map(u8::to_ascii_uppercase).collect())
            .ok_or_else(|| {
                Error::ReferenceMissing(format!(
                    "reference sequence {reference_sequence_id} does not cover [{start}, {end})"
                ))
            })
    }

    fn length(&self, reference_sequence_id: i32) -> Result<i32> {
        self.sequences
            .get(&reference_sequence_id)
            .map(|s| i32::try_from(s.len()).unwrap_or(i32::MAX))
            .ok_or_else(|| {
                Error::ReferenceMissing(format!("no such reference sequence: {reference_sequence_id}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bases_are_uppercased_and_range_checked() {
        let mut refs = InMemoryReferenceSequences::new();
        refs.insert(0, b"acgtACGT".to_vec());

        assert_eq!(refs.bases(0, 1, 4).unwrap(), b"ACGT");
        assert_eq!(refs.bases(0, 5, 4).unwrap(), b"ACGT");
        assert!(refs.bases(0, 1, 100).is_err());
        assert!(refs.bases(1, 1, 1).is_err());
    }

    #[test]
    fn test_length() {
        let mut refs = InMemoryReferenceSequences::new();
        refs.insert(0, b"ACGTACGT".to_vec());
        assert_eq!(refs.length(0).unwrap(), 8);
        assert!(refs.length(1).is_err());
    }
}
