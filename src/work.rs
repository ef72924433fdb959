//! Work-package dispatch for the concurrent slice-decode pipeline.
//!
//! Slices within a container are independent once the container's compression header has
//! been parsed, so their record decode can run off the thread that parsed the container.
//! Without the `parallel` feature this still runs sequentially; the package shape stays the
//! same either way so callers don't need to branch on it.

use std::collections::HashMap;

use crate::bitio::BitReader;
use crate::codec::ExternalReaders;
use crate::compression_header::CompressionHeader;
use crate::error::Result;
use crate::record::{decode_record, Record, SliceState};
use crate::slice;

/// One slice's raw framing plus its block bodies, ready for record decode on any thread
/// once the container's compression header is available.
pub struct SliceWorkPackage {
    /// The slice header.
    pub header: slice::Header,
    /// The slice's core (bit-packed) block body.
    pub core_block: Vec<u8>,
    /// The slice's external block bodies, keyed by content id.
    pub external_blocks: HashMap<i32, Vec<u8>>,
}

/// Decodes every slice in `packages` against the shared `compression_header`, calling `f`
/// with each slice's index, header, and decoded records.
///
/// Without the `parallel` feature, slices are decoded sequentially in package order. With
/// it, slices are decoded across a rayon thread pool; `f` must tolerate being called
/// concurrently from multiple threads, and call order is not guaranteed.
pub fn decode_slices<F>(
    compression_header: &CompressionHeader,
    packages: Vec<SliceWorkPackage>,
    f: F,
) -> Result<()>
where
    F: Fn(usize, &slice::Header, Vec<Record>) -> Result<()> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        packages
            .into_par_iter()
            .enumerate()
            .try_for_each(|(index, package)| decode_one(compression_header, index, package, &f))
    }

    #[cfg(not(feature = "parallel"))]
    {
        packages
            .into_iter()
            .enumerate()
            .try_for_each(|(index, package)| decode_one(compression_header, index, package, &f))
    }
}

fn decode_one<F>(
    compression_header: &CompressionHeader,
    index: usize,
    package: SliceWorkPackage,
    f: &F,
) -> Result<()>
where
    F: Fn(usize, &slice::Header, Vec<Record>) -> Result<()>,
{
    let borrowed: HashMap<i32, &[u8]> = package
        .external_blocks
        .iter()
        .map(|(&k, v)| (k, v.as_slice()))
        .collect();

    let mut external = ExternalReaders::new(borrowed);
    let mut core = BitReader::new(&package.core_block[..]);
    let mut state = SliceState::default();

    let mut records = Vec::with_capacity(package.header.record_count);
    for _ in 0..package.header.record_count {
        let record = decode_record(
            &mut core,
            &mut external,
            &compression_header.data_series_encodings,
            &compression_header.tag_encodings,
            &compression_header.preservation_map.tag_sets,
            compression_header.preservation_map.records_have_names,
            compression_header.preservation_map.alignment_starts_are_deltas,
            &mut state,
        )?;
        records.push(record);
    }

    f(index, &package.header, records)
}
