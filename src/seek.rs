//! Translating a `(reference sequence, position)` query into a seek on the underlying file,
//! via a `.crai` index and, for a bgzipped stream, a `.gzi` index.

use std::io::{Seek, SeekFrom};

use crate::crai;
use crate::error::{Error, Result};
use crate::gzi;

/// Seeks `stream` to `pos`.
///
/// `SeekFrom::End` is rejected: CRAM streams are read forward from a known start, and an
/// index-driven seek should never need to measure from the tail. Both `SeekFrom::Start` and
/// `SeekFrom::Current` (including negative deltas) are handled directly, rather than folding
/// `Current` into the same "unsupported" bucket as `End`.
pub fn seek<S>(stream: &mut S, pos: SeekFrom) -> Result<u64>
where
    S: Seek,
{
    match pos {
        SeekFrom::End(_) => Err(Error::Unseekable(
            "seeking from the end of a CRAM stream is not supported".into(),
        )),
        other => stream.seek(other).map_err(Error::from),
    }
}

/// Finds the container holding reads for `reference_sequence_id` at `position` and seeks
/// `stream` to it, returning the matching index record.
///
/// If `gzi_index` is `Some`, `crai_index`'s container offsets are treated as uncompressed
/// offsets into the underlying bgzip stream and translated through it; otherwise they are
/// used as direct byte offsets.
pub fn seek_to_reference_position<S>(
    stream: &mut S,
    crai_index: &crai::Index,
    gzi_index: Option<&gzi::Index>,
    reference_sequence_id: i32,
    position: i32,
) -> Result<crai::Record>
where
    S: Seek,
{
    let record = crai_index
        .query(reference_sequence_id, position)
        .copied()
        .ok_or_else(|| {
            Error::Corrupt(format!(
                "no index entry covers reference sequence {reference_sequence_id} at position {position}"
            ))
        })?;

    let offset = match gzi_index {
        Some(gzi) => gzi::split_virtual_offset(gzi.query(record.container_offset)?).0,
        None => record.container_offset,
    };

    seek(stream, SeekFrom::Start(offset))?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_seek_rejects_from_end() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        let result = seek(&mut cursor, SeekFrom::End(-1));
        assert!(matches!(result, Err(Error::Unseekable(_))));
    }

    #[test]
    fn test_seek_current_is_not_folded_into_unsupported() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        seek(&mut cursor, SeekFrom::Start(4)).unwrap();
        let pos = seek(&mut cursor, SeekFrom::Current(2)).unwrap();
        assert_eq!(pos, 6);
    }

    #[test]
    fn test_seek_to_reference_position_without_gzi() {
        let index = crai::Index::new(vec![crai::Record {
            reference_sequence_id: 0,
            alignment_start: 1,
            alignment_span: 100,
            container_offset: 42,
            slice_offset: 0,
            slice_size: 10,
        }]);

        let mut cursor = Cursor::new(vec![0u8; 100]);
        let record = seek_to_reference_position(&mut cursor, &index, None, 0, 50).unwrap();
        assert_eq!(record.container_offset, 42);
        assert_eq!(cursor.position(), 42);
    }

    #[test]
    fn test_seek_to_reference_position_missing_entry() {
        let index = crai::Index::new(Vec::new());
        let mut cursor = Cursor::new(vec![0u8; 100]);
        let result = seek_to_reference_position(&mut cursor, &index, None, 0, 50);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }
}
