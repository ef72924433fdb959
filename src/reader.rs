//! The top-level reading facade: file definition, file header, and a forward record iterator
//! that pulls containers and slices from the underlying stream as needed.

use std::collections::{HashMap, VecDeque};
use std::io::Read;

use crate::bitio::BitReader;
use crate::block::{self, ContentType};
use crate::codec::ExternalReaders;
use crate::compression_header::{self, CompressionHeader};
use crate::config::ReaderOptions;
use crate::container::{self, FileDefinition, Header, ReferenceSequenceContext};
use crate::error::{Error, Result};
use crate::record::{decode_record, Record, SliceState};
use crate::slice;
use crate::work::SliceWorkPackage;

/// One parsed container: its header, compression header, and slice work packages.
pub struct ContainerData {
    /// The container header.
    pub header: Header,
    /// The container's compression header.
    pub compression_header: CompressionHeader,
    /// The container's slices, with their block bodies already decompressed.
    pub slices: Vec<SliceWorkPackage>,
}

/// Reads CRAM containers and records from an underlying stream.
pub struct Reader<R> {
    inner: R,
    options: ReaderOptions,
    file_definition: Option<FileDefinition>,
    buffered: VecDeque<Record>,
    finished: bool,
}

impl<R> Reader<R>
where
    R: Read,
{
    /// Wraps `inner` with the default reader options.
    pub fn new(inner: R) -> Self {
        Self::with_options(inner, ReaderOptions::default())
    }

    /// Wraps `inner` with explicit reader options.
    pub fn with_options(inner: R, options: ReaderOptions) -> Self {
        Self {
            inner,
            options,
            file_definition: None,
            buffered: VecDeque::new(),
            finished: false,
        }
    }

    /// The reader's options.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Reads the file definition. Must be called before [`Self::read_file_header`].
    pub fn read_file_definition(&mut self) -> Result<FileDefinition> {
        let definition = container::read_file_definition(&mut self.inner)?;
        self.file_definition = Some(definition.clone());
        Ok(definition)
    }

    /// Reads the file header container, returning its opaque body bytes. The core neither
    /// parses nor validates this text; it is a SAM-style header as far as any caller cares.
    pub fn read_file_header(&mut self) -> Result<Vec<u8>> {
        let (_header, _len) = container::read_header(&mut self.inner)?
            .ok_or_else(|| Error::MalformedHeader("missing file header container".into()))?;

        let block = block::read_block(&mut self.inner)?;
        if block.content_type != ContentType::FileHeader {
            return Err(Error::MalformedHeader(
                "expected file header block as the sole block of the header container".into(),
            ));
        }

        block.decompressed()
    }

    fn read_container_data(&mut self) -> Result<Option<ContainerData>> {
        let (header, _len) = match container::read_header(&mut self.inner)? {
            Some(h) => h,
            None => return Ok(None),
        };

        let compression_header_block = block::read_block(&mut self.inner)?;
        let compression_header_body = compression_header_block.decompressed()?;
        let compression_header =
            compression_header::read_compression_header(&mut &compression_header_body[..])?;

        let mut slices = Vec::with_capacity(header.landmarks.len());
        for _ in 0..header.landmarks.len() {
            let slice_header_block = block::read_block(&mut self.inner)?;
            let slice_header_body = slice_header_block.decompressed()?;
            let slice_header = slice::read_header(&mut &slice_header_body[..])?;

            let mut core_block = Vec::new();
            let mut external_blocks = HashMap::new();

            for _ in 0..slice_header.block_count {
                let data_block = block::read_block(&mut self.inner)?;
                let body = data_block.decompressed()?;
                match data_block.content_type {
                    ContentType::CoreData => core_block = body,
                    ContentType::ExternalData => {
                        external_blocks.insert(data_block.content_id, body);
                    }
                    other => {
                        return Err(Error::MalformedHeader(format!(
                            "unexpected block content type inside slice: {other:?}"
                        )))
                    }
                }
            }

            slices.push(SliceWorkPackage {
                header: slice_header,
                core_block,
                external_blocks,
            });
        }

        Ok(Some(ContainerData {
            header,
            compression_header,
            slices,
        }))
    }

    /// Reads and returns the next record, pulling and decoding containers as needed. Returns
    /// `Ok(None)` once the stream is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Ok(Some(record));
            }

            if self.finished {
                return Ok(None);
            }

            let Some(container_data) = self.read_container_data()? else {
                self.finished = true;
                continue;
            };

            for package in container_data.slices {
                let mut state = SliceState::default();
                if let ReferenceSequenceContext::Some { alignment_start, .. } =
                    package.header.reference_sequence_context
                {
                    state.previous_alignment_start = alignment_start;
                }

                let borrowed: HashMap<i32, &[u8]> = package
                    .external_blocks
                    .iter()
                    .map(|(&k, v)| (k, v.as_slice()))
                    .collect();
                let mut external = ExternalReaders::new(borrowed);
                let mut core = BitReader::new(&package.core_block[..]);

                for _ in 0..package.header.record_count {
                    let record = decode_record(
                        &mut core,
                        &mut external,
                        &container_data.compression_header.data_series_encodings,
                        &container_data.compression_header.tag_encodings,
                        &container_data.compression_header.preservation_map.tag_sets,
                        container_data
                            .compression_header
                            .preservation_map
                            .records_have_names,
                        container_data
                            .compression_header
                            .preservation_map
                            .alignment_starts_are_deltas,
                        &mut state,
                    )?;
                    self.buffered.push_back(record);
                }
            }
        }
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Iterator for Reader<R>
where
    R: Read,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, CompressionMethod};
    use crate::codec::{Codec, ExternalWriters};
    use crate::compression_header::{DataSeriesEncodings, PreservationMap};
    use crate::record::{encode_record, Flags};
    use bstr::BString;
    use indexmap::IndexMap;

    fn simple_encodings() -> DataSeriesEncodings {
        let mut e = DataSeriesEncodings::default();
        e.bam_flags = Some(Codec::External { block_content_id: 0 });
        e.cram_flags = Some(Codec::External { block_content_id: 1 });
        e.read_lengths = Some(Codec::External { block_content_id: 2 });
        e.alignment_starts = Some(Codec::External { block_content_id: 3 });
        e.read_group_ids = Some(Codec::External { block_content_id: 4 });
        e.names = Some(Codec::ByteArrayStop {
            stop_byte: 0,
            block_content_id: 5,
        });
        e.tag_set_ids = Some(Codec::External { block_content_id: 6 });
        e.bases = Some(Codec::External { block_content_id: 7 });
        e
    }

    fn write_container_with_one_record(buf: &mut Vec<u8>) {
        let compression_header = CompressionHeader {
            preservation_map: PreservationMap {
                tag_sets: vec![Vec::new()],
                ..PreservationMap::default()
            },
            data_series_encodings: simple_encodings(),
            tag_encodings: IndexMap::new(),
        };

        let record = Record {
            bam_flags: Flags::UNMAPPED,
            read_length: 4,
            name: Some(BString::from("r1")),
            bases: Some(b"ACGT".to_vec()),
            ..Record::default()
        };

        let mut writers = ExternalWriters::new();
        let mut core_out = crate::bitio::BitWriter::new(Vec::new());
        let mut state = SliceState::default();
        encode_record(
            &mut core_out,
            &mut writers,
            &compression_header.data_series_encodings,
            &compression_header.tag_encodings,
            &compression_header.preservation_map.tag_sets,
            true,
            true,
            &mut state,
            &record,
        )
        .unwrap();

        let external_blocks = writers.into_blocks();

        let slice_header = slice::Header {
            reference_sequence_context: ReferenceSequenceContext::None,
            record_count: 1,
            record_counter: 0,
            block_count: 1 + external_blocks.len(),
            block_content_ids: external_blocks.keys().copied().collect(),
            embedded_reference_bases_block_content_id: None,
            reference_md5: None,
            optional_tags: Vec::new(),
        };

        let mut slice_header_bytes = Vec::new();
        slice::write_header(&mut slice_header_bytes, &slice_header).unwrap();
        let slice_header_block = Block::encode(
            ContentType::SliceHeader,
            0,
            CompressionMethod::None,
            &slice_header_bytes,
        )
        .unwrap();

        let mut compression_header_bytes = Vec::new();
        compression_header::write_compression_header(&mut compression_header_bytes, &compression_header)
            .unwrap();
        let compression_header_block = Block::encode(
            ContentType::CompressionHeader,
            0,
            CompressionMethod::None,
            &compression_header_bytes,
        )
        .unwrap();

        let mut body = Vec::new();
        block::write_block(&mut body, &compression_header_block).unwrap();
        let landmark0 = body.len();

        block::write_block(&mut body, &slice_header_block).unwrap();
        let core_block = Block::encode(ContentType::CoreData, 0, CompressionMethod::None, &[]).unwrap();
        block::write_block(&mut body, &core_block).unwrap();
        for (id, data) in &external_blocks {
            let block = Block::encode(ContentType::ExternalData, *id, CompressionMethod::None, data).unwrap();
            block::write_block(&mut body, &block).unwrap();
        }

        let header = Header {
            reference_sequence_context: ReferenceSequenceContext::None,
            record_count: 1,
            record_counter: 0,
            base_count: 4,
            block_count: 2 + external_blocks.len(),
            landmarks: vec![landmark0],
        };

        container::write_header(buf, &header, body.len()).unwrap();
        buf.extend_from_slice(&body);
    }

    #[test]
    fn test_next_record_reads_through_one_container() {
        let mut buf = Vec::new();
        write_container_with_one_record(&mut buf);
        container::write_eof_container(&mut buf).unwrap();

        let mut reader = Reader::new(&buf[..]);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.name, Some(BString::from("r1")));
        assert_eq!(record.bases, Some(b"ACGT".to_vec()));

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_is_iterator() {
        let mut buf = Vec::new();
        write_container_with_one_record(&mut buf);
        container::write_eof_container(&mut buf).unwrap();

        let reader = Reader::new(&buf[..]);
        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records.len(), 1);
    }
}
