//! Reader and writer configuration.

use crate::block::CompressionMethod;
use crate::rans::Order;

/// Options controlling how the reader validates and decodes a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Whether to verify each block's CRC32 trailer.
    pub verify_block_crc: bool,
    /// Whether to verify each container header's CRC32 trailer.
    pub verify_container_crc: bool,
    /// Whether to verify a slice's reference MD5, when present and a reference is supplied.
    pub verify_reference_md5: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            verify_block_crc: true,
            verify_container_crc: true,
            verify_reference_md5: true,
        }
    }
}

/// Builds a [`ReaderOptions`] one setting at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptionsBuilder {
    options: ReaderOptions,
}

impl ReaderOptionsBuilder {
    /// Starts from the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether block CRCs are verified.
    pub fn verify_block_crc(mut self, value: bool) -> Self {
        self.options.verify_block_crc = value;
        self
    }

    /// Sets whether container header CRCs are verified.
    pub fn verify_container_crc(mut self, value: bool) -> Self {
        self.options.verify_container_crc = value;
        self
    }

    /// Sets whether slice reference MD5s are verified.
    pub fn verify_reference_md5(mut self, value: bool) -> Self {
        self.options.verify_reference_md5 = value;
        self
    }

    /// Builds the options.
    pub fn build(self) -> ReaderOptions {
        self.options
    }
}

/// Options controlling how the writer lays out containers and slices, and which block
/// compression method it applies to each content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// The maximum number of records per slice.
    pub records_per_slice: usize,
    /// The maximum number of slices per container.
    pub slices_per_container: usize,
    /// The compression method applied to the core data block.
    pub core_data_compression: CompressionMethod,
    /// The compression method applied to external data blocks.
    pub external_data_compression: CompressionMethod,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            records_per_slice: 10_000,
            slices_per_container: 1,
            core_data_compression: CompressionMethod::Rans4x8(Order::Zero),
            external_data_compression: CompressionMethod::Gzip,
        }
    }
}

/// Builds a [`WriterOptions`] one setting at a time.
#[derive(Debug, Clone, Default)]
pub struct WriterOptionsBuilder {
    options: WriterOptions,
}

impl WriterOptionsBuilder {
    /// Starts from the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of records per slice.
    pub fn records_per_slice(mut self, value: usize) -> Self {
        self.options.records_per_slice = value;
        self
    }

    /// Sets the maximum number of slices per container.
    pub fn slices_per_container(mut self, value: usize) -> Self {
        self.options.slices_per_container = value;
        self
    }

    /// Sets the core data block compression method.
    pub fn core_data_compression(mut self, method: CompressionMethod) -> Self {
        self.options.core_data_compression = method;
        self
    }

    /// Sets the external data block compression method.
    pub fn external_data_compression(mut self, method: CompressionMethod) -> Self {
        self.options.external_data_compression = method;
        self
    }

    /// Builds the options.
    pub fn build(self) -> WriterOptions {
        self.options
    }
}
