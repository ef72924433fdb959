//! The structured error taxonomy shared by every core operation.

use std::string::FromUtf8Error;

/// An error from a core CRAM operation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying read/write failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A file definition, container, or block header failed a structural check.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A `.crai` or `.gzi` index failed to parse.
    #[error("malformed index: {0}")]
    MalformedIndex(String),

    /// The major/minor CRAM version cannot be read by this implementation.
    #[error("unsupported CRAM version: {major}.{minor}")]
    UnsupportedVersion {
        /// The major version.
        major: u8,
        /// The minor version.
        minor: u8,
    },

    /// The block's compression method is not implemented.
    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(String),

    /// A CRC mismatch, rANS underflow, Huffman fall-through, or codec read past end.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// A backward seek was requested on a non-seekable stream.
    #[error("unseekable: {0}")]
    Unseekable(String),

    /// A required reference sequence could not be resolved.
    #[error("reference sequence missing: {0}")]
    ReferenceMissing(String),
}

impl From<FromUtf8Error> for Error {
    fn from(e: FromUtf8Error) -> Self {
        Self::MalformedIndex(e.to_string())
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(e: std::num::TryFromIntError) -> Self {
        Self::Corrupt(e.to_string())
    }
}

/// The result type returned by core operations.
pub type Result<T> = std::result::Result<T, Error>;
