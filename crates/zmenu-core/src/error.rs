//! Error types for the zmenu-core library.
//!
//! Only genuinely invalid caller input is an error here. "No section at this
//! offset" is a zero score, and undecodable text falls back to hex, so neither
//! has a variant.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for zmenu operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all zmenu operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A read or write window does not fit inside the blob
    #[error("window {offset}..{} exceeds blob length {blob_len}", .offset + .len)]
    OutOfBounds {
        /// Absolute start of the window
        offset: usize,
        /// Window length in bytes
        len: usize,
        /// Length of the blob
        blob_len: usize,
    },

    /// i-menu slot index outside 0..12
    #[error("invalid i-menu slot {index}: must be between 0 and 11")]
    InvalidSlot {
        /// The rejected slot index
        index: usize,
    },

    /// Blob is too short to carry the structure being accessed
    #[error("blob of {len} bytes is too short (need at least {min})")]
    BlobTooShort {
        /// Actual length
        len: usize,
        /// Required minimum length
        min: usize,
    },

    /// Stored trailer does not match the computed CRC
    #[error("checksum mismatch: stored 0x{stored:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch {
        /// CRC stored in the trailing two bytes
        stored: u16,
        /// CRC computed over the body
        computed: u16,
    },

    /// Two blobs cannot be compared byte for byte
    #[error("blobs have different sizes: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first blob
        left: usize,
        /// Length of the second blob
        right: usize,
    },

    /// A value is outside the range a setting accepts
    #[error("invalid value {value} for {setting}")]
    InvalidValue {
        /// Name of the setting
        setting: &'static str,
        /// The rejected value
        value: u32,
    },

    /// Failed to parse an injected layout table
    #[error("failed to parse layout table: {0}")]
    LayoutParse(#[source] serde_json::Error),

    /// Failed to parse an injected name table
    #[error("failed to parse name table: {0}")]
    NameTableParse(#[source] serde_json::Error),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new out-of-bounds error
    pub fn out_of_bounds(offset: usize, len: usize, blob_len: usize) -> Self {
        Self::OutOfBounds {
            offset,
            len,
            blob_len,
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if the caller may keep working with the blob
    ///
    /// A checksum mismatch is a warning: the file may still be usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

/// Checks that `offset..offset + len` lies inside a blob of `blob_len` bytes
pub(crate) fn check_window(offset: usize, len: usize, blob_len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= blob_len => Ok(()),
        _ => Err(Error::out_of_bounds(offset, len, blob_len)),
    }
}
