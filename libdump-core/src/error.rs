//! Error types for loading, resolving and decoding images.

use thiserror::Error;

/// Error type for every step of a dump.
#[derive(Error, Debug)]
pub enum DumpError {
    /// The library could not be loaded into the process.
    #[error("failed to load library {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    /// A symbol is undefined or its owning image could not be located.
    #[error("failed to resolve {symbol}: {reason}")]
    ResolutionFailure { symbol: String, reason: String },

    /// The leading bytes are not a recognized Mach-O 64-bit magic.
    #[error("invalid Mach-O magic number: {actual:02x?}")]
    ValidationFailure { actual: Vec<u8> },

    /// A record or table would be read outside the image.
    #[error("malformed record at offset {offset:#x}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// The image file holds no slice this tool can decode.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// I/O error while reading an image file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DumpError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    pub fn unresolved(symbol: &str, reason: impl Into<String>) -> Self {
        Self::ResolutionFailure {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that only affect a single symbol lookup.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::ResolutionFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, DumpError>;
