//! Error types for flowzip

use std::io;

/// Result type for flowzip operations
pub type Result<T> = std::result::Result<T, SZipError>;

/// Error types that can occur while streaming a ZIP archive
#[derive(Debug)]
pub enum SZipError {
    /// I/O error outside the output sink (e.g. creating the output file)
    Io(io::Error),
    /// The output sink failed earlier; nothing more will be written
    SinkFailed,
    /// Operation called in the wrong writer state
    InvalidState(&'static str),
    /// Entry name does not fit the 16-bit name length field
    NameTooLong(usize),
    /// Compression level outside -1..=9
    InvalidLevel(i32),
    /// The DEFLATE engine reported an error
    Compression(String),
}

impl std::fmt::Display for SZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SZipError::Io(e) => write!(f, "I/O error: {}", e),
            SZipError::SinkFailed => write!(f, "output sink failed, archive aborted"),
            SZipError::InvalidState(msg) => write!(f, "Invalid writer state: {}", msg),
            SZipError::NameTooLong(len) => {
                write!(f, "Entry name is {} bytes, limit is 65535", len)
            }
            SZipError::InvalidLevel(level) => {
                write!(f, "Compression level {} out of range -1..=9", level)
            }
            SZipError::Compression(msg) => write!(f, "Compression error: {}", msg),
        }
    }
}

impl std::error::Error for SZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SZipError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SZipError {
    fn from(err: io::Error) -> Self {
        SZipError::Io(err)
    }
}

impl From<flate2::CompressError> for SZipError {
    fn from(err: flate2::CompressError) -> Self {
        SZipError::Compression(err.to_string())
    }
}
