//! Encoding table error types

use thiserror::Error;

/// Encoding table errors
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Magic is not `EN`
    #[error("invalid encoding magic: {0:02X?}")]
    InvalidMagic([u8; 2]),

    /// Unsupported table version
    #[error("unsupported encoding version: {0}")]
    UnsupportedVersion(u8),

    /// Key size other than 1..=16 bytes
    #[error("invalid {field}: {value}")]
    InvalidHashSize {
        /// Header field name
        field: &'static str,
        /// Value found
        value: u8,
    },

    /// Zero page size
    #[error("invalid page size: {0} KiB")]
    InvalidPageSize(u16),

    /// Page data does not match the index checksum
    #[error("checksum mismatch in content key page {0}")]
    ChecksumMismatch(usize),

    /// Table ends before the announced pages
    #[error("truncated encoding table: {0}")]
    Truncated(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}
