//! BLTE error types

use thiserror::Error;

/// BLTE-specific error type
#[derive(Debug, Error)]
pub enum BlteError {
    /// Invalid BLTE magic bytes
    #[error("invalid BLTE magic: expected [42 4C 54 45], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Header size does not fit the chunk table it announces
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),

    /// Unknown chunk table flags
    #[error("invalid chunk table flags: 0x{0:02X}")]
    InvalidTableFlags(u8),

    /// Chunk count of zero in a chunked header
    #[error("invalid chunk count: {0}")]
    InvalidChunkCount(u32),

    /// Empty chunk encountered
    #[error("empty chunk (zero size)")]
    EmptyChunk,

    /// Chunk table points past the end of the blob
    #[error("chunk {index} truncated: needs {needed} bytes, {available} available")]
    TruncatedChunk {
        /// Chunk index
        index: usize,
        /// Bytes announced by the chunk table
        needed: usize,
        /// Bytes left in the blob
        available: usize,
    },

    /// Unknown compression mode
    #[error("unknown compression mode: 0x{0:02X}")]
    UnknownCompressionMode(u8),

    /// Compression mode recognised but not supported
    #[error("unsupported compression mode: 0x{0:02X}")]
    UnsupportedCompressionMode(u8),

    /// Encrypted chunk; decryption keys are not available
    #[error("chunk {index} is encrypted with key {key_name:016X}")]
    EncryptedChunk {
        /// Chunk index
        index: usize,
        /// TACT key name
        key_name: u64,
    },

    /// Chunk MD5 does not match the chunk table
    #[error("chunk {index} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Chunk index
        index: usize,
        /// Expected checksum
        expected: String,
        /// Actual checksum
        actual: String,
    },

    /// Decoded size disagrees with the chunk table
    #[error("chunk {index} decoded to {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Chunk index
        index: usize,
        /// Size announced by the chunk table
        expected: usize,
        /// Size produced by the decoder
        actual: usize,
    },

    /// Compression/decompression error
    #[error("compression error: {0}")]
    CompressionError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for BLTE operations
pub type BlteResult<T> = Result<T, BlteError>;
