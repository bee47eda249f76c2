//! Root manifest error types

use thiserror::Error;

/// Root manifest errors
#[derive(Debug, Error)]
pub enum RootError {
    /// Header size outside the accepted range
    #[error("invalid root header size: {0}")]
    InvalidHeaderSize(u32),

    /// Manifest ends inside a block
    #[error("truncated root block at offset {offset}: needs {needed} bytes, {available} available")]
    Truncated {
        /// Offset of the block
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes remaining
        available: usize,
    },
}
