//! Encoding table
//!
//! Maps content keys (MD5 of decoded files) to encoding keys (MD5 of the
//! stored BLTE blobs) and records each file's decoded size. Only the
//! content key half is parsed; the encoding key half is written by the
//! builder for completeness but never needed for reads.

mod builder;
mod error;
mod file;
mod header;

pub use builder::EncodingBuilder;
pub use error::EncodingError;
pub use file::{CKeyEntry, EncodingFile, PageIndex};
pub use header::{ENCODING_HEADER_SIZE, EncodingHeader};
