//! Parsers for the container formats found in a local World of Warcraft
//! installation.
//!
//! Everything in this crate is pure: functions take byte slices and return
//! owned structures. File access, memory mapping and lookup chains live in
//! `wowvfs-storage`.
//!
//! # Supported Formats
//!
//! - **BLTE**: block table encoded payloads (raw, zlib and LZ4 chunks)
//! - **Encoding**: content key to encoding key table
//! - **Root**: FileDataID / name hash to content key manifest, with locale
//!   and content flags per block
//! - **Build config**: `key = value` text that names the root and encoding
//!   files of a build
//! - **Keys**: 16-byte MD5 content and encoding keys
//! - **Jenkins**: lookup3 `hashlittle`/`hashlittle2`, used for path name
//!   hashes and index block checksums
//!
//! # Example
//!
//! ```
//! use wowvfs_formats::blte::{BlteFile, CompressionMode};
//!
//! let encoded = BlteFile::encode(b"hello", CompressionMode::ZLib).expect("encode");
//! let decoded = BlteFile::decode(&encoded).expect("decode");
//! assert_eq!(decoded, b"hello");
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns

pub mod blte;
pub mod config;
pub mod encoding;
pub mod jenkins;
pub mod keys;
pub mod root;

pub use keys::{ContentKey, EncodingKey};
