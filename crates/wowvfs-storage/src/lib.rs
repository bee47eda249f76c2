//! Local CASC storage for World of Warcraft installations.
//!
//! This crate resolves the active build of an installation from
//! `.build.info`, then serves file reads out of the local archive store
//! under `Data/`. The read chain follows the client:
//!
//! 1. Root manifest: path name hash or FileDataID -> content key
//! 2. Encoding table: content key -> encoding key and decoded size
//! 3. `.idx` journals: encoding key -> archive, offset and size
//! 4. `data.NNN`: 30-byte local header followed by a BLTE blob
//!
//! [`ArchiveSession`] wraps a [`StorageBackend`] (by default
//! [`CascStorage`]) and applies path normalization and the size policy that
//! rejects placeholder entries.
//!
//! # Example
//!
//! ```rust,ignore
//! use wowvfs_storage::{ArchiveSession, BuildDescriptor, LocaleFlags};
//! use std::path::Path;
//!
//! let game = Path::new("/games/wow_classic");
//! let build = BuildDescriptor::resolve(&game.join(".build.info"), None)?;
//! let mut session = ArchiveSession::new();
//! session.open(&game.join("Data"), LocaleFlags::from_code(&build.locale))?;
//! let data = session.read_by_name("world/wmo/kalimdor/ogrimmar/ogrimmar.wmo")?;
//! println!("{} bytes", data.len());
//! # Ok::<(), wowvfs_storage::StorageError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;
use thiserror::Error;

// Build info parser (.build.info)
pub mod build_info;

// Index journals (.idx)
pub mod index;

// Data archives (data.NNN)
pub mod archive;
pub mod local_header;

// Content resolution pipeline
pub mod resolver;

// Local CASC backend
pub mod casc;

// Session over a storage backend
pub mod session;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use build_info::{BuildDescriptor, BuildVersion};
pub use casc::CascStorage;
pub use session::{ArchiveSession, FileData, FileTarget, StorageBackend, StorageFile};
pub use wowvfs_formats::root::LocaleFlags;

/// Installation subdirectory holding archives and configs
pub const DEFAULT_DATA_DIR: &str = "Data";
/// Directory under `Data/` holding `.idx` and `data.NNN` files
pub const DATA_DIR: &str = "data";
/// Build manifest at the installation root
pub const BUILD_INFO_FILE: &str = ".build.info";

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest, archive entry or file is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Entry reports a size that marks it unreadable.
    #[error("invalid size {size:#x} for {target}")]
    InvalidSize {
        /// File name or ID
        target: String,
        /// Reported size
        size: u32,
    },

    /// Short or failed payload read.
    #[error("read error for {target}: {reason}")]
    Read {
        /// File name or ID
        target: String,
        /// What went wrong
        reason: String,
    },

    /// Storage could not be opened, or is not open.
    #[error("storage unavailable at {}", path.display())]
    Unavailable {
        /// Data directory
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: Option<Box<StorageError>>,
    },

    /// Index file error.
    #[error("index error: {0}")]
    Index(String),

    /// Archive file error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Invalid data format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Build manifest header lacks a required column.
    #[error("malformed build manifest header: missing {0} column")]
    MalformedHeader(&'static str),

    /// Build manifest row width differs from the header.
    #[error("build manifest line {line} has {found} cells, header has {expected}")]
    ColumnMismatch {
        /// 1-based line number
        line: usize,
        /// Header cell count
        expected: usize,
        /// Row cell count
        found: usize,
    },

    /// No build manifest row is active.
    #[error("no active build in manifest")]
    NoActiveRow,

    /// BLTE decoding failed.
    #[error("BLTE error: {0}")]
    Blte(#[from] wowvfs_formats::blte::BlteError),

    /// Encoding table parsing failed.
    #[error("encoding table error: {0}")]
    Encoding(#[from] wowvfs_formats::encoding::EncodingError),

    /// Root manifest parsing failed.
    #[error("root manifest error: {0}")]
    Root(#[from] wowvfs_formats::root::RootError),

    /// Build config parsing failed.
    #[error("build config error: {0}")]
    Config(#[from] wowvfs_formats::config::ConfigError),
}

impl StorageError {
    /// Storage unavailable at `path` because of `source`
    pub fn unavailable(path: impl Into<PathBuf>, source: Self) -> Self {
        Self::Unavailable {
            path: path.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the error means the entry is absent rather than broken
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidSize { .. })
    }
}
