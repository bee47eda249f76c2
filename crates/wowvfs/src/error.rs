//! Error types for the environment

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;
use wowvfs_db::{DatabaseError, SchemaError};
use wowvfs_storage::StorageError;

/// Result type for environment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Environment errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Build resolution or storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Listing file does not exist
    #[error("listfile not found: {}", .0.display())]
    ListfileNotFound(PathBuf),

    /// Listing file could not be read
    #[error("failed to read listfile {}", path.display())]
    Listfile {
        /// Listing file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Schema description failure
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Table store failure
    #[error(transparent)]
    Database(#[from] DatabaseError),
}
