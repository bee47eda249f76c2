//! Error types for schema loading, table decoding and the table store

use std::path::PathBuf;
use thiserror::Error;

/// Schema description errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema file does not exist
    #[error("schema file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Schema file could not be read
    #[error("failed to read schema {}", path.display())]
    Io {
        /// Schema file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Schema file is not well-formed XML
    #[error("invalid schema XML: {0}")]
    Parse(#[from] roxmltree::Error),
}

/// Binary table decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Magic is not a supported table format
    #[error("unsupported table format: {0:02X?}")]
    UnsupportedFormat([u8; 4]),

    /// Blob ends before a structure it announces
    #[error("truncated {what} at offset {offset}: needs {needed} bytes")]
    Truncated {
        /// Structure being read
        what: &'static str,
        /// Offset of the structure
        offset: usize,
        /// Bytes required
        needed: usize,
    },

    /// Field type tag the decoder does not know
    #[error("field {field} has unknown type {tag}")]
    UnknownType {
        /// Field name
        field: String,
        /// Type tag from the schema
        tag: String,
    },

    /// Field maps to a column the table does not have
    #[error("field {field} maps to column {column}, table has {available}")]
    ColumnOutOfRange {
        /// Field name
        field: String,
        /// Mapped column
        column: usize,
        /// Column count of the table
        available: usize,
    },

    /// Column uses a compression kind the decoder does not know
    #[error("column {column} uses unknown compression {kind}")]
    UnsupportedCompression {
        /// Column index
        column: usize,
        /// Compression kind
        kind: u32,
    },

    /// Header parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Table store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// No schema is registered for the table
    #[error("no schema for table {0}")]
    MissingSchema(String),

    /// Neither a `.db2` nor a `.dbc` file exists for the table
    #[error("table file not found: {0}")]
    TableNotFound(String),

    /// Table blob failed to decode
    #[error("failed to decode table {table}")]
    Decode {
        /// Table name
        table: String,
        /// Underlying error
        #[source]
        source: DecodeError,
    },

    /// Schema loading failed
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
