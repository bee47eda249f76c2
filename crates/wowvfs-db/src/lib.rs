//! Client database tables for World of Warcraft.
//!
//! Table layouts are described by an XML schema registry; binary tables
//! (`WDBC` and `WDC3`) are decoded against those schemas into rows that are
//! addressable by record ID and, for indexed fields, by value.
//!
//! # Example
//!
//! ```rust,ignore
//! use wowvfs_db::{SchemaRegistry, TableStore};
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! let registry = SchemaRegistry::load(Path::new("data/1.13/database.xml"))?;
//! let files: HashMap<String, Vec<u8>> = HashMap::new();
//! let store = TableStore::load(&files, &registry, &["Map"])?;
//! if let Some(map) = store.get("Map").and_then(|t| t.get(1)) {
//!     println!("{:?}", map.get("Directory"));
//! }
//! # Ok::<(), wowvfs_db::DatabaseError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

pub mod decoder;
pub mod error;
pub mod schema;
pub mod store;
pub mod table;
pub mod wdbc;
pub mod wdc3;

pub use decoder::decode;
pub use error::{DatabaseError, DecodeError, SchemaError};
pub use schema::{FieldSchema, FieldType, SchemaRegistry, TableSchema};
pub use store::{TableSource, TableStore};
pub use table::{DecodedTable, Row, Value};

/// Schema description file name inside a version directory
pub const SCHEMA_FILE: &str = "database.xml";
