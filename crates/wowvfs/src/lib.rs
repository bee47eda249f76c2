//! Asset environment for local World of Warcraft installations.
//!
//! [`Environment`] resolves the active build from `.build.info`, opens the
//! installation's archive storage for the build's locale, loads the
//! listfile namespace and, on request, the client database tables
//! described by the version's schema file.
//!
//! # Example
//!
//! ```rust,ignore
//! use wowvfs::{Environment, EnvironmentConfig};
//!
//! let config = EnvironmentConfig::new("/games/wow_classic", "/opt/wowvfs/data")
//!     .with_product("wow_classic")
//!     .with_tables(["Map"]);
//! let mut env = Environment::init(config)?;
//! env.load_database()?;
//!
//! if let Some(data) = env.open_file("world/wmo/kalimdor/ogrimmar/ogrimmar.wmo") {
//!     println!("{} bytes", data.len());
//! }
//! for wmo in env.namespace().iter_by_path_and_extension("world/wmo", "wmo") {
//!     println!("{wmo}");
//! }
//! # Ok::<(), wowvfs::Error>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod environment;
pub mod error;
pub mod namespace;

pub use config::{ConfigError, EnvironmentConfig};
pub use environment::Environment;
pub use error::{Error, Result};
pub use namespace::{LISTFILE, NamespaceIndex};

pub use wowvfs_db as db;
pub use wowvfs_storage as storage;
