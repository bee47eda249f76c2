//! Configuration for the environment

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured directory does not exist
    #[error("{what} directory does not exist: {}", path.display())]
    MissingDirectory {
        /// Which directory
        what: &'static str,
        /// Configured path
        path: PathBuf,
    },

    /// Configuration file could not be read
    #[error("failed to read config {}", path.display())]
    Read {
        /// Configuration file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for this structure
    #[error("invalid config {}", path.display())]
    Parse {
        /// Configuration file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration of an [`Environment`](crate::Environment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Installation root holding `.build.info` and `Data/`
    pub game_dir: PathBuf,

    /// Application data holding `<major>.<minor>/listfile.csv` and
    /// `<major>.<minor>/database.xml`
    pub data_dir: PathBuf,

    /// Product code the active build row must carry
    pub product: Option<String>,

    /// Locale code used instead of the build's text locale
    pub locale_override: Option<String>,

    /// Load the listfile during initialization
    pub load_listfile: bool,

    /// Tables to load, every described table when unset
    pub tables: Option<Vec<String>>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            game_dir: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            product: None,
            locale_override: None,
            load_listfile: true,
            tables: None,
        }
    }
}

impl EnvironmentConfig {
    /// Configuration for an installation and an application data directory
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(game_dir: P, data_dir: Q) -> Self {
        Self {
            game_dir: game_dir.as_ref().to_path_buf(),
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the installation root
    #[must_use]
    pub fn with_game_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.game_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the application data directory
    #[must_use]
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Only accept build rows of a product
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Use a locale instead of the build's
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale_override = Some(locale.into());
        self
    }

    /// Enable or disable loading the listfile during initialization
    #[must_use]
    pub const fn with_listfile(mut self, load: bool) -> Self {
        self.load_listfile = load;
        self
    }

    /// Restrict the tables loaded by the database
    #[must_use]
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    /// Check that the configured directories exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, path) in [("game", &self.game_dir), ("data", &self.data_dir)] {
            if !path.is_dir() {
                return Err(ConfigError::MissingDirectory {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_and_builders() {
        let config = EnvironmentConfig::default();
        assert!(config.load_listfile);
        assert!(config.tables.is_none());

        let config = EnvironmentConfig::new("/games/wow", "/opt/data")
            .with_product("wow_classic")
            .with_locale("deDE")
            .with_listfile(false)
            .with_tables(["Map", "AreaTable"]);
        assert_eq!(config.game_dir, PathBuf::from("/games/wow"));
        assert_eq!(config.product.as_deref(), Some("wow_classic"));
        assert_eq!(config.locale_override.as_deref(), Some("deDE"));
        assert!(!config.load_listfile);
        assert_eq!(
            config.tables,
            Some(vec!["Map".to_string(), "AreaTable".to_string()])
        );
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wowvfs.json");
        std::fs::write(&path, r#"{"game_dir": "/games/wow", "product": "wow"}"#).expect("write");

        let config = EnvironmentConfig::from_json_file(&path).expect("load");
        assert_eq!(config.game_dir, PathBuf::from("/games/wow"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.product.as_deref(), Some("wow"));
        assert!(config.load_listfile);

        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            EnvironmentConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EnvironmentConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EnvironmentConfig::new(dir.path(), dir.path());
        assert!(config.validate().is_ok());

        let config = config.with_data_dir(dir.path().join("nope"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDirectory { what: "data", .. })
        ));
    }
}
