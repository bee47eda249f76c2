//! Build config file format
//!
//! Build configs are `key = value [value ...]` text files stored under
//! `Data/config/xx/yy/<hash>`. Only the system file references needed for
//! local reads are exposed as typed accessors; every other key is kept as
//! raw strings.

use crate::keys::{ContentKey, EncodingKey};
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Build config errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required key is absent
    #[error("missing build config key: {0}")]
    MissingKey(&'static str),

    /// Key holds an invalid hash
    #[error("invalid hash for {key}: {value}")]
    InvalidHash {
        /// Config key
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// File is not UTF-8 text
    #[error("build config is not valid UTF-8")]
    NotText,
}

/// Parsed build config
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    entries: HashMap<String, Vec<String>>,
}

impl BuildConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self, ConfigError> {
        let text = std::str::from_utf8(data).map_err(|_| ConfigError::NotText)?;
        let mut entries = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let values = value.split_whitespace().map(String::from).collect();
                entries.insert(key.trim().to_string(), values);
            }
        }

        Ok(Self { entries })
    }

    /// Set a key, replacing earlier values
    pub fn set(&mut self, key: &str, values: &[&str]) -> &mut Self {
        self.entries.insert(
            key.to_string(),
            values.iter().map(|value| (*value).to_string()).collect(),
        );
        self
    }

    /// Raw values of a key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Content key of the root manifest
    pub fn root(&self) -> Result<ContentKey, ConfigError> {
        let value = self.first("root")?;
        ContentKey::from_hex(value).map_err(|_| ConfigError::InvalidHash {
            key: "root",
            value: value.to_string(),
        })
    }

    /// Content and encoding key of the encoding table
    pub fn encoding(&self) -> Result<(ContentKey, EncodingKey), ConfigError> {
        let values = self.get("encoding").ok_or(ConfigError::MissingKey("encoding"))?;
        let invalid = || ConfigError::InvalidHash {
            key: "encoding",
            value: values.join(" "),
        };
        let [ckey, ekey, ..] = values else {
            return Err(invalid());
        };
        let ckey = ContentKey::from_hex(ckey).map_err(|_| invalid())?;
        let ekey = EncodingKey::from_hex(ekey).map_err(|_| invalid())?;
        Ok((ckey, ekey))
    }

    /// Human readable build name, such as `WOW-40888patch1.13.5_Retail`
    pub fn build_name(&self) -> Option<&str> {
        self.get("build-name")
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Serialize as config text with keys in sorted order
    pub fn build(&self) -> String {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();

        let mut output = String::from("# Build Configuration\n\n");
        for key in keys {
            let _ = writeln!(output, "{} = {}", key, self.entries[key].join(" "));
        }
        output
    }

    fn first(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .ok_or(ConfigError::MissingKey(key))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Build Configuration

root = 0123456789abcdef0123456789abcdef
install = 11111111111111111111111111111111 22222222222222222222222222222222
encoding = aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb
encoding-size = 1000 900
build-name = WOW-40888patch1.13.5_Retail
";

    #[test]
    fn test_parse_sample() {
        let config = BuildConfig::parse(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(
            config.root().expect("root").to_hex(),
            "0123456789abcdef0123456789abcdef"
        );
        let (ckey, ekey) = config.encoding().expect("encoding");
        assert_eq!(ckey.to_hex(), "a".repeat(32));
        assert_eq!(ekey.to_hex(), "b".repeat(32));
        assert_eq!(config.build_name(), Some("WOW-40888patch1.13.5_Retail"));
        assert_eq!(config.get("encoding-size").map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_missing_and_invalid_keys() {
        let config = BuildConfig::parse(b"root = nothex\nencoding = aaaa\n").expect("parse");
        assert!(matches!(
            config.root(),
            Err(ConfigError::InvalidHash { key: "root", .. })
        ));
        assert!(matches!(
            config.encoding(),
            Err(ConfigError::InvalidHash { key: "encoding", .. })
        ));
        assert!(matches!(
            BuildConfig::new().root(),
            Err(ConfigError::MissingKey("root"))
        ));
    }

    #[test]
    fn test_build_then_parse() {
        let mut config = BuildConfig::new();
        config
            .set("root", &["0123456789abcdef0123456789abcdef"])
            .set("build-name", &["test"]);
        let reparsed = BuildConfig::parse(config.build().as_bytes()).expect("parse");
        assert_eq!(reparsed.root().expect("root"), config.root().expect("root"));
        assert_eq!(reparsed.build_name(), Some("test"));
    }

    #[test]
    fn test_binary_input_rejected() {
        assert!(matches!(
            BuildConfig::parse(&[0xff, 0xfe]),
            Err(ConfigError::NotText)
        ));
    }
}
