//! Synthetic local installations for tests
//!
//! [`InstallationBuilder`] writes everything [`CascStorage`] reads: a
//! `.build.info`, a build config, an encoding table, a root manifest,
//! `.idx` journals and a single `data.000` archive.
//!
//! [`CascStorage`]: crate::CascStorage

use crate::casc::config_path;
use crate::index::{IndexEntry, bucket_for_key, index_filename, write_index};
use crate::local_header::{LOCAL_HEADER_SIZE, LocalHeader};
use crate::{BUILD_INFO_FILE, DATA_DIR, DEFAULT_DATA_DIR, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wowvfs_formats::blte::{BlteFile, CompressionMode};
use wowvfs_formats::config::BuildConfig;
use wowvfs_formats::encoding::EncodingBuilder;
use wowvfs_formats::root::{ContentFlags, LocaleFlags, RootBuilder};
use wowvfs_formats::{ContentKey, EncodingKey};

struct FixtureFile {
    path: Option<String>,
    file_data_id: u32,
    locale: LocaleFlags,
    content: ContentFlags,
    data: Vec<u8>,
}

/// Builder for a synthetic installation
pub struct InstallationBuilder {
    version: String,
    tags: String,
    product: String,
    files: Vec<FixtureFile>,
    unindexed: Vec<u32>,
}

impl Default for InstallationBuilder {
    fn default() -> Self {
        Self {
            version: "1.13.5.40888".to_string(),
            tags: "Windows code US? acct-USA? geoip-US? enUS speech?:Windows code US? acct-USA? geoip-US? enUS text?".to_string(),
            product: "wow_classic".to_string(),
            files: Vec::new(),
            unindexed: Vec::new(),
        }
    }
}

/// A written installation, removed when dropped
pub struct Installation {
    dir: TempDir,
    /// Hash of the build config
    pub build_key: String,
}

impl Installation {
    /// Installation root, holding `.build.info`
    pub fn game_dir(&self) -> &Path {
        self.dir.path()
    }

    /// The `Data` directory
    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_DATA_DIR)
    }
}

impl InstallationBuilder {
    /// Builder for an enUS `wow_classic` 1.13.5.40888 installation
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version cell
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Set the text locale tag
    pub fn locale(mut self, code: &str) -> Self {
        self.tags = format!("Windows {code} speech?:Windows {code} text?");
        self
    }

    /// Set the product cell
    pub fn product(mut self, product: &str) -> Self {
        self.product = product.to_string();
        self
    }

    /// Add a named file visible in every locale
    pub fn file(self, path: &str, file_data_id: u32, data: &[u8]) -> Self {
        self.localized_file(Some(path), file_data_id, LocaleFlags::ALL, data)
    }

    /// Add a file, optionally named, for specific locales
    pub fn localized_file(
        mut self,
        path: Option<&str>,
        file_data_id: u32,
        locale: LocaleFlags,
        data: &[u8],
    ) -> Self {
        self.files.push(FixtureFile {
            path: path.map(String::from),
            file_data_id,
            locale,
            content: ContentFlags::NONE,
            data: data.to_vec(),
        });
        self
    }

    /// Add a low-violence variant of a file
    pub fn low_violence_file(mut self, file_data_id: u32, locale: LocaleFlags, data: &[u8]) -> Self {
        self.files.push(FixtureFile {
            path: None,
            file_data_id,
            locale,
            content: ContentFlags::LOW_VIOLENCE,
            data: data.to_vec(),
        });
        self
    }

    /// Keep a file in the root and encoding table but out of the archives
    pub fn not_stored_locally(mut self, file_data_id: u32) -> Self {
        self.unindexed.push(file_data_id);
        self
    }

    /// Write the installation into a fresh temporary directory
    pub fn build(self) -> Result<Installation> {
        let dir = tempfile::tempdir()?;
        let build_key = self.write_to(dir.path())?;
        Ok(Installation { dir, build_key })
    }

    /// Write the installation under `game_dir`, returning the build key
    pub fn write_to(&self, game_dir: &Path) -> Result<String> {
        let data_dir = game_dir.join(DEFAULT_DATA_DIR);
        let storage_dir = data_dir.join(DATA_DIR);
        std::fs::create_dir_all(&storage_dir)?;

        let mut archive = ArchiveWriter::default();
        let mut encoding = EncodingBuilder::new();
        let mut root = RootBuilder::new();

        for file in &self.files {
            let content_key = ContentKey::from_data(&file.data);
            let stored = !self.unindexed.contains(&file.file_data_id);
            let encoding_key = archive.add(&file.data, stored)?;
            encoding.add(content_key, encoding_key, file.data.len() as u64);
            root.add(
                file.file_data_id,
                content_key,
                file.path.as_deref(),
                file.locale,
                file.content,
            );
        }

        let root_data = root.build();
        let root_key = ContentKey::from_data(&root_data);
        let root_ekey = archive.add(&root_data, true)?;
        encoding.add(root_key, root_ekey, root_data.len() as u64);

        let encoding_data = encoding.build()?;
        let encoding_ckey = ContentKey::from_data(&encoding_data);
        let encoding_ekey = archive.add(&encoding_data, true)?;

        std::fs::write(storage_dir.join("data.000"), &archive.data)?;
        for (bucket, entries) in &archive.buckets {
            std::fs::write(
                storage_dir.join(index_filename(*bucket, 1)),
                write_index(*bucket, entries)?,
            )?;
        }

        let mut config = BuildConfig::new();
        config
            .set("root", &[&root_key.to_hex()])
            .set("encoding", &[&encoding_ckey.to_hex(), &encoding_ekey.to_hex()])
            .set("build-name", &[&format!("WOW-fixture-{}", self.version)]);
        let config_text = config.build();
        let build_key = ContentKey::from_data(config_text.as_bytes()).to_hex();
        if let Some(path) = config_path(&data_dir, &build_key) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, config_text)?;
        }

        let build_info = format!(
            "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16|Tags!STRING:0|Version!STRING:0|Product!STRING:0\n\
             us|1|{build_key}|{cdn_key}|{tags}|{version}|{product}\n",
            cdn_key = "0".repeat(32),
            tags = self.tags,
            version = self.version,
            product = self.product,
        );
        std::fs::write(game_dir.join(BUILD_INFO_FILE), build_info)?;

        Ok(build_key)
    }
}

#[derive(Default)]
struct ArchiveWriter {
    data: Vec<u8>,
    written: HashSet<EncodingKey>,
    buckets: BTreeMap<u8, Vec<IndexEntry>>,
}

impl ArchiveWriter {
    /// BLTE-encode a payload and append it unless already present
    fn add(&mut self, payload: &[u8], indexed: bool) -> Result<EncodingKey> {
        let mode = if payload.len() < 64 {
            CompressionMode::None
        } else {
            CompressionMode::ZLib
        };
        let blte = BlteFile::encode(payload, mode)?;
        let key = EncodingKey::from_data(&blte);
        if !indexed || !self.written.insert(key) {
            return Ok(key);
        }

        let offset = self.data.len() as u32;
        self.data
            .extend_from_slice(&LocalHeader::new(&key, blte.len() as u32).to_bytes());
        self.data.extend_from_slice(&blte);

        let truncated = key.truncated();
        self.buckets
            .entry(bucket_for_key(&truncated))
            .or_default()
            .push(IndexEntry::new(
                truncated,
                0,
                offset,
                (LOCAL_HEADER_SIZE + blte.len()) as u32,
            ));
        Ok(key)
    }
}
