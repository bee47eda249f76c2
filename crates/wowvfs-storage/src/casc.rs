//! Local CASC backend
//!
//! Opening reads the active build's config from `Data/config`, loads the
//! journals and archives from `Data/data`, then fetches the encoding table
//! and the root manifest through the same lookup chain regular files use.

use crate::build_info::BuildDescriptor;
use crate::resolver::ContentResolver;
use crate::session::{FileTarget, StorageBackend, StorageFile, UNKNOWN_SIZE};
use crate::{BUILD_INFO_FILE, DATA_DIR, Result, StorageError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use wowvfs_formats::config::BuildConfig;
use wowvfs_formats::jenkins::hash_path;
use wowvfs_formats::root::{LocaleFlags, RootFile};
use wowvfs_formats::ContentKey;

/// Path of a config file named by its hash: `config/xx/yy/<hash>`
pub fn config_path(data_dir: &Path, hash: &str) -> Option<PathBuf> {
    let (first, second) = (hash.get(0..2)?, hash.get(2..4)?);
    Some(data_dir.join("config").join(first).join(second).join(hash))
}

/// Open local CASC storage
#[derive(Debug)]
pub struct CascStorage {
    resolver: ContentResolver,
    root: RootFile,
    build_name: Option<String>,
}

impl CascStorage {
    /// Open the storage for a resolved build.
    ///
    /// `data_dir` is the installation's `Data` directory.
    pub fn open_build(data_dir: &Path, build: &BuildDescriptor) -> Result<Self> {
        Self::load(data_dir, build).map_err(|e| StorageError::unavailable(data_dir, e))
    }

    fn load(data_dir: &Path, build: &BuildDescriptor) -> Result<Self> {
        let build_key = build
            .build_key
            .as_deref()
            .ok_or_else(|| StorageError::InvalidFormat("active build has no Build Key".into()))?;
        let config_file = config_path(data_dir, build_key)
            .ok_or_else(|| StorageError::InvalidFormat(format!("invalid build key {build_key}")))?;
        let config = match std::fs::read(&config_file) {
            Ok(data) => BuildConfig::parse(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(config_file.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Read build config {}", config_file.display());

        let mut resolver = ContentResolver::open(&data_dir.join(DATA_DIR))?;
        let (_, encoding_key) = config.encoding()?;
        resolver.load_encoding(&encoding_key)?;

        let root_key = config.root()?;
        let root = RootFile::parse(&resolver.read_content(&root_key)?)?;

        info!(
            "Opened CASC storage {}: {} archives, {} index entries, {} files",
            config.build_name().unwrap_or("(unnamed build)"),
            resolver.archive_count(),
            resolver.index_count(),
            root.len()
        );

        Ok(Self {
            resolver,
            root,
            build_name: config.build_name().map(String::from),
        })
    }

    /// Parsed root manifest
    pub const fn root(&self) -> &RootFile {
        &self.root
    }

    /// `build-name` of the build config
    pub fn build_name(&self) -> Option<&str> {
        self.build_name.as_deref()
    }

    fn file_data_id(&self, target: FileTarget<'_>) -> Option<u32> {
        match target {
            FileTarget::Name(name) => self.root.file_data_id_by_hash(hash_path(name)),
            FileTarget::Id(id) => Some(id),
        }
    }

    fn content_key(&self, target: FileTarget<'_>, locale: LocaleFlags) -> Option<ContentKey> {
        self.root.resolve(self.file_data_id(target)?, locale)
    }
}

impl StorageBackend for CascStorage {
    type File = CascFile;

    /// Open the storage of the first active build in the `.build.info`
    /// next to `data_dir`.
    fn open(data_dir: &Path, _locale: LocaleFlags) -> Result<Self> {
        let game_dir = data_dir.parent().unwrap_or(data_dir);
        let build = BuildDescriptor::resolve(&game_dir.join(BUILD_INFO_FILE), None)
            .map_err(|e| StorageError::unavailable(data_dir, e))?;
        Self::open_build(data_dir, &build)
    }

    fn open_file(&self, target: FileTarget<'_>, locale: LocaleFlags) -> Result<Option<CascFile>> {
        let Some(content_key) = self.content_key(target, locale) else {
            return Ok(None);
        };
        let Some(entry) = self.resolver.content_entry(&content_key) else {
            debug!("{} has no encoding entry", target);
            return Ok(None);
        };
        if self.resolver.locate(&entry.encoding_key).is_none() {
            debug!("{} is not stored locally", target);
            return Ok(None);
        }

        let data = self.resolver.read_encoded(&entry.encoding_key)?;
        if data.len() as u64 != entry.size {
            return Err(StorageError::Read {
                target: target.to_string(),
                reason: format!(
                    "decoded {} bytes, encoding table declares {}",
                    data.len(),
                    entry.size
                ),
            });
        }

        Ok(Some(CascFile {
            size: u32::try_from(entry.size).unwrap_or(UNKNOWN_SIZE),
            data,
            position: 0,
        }))
    }

    fn contains(&self, target: FileTarget<'_>, locale: LocaleFlags) -> bool {
        self.content_key(target, locale)
            .and_then(|key| self.resolver.content_entry(&key))
            .is_some_and(|entry| {
                entry.size != 0 && self.resolver.locate(&entry.encoding_key).is_some()
            })
    }
}

/// Decoded file read from local storage
#[derive(Debug)]
pub struct CascFile {
    size: u32,
    data: Vec<u8>,
    position: usize,
}

impl StorageFile for CascFile {
    fn size(&self) -> u32 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = &self.data[self.position..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }
}
