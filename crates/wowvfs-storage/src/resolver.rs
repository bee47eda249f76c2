//! Content resolution pipeline
//!
//! Resolves content keys to decoded bytes through the encoding table, the
//! index journals and the archives.

use crate::archive::ArchiveManager;
use crate::index::{IndexEntry, IndexManager};
use crate::{Result, StorageError};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use wowvfs_formats::encoding::EncodingFile;
use wowvfs_formats::{ContentKey, EncodingKey};

/// Decoded size and stored key of one content key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentEntry {
    /// Decoded size in bytes
    pub size: u64,
    /// Encoding key of the stored blob
    pub encoding_key: EncodingKey,
}

/// Resolves content keys to payloads stored in local archives
#[derive(Debug, Default)]
pub struct ContentResolver {
    indices: IndexManager,
    archives: ArchiveManager,
    content: HashMap<ContentKey, ContentEntry>,
}

impl ContentResolver {
    /// Load journals and map archives from `Data/data`
    pub fn open(storage_dir: &Path) -> Result<Self> {
        let mut indices = IndexManager::new();
        indices.load_all(storage_dir)?;
        let mut archives = ArchiveManager::new();
        archives.open_all(storage_dir)?;
        Ok(Self {
            indices,
            archives,
            content: HashMap::new(),
        })
    }

    /// Read the encoding table stored under `key` and index its entries
    pub fn load_encoding(&mut self, key: &EncodingKey) -> Result<()> {
        let data = self.read_encoded(key)?;
        info!("Loading encoding table ({} bytes)", data.len());

        let table = EncodingFile::parse(&data)?;
        self.content.reserve(table.len());
        for entry in table.entries() {
            if let Some(encoding_key) = entry.encoding_key() {
                self.content.insert(
                    entry.content_key,
                    ContentEntry {
                        size: entry.file_size,
                        encoding_key: *encoding_key,
                    },
                );
            }
        }
        debug!("Indexed {} content keys", self.content.len());
        Ok(())
    }

    /// Size and encoding key of a content key
    pub fn content_entry(&self, key: &ContentKey) -> Option<&ContentEntry> {
        self.content.get(key)
    }

    /// Index entry of an encoding key, if stored locally
    pub fn locate(&self, key: &EncodingKey) -> Option<&IndexEntry> {
        self.indices.lookup(key)
    }

    /// Read and decode the blob stored under an encoding key
    pub fn read_encoded(&self, key: &EncodingKey) -> Result<Vec<u8>> {
        let entry = self
            .indices
            .lookup(key)
            .ok_or_else(|| StorageError::NotFound(format!("encoding key {key}")))?;
        self.archives.read_entry(entry, key)
    }

    /// Read and decode the file with a content key
    pub fn read_content(&self, key: &ContentKey) -> Result<Vec<u8>> {
        let entry = self
            .content
            .get(key)
            .ok_or_else(|| StorageError::NotFound(format!("content key {key}")))?;
        self.read_encoded(&entry.encoding_key)
    }

    /// Number of content keys known from the encoding table
    pub fn content_count(&self) -> usize {
        self.content.len()
    }

    /// Number of index entries
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of mapped archives
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }
}
