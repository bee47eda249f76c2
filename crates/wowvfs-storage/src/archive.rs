//! Data archive (`data.NNN`) access
//!
//! Archives are memory-mapped read-only. Each entry is a 30-byte local
//! header followed by a BLTE blob.

use crate::index::IndexEntry;
use crate::local_header::{LOCAL_HEADER_SIZE, LocalHeader};
use crate::{Result, StorageError};
use memmap2::{Mmap, MmapOptions};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};
use wowvfs_formats::EncodingKey;
use wowvfs_formats::blte::BlteFile;

/// Memory-mapped `data.NNN` files by archive number
#[derive(Debug, Default)]
pub struct ArchiveManager {
    archives: BTreeMap<u16, Mmap>,
}

impl ArchiveManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every `data.NNN` file in `dir`
    pub fn open_all(&mut self, dir: &Path) -> Result<()> {
        info!("Opening archive files from {}", dir.display());

        let entries = std::fs::read_dir(dir)
            .map_err(|e| StorageError::Archive(format!("failed to read {}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && let Some(id) = parse_archive_filename(name)
            {
                debug!("Opening archive {} from {}", id, path.display());
                self.open_archive(id, &path)?;
            }
        }

        info!("Opened {} archive files", self.archives.len());
        Ok(())
    }

    /// Map one archive file
    pub fn open_archive(&mut self, id: u16, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| StorageError::Archive(format!("failed to open archive: {e}")))?;

        // The client never truncates archives while they are mapped
        #[allow(unsafe_code)]
        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| StorageError::Archive(format!("failed to mmap archive: {e}")))?
        };

        self.archives.insert(id, mmap);
        Ok(())
    }

    /// Raw bytes at a location, local header included
    pub fn read_raw(&self, archive_id: u16, offset: u32, size: u32) -> Result<&[u8]> {
        let archive = self
            .archives
            .get(&archive_id)
            .ok_or_else(|| StorageError::Archive(format!("archive {archive_id} not found")))?;

        let start = offset as usize;
        let end = start + size as usize;
        archive.get(start..end).ok_or_else(|| {
            StorageError::Archive(format!(
                "read beyond archive {archive_id} bounds: {start}..{end} > {}",
                archive.len()
            ))
        })
    }

    /// Read and decode the blob an index entry points at.
    ///
    /// The local header must name `key`; a mismatch means the index is
    /// stale and is reported as an archive error.
    pub fn read_entry(&self, entry: &IndexEntry, key: &EncodingKey) -> Result<Vec<u8>> {
        let raw = self.read_raw(
            entry.location.archive_id,
            entry.location.archive_offset,
            entry.size,
        )?;
        let header = LocalHeader::parse(raw).ok_or_else(|| {
            StorageError::Archive(format!("entry for {key} is shorter than its header"))
        })?;
        if header.encoding_key() != *key {
            warn!(
                "Local header key {} does not match {}",
                header.encoding_key(),
                key
            );
            return Err(StorageError::Archive(format!(
                "archive {} offset {} holds {}, expected {}",
                entry.location.archive_id,
                entry.location.archive_offset,
                header.encoding_key(),
                key
            )));
        }

        let blte_end = (LOCAL_HEADER_SIZE + header.blte_size() as usize).min(raw.len());
        Ok(BlteFile::decode(&raw[LOCAL_HEADER_SIZE..blte_end])?)
    }

    /// Number of mapped archives
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Check whether no archive is mapped
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

/// Archive number of a `data.NNN` file name
pub fn parse_archive_filename(name: &str) -> Option<u16> {
    let digits = name.strip_prefix("data.")?;
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use wowvfs_formats::blte::CompressionMode;

    fn archive_with(payload: &[u8]) -> (tempfile::TempDir, IndexEntry, EncodingKey) {
        let dir = tempfile::tempdir().expect("tempdir");
        let blte = BlteFile::encode(payload, CompressionMode::ZLib).expect("encode");
        let key = EncodingKey::from_data(&blte);

        let mut data = vec![0xAA; 16];
        data.extend_from_slice(&LocalHeader::new(&key, blte.len() as u32).to_bytes());
        data.extend_from_slice(&blte);
        std::fs::write(dir.path().join("data.000"), &data).expect("write");

        let entry = IndexEntry::new(
            key.truncated(),
            0,
            16,
            (LOCAL_HEADER_SIZE + blte.len()) as u32,
        );
        (dir, entry, key)
    }

    #[test]
    fn test_read_entry() {
        let (dir, entry, key) = archive_with(b"archive payload");
        let mut archives = ArchiveManager::new();
        archives.open_all(dir.path()).expect("open");
        assert_eq!(archives.len(), 1);
        assert_eq!(archives.read_entry(&entry, &key).expect("read"), b"archive payload");
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let (dir, entry, _) = archive_with(b"payload");
        let mut archives = ArchiveManager::new();
        archives.open_all(dir.path()).expect("open");
        let other = EncodingKey::from_data(b"other");
        assert!(matches!(
            archives.read_entry(&entry, &other),
            Err(StorageError::Archive(_))
        ));
    }

    #[test]
    fn test_out_of_bounds() {
        let (dir, _, _) = archive_with(b"payload");
        let mut archives = ArchiveManager::new();
        archives.open_all(dir.path()).expect("open");
        assert!(archives.read_raw(0, 0, 1 << 20).is_err());
        assert!(archives.read_raw(7, 0, 1).is_err());
    }

    #[test]
    fn test_archive_filenames() {
        assert_eq!(parse_archive_filename("data.000"), Some(0));
        assert_eq!(parse_archive_filename("data.042"), Some(42));
        assert_eq!(parse_archive_filename("data.0000"), None);
        assert_eq!(parse_archive_filename("data.abc"), None);
        assert_eq!(parse_archive_filename("0000000001.idx"), None);
    }
}
