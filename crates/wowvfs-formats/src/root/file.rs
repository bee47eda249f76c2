use super::error::RootError;
use super::flags::{ContentFlags, LocaleFlags};
use crate::keys::ContentKey;
use std::collections::HashMap;
use tracing::debug;

/// Root magic as it appears on disk
pub const ROOT_MAGIC: [u8; 4] = *b"TSFM";
/// Byte-swapped magic accepted for completeness
pub const ROOT_MAGIC_SWAPPED: [u8; 4] = *b"MFST";

/// Layout of a root manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootFormat {
    /// Headerless manifest with interleaved key/hash records
    Legacy,
    /// `TSFM` magic followed by file counts
    Manifest,
    /// `TSFM` magic followed by header size and version
    Extended {
        /// Header version, 1 or 2
        version: u32,
    },
}

/// One file entry of a root block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    /// FileDataID
    pub file_data_id: u32,
    /// Content key of the file payload
    pub content_key: ContentKey,
    /// Jenkins hash of the normalized path, when the block carries one
    pub name_hash: Option<u64>,
}

/// Group of records sharing locale and content flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootBlock {
    /// Content flags
    pub content_flags: ContentFlags,
    /// Locale flags
    pub locale_flags: LocaleFlags,
    /// Records in file order
    pub records: Vec<RootRecord>,
}

/// Locale-tagged content key for one FileDataID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootEntry {
    /// Content key
    pub content_key: ContentKey,
    /// Locale flags of the owning block
    pub locale_flags: LocaleFlags,
    /// Content flags of the owning block
    pub content_flags: ContentFlags,
}

/// Parsed root manifest with lookup maps
#[derive(Debug, Clone)]
pub struct RootFile {
    /// Detected layout
    pub format: RootFormat,
    /// Total file count from the header, if present
    pub total_files: Option<u32>,
    /// Named file count from the header, if present
    pub named_files: Option<u32>,
    /// Blocks in file order
    pub blocks: Vec<RootBlock>,
    by_id: HashMap<u32, Vec<RootEntry>>,
    by_hash: HashMap<u64, u32>,
}

impl RootFile {
    /// Parse a decoded (non-BLTE) root manifest
    pub fn parse(data: &[u8]) -> Result<Self, RootError> {
        let mut reader = Reader { data, pos: 0 };
        let mut format = RootFormat::Legacy;
        let mut total_files = None;
        let mut named_files = None;

        if data.len() >= 4 && (data[..4] == ROOT_MAGIC || data[..4] == ROOT_MAGIC_SWAPPED) {
            reader.pos = 4;
            let first = reader.u32()?;
            let second = reader.u32()?;
            if (16..=100).contains(&first) && (1..=2).contains(&second) {
                format = RootFormat::Extended { version: second };
                total_files = Some(reader.u32()?);
                named_files = Some(reader.u32()?);
                reader.pos = first as usize;
            } else {
                format = RootFormat::Manifest;
                total_files = Some(first);
                named_files = Some(second);
            }
            if reader.pos > data.len() {
                return Err(RootError::InvalidHeaderSize(first));
            }
        }

        let block_v2 = matches!(format, RootFormat::Extended { version: 2 });
        let mut blocks = Vec::new();
        while reader.remaining() > 0 {
            let block = if block_v2 {
                reader.block_v2()?
            } else {
                reader.block_v1()?
            };
            let (count, content_flags, locale_flags) = block;

            let has_names = match format {
                RootFormat::Legacy => true,
                _ => {
                    !content_flags.has(ContentFlags::NO_NAME_HASH) && named_files != Some(0)
                }
            };

            let deltas = reader.take(count * 4)?;
            let mut records = Vec::with_capacity(count);
            let mut next_id = 0u32;
            for delta in deltas.chunks_exact(4) {
                let delta = u32::from_le_bytes([delta[0], delta[1], delta[2], delta[3]]);
                let file_data_id = next_id.wrapping_add(delta);
                next_id = file_data_id.wrapping_add(1);
                records.push(RootRecord {
                    file_data_id,
                    content_key: ContentKey::from_bytes([0; 16]),
                    name_hash: None,
                });
            }

            if format == RootFormat::Legacy {
                let body = reader.take(count * 24)?;
                for (record, bytes) in records.iter_mut().zip(body.chunks_exact(24)) {
                    record.content_key = ContentKey::from_bytes(key(&bytes[..16]));
                    record.name_hash = Some(u64_le(&bytes[16..]));
                }
            } else {
                let keys = reader.take(count * 16)?;
                for (record, bytes) in records.iter_mut().zip(keys.chunks_exact(16)) {
                    record.content_key = ContentKey::from_bytes(key(bytes));
                }
                if has_names {
                    let hashes = reader.take(count * 8)?;
                    for (record, bytes) in records.iter_mut().zip(hashes.chunks_exact(8)) {
                        record.name_hash = Some(u64_le(bytes));
                    }
                }
            }

            blocks.push(RootBlock {
                content_flags,
                locale_flags,
                records,
            });
        }

        let root = Self::with_blocks(format, total_files, named_files, blocks);
        debug!(
            "Parsed root manifest: {:?}, {} blocks, {} file IDs",
            root.format,
            root.blocks.len(),
            root.by_id.len()
        );
        Ok(root)
    }

    fn with_blocks(
        format: RootFormat,
        total_files: Option<u32>,
        named_files: Option<u32>,
        blocks: Vec<RootBlock>,
    ) -> Self {
        let mut by_id: HashMap<u32, Vec<RootEntry>> = HashMap::new();
        let mut by_hash = HashMap::new();
        for block in &blocks {
            for record in &block.records {
                by_id.entry(record.file_data_id).or_default().push(RootEntry {
                    content_key: record.content_key,
                    locale_flags: block.locale_flags,
                    content_flags: block.content_flags,
                });
                if let Some(hash) = record.name_hash {
                    by_hash.entry(hash).or_insert(record.file_data_id);
                }
            }
        }
        Self {
            format,
            total_files,
            named_files,
            blocks,
            by_id,
            by_hash,
        }
    }

    /// All locale variants of a FileDataID, in file order
    pub fn entries(&self, file_data_id: u32) -> &[RootEntry] {
        self.by_id.get(&file_data_id).map_or(&[], Vec::as_slice)
    }

    /// Pick the content key for a FileDataID under a locale mask.
    ///
    /// The first entry matching the locale wins, preferring entries without
    /// the low-violence flag. With [`LocaleFlags::NONE`], or when no entry
    /// matches, the first entry is returned.
    pub fn resolve(&self, file_data_id: u32, locale: LocaleFlags) -> Option<ContentKey> {
        let entries = self.entries(file_data_id);
        let first = entries.first()?;
        if locale.is_none() {
            return Some(first.content_key);
        }

        let mut matching = entries
            .iter()
            .filter(|entry| entry.locale_flags.intersects(locale));
        let fallback = matching.clone().next();
        let chosen = matching
            .find(|entry| !entry.content_flags.has(ContentFlags::LOW_VIOLENCE))
            .or(fallback)
            .unwrap_or(first);
        Some(chosen.content_key)
    }

    /// FileDataID recorded for a path name hash
    pub fn file_data_id_by_hash(&self, name_hash: u64) -> Option<u32> {
        self.by_hash.get(&name_hash).copied()
    }

    /// Whether the FileDataID appears in any block
    pub fn contains(&self, file_data_id: u32) -> bool {
        self.by_id.contains_key(&file_data_id)
    }

    /// Number of distinct FileDataIDs
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check whether the manifest has no files
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], RootError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(RootError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            })?;
        self.pos += len;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, RootError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn block_v1(&mut self) -> Result<(usize, ContentFlags, LocaleFlags), RootError> {
        let count = self.u32()? as usize;
        let content = ContentFlags(self.u32()?);
        let locale = LocaleFlags(self.u32()?);
        Ok((count, content, locale))
    }

    fn block_v2(&mut self) -> Result<(usize, ContentFlags, LocaleFlags), RootError> {
        let count = self.u32()? as usize;
        let locale = LocaleFlags(self.u32()?);
        let low = self.u32()?;
        let high = self.u32()?;
        let top = self.take(1)?[0];
        let content = ContentFlags(low | high | (u32::from(top) << 17));
        Ok((count, content, locale))
    }
}

fn key(bytes: &[u8]) -> [u8; 16] {
    let mut key = [0u8; 16];
    key.copy_from_slice(bytes);
    key
}

fn u64_le(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::jenkins::hash_path;

    fn ckey(n: u8) -> [u8; 16] {
        [n; 16]
    }

    #[test]
    fn test_legacy_layout() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&LocaleFlags::ENUS.0.to_le_bytes());
        // ids 5 and 9
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        for (n, name) in [(1u8, "a.txt"), (2u8, "b.txt")] {
            data.extend_from_slice(&ckey(n));
            data.extend_from_slice(&hash_path(name).to_le_bytes());
        }

        let root = RootFile::parse(&data).expect("parse");
        assert_eq!(root.format, RootFormat::Legacy);
        assert_eq!(root.len(), 2);
        assert_eq!(
            root.resolve(9, LocaleFlags::ENUS),
            Some(ContentKey::from_bytes(ckey(2)))
        );
        assert_eq!(root.file_data_id_by_hash(hash_path("A.TXT")), Some(5));
    }

    #[test]
    fn test_extended_v2_block() {
        let mut data = Vec::new();
        data.extend_from_slice(&ROOT_MAGIC);
        data.extend_from_slice(&24u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        // v2 block: count, locale, two content words and a high byte
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&LocaleFlags::DEDE.0.to_le_bytes());
        data.extend_from_slice(&0x8u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(0x1);
        data.extend_from_slice(&42u32.to_le_bytes());
        data.extend_from_slice(&ckey(7));

        let root = RootFile::parse(&data).expect("parse");
        assert_eq!(root.format, RootFormat::Extended { version: 2 });
        assert_eq!(root.total_files, Some(1));
        let block = &root.blocks[0];
        assert_eq!(block.content_flags, ContentFlags(0x8 | (1 << 17)));
        assert_eq!(block.records[0].file_data_id, 42);
        assert_eq!(block.records[0].name_hash, None);
    }

    #[test]
    fn test_truncated_block() {
        let mut data = Vec::new();
        data.extend_from_slice(&ROOT_MAGIC);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            RootFile::parse(&data),
            Err(RootError::Truncated { needed: 16, .. })
        ));
    }
}
