//! Index journal (`.idx`) loading
//!
//! Index files map truncated encoding keys to locations within the
//! `data.NNN` archives. The installation keeps sixteen buckets; each bucket
//! may have several journal versions on disk, of which only the newest is
//! current.
//!
//! File layout (version 7):
//! ```text
//! [0x00] GuardedBlockHeader (8 bytes): header size + Jenkins hash
//! [0x08] IndexHeader (16 bytes)
//! [0x18] Padding (8 bytes)
//! [0x20] GuardedBlockHeader (8 bytes): entry data size + Jenkins hash
//! [0x28] Entries, 18 bytes each
//! ```

use crate::{Result, StorageError};
use binrw::io::{Cursor, Write};
use binrw::{BinRead, BinReaderExt, BinResult, BinWrite, BinWriterExt, Endian};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use wowvfs_formats::EncodingKey;
use wowvfs_formats::jenkins::hashlittle;

/// Journal version understood by this reader
pub const INDEX_VERSION: u16 = 7;
/// Size of one packed entry
pub const INDEX_ENTRY_SIZE: usize = 18;
/// Offset of the entry data
const ENTRIES_OFFSET: usize = 0x28;

fn parse_archive_location<R: std::io::Read + std::io::Seek>(
    reader: &mut R,
    _endian: Endian,
    _args: (),
) -> BinResult<ArchiveLocation> {
    let index_high = u16::from(reader.read_be::<u8>()?);
    let index_low = reader.read_be::<u32>()?;

    // High byte shifted left by 2, plus top 2 bits of the packed word
    Ok(ArchiveLocation {
        archive_id: (index_high << 2) | (index_low >> 30) as u16,
        archive_offset: index_low & 0x3FFF_FFFF,
    })
}

fn write_archive_location<W: std::io::Write + std::io::Seek>(
    location: &ArchiveLocation,
    writer: &mut W,
    _endian: Endian,
    _args: (),
) -> BinResult<()> {
    let index_high =
        u8::try_from(location.archive_id >> 2).map_err(|e| binrw::Error::AssertFail {
            pos: 0,
            message: format!("archive ID too large: {e}"),
        })?;
    writer.write_be(&index_high)?;

    let index_low =
        (u32::from(location.archive_id & 0x03) << 30) | (location.archive_offset & 0x3FFF_FFFF);
    writer.write_be(&index_low)?;
    Ok(())
}

/// Guarded block header (size + hash)
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
pub struct GuardedBlockHeader {
    /// Size of the block data
    pub block_size: u32,
    /// Jenkins `hashlittle` of the block data
    pub block_hash: u32,
}

/// Index journal header.
///
/// Unlike most CASC structures the journal header is little-endian.
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
pub struct IndexHeader {
    /// Journal version (7)
    pub version: u16,
    /// Bucket ID (0x00-0x0F)
    pub bucket: u8,
    /// Extra bytes (0)
    pub extra_bytes: u8,
    /// Size field bytes (4)
    pub encoded_size_length: u8,
    /// Location field bytes (5)
    pub storage_offset_length: u8,
    /// Key field bytes (9)
    pub ekey_length: u8,
    /// File offset bits (30)
    pub file_offset_bits: u8,
    /// Size of one data segment
    pub segment_size: u64,
}

impl IndexHeader {
    /// Standard version 7 header for a bucket
    pub const fn new(bucket: u8) -> Self {
        Self {
            version: INDEX_VERSION,
            bucket,
            extra_bytes: 0,
            encoded_size_length: 4,
            storage_offset_length: 5,
            ekey_length: 9,
            file_offset_bits: 30,
            segment_size: 0x4000_0000,
        }
    }
}

/// Archive location: `data.NNN` number and byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    /// Archive file number
    pub archive_id: u16,
    /// Offset within the archive
    pub archive_offset: u32,
}

/// Entry in an index file (18 bytes).
///
/// Key and location are big-endian; the encoded size is little-endian.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct IndexEntry {
    /// Truncated encoding key (first 9 bytes)
    pub key: [u8; 9],

    /// Archive ID and offset packed into 5 bytes
    #[br(parse_with = parse_archive_location)]
    #[bw(write_with = write_archive_location)]
    pub location: ArchiveLocation,

    /// Encoded size including the 30-byte local header
    #[brw(little)]
    pub size: u32,
}

impl IndexEntry {
    /// Create an entry
    pub const fn new(key: [u8; 9], archive_id: u16, archive_offset: u32, size: u32) -> Self {
        Self {
            key,
            location: ArchiveLocation {
                archive_id,
                archive_offset,
            },
            size,
        }
    }
}

/// Loaded index journals, one per bucket
#[derive(Debug, Default)]
pub struct IndexManager {
    buckets: BTreeMap<u8, Vec<IndexEntry>>,
}

impl IndexManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the newest journal of every bucket found in `dir`
    pub fn load_all(&mut self, dir: &Path) -> Result<()> {
        info!("Loading index files from {}", dir.display());

        let mut newest: BTreeMap<u8, (u32, std::path::PathBuf)> = BTreeMap::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| StorageError::Index(format!("failed to read {}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry?.path();
            let Some((bucket, version)) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_index_filename)
            else {
                continue;
            };
            match newest.get(&bucket) {
                Some((current, _)) if *current >= version => {}
                _ => {
                    newest.insert(bucket, (version, path));
                }
            }
        }

        for (bucket, (version, path)) in newest {
            debug!(
                "Loading index bucket {:02x} version {:08x} from {}",
                bucket,
                version,
                path.display()
            );
            let data = std::fs::read(&path)?;
            let entries = parse_index(&data)
                .map_err(|e| StorageError::Index(format!("{}: {e}", path.display())))?;
            self.buckets.insert(bucket, entries);
        }

        info!(
            "Loaded {} index buckets with {} entries",
            self.buckets.len(),
            self.len()
        );
        Ok(())
    }

    /// Look up the archive location of an encoding key
    pub fn lookup(&self, key: &EncodingKey) -> Option<&IndexEntry> {
        let truncated = key.truncated();
        let entries = self.buckets.get(&bucket_for_key(&truncated))?;
        entries
            .binary_search_by(|entry| entry.key.cmp(&truncated))
            .ok()
            .map(|position| &entries[position])
    }

    /// Total number of entries across buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Check whether no entries are loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buckets with a loaded journal
    pub fn loaded_buckets(&self) -> Vec<u8> {
        self.buckets.keys().copied().collect()
    }
}

/// Parse a journal, returning its entries sorted by key
pub fn parse_index(data: &[u8]) -> std::result::Result<Vec<IndexEntry>, String> {
    let mut cursor = Cursor::new(data);
    let header_block: GuardedBlockHeader = cursor
        .read_le()
        .map_err(|e| format!("failed to read header block: {e}"))?;
    let header: IndexHeader = cursor
        .read_le()
        .map_err(|e| format!("failed to read header: {e}"))?;

    if header.version != INDEX_VERSION {
        warn!("Unexpected index version: {}", header.version);
    }
    if header.ekey_length != 9 || header.storage_offset_length != 5 || header.encoded_size_length != 4
    {
        return Err(format!(
            "unsupported field sizes: key {} location {} size {}",
            header.ekey_length, header.storage_offset_length, header.encoded_size_length
        ));
    }
    if let Some(header_bytes) = data.get(8..8 + header_block.block_size as usize)
        && hashlittle(header_bytes, 0) != header_block.block_hash
    {
        warn!("Index header hash mismatch for bucket {:02x}", header.bucket);
    }

    cursor.set_position(0x20);
    let entry_block: GuardedBlockHeader = cursor
        .read_le()
        .map_err(|e| format!("failed to read entry block header: {e}"))?;
    let entry_data = data
        .get(ENTRIES_OFFSET..ENTRIES_OFFSET + entry_block.block_size as usize)
        .ok_or_else(|| format!("entry block of {} bytes is truncated", entry_block.block_size))?;

    let mut entries = Vec::with_capacity(entry_data.len() / INDEX_ENTRY_SIZE);
    let mut cursor = Cursor::new(entry_data);
    for _ in 0..entry_data.len() / INDEX_ENTRY_SIZE {
        let entry: IndexEntry = cursor
            .read_be()
            .map_err(|e| format!("failed to read entry: {e}"))?;
        // All-zero keys are unused slots
        if entry.key.iter().any(|&b| b != 0) {
            entries.push(entry);
        }
    }
    entries.sort_by_key(|entry| entry.key);
    Ok(entries)
}

/// Serialize a version 7 journal for `bucket`
pub fn write_index(bucket: u8, entries: &[IndexEntry]) -> Result<Vec<u8>> {
    let mut header = Cursor::new(Vec::new());
    header
        .write_le(&IndexHeader::new(bucket))
        .map_err(|e| StorageError::Index(format!("failed to write header: {e}")))?;
    let header = header.into_inner();

    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|entry| entry.key);
    let mut body = Cursor::new(Vec::new());
    for entry in &sorted {
        body.write_be(entry)
            .map_err(|e| StorageError::Index(format!("failed to write entry: {e}")))?;
    }
    let body = body.into_inner();

    let mut file = Cursor::new(Vec::with_capacity(ENTRIES_OFFSET + body.len()));
    let guard = |data: &[u8]| GuardedBlockHeader {
        block_size: data.len() as u32,
        block_hash: hashlittle(data, 0),
    };
    file.write_le(&guard(&header))
        .map_err(|e| StorageError::Index(format!("failed to write block header: {e}")))?;
    file.write_all(&header)?;
    file.write_all(&[0u8; 8])?;
    file.write_le(&guard(&body))
        .map_err(|e| StorageError::Index(format!("failed to write block header: {e}")))?;
    file.write_all(&body)?;
    Ok(file.into_inner())
}

/// Bucket of a key: XOR of the first 9 bytes, nibbles folded
pub fn bucket_for_key(key: &[u8]) -> u8 {
    if key.len() < 9 {
        return 0;
    }
    let hash = key[..9].iter().fold(0u8, |acc, &b| acc ^ b);
    (hash & 0x0F) ^ (hash >> 4)
}

/// Journal file name, `{bucket:02x}{version:08x}.idx`
pub fn index_filename(bucket: u8, version: u32) -> String {
    format!("{bucket:02x}{version:08x}.idx")
}

/// Parse bucket and version from a journal file name
pub fn parse_index_filename(filename: &str) -> Option<(u8, u32)> {
    if filename.len() != 14
        || !Path::new(filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("idx"))
    {
        return None;
    }
    let bucket = u8::from_str_radix(filename.get(0..2)?, 16).ok()?;
    let version = u32::from_str_radix(filename.get(2..10)?, 16).ok()?;
    Some((bucket, version))
}
