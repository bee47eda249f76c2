//! 30-byte header preceding each blob in `data.NNN` archives.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 16   | Encoding key (reversed byte order) |
//! | 0x10   | 4    | Size including this header (BE) |
//! | 0x14   | 2    | Flags |
//! | 0x16   | 4    | ChecksumA |
//! | 0x1A   | 4    | ChecksumB |

use wowvfs_formats::EncodingKey;

/// Size of the local header in bytes.
pub const LOCAL_HEADER_SIZE: usize = 0x1E;

/// Local header of an archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeader {
    /// Encoding key as stored (reversed).
    pub reversed_key: [u8; 16],
    /// Total size including this header.
    pub size_with_header: u32,
    /// Flags.
    pub flags: u16,
    /// Checksum A.
    pub checksum_a: u32,
    /// Checksum B.
    pub checksum_b: u32,
}

impl LocalHeader {
    /// Header for a blob of `blte_size` bytes stored under `key`.
    pub fn new(key: &EncodingKey, blte_size: u32) -> Self {
        let mut reversed_key = *key.as_bytes();
        reversed_key.reverse();
        Self {
            reversed_key,
            size_with_header: blte_size + LOCAL_HEADER_SIZE as u32,
            flags: 0,
            checksum_a: 0,
            checksum_b: 0,
        }
    }

    /// Parse the header at the start of `data`, `None` if too short.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = data.get(..LOCAL_HEADER_SIZE)?;
        let mut reversed_key = [0u8; 16];
        reversed_key.copy_from_slice(&header[0x00..0x10]);
        let word = |at: usize| [header[at], header[at + 1], header[at + 2], header[at + 3]];
        Some(Self {
            reversed_key,
            size_with_header: u32::from_be_bytes(word(0x10)),
            flags: u16::from_le_bytes([header[0x14], header[0x15]]),
            checksum_a: u32::from_le_bytes(word(0x16)),
            checksum_b: u32::from_le_bytes(word(0x1A)),
        })
    }

    /// Serialize to 30 bytes.
    pub fn to_bytes(&self) -> [u8; LOCAL_HEADER_SIZE] {
        let mut buf = [0u8; LOCAL_HEADER_SIZE];
        buf[0x00..0x10].copy_from_slice(&self.reversed_key);
        buf[0x10..0x14].copy_from_slice(&self.size_with_header.to_be_bytes());
        buf[0x14..0x16].copy_from_slice(&self.flags.to_le_bytes());
        buf[0x16..0x1A].copy_from_slice(&self.checksum_a.to_le_bytes());
        buf[0x1A..0x1E].copy_from_slice(&self.checksum_b.to_le_bytes());
        buf
    }

    /// Encoding key in normal byte order.
    pub fn encoding_key(&self) -> EncodingKey {
        let mut key = self.reversed_key;
        key.reverse();
        EncodingKey::from_bytes(key)
    }

    /// Size of the BLTE blob following the header.
    pub const fn blte_size(&self) -> u32 {
        self.size_with_header.saturating_sub(LOCAL_HEADER_SIZE as u32)
    }
}
