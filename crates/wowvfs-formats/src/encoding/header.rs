use super::error::EncodingError;
use binrw::{BinRead, BinWrite};

/// Size of the encoded header
pub const ENCODING_HEADER_SIZE: usize = 22;

/// Encoding table header (22 bytes, big-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct EncodingHeader {
    /// Magic bytes: 'EN'
    pub magic: [u8; 2],
    /// Version (1)
    pub version: u8,
    /// Content key size (16 for MD5)
    pub ckey_hash_size: u8,
    /// Encoding key size (16 for MD5)
    pub ekey_hash_size: u8,
    /// Content key page size in KiB
    pub ckey_page_size_kb: u16,
    /// Encoding key page size in KiB
    pub ekey_page_size_kb: u16,
    /// Number of content key pages
    pub ckey_page_count: u32,
    /// Number of encoding key pages
    pub ekey_page_count: u32,
    /// Unused flags byte
    pub flags: u8,
    /// Size of the `ESpec` string block following the header
    pub espec_block_size: u32,
}

impl EncodingHeader {
    /// Header with the sizes every shipped table uses
    pub fn new() -> Self {
        Self {
            magic: *b"EN",
            version: 1,
            ckey_hash_size: 16,
            ekey_hash_size: 16,
            ckey_page_size_kb: 4,
            ekey_page_size_kb: 4,
            ckey_page_count: 0,
            ekey_page_count: 0,
            flags: 0,
            espec_block_size: 0,
        }
    }

    /// Validate the fields this crate depends on
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.magic != *b"EN" {
            return Err(EncodingError::InvalidMagic(self.magic));
        }
        if self.version != 1 {
            return Err(EncodingError::UnsupportedVersion(self.version));
        }
        if self.ckey_hash_size == 0 || self.ckey_hash_size > 16 {
            return Err(EncodingError::InvalidHashSize {
                field: "ckey_hash_size",
                value: self.ckey_hash_size,
            });
        }
        if self.ekey_hash_size == 0 || self.ekey_hash_size > 16 {
            return Err(EncodingError::InvalidHashSize {
                field: "ekey_hash_size",
                value: self.ekey_hash_size,
            });
        }
        if self.ckey_page_size_kb == 0 {
            return Err(EncodingError::InvalidPageSize(0));
        }
        Ok(())
    }

    /// Content key page size in bytes
    pub fn ckey_page_size(&self) -> usize {
        self.ckey_page_size_kb as usize * 1024
    }

    /// Encoding key page size in bytes
    pub fn ekey_page_size(&self) -> usize {
        self.ekey_page_size_kb as usize * 1024
    }
}

impl Default for EncodingHeader {
    fn default() -> Self {
        Self::new()
    }
}
