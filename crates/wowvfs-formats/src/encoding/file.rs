use super::error::EncodingError;
use super::header::{ENCODING_HEADER_SIZE, EncodingHeader};
use crate::keys::{ContentKey, EncodingKey};
use binrw::BinReaderExt;
use binrw::io::Cursor;

/// Content key page entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CKeyEntry {
    /// Content key
    pub content_key: ContentKey,
    /// Decoded file size (40-bit on disk)
    pub file_size: u64,
    /// Encoding keys, usually exactly one
    pub encoding_keys: Vec<EncodingKey>,
}

impl CKeyEntry {
    /// First encoding key, the one local storage indexes
    pub fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding_keys.first()
    }
}

/// Page index entry: first key of the page plus the page MD5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndex {
    /// First key stored in the page
    pub first_key: [u8; 16],
    /// MD5 of the full page bytes
    pub checksum: [u8; 16],
}

/// Parsed content key half of an encoding table
#[derive(Debug, Clone)]
pub struct EncodingFile {
    /// File header
    pub header: EncodingHeader,
    /// Page index for binary search
    pub ckey_index: Vec<PageIndex>,
    /// Entries per page, sorted by content key
    pub ckey_pages: Vec<Vec<CKeyEntry>>,
}

impl EncodingFile {
    /// Parse a decoded (non-BLTE) encoding table
    pub fn parse(data: &[u8]) -> Result<Self, EncodingError> {
        if data.len() < ENCODING_HEADER_SIZE {
            return Err(EncodingError::Truncated(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let header: EncodingHeader = cursor.read_be()?;
        header.validate()?;

        // ESpec strings are not needed to resolve content keys
        let mut offset = ENCODING_HEADER_SIZE + header.espec_block_size as usize;

        let page_count = header.ckey_page_count as usize;
        let index_bytes = slice(data, offset, page_count * 32, "content key page index")?;
        let ckey_index: Vec<PageIndex> = index_bytes
            .chunks_exact(32)
            .map(|entry| {
                let mut first_key = [0u8; 16];
                let mut checksum = [0u8; 16];
                first_key.copy_from_slice(&entry[..16]);
                checksum.copy_from_slice(&entry[16..]);
                PageIndex {
                    first_key,
                    checksum,
                }
            })
            .collect();
        offset += index_bytes.len();

        let page_size = header.ckey_page_size();
        let mut ckey_pages = Vec::with_capacity(page_count);
        for (page_number, index) in ckey_index.iter().enumerate() {
            let page = slice(data, offset, page_size, "content key page")?;
            if md5::compute(page).0 != index.checksum {
                return Err(EncodingError::ChecksumMismatch(page_number));
            }
            ckey_pages.push(parse_ckey_page(page, &header)?);
            offset += page_size;
        }

        Ok(Self {
            header,
            ckey_index,
            ckey_pages,
        })
    }

    /// Look up the entry for a content key
    pub fn find(&self, key: &ContentKey) -> Option<&CKeyEntry> {
        let target = key.as_bytes();
        // Last page whose first key is <= target
        let page = self
            .ckey_index
            .partition_point(|index| &index.first_key <= target)
            .checked_sub(1)?;
        let entries = self.ckey_pages.get(page)?;
        entries
            .binary_search_by(|entry| entry.content_key.as_bytes().cmp(target))
            .ok()
            .map(|position| &entries[position])
    }

    /// Iterate every content key entry
    pub fn entries(&self) -> impl Iterator<Item = &CKeyEntry> {
        self.ckey_pages.iter().flatten()
    }

    /// Number of content key entries
    pub fn len(&self) -> usize {
        self.ckey_pages.iter().map(Vec::len).sum()
    }

    /// Check whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn slice<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], EncodingError> {
    data.get(offset..offset + len).ok_or_else(|| {
        EncodingError::Truncated(format!("{what} at {offset} needs {len} bytes"))
    })
}

fn parse_ckey_page(page: &[u8], header: &EncodingHeader) -> Result<Vec<CKeyEntry>, EncodingError> {
    let ckey_size = header.ckey_hash_size as usize;
    let ekey_size = header.ekey_hash_size as usize;
    let mut entries = Vec::new();
    let mut pos = 0;

    // key_count == 0 marks the zero padding at the end of a page
    while let Some(&key_count) = page.get(pos)
        && key_count != 0
    {
        let entry_len = 1 + 5 + ckey_size + key_count as usize * ekey_size;
        let Some(entry) = page.get(pos..pos + entry_len) else {
            return Err(EncodingError::Truncated(format!(
                "content key entry at page offset {pos}"
            )));
        };

        let file_size = (u64::from(entry[1]) << 32)
            | u64::from(u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]));

        let content_key = ContentKey::from_bytes(padded_key(&entry[6..6 + ckey_size]));
        let encoding_keys = entry[6 + ckey_size..]
            .chunks_exact(ekey_size)
            .map(|bytes| EncodingKey::from_bytes(padded_key(bytes)))
            .collect();

        entries.push(CKeyEntry {
            content_key,
            file_size,
            encoding_keys,
        });
        pos += entry_len;
    }

    Ok(entries)
}

fn padded_key(bytes: &[u8]) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..bytes.len()].copy_from_slice(bytes);
    key
}
