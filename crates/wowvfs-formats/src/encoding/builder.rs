use super::error::EncodingError;
use super::header::EncodingHeader;
use crate::keys::{ContentKey, EncodingKey};
use binrw::BinWriterExt;
use binrw::io::Cursor;

/// Builds encoding tables, used to assemble synthetic installations
#[derive(Debug, Default)]
pub struct EncodingBuilder {
    entries: Vec<(ContentKey, EncodingKey, u64)>,
}

impl EncodingBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a content key with its single encoding key and decoded size
    pub fn add(&mut self, ckey: ContentKey, ekey: EncodingKey, file_size: u64) -> &mut Self {
        self.entries.push((ckey, ekey, file_size));
        self
    }

    /// Serialize the table (not BLTE encoded)
    pub fn build(&self) -> Result<Vec<u8>, EncodingError> {
        let header_template = EncodingHeader::new();
        let page_size = header_template.ckey_page_size();
        let espec = b"n\0";

        let mut by_ckey = self.entries.clone();
        by_ckey.sort_by(|a, b| a.0.cmp(&b.0));
        by_ckey.dedup_by(|a, b| a.0 == b.0);

        let ckey_pages = paginate(
            by_ckey.iter().map(|(ckey, ekey, size)| {
                let mut entry = vec![1u8, (size >> 32) as u8];
                entry.extend_from_slice(&(*size as u32).to_be_bytes());
                entry.extend_from_slice(ckey.as_bytes());
                entry.extend_from_slice(ekey.as_bytes());
                (*ckey.as_bytes(), entry)
            }),
            page_size,
        );

        let mut by_ekey = by_ckey.clone();
        by_ekey.sort_by(|a, b| a.1.cmp(&b.1));
        let ekey_pages = paginate(
            by_ekey.iter().map(|(_, ekey, size)| {
                let mut entry = ekey.as_bytes().to_vec();
                entry.extend_from_slice(&0u32.to_be_bytes());
                entry.push((size >> 32) as u8);
                entry.extend_from_slice(&(*size as u32).to_be_bytes());
                (*ekey.as_bytes(), entry)
            }),
            page_size,
        );

        let header = EncodingHeader {
            ckey_page_count: ckey_pages.len() as u32,
            ekey_page_count: ekey_pages.len() as u32,
            espec_block_size: espec.len() as u32,
            ..header_template
        };

        let mut out = Cursor::new(Vec::new());
        out.write_be(&header)?;
        let mut out = out.into_inner();
        out.extend_from_slice(espec);
        for pages in [&ckey_pages, &ekey_pages] {
            for (first_key, page) in pages {
                out.extend_from_slice(first_key);
                out.extend_from_slice(&md5::compute(page).0);
            }
            for (_, page) in pages {
                out.extend_from_slice(page);
            }
        }
        Ok(out)
    }
}

fn paginate(
    entries: impl Iterator<Item = ([u8; 16], Vec<u8>)>,
    page_size: usize,
) -> Vec<([u8; 16], Vec<u8>)> {
    let mut pages: Vec<([u8; 16], Vec<u8>)> = Vec::new();
    for (key, entry) in entries {
        match pages.last_mut() {
            Some((_, page)) if page.len() + entry.len() <= page_size => {
                page.extend_from_slice(&entry);
            }
            _ => pages.push((key, entry)),
        }
    }
    for (_, page) in &mut pages {
        page.resize(page_size, 0);
    }
    pages
}
