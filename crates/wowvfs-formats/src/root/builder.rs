use super::flags::{ContentFlags, LocaleFlags};
use crate::jenkins::hash_path;
use crate::keys::ContentKey;

/// Builds extended (version 1) root manifests for synthetic installations
#[derive(Debug, Default)]
pub struct RootBuilder {
    blocks: Vec<PendingBlock>,
}

#[derive(Debug)]
struct PendingBlock {
    locale: LocaleFlags,
    content: ContentFlags,
    records: Vec<(u32, ContentKey, Option<u64>)>,
}

impl RootBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Files sharing locale and content flags share a block.
    pub fn add(
        &mut self,
        file_data_id: u32,
        content_key: ContentKey,
        path: Option<&str>,
        locale: LocaleFlags,
        content: ContentFlags,
    ) -> &mut Self {
        let record = (file_data_id, content_key, path.map(hash_path));
        match self
            .blocks
            .iter_mut()
            .find(|block| block.locale == locale && block.content == content)
        {
            Some(block) => block.records.push(record),
            None => self.blocks.push(PendingBlock {
                locale,
                content,
                records: vec![record],
            }),
        }
        self
    }

    /// Serialize the manifest (not BLTE encoded)
    pub fn build(&self) -> Vec<u8> {
        let total: usize = self.blocks.iter().map(|block| block.records.len()).sum();
        let named: usize = self
            .blocks
            .iter()
            .flat_map(|block| &block.records)
            .filter(|record| record.2.is_some())
            .count();

        let mut out = Vec::new();
        out.extend_from_slice(&super::ROOT_MAGIC);
        out.extend_from_slice(&24u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(named as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        for block in &self.blocks {
            let mut records = block.records.clone();
            records.sort_by_key(|record| record.0);
            let has_names = records.iter().any(|record| record.2.is_some());
            let content = if has_names {
                block.content
            } else {
                block.content | ContentFlags::NO_NAME_HASH
            };

            out.extend_from_slice(&(records.len() as u32).to_le_bytes());
            out.extend_from_slice(&content.0.to_le_bytes());
            out.extend_from_slice(&block.locale.0.to_le_bytes());

            let mut next_id = 0u32;
            for (file_data_id, _, _) in &records {
                out.extend_from_slice(&file_data_id.wrapping_sub(next_id).to_le_bytes());
                next_id = file_data_id.wrapping_add(1);
            }
            for (_, content_key, _) in &records {
                out.extend_from_slice(content_key.as_bytes());
            }
            if has_names {
                for (_, _, hash) in &records {
                    out.extend_from_slice(&hash.unwrap_or(0).to_le_bytes());
                }
            }
        }
        out
    }
}
