//! Root manifest
//!
//! Maps FileDataIDs (and, for named files, the Jenkins hash of the path) to
//! content keys. Records are grouped into blocks that share a locale mask
//! and a content mask, so one FileDataID can resolve to several content
//! keys depending on the selected locale.

mod builder;
mod error;
mod file;
mod flags;

pub use builder::RootBuilder;
pub use error::RootError;
pub use file::{
    ROOT_MAGIC, ROOT_MAGIC_SWAPPED, RootBlock, RootEntry, RootFile, RootFormat, RootRecord,
};
pub use flags::{ContentFlags, LocaleFlags};

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::jenkins::hash_path;
    use crate::keys::ContentKey;

    #[test]
    fn test_builder_output_parses() {
        let a = ContentKey::from_data(b"a");
        let b = ContentKey::from_data(b"b");
        let mut builder = RootBuilder::new();
        builder
            .add(100, a, Some("World/a.wmo"), LocaleFlags::ALL, ContentFlags::NONE)
            .add(7, b, None, LocaleFlags::ALL, ContentFlags::NONE);

        let root = RootFile::parse(&builder.build()).expect("parse");
        assert_eq!(root.format, RootFormat::Extended { version: 1 });
        assert_eq!(root.total_files, Some(2));
        assert_eq!(root.named_files, Some(1));
        assert_eq!(root.blocks.len(), 1);
        // records are stored sorted by id
        assert_eq!(root.blocks[0].records[0].file_data_id, 7);
        assert_eq!(root.resolve(100, LocaleFlags::NONE), Some(a));
        assert_eq!(root.file_data_id_by_hash(hash_path("world/A.WMO")), Some(100));
    }

    #[test]
    fn test_locale_selection() {
        let us = ContentKey::from_data(b"us");
        let de = ContentKey::from_data(b"de");
        let de_low = ContentKey::from_data(b"de-low");
        let mut builder = RootBuilder::new();
        builder
            .add(1, us, None, LocaleFlags::ENUS, ContentFlags::NONE)
            .add(1, de_low, None, LocaleFlags::DEDE, ContentFlags::LOW_VIOLENCE)
            .add(1, de, None, LocaleFlags::DEDE, ContentFlags::NONE);
        let root = RootFile::parse(&builder.build()).expect("parse");

        assert_eq!(root.entries(1).len(), 3);
        assert_eq!(root.resolve(1, LocaleFlags::ENUS), Some(us));
        assert_eq!(root.resolve(1, LocaleFlags::DEDE), Some(de));
        // no match falls back to the first entry
        assert_eq!(root.resolve(1, LocaleFlags::KOKR), Some(us));
        assert_eq!(root.resolve(1, LocaleFlags::NONE), Some(us));
        assert_eq!(root.resolve(2, LocaleFlags::ENUS), None);
    }

    #[test]
    fn test_low_violence_only() {
        let low = ContentKey::from_data(b"low");
        let mut builder = RootBuilder::new();
        builder.add(3, low, None, LocaleFlags::DEDE, ContentFlags::LOW_VIOLENCE);
        let root = RootFile::parse(&builder.build()).expect("parse");
        assert_eq!(root.resolve(3, LocaleFlags::DEDE), Some(low));
    }

    #[test]
    fn test_classic_manifest_header() {
        let key = ContentKey::from_data(b"x");
        let mut data = Vec::new();
        data.extend_from_slice(&ROOT_MAGIC);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&LocaleFlags::ENUS.0.to_le_bytes());
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(key.as_bytes());
        data.extend_from_slice(&hash_path("a.m2").to_le_bytes());

        let root = RootFile::parse(&data).expect("parse");
        assert_eq!(root.format, RootFormat::Manifest);
        assert_eq!(root.blocks[0].records[0].name_hash, Some(hash_path("A.M2")));
        assert!(root.contains(10));
        assert!(!root.is_empty());
    }

    #[test]
    fn test_empty_manifest() {
        let root = RootFile::parse(&RootBuilder::new().build()).expect("parse");
        assert!(root.is_empty());
        assert!(root.entries(1).is_empty());
    }
}
