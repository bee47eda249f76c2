//! Filename and FileDataID namespace
//!
//! Built from a listfile of `id;path` lines. Paths are stored lowercase
//! with `/` separators in an ordered map, so every file under a directory
//! forms one contiguous run. A directory index maps each directory prefix
//! to the first path seen under it, which is where prefix walks start.

use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use tracing::{debug, info};
use wowvfs_storage::session::normalize_path;

/// Listfile name inside a version directory
pub const LISTFILE: &str = "listfile.csv";

/// Bidirectional path and FileDataID index
#[derive(Debug, Clone, Default)]
pub struct NamespaceIndex {
    by_name: BTreeMap<String, u32>,
    by_id: HashMap<u32, String>,
    directories: HashMap<String, String>,
}

impl NamespaceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a listfile, returning the entry count
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        let text = match std::fs::read(path) {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ListfileNotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(Error::Listfile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        self.load_str(&text);
        info!("Loaded {} listfile entries from {}", self.len(), path.display());
        Ok(self.len())
    }

    /// Replace the contents with listfile text
    pub fn load_str(&mut self, text: &str) {
        self.clear();

        let mut skipped = 0usize;
        for line in text.lines() {
            let mut fields = line.split(';');
            let (Some(id), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some(id) = id.trim().parse::<i64>().ok().and_then(|id| u32::try_from(id).ok())
            else {
                debug!("Skipping listfile line with invalid ID: {}", line);
                skipped += 1;
                continue;
            };
            let name = normalize_path(name.trim());
            if name.is_empty() {
                skipped += 1;
                continue;
            }
            self.insert(id, name);
        }
        if skipped > 0 {
            debug!("Skipped {} listfile lines", skipped);
        }

        self.build_directory_index();
    }

    /// Last write wins in both directions; the pairs it displaces are
    /// dropped so the maps stay inverse
    fn insert(&mut self, id: u32, name: String) {
        if let Some(old_id) = self.by_name.insert(name.clone(), id)
            && old_id != id
            && self.by_id.get(&old_id) == Some(&name)
        {
            self.by_id.remove(&old_id);
        }
        if let Some(old_name) = self.by_id.insert(id, name)
            && self.by_name.get(&old_name) == Some(&id)
            && self.by_id.get(&id) != Some(&old_name)
        {
            self.by_name.remove(&old_name);
        }
    }

    /// Record the first path under every directory prefix. The walk over a
    /// path stops at a segment starting with `0`.
    fn build_directory_index(&mut self) {
        self.directories.clear();
        for name in self.by_name.keys() {
            for (at, _) in name.match_indices('/') {
                self.directories
                    .entry(name[..at].to_string())
                    .or_insert_with(|| name.clone());
                if name.as_bytes().get(at + 1) == Some(&b'0') {
                    break;
                }
            }
        }
        debug!("Indexed {} directories", self.directories.len());
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        self.directories.clear();
    }

    /// FileDataID of a path
    pub fn id_of(&self, path: &str) -> Option<u32> {
        self.by_name.get(&normalize_path(path)).copied()
    }

    /// Path of a FileDataID
    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Number of indexed directory prefixes
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// All paths in order with their IDs
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// First path recorded under a directory
    pub fn directory_representative(&self, directory: &str) -> Option<&str> {
        self.directories
            .get(&normalize_path(directory))
            .map(String::as_str)
    }

    /// Paths with an extension, in order
    pub fn iter_by_extension<'a>(&'a self, extension: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.by_name
            .keys()
            .map(String::as_str)
            .filter(move |name| has_extension(name, extension))
    }

    /// Paths under a directory with an extension, in order.
    ///
    /// Yields nothing for a directory without a representative.
    pub fn iter_by_path_and_extension<'a>(
        &'a self,
        directory: &str,
        extension: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let directory = normalize_path(directory);
        let start = self.directories.get(&directory).map(|first| {
            self.by_name
                .range::<str, _>((Bound::Included(first.as_str()), Bound::Unbounded))
        });
        let prefix = format!("{directory}/");

        start
            .into_iter()
            .flatten()
            .map(|(name, _)| name.as_str())
            .take_while(move |name| name.starts_with(&prefix))
            .filter(move |name| has_extension(name, extension))
    }

    /// Visit every path with an extension
    pub fn for_each_by_extension(&self, extension: &str, mut visit: impl FnMut(&str)) {
        for name in self.iter_by_extension(extension) {
            visit(name);
        }
    }

    /// Visit every path under a directory with an extension
    pub fn for_each_by_path_and_extension(
        &self,
        directory: &str,
        extension: &str,
        mut visit: impl FnMut(&str),
    ) {
        for name in self.iter_by_path_and_extension(directory, extension) {
            visit(name);
        }
    }
}

/// Case-insensitive match on the text after the final `.`; an empty
/// extension matches every path
pub fn has_extension(name: &str, extension: &str) -> bool {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        return true;
    }
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const LISTFILE_TEXT: &str = "\
1234;World/wmo/Kalimdor/Ogrimmar/Ogrimmar.wmo;extra
1235;World\\WMO\\Kalimdor\\Ogrimmar\\Ogrimmar_000.wmo
775971;world/maps/Azeroth/Azeroth.wdt
22;world/0versioned/deep/file.wmo
-5;world/negative.wmo
abc;world/garbage.wmo
no-separator-line
40;interface/icons/inv_misc_questionmark.blp
41;Interface/Icons/INV_Sword_04.BLP
";

    fn index() -> NamespaceIndex {
        let mut index = NamespaceIndex::new();
        index.load_str(LISTFILE_TEXT);
        index
    }

    #[test]
    fn test_lookups_are_normalized() {
        let index = index();
        assert_eq!(index.len(), 6);
        assert_eq!(index.id_of("world/wmo/kalimdor/ogrimmar/ogrimmar.wmo"), Some(1234));
        assert_eq!(index.id_of("WORLD\\WMO\\Kalimdor\\Ogrimmar\\Ogrimmar.wmo"), Some(1234));
        assert_eq!(
            index.name_of(1234),
            Some("world/wmo/kalimdor/ogrimmar/ogrimmar.wmo")
        );
        assert_eq!(index.name_of(1235), Some("world/wmo/kalimdor/ogrimmar/ogrimmar_000.wmo"));
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let index = index();
        assert_eq!(index.id_of("world/negative.wmo"), None);
        assert_eq!(index.id_of("world/garbage.wmo"), None);
        assert_eq!(index.name_of(0), None);
    }

    #[test]
    fn test_reload_clears_previous_entries() {
        let mut index = index();
        index.load_str("7;sound/music/zone.mp3\n");
        assert_eq!(index.len(), 1);
        assert_eq!(index.id_of("world/maps/azeroth/azeroth.wdt"), None);
        assert_eq!(index.name_of(1234), None);
        assert_eq!(index.directory_representative("world"), None);
        assert_eq!(index.directory_representative("sound/music"), Some("sound/music/zone.mp3"));
    }

    #[test]
    fn test_duplicates_are_last_write_wins() {
        let mut index = NamespaceIndex::new();
        index.load_str("1;a/b.txt\n2;a/b.txt\n");
        assert_eq!(index.id_of("a/b.txt"), Some(2));
        assert_eq!(index.name_of(2), Some("a/b.txt"));
        assert_eq!(index.name_of(1), None);

        index.load_str("7;x/one.txt\n7;x/two.txt\n");
        assert_eq!(index.name_of(7), Some("x/two.txt"));
        assert_eq!(index.id_of("x/one.txt"), None);
        assert_eq!(index.len(), 1);
        assert_eq!(index.iter_by_path_and_extension("x", "txt").collect::<Vec<_>>(), ["x/two.txt"]);
    }

    #[test]
    fn test_directory_index() {
        let index = index();
        assert_eq!(
            index.directory_representative("world"),
            Some("world/0versioned/deep/file.wmo")
        );
        assert_eq!(
            index.directory_representative("World/WMO"),
            Some("world/wmo/kalimdor/ogrimmar/ogrimmar.wmo")
        );
        // walk stops at a segment starting with '0'
        assert_eq!(index.directory_representative("world/0versioned"), None);
        assert_eq!(index.directory_representative("world/0versioned/deep"), None);
        assert_eq!(index.directory_representative("nowhere"), None);
    }

    #[test]
    fn test_iterate_by_extension() {
        let index = index();
        let icons: Vec<&str> = index.iter_by_extension(".BLP").collect();
        assert_eq!(
            icons,
            vec![
                "interface/icons/inv_misc_questionmark.blp",
                "interface/icons/inv_sword_04.blp"
            ]
        );
        let mut count = 0;
        index.for_each_by_extension("wmo", |_| count += 1);
        assert_eq!(count, 3);
        assert_eq!(index.iter_by_extension("").count(), 6);
    }

    #[test]
    fn test_iterate_by_path_and_extension() {
        let index = index();
        let wmos: Vec<&str> = index.iter_by_path_and_extension("world/wmo", "wmo").collect();
        assert_eq!(
            wmos,
            vec![
                "world/wmo/kalimdor/ogrimmar/ogrimmar.wmo",
                "world/wmo/kalimdor/ogrimmar/ogrimmar_000.wmo"
            ]
        );

        let mut world = Vec::new();
        index.for_each_by_path_and_extension("WORLD/", "", |name| world.push(name.to_string()));
        assert_eq!(world.len(), 4);
        assert!(world.iter().all(|name| name.starts_with("world/")));

        assert_eq!(index.iter_by_path_and_extension("world/0versioned", "wmo").count(), 0);
        assert_eq!(index.iter_by_path_and_extension("", "wmo").count(), 0);
    }

    #[test]
    fn test_missing_listfile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = NamespaceIndex::new();
        assert!(matches!(
            index.load(&dir.path().join(LISTFILE)),
            Err(Error::ListfileNotFound(_))
        ));

        let path = dir.path().join(LISTFILE);
        std::fs::write(&path, LISTFILE_TEXT).expect("write");
        assert_eq!(index.load(&path).expect("load"), 6);
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("a/b.WMO", "wmo"));
        assert!(has_extension("a/b.wmo", ".wmo"));
        assert!(!has_extension("a/b.wmo2", "wmo"));
        assert!(!has_extension("a/wmo", "wmo"));
    }

    fn entries() -> impl Strategy<Value = Vec<(u32, String)>> {
        prop::collection::vec((0u32..50_000, "[a-z]{1,4}(/[a-z0-9]{1,4}){0,3}\\.[a-z]{3}"), 1..40)
    }

    proptest! {
        #[test]
        fn prop_name_and_id_are_inverse(entries in entries()) {
            let text: String = entries.iter().map(|(id, name)| format!("{id};{name}\n")).collect();

            let mut index = NamespaceIndex::new();
            index.load_str(&text);
            prop_assert_eq!(index.by_name.len(), index.by_id.len());
            for (name, id) in index.iter() {
                prop_assert_eq!(index.name_of(id), Some(name));
                prop_assert_eq!(index.id_of(name), Some(id));
            }
        }

        #[test]
        fn prop_prefix_walk_stays_in_directory(entries in entries(), directory in "[a-z]{1,4}(/[a-z0-9]{1,4}){0,2}") {
            let text: String = entries.iter().map(|(id, name)| format!("{id};{name}\n")).collect();
            let mut index = NamespaceIndex::new();
            index.load_str(&text);

            let prefix = format!("{directory}/");
            for name in index.iter_by_path_and_extension(&directory, "") {
                prop_assert!(name.starts_with(&prefix));
            }
        }
    }
}
