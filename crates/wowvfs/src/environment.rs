//! Asset environment
//!
//! An [`Environment`] ties together the active build of an installation,
//! the archive session reading from it, the listfile namespace and,
//! once loaded, the client database. It is built once by
//! [`Environment::init`] and passed by reference to whatever needs assets.

use crate::config::EnvironmentConfig;
use crate::namespace::{LISTFILE, NamespaceIndex};
use crate::Result;
use std::path::PathBuf;
use tracing::{debug, info};
use wowvfs_db::{DecodedTable, SCHEMA_FILE, SchemaRegistry, TableSource, TableStore};
use wowvfs_storage::{
    ArchiveSession, BUILD_INFO_FILE, BuildDescriptor, BuildVersion, CascStorage,
    DEFAULT_DATA_DIR, FileData, LocaleFlags, StorageError,
};

/// Directory all WMO files live under
const WMO_ROOT: &str = "world";

/// Loaded asset environment
#[derive(Debug)]
pub struct Environment {
    config: EnvironmentConfig,
    build: BuildDescriptor,
    locale: LocaleFlags,
    session: ArchiveSession,
    namespace: NamespaceIndex,
    wmo_files: Vec<String>,
    schemas: Option<SchemaRegistry>,
    tables: Option<TableStore>,
}

impl Environment {
    /// Resolve the active build, open its storage and load the listfile.
    ///
    /// Any failure aborts; no partially initialized environment is
    /// returned.
    pub fn init(config: EnvironmentConfig) -> Result<Self> {
        config.validate()?;

        let build = BuildDescriptor::resolve(
            &config.game_dir.join(BUILD_INFO_FILE),
            config.product.as_deref(),
        )?;
        let locale_code = config
            .locale_override
            .clone()
            .unwrap_or_else(|| build.locale.clone());
        let locale = LocaleFlags::from_code(&locale_code);
        if locale.is_none() {
            debug!("Locale {:?} is not known, reading without a locale filter", locale_code);
        }
        info!("Active build {} with locale {}", build.version, locale_code);

        let mut environment = Self {
            config,
            build,
            locale,
            session: ArchiveSession::new(),
            namespace: NamespaceIndex::new(),
            wmo_files: Vec::new(),
            schemas: None,
            tables: None,
        };
        environment.load_root()?;
        if environment.config.load_listfile {
            environment.reload_listfile()?;
        }
        Ok(environment)
    }

    /// Open the archive storage, closing it first when open
    pub fn load_root(&mut self) -> Result<()> {
        self.session.close();
        let data_dir = self.storage_dir();
        let storage = CascStorage::open_build(&data_dir, &self.build)?;
        self.session.attach(storage, &data_dir, self.locale);
        Ok(())
    }

    /// Close the archive storage
    pub fn unload_root(&mut self) {
        self.session.close();
    }

    /// Close the storage and drop every loaded structure
    pub fn shutdown(&mut self) {
        self.unload_root();
        self.tables = None;
        self.schemas = None;
        self.namespace.clear();
        self.wmo_files.clear();
    }

    /// Rebuild the namespace from the version's listfile.
    ///
    /// The WMO list is cleared and must be rebuilt.
    pub fn reload_listfile(&mut self) -> Result<usize> {
        self.wmo_files.clear();
        self.namespace.load(&self.version_dir().join(LISTFILE))
    }

    /// Load the schema registry and the configured tables
    pub fn load_database(&mut self) -> Result<()> {
        let registry = SchemaRegistry::load(&self.version_dir().join(SCHEMA_FILE))?;
        let store = match &self.config.tables {
            Some(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                TableStore::load(&*self, &registry, &names)?
            }
            None => TableStore::load_all(&*self, &registry)?,
        };
        info!(
            "Loaded database for {}: {} tables",
            self.build.version.short(),
            store.len()
        );
        self.schemas = Some(registry);
        self.tables = Some(store);
        Ok(())
    }

    /// Read a file by path.
    ///
    /// A path the storage does not know by name is retried by the
    /// FileDataID the listfile gives it.
    pub fn read_file(&self, name: &str) -> Result<FileData> {
        match self.session.read_by_name(name) {
            Err(StorageError::NotFound(reason)) => match self.namespace.id_of(name) {
                Some(id) => {
                    debug!("Reading {} by listfile ID {}", name, id);
                    Ok(self.session.read_by_id(id)?)
                }
                None => Err(StorageError::NotFound(reason).into()),
            },
            result => Ok(result?),
        }
    }

    /// Read a file by FileDataID
    pub fn read_file_by_id(&self, id: u32) -> Result<FileData> {
        Ok(self.session.read_by_id(id)?)
    }

    /// Read a file by path, `None` when it cannot be read
    pub fn open_file(&self, name: &str) -> Option<FileData> {
        self.read_file(name)
            .inspect_err(|e| debug!("Cannot open {}: {}", name, e))
            .ok()
    }

    /// Read a file by FileDataID, `None` when it cannot be read
    pub fn open_file_by_id(&self, id: u32) -> Option<FileData> {
        self.read_file_by_id(id)
            .inspect_err(|e| debug!("Cannot open file ID {}: {}", id, e))
            .ok()
    }

    /// Check whether a path resolves to a readable file
    pub fn exists(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.session.exists(name)
            || self
                .namespace
                .id_of(name)
                .is_some_and(|id| self.session.exists_by_id(id))
    }

    /// Collect root WMO files under `world`, skipping `internal` paths and
    /// `_NNN.wmo` group files
    pub fn build_wmo_file_list(&mut self) -> usize {
        self.wmo_files = self
            .namespace
            .iter_by_path_and_extension(WMO_ROOT, "wmo")
            .filter(|name| !name.contains("internal") && !is_wmo_group_file(name))
            .map(String::from)
            .collect();
        debug!("Found {} WMO files", self.wmo_files.len());
        self.wmo_files.len()
    }

    /// Root WMO files from the last [`build_wmo_file_list`](Self::build_wmo_file_list)
    pub fn wmo_files(&self) -> &[String] {
        &self.wmo_files
    }

    /// Configuration the environment was built from
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Active build
    pub const fn build(&self) -> &BuildDescriptor {
        &self.build
    }

    /// Version of the active build
    pub const fn version(&self) -> &BuildVersion {
        &self.build.version
    }

    /// Locale files are read with
    pub const fn locale(&self) -> LocaleFlags {
        self.locale
    }

    /// Archive session
    pub const fn session(&self) -> &ArchiveSession {
        &self.session
    }

    /// Listfile namespace
    pub const fn namespace(&self) -> &NamespaceIndex {
        &self.namespace
    }

    /// Schema registry, once the database is loaded
    pub const fn schemas(&self) -> Option<&SchemaRegistry> {
        self.schemas.as_ref()
    }

    /// Table store, once the database is loaded
    pub const fn tables(&self) -> Option<&TableStore> {
        self.tables.as_ref()
    }

    /// Decoded table by name
    pub fn table(&self, name: &str) -> Option<&DecodedTable> {
        self.tables.as_ref()?.get(name)
    }

    /// Path of a FileDataID in the listfile
    pub fn file_name(&self, id: u32) -> Option<&str> {
        self.namespace.name_of(id)
    }

    /// FileDataID of a path in the listfile
    pub fn file_id(&self, name: &str) -> Option<u32> {
        self.namespace.id_of(name)
    }

    /// `Data` directory of the installation
    pub fn storage_dir(&self) -> PathBuf {
        self.config.game_dir.join(DEFAULT_DATA_DIR)
    }

    /// `<data_dir>/<major>.<minor>` for the active build
    pub fn version_dir(&self) -> PathBuf {
        self.config.data_dir.join(self.build.version.short())
    }
}

impl TableSource for Environment {
    fn read_table_file(&self, path: &str) -> Option<Vec<u8>> {
        self.open_file(path).map(FileData::into_vec)
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `_NNN.wmo` suffix of a WMO group file
fn is_wmo_group_file(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 8
        && bytes[bytes.len() - 8] == b'_'
        && bytes[bytes.len() - 7..bytes.len() - 4]
            .iter()
            .all(u8::is_ascii_digit)
}
