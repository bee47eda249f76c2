//! Archive session over a storage backend
//!
//! The session owns at most one open backend. Reads normalize the path,
//! reject entries whose reported size marks them unreadable (0 or
//! `u32::MAX`) and return the payload as an owned [`FileData`] buffer that
//! outlives the backend's file handle.

use crate::casc::CascStorage;
use crate::{Result, StorageError};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use wowvfs_formats::root::LocaleFlags;

/// Size reported by a backend that cannot tell a file's size
pub const UNKNOWN_SIZE: u32 = u32::MAX;

/// File addressed by path or by FileDataID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTarget<'a> {
    /// Normalized path
    Name(&'a str),
    /// FileDataID
    Id(u32),
}

impl fmt::Display for FileTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "file ID {id}"),
        }
    }
}

/// Open file handle of a backend
pub trait StorageFile {
    /// Payload size, [`UNKNOWN_SIZE`] when unknown
    fn size(&self) -> u32;

    /// Read up to `buf.len()` bytes, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Versioned, locale-aware content store
pub trait StorageBackend: Sized {
    /// File handle type
    type File: StorageFile;

    /// Open the store rooted at `data_dir`
    fn open(data_dir: &Path, locale: LocaleFlags) -> Result<Self>;

    /// Open a file, `Ok(None)` when it does not exist
    fn open_file(&self, target: FileTarget<'_>, locale: LocaleFlags)
    -> Result<Option<Self::File>>;

    /// Check whether a file exists without reading it
    fn contains(&self, target: FileTarget<'_>, locale: LocaleFlags) -> bool {
        matches!(self.open_file(target, locale), Ok(Some(_)))
    }
}

/// Owned payload of one read
#[derive(PartialEq, Eq)]
pub struct FileData(Vec<u8>);

impl FileData {
    /// Take the bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for FileData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileData").field("len", &self.0.len()).finish()
    }
}

/// Lowercase the path, use `/` separators, drop empty segments
pub fn normalize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("/")
}

/// Session holding at most one open backend
#[derive(Debug)]
pub struct ArchiveSession<B = CascStorage> {
    backend: Option<B>,
    data_dir: PathBuf,
    locale: LocaleFlags,
}

impl<B> Default for ArchiveSession<B> {
    fn default() -> Self {
        Self {
            backend: None,
            data_dir: PathBuf::new(),
            locale: LocaleFlags::NONE,
        }
    }
}

impl<B: StorageBackend> ArchiveSession<B> {
    /// Create a closed session
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the backend at `data_dir`, closing any open one first
    pub fn open(&mut self, data_dir: &Path, locale: LocaleFlags) -> Result<()> {
        self.close();
        let backend = B::open(data_dir, locale).map_err(|e| match e {
            StorageError::Unavailable { .. } => e,
            other => StorageError::unavailable(data_dir, other),
        })?;
        self.attach(backend, data_dir, locale);
        Ok(())
    }

    /// Adopt an already opened backend, closing any open one first
    pub fn attach(&mut self, backend: B, data_dir: &Path, locale: LocaleFlags) {
        self.close();
        self.backend = Some(backend);
        self.data_dir = data_dir.to_path_buf();
        self.locale = locale;
        info!("Opened storage at {} (locale {})", data_dir.display(), locale);
    }

    /// Close the backend; a no-op when closed
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            debug!("Closed storage at {}", self.data_dir.display());
        }
    }

    /// Whether a backend is open
    pub const fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Locale the session filters by
    pub const fn locale(&self) -> LocaleFlags {
        self.locale
    }

    /// Open backend, if any
    pub const fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Read a file by path
    pub fn read_by_name(&self, path: &str) -> Result<FileData> {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        self.read(FileTarget::Name(&normalized))
    }

    /// Read a file by FileDataID
    pub fn read_by_id(&self, id: u32) -> Result<FileData> {
        self.read(FileTarget::Id(id))
    }

    /// Check whether a path resolves in the open backend
    pub fn exists(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            return false;
        }
        self.backend.as_ref().is_some_and(|backend| {
            backend.contains(FileTarget::Name(&normalized), self.locale)
        })
    }

    /// Check whether a FileDataID resolves in the open backend
    pub fn exists_by_id(&self, id: u32) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.contains(FileTarget::Id(id), self.locale))
    }

    fn read(&self, target: FileTarget<'_>) -> Result<FileData> {
        let backend = self.backend.as_ref().ok_or_else(|| StorageError::Unavailable {
            path: self.data_dir.clone(),
            source: None,
        })?;

        let mut file = match backend.open_file(target, self.locale) {
            Ok(Some(file)) => file,
            Ok(None) => return Err(StorageError::NotFound(target.to_string())),
            Err(e) if e.is_not_found() => return Err(e),
            Err(e) => {
                return Err(StorageError::Read {
                    target: target.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let size = file.size();
        if size == 0 || size == UNKNOWN_SIZE {
            return Err(StorageError::InvalidSize {
                target: target.to_string(),
                size,
            });
        }

        let mut buffer = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            let read = file.read(&mut buffer[filled..]).map_err(|e| StorageError::Read {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
            if read == 0 {
                return Err(StorageError::Read {
                    target: target.to_string(),
                    reason: format!("short read: {filled} of {size} bytes"),
                });
            }
            filled += read;
        }

        debug!("Read {} bytes for {}", size, target);
        Ok(FileData(buffer))
    }
}
