//! Byte sources for [`LoaderFetcher`](crate::LoaderFetcher).
//!
//! Readers are blocking; the fetcher calls them from its worker pool.

use std::path::{Path, PathBuf};

use hearth_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::key::ResourceKey;

/// Something that can produce the raw bytes behind a key's name.
pub trait BytesReader: Send + Sync + 'static {
    /// Read all bytes for `key`.
    fn read(&self, key: &ResourceKey) -> AssetResult<Vec<u8>>;

    /// Check if bytes exist for a path.
    fn exists(&self, path: &str) -> bool;
}

/// Reads files relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl BytesReader for FileReader {
    fn read(&self, key: &ResourceKey) -> AssetResult<Vec<u8>> {
        let full_path = self.resolve_path(key.name());
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    key: key.clone(),
                    path: full_path.display().to_string(),
                }
            } else {
                AssetError::IoError {
                    key: key.clone(),
                    path: full_path.clone(),
                    source: e,
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).exists()
    }
}

/// In-memory bytes for tests or embedded assets.
///
/// Populate it before handing it to a fetcher; once shared it is read-only.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    pub fn insert_static(&mut self, path: impl Into<String>, bytes: &'static [u8]) {
        self.files.insert(path.into(), bytes.to_vec());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl BytesReader for MemoryReader {
    fn read(&self, key: &ResourceKey) -> AssetResult<Vec<u8>> {
        self.files
            .get(key.name())
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                key: key.clone(),
                path: key.name().to_string(),
            })
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
