//! Asset archives - script and data sources
//!
//! Scripts never touch the filesystem directly; every byte the bridge loads
//! (module source, `inflate` data, the bundle config) comes through an
//! [`AssetArchive`].

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::BridgeResult;

/// Read-only source of asset bytes keyed by slash-separated path
pub trait AssetArchive {
    /// Contents of the asset at `path`, or `None` if there is none
    fn inflate(&self, path: &str) -> Option<Vec<u8>>;
}

// ============================================================================
// Zip bundles
// ============================================================================

/// Largest buffer reserved from an entry's declared size
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Assets stored in a zip archive (an APK, for instance)
pub struct ZipAssets<R: Read + Seek = File> {
    archive: RefCell<zip::ZipArchive<R>>,
}

impl ZipAssets<File> {
    /// Open a zip bundle on disk
    pub fn open(path: &Path) -> BridgeResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> ZipAssets<R> {
    /// Read the central directory of an already opened bundle
    pub fn from_reader(reader: R) -> BridgeResult<Self> {
        let archive = zip::ZipArchive::new(reader)?;
        tracing::debug!(target: "slick", entries = archive.len(), "opened asset bundle");
        Ok(Self {
            archive: RefCell::new(archive),
        })
    }

    fn read_entry(&self, path: &str) -> zip::result::ZipResult<Vec<u8>> {
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive.by_name(path)?;
        // The header size is untrusted; cap the upfront reservation
        let mut buf = Vec::with_capacity(entry.size().min(MAX_PREALLOCATION) as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek> AssetArchive for ZipAssets<R> {
    fn inflate(&self, path: &str) -> Option<Vec<u8>> {
        match self.read_entry(path) {
            Ok(bytes) => Some(bytes),
            Err(zip::result::ZipError::FileNotFound) => None,
            Err(e) => {
                tracing::warn!(target: "slick", path, "cannot inflate asset: {}", e);
                None
            }
        }
    }
}

// ============================================================================
// Directory trees
// ============================================================================

/// Assets stored as plain files under a root directory
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        // Only plain names below the root
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl AssetArchive for DirAssets {
    fn inflate(&self, path: &str) -> Option<Vec<u8>> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(target: "slick", path, "cannot read asset: {}", e);
                None
            }
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Assets held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryAssets {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset, replacing any previous one at `path`
    pub fn with(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(path.to_string(), bytes.into());
    }
}

impl AssetArchive for MemoryAssets {
    fn inflate(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.get(path).cloned()
    }
}
