//! Disk cache for downloaded model files
//!
//! Converted models are fetched over HTTP but the renderer loads assets from
//! disk, so every download lands here first. Files are stored under a key
//! derived from the source URL:
//! - the same URL always maps to the same file, so a re-download after a
//!   re-conversion overwrites in place
//! - a manifest records the source URL, content hash, and fetch time of
//!   every entry
//!
//! Files are stored with key-prefixed names: `models/{short_key}-{name}`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// One downloaded asset as recorded in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAsset {
    /// Source URL of the download
    pub url: String,
    /// SHA256 of the stored bytes
    pub sha: String,
    /// Where the file sits, relative to the cache root
    pub path: String,
    /// Content length in bytes
    pub size: u64,
    /// RFC 3339 timestamp of the fetch
    pub fetched_at: String,
}

/// On-disk index of everything the cache holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    #[serde(default = "manifest_version")]
    pub version: String,
    /// Entries keyed by [`AssetCache::url_key`]
    pub assets: HashMap<String, CachedAsset>,
}

fn manifest_version() -> String {
    "1.0".to_string()
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: manifest_version(),
            assets: HashMap::new(),
        }
    }
}

/// Handle to a cache directory and its manifest
#[derive(Debug, Clone)]
pub struct AssetCache {
    /// Root directory of the cache
    pub base_dir: PathBuf,
    /// Where the manifest is persisted
    pub manifest_path: PathBuf,
    /// In-memory copy of the manifest, written back on every store
    pub manifest: CacheManifest,
}

impl AssetCache {
    /// Opens the cache at `base_dir`, creating the directory and an empty
    /// manifest if nothing is there yet.
    pub fn new(base_dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&base_dir)?;

        let manifest_path = base_dir.join("manifest.json");
        let manifest = if manifest_path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?
        } else {
            CacheManifest::default()
        };

        Ok(Self {
            base_dir,
            manifest_path,
            manifest,
        })
    }

    /// Key a URL for manifest lookups and file naming
    pub fn url_key(url: &str) -> String {
        sha256_hex(url.as_bytes())
    }

    /// File name component taken from the URL path, without any query string
    pub fn asset_name(url: &str) -> String {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        without_query
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && !name.contains(':'))
            .unwrap_or("model.glb")
            .to_string()
    }

    /// Directory holding the model files themselves, flat
    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join("models")
    }

    /// Path where the asset for a URL is stored
    pub fn asset_path(&self, url: &str) -> PathBuf {
        let key = Self::url_key(url);
        let short_key = &key[..8.min(key.len())];
        self.models_dir()
            .join(format!("{}-{}", short_key, Self::asset_name(url)))
    }

    /// Store downloaded bytes for a URL, overwriting any previous entry
    pub fn store(&mut self, url: &str, content: &[u8]) -> Result<PathBuf, CacheError> {
        std::fs::create_dir_all(self.models_dir())?;

        let path = self.asset_path(url);
        std::fs::write(&path, content)?;

        let relative_path = path
            .strip_prefix(&self.base_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        self.manifest.assets.insert(
            Self::url_key(url),
            CachedAsset {
                url: url.to_string(),
                sha: sha256_hex(content),
                path: relative_path,
                size: content.len() as u64,
                fetched_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        self.persist()?;

        Ok(path)
    }

    /// Get the absolute path of a cached asset, if present on disk
    pub fn lookup(&self, url: &str) -> Option<PathBuf> {
        let entry = self.manifest.assets.get(&Self::url_key(url))?;
        let path = self.base_dir.join(&entry.path);
        path.exists().then_some(path)
    }

    fn persist(&self) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(&self.manifest)?;
        std::fs::write(&self.manifest_path, content)?;
        Ok(())
    }
}

/// Hex-encoded SHA256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = AssetCache::new(temp_dir.path().to_path_buf()).unwrap();

        let url = "http://127.0.0.1:8000/static/P1.glb";
        assert!(cache.lookup(url).is_none());

        let path = cache.store(url, b"glb-bytes").unwrap();
        assert_eq!(cache.lookup(url).as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"glb-bytes");
    }

    #[test]
    fn test_restore_overwrites_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = AssetCache::new(temp_dir.path().to_path_buf()).unwrap();

        let url = "http://127.0.0.1:8000/static/P1.glb";
        let first = cache.store(url, b"old").unwrap();
        let second = cache.store(url, b"new").unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"new");
        assert_eq!(cache.manifest.assets.len(), 1);
    }

    #[test]
    fn test_manifest_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let url = "http://127.0.0.1:8000/static/P2.glb";

        {
            let mut cache = AssetCache::new(temp_dir.path().to_path_buf()).unwrap();
            cache.store(url, b"persisted").unwrap();
        }

        let reopened = AssetCache::new(temp_dir.path().to_path_buf()).unwrap();
        let path = reopened.lookup(url).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"persisted");
    }

    #[test]
    fn test_asset_name() {
        assert_eq!(
            AssetCache::asset_name("http://host/static/P1.glb"),
            "P1.glb"
        );
        assert_eq!(
            AssetCache::asset_name("http://host/static/P1.glb?token=abc"),
            "P1.glb"
        );
        assert_eq!(AssetCache::asset_name("http://host/static/"), "model.glb");
        assert_eq!(AssetCache::asset_name("no-slashes"), "no-slashes");
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
