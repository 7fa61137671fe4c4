use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::model::Album;

/// Durable key for the TTL'd album list cache.
pub const ALBUMS_CACHE_KEY: &str = "travel-map.albums";
/// Durable key for the user's renderer preference.
pub const RENDERER_PREF_KEY: &str = "travel-map.renderer";
/// Session-scoped key for the album carried from the list into the detail view.
pub const CURRENT_ALBUM_KEY: &str = "currentAlbum";

/// Minimal key-value storage seam so the caches can be exercised without
/// touching the filesystem.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn put(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// One JSON file per key under the configured cache directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<FileStore, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys may contain characters that are not valid in filenames, so
        // keep a readable prefix and disambiguate with a digest.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let digest = Sha256::digest(key.as_bytes());
        let digest = format!("{:x}", digest);
        self.dir.join(format!("{}-{}.json", safe, &digest[..16]))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(Some(contents))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| AppError::Storage(e.to_string()))
    }
}

/// In-memory store for tests and for session-scoped state.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let map = self
            .map
            .lock()
            .map_err(|_| AppError::Storage("store lock poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| AppError::Storage("store lock poisoned".into()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Session-lifetime state: the album handed from a map pin into the detail
/// view so the detail page can paint before the fresh list arrives.
/// Read/write failures are absorbed; this is an optimization, not a source
/// of truth.
#[derive(Default)]
pub struct SessionStore {
    inner: MemoryStore,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    pub fn current_album(&self) -> Option<Album> {
        let raw = match self.inner.get(CURRENT_ALBUM_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read session album: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(album) => Some(album),
            Err(e) => {
                log::warn!("Failed to parse session album: {}", e);
                None
            }
        }
    }

    pub fn set_current_album(&self, album: &Album) {
        match serde_json::to_string(album) {
            Ok(raw) => {
                if let Err(e) = self.inner.put(CURRENT_ALBUM_KEY, &raw) {
                    log::warn!("Unable to cache album in session store: {}", e);
                }
            }
            Err(e) => log::warn!("Unable to serialize session album: {}", e),
        }
    }
}
