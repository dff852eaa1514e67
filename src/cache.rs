use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;

const CACHE_TTL_SECS: u64 = 86400 * 7; // 7 days
const CACHE_DIR_NAME: &str = "journalscout";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory: {0}")]
    CreateDir(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk cache of remote payloads, one JSON file per (source, key).
pub struct Cache {
    cache_dir: PathBuf,
    enabled: bool,
}

impl Cache {
    /// Cache under the user cache directory.
    pub fn new(enabled: bool) -> Result<Self, CacheError> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join(CACHE_DIR_NAME);
        Self::in_dir(cache_dir, enabled)
    }

    /// Cache rooted at an explicit directory.
    pub fn in_dir(cache_dir: impl Into<PathBuf>, enabled: bool) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        if enabled {
            fs::create_dir_all(&cache_dir).map_err(CacheError::CreateDir)?;
        }
        Ok(Self { cache_dir, enabled })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, source: &str, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{:016x}.json", source, key_hash(key)))
    }

    /// Cached value for `key`, unless missing, unreadable or older than the TTL.
    /// Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, source: &str, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let path = self.entry_path(source, key);
        let modified = fs::metadata(&path).ok()?.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > Duration::from_secs(CACHE_TTL_SECS) {
            debug!(path = %path.display(), "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn set<T: Serialize>(&self, source: &str, key: &str, value: &T) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }

        let path = self.entry_path(source, key);
        fs::write(&path, serde_json::to_string(value)?)?;
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
