//! Best-effort persistent cache
//!
//! Values are JSON documents under string keys. A cache never fails the
//! caller: read errors and corrupt entries are misses, write errors are
//! logged and dropped. Hydrated video metadata is memoized here without its
//! stream list, since stream URLs expire.

use crate::media::Video;
use crate::utils::error::{IntoVistreamError, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Key-value store for JSON documents
pub trait PersistentCache: Send + Sync {
    /// Look up a value; any failure is a miss
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value, best effort
    fn set(&self, key: &str, value: Value);
}

/// Cache living only for the process lifetime
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl PersistentCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.lock().insert(key.to_string(), value);
    }
}

/// Cache storing one JSON file per key in a directory
#[derive(Debug)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    /// Open (and create if needed) a cache directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).cache_err(&format!("Creating {}", root.display()))?;
        Ok(Self { root })
    }

    /// Directory backing this cache
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", name))
    }
}

impl PersistentCache for DirectoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) {
        let path = self.path_for(key);
        let written = serde_json::to_string(&value)
            .cache_err("Serializing cache entry")
            .and_then(|json| std::fs::write(&path, json).cache_err(&format!("Writing {}", path.display())));
        if let Err(e) = written {
            warn!("{}", e);
        }
    }
}

fn video_key(video_id: &str) -> String {
    format!("video:{}", video_id)
}

/// Look up cached metadata for a video
pub fn cached_video(cache: &dyn PersistentCache, video_id: &str) -> Option<Video> {
    let value = cache.get(&video_key(video_id))?;
    match serde_json::from_value::<Video>(value) {
        Ok(video) if video.id == video_id => Some(video),
        Ok(_) => None,
        Err(e) => {
            debug!("Cached metadata for {} is unreadable: {}", video_id, e);
            None
        }
    }
}

/// Memoize video metadata, stream list excluded
pub fn store_video(cache: &dyn PersistentCache, video: &Video) {
    if video.local {
        return;
    }
    match serde_json::to_value(video.without_streams()) {
        Ok(value) => cache.set(&video_key(&video.id), value),
        Err(e) => warn!("Failed to serialize metadata for {}: {}", video.id, e),
    }
}
