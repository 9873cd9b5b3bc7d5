//! Incremental-load tile cache
//!
//! A small JSON file mapping tile id to the last-updated timestamp seen for
//! that tile. The load sequencer consults it to decide whether an incoming
//! tile is new, changed, or can be skipped entirely.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use specdb_core::{LoadError, SpecdbResult};

/// How an incoming tile relates to the last load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Never seen before; insert-only path.
    New,
    /// Seen before with an older timestamp; update path.
    Changed,
    /// Timestamp matches the cached one; skip.
    Unchanged,
}

/// Persisted tile id to last-updated mapping.
#[derive(Debug, Clone, Default)]
pub struct TileCache {
    path: Option<PathBuf>,
    entries: BTreeMap<i32, DateTime<Utc>>,
}

impl TileCache {
    /// A cache with no backing file; every tile classifies as new until
    /// recorded within this process.
    pub fn in_memory() -> TileCache {
        TileCache::default()
    }

    /// Load the cache from `path`. A missing file is an empty cache, not an
    /// error, so first runs need no setup.
    pub fn load(path: impl AsRef<Path>) -> SpecdbResult<TileCache> {
        let path = path.as_ref();
        let entries = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| LoadError::CacheUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            serde_json::from_str(&raw).map_err(|e| LoadError::CacheUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };
        Ok(TileCache {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_updated(&self, tileid: i32) -> Option<DateTime<Utc>> {
        self.entries.get(&tileid).copied()
    }

    /// Classify an incoming tile against the cached timestamp.
    pub fn classify(&self, tileid: i32, updated: DateTime<Utc>) -> TileState {
        match self.entries.get(&tileid) {
            None => TileState::New,
            Some(cached) if *cached == updated => TileState::Unchanged,
            Some(_) => TileState::Changed,
        }
    }

    /// Record a successfully loaded tile. Call only after the tile's rows
    /// have committed, so a failed load retries next run.
    pub fn record(&mut self, tileid: i32, updated: DateTime<Utc>) {
        self.entries.insert(tileid, updated);
    }

    /// Write the cache back to its file. A cache created with
    /// [`TileCache::in_memory`] saves nowhere and returns Ok.
    pub fn save(&self) -> SpecdbResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw =
            serde_json::to_string_pretty(&self.entries).map_err(|e| LoadError::CacheWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        fs::write(path, raw).map_err(|e| LoadError::CacheWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
