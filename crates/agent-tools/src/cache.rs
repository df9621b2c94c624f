//! Content-addressed result cache for tool calls
//!
//! Entries are keyed by [`Fingerprint`], bounded by an LRU capacity, and
//! expire lazily: an entry past its TTL is reported as a miss and replaced by
//! the next write, but never swept in the background.

use crate::fingerprint::Fingerprint;
use agent_core::Result;
use cached::{Cached, SizedCache};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const PERSIST_VERSION: u32 = 1;

/// A cached tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, payload: Value, ttl: Duration) -> Self {
        Self {
            fingerprint,
            payload,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Whether the entry is past its TTL at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = TimeDelta::from_std(self.ttl) else {
            return false;
        };
        self.stored_at
            .checked_add_signed(ttl)
            .is_some_and(|expires_at| now >= expires_at)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    payload: Value,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: BTreeMap<Fingerprint, PersistedEntry>,
}

/// Thread-safe, optionally persistent cache for tool results
#[derive(Clone)]
pub struct ResultCache {
    cache: Arc<RwLock<SizedCache<Fingerprint, CacheEntry>>>,
    default_ttl: Duration,
    path: Option<PathBuf>,
}

impl ResultCache {
    /// Create an in-memory cache
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(SizedCache::with_size(capacity.max(1)))),
            default_ttl,
            path: None,
        }
    }

    /// Create a cache backed by a file, loading whatever it holds
    ///
    /// A missing file yields an empty cache. A file that cannot be parsed is
    /// logged and ignored; it will be overwritten on the next flush.
    pub async fn open(path: impl AsRef<Path>, capacity: usize, default_ttl: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut cache = Self::new(capacity, default_ttl);
        cache.path = Some(path.clone());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No persisted cache, starting empty");
                return Ok(cache);
            }
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedCache = match serde_json::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable cache file");
                return Ok(cache);
            }
        };
        if persisted.version != PERSIST_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = persisted.version,
                "Ignoring cache file with unsupported version"
            );
            return Ok(cache);
        }

        let now = Utc::now();
        let mut entries: Vec<CacheEntry> = persisted
            .entries
            .into_iter()
            .map(|(fingerprint, entry)| CacheEntry {
                fingerprint,
                payload: entry.payload,
                stored_at: entry.stored_at,
                ttl: entry.ttl,
            })
            .filter(|entry| !entry.is_expired_at(now))
            .collect();
        // Oldest first so the newest entries end up most recently used
        entries.sort_by_key(|entry| entry.stored_at);

        {
            let mut store = cache.cache.write().await;
            for entry in entries {
                store.cache_set(entry.fingerprint.clone(), entry);
            }
            tracing::info!(path = %path.display(), entries = store.cache_size(), "Loaded persisted cache");
        }

        Ok(cache)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Value> {
        self.get_at(fingerprint, Utc::now()).await
    }

    /// Look up an entry as of `now`; expired entries are misses
    pub async fn get_at(&self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> Option<Value> {
        let mut cache = self.cache.write().await;
        match cache.cache_get(fingerprint) {
            Some(entry) if !entry.is_expired_at(now) => {
                tracing::debug!(fingerprint = fingerprint.short(), "Cache hit");
                Some(entry.payload.clone())
            }
            Some(_) => {
                tracing::debug!(fingerprint = fingerprint.short(), "Cache entry expired");
                None
            }
            None => {
                tracing::debug!(fingerprint = fingerprint.short(), "Cache miss");
                None
            }
        }
    }

    /// Store a payload, replacing any existing entry for the fingerprint
    pub async fn put(&self, fingerprint: Fingerprint, payload: Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(fingerprint.clone(), payload, ttl.unwrap_or(self.default_ttl));
        self.insert(entry).await;
    }

    /// Store a prepared entry
    pub async fn insert(&self, entry: CacheEntry) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(entry.fingerprint.clone(), entry);
    }

    /// Write live entries to the backing file, returning how many were written
    ///
    /// The file is replaced atomically through a temporary sibling. A cache
    /// without a backing file flushes nothing.
    pub async fn flush(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let now = Utc::now();
        let persisted = {
            let cache = self.cache.read().await;
            PersistedCache {
                version: PERSIST_VERSION,
                entries: cache
                    .value_order()
                    .filter(|entry| !entry.is_expired_at(now))
                    .map(|entry| {
                        (
                            entry.fingerprint.clone(),
                            PersistedEntry {
                                payload: entry.payload.clone(),
                                stored_at: entry.stored_at,
                                ttl: entry.ttl,
                            },
                        )
                    })
                    .collect(),
            }
        };
        let count = persisted.entries.len();
        let bytes = serde_json::to_vec_pretty(&persisted)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::info!(path = %path.display(), entries = count, "Flushed cache");
        Ok(count)
    }

    /// Remove all entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
