//! Namespaced TTL cache for expensive-to-obtain session artifacts.
//!
//! Stores browser-derived cookies and captured request headers so that
//! adapters can skip repeated headless-browser acquisitions. Entries are
//! advisory: losing one costs a re-acquisition, never correctness, so the
//! cache has no locking discipline beyond an in-process map mutex and
//! persistence failures degrade to memory-only operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// TTL sentinel: an entry written with this value never expires.
pub const TTL_FOREVER: u64 = 0;

/// Default entry lifetime: six hours, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 6 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    /// Unix epoch milliseconds at write time.
    pub timestamp: i64,
    /// Lifetime in milliseconds; [`TTL_FOREVER`] disables expiry.
    pub ttl: u64,
}

impl CacheEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        if self.ttl == TTL_FOREVER {
            return false;
        }
        now_ms.saturating_sub(self.timestamp) > i64::try_from(self.ttl).unwrap_or(i64::MAX)
    }
}

/// Namespace → key → entry store, persisted as one JSON file per namespace.
pub struct ArtifactCache {
    dir: PathBuf,
    namespaces: Mutex<HashMap<String, HashMap<String, CacheEntry>>>,
}

impl ArtifactCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    /// Load a namespace from its backing file into memory.
    ///
    /// A missing or unreadable file yields an empty namespace — the cache
    /// is cost-reducing, not correctness-critical, so a failed load is a
    /// warning, not an error.
    pub async fn load(&self, namespace: &str) {
        let path = self.namespace_path(namespace);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(namespace, path = %path.display(), error = %e, "cache file unparseable; starting namespace empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(namespace, path = %path.display(), error = %e, "cache file unreadable; starting namespace empty");
                HashMap::new()
            }
        };

        let mut namespaces = self.namespaces.lock().expect("cache mutex poisoned");
        namespaces.insert(namespace.to_string(), entries);
    }

    /// Write a namespace's in-memory entries to its backing file.
    ///
    /// I/O failures are logged and swallowed; the in-memory state stays
    /// authoritative for the rest of the process lifetime.
    pub async fn persist(&self, namespace: &str) {
        let snapshot = {
            let namespaces = self.namespaces.lock().expect("cache mutex poisoned");
            namespaces.get(namespace).cloned().unwrap_or_default()
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "cannot create cache dir; keeping namespace in memory only");
            return;
        }

        let path = self.namespace_path(namespace);
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    tracing::warn!(namespace, path = %path.display(), error = %e, "cache persist failed; keeping namespace in memory only");
                }
            }
            Err(e) => {
                tracing::warn!(namespace, error = %e, "cache serialization failed");
            }
        }
    }

    /// Fetch a live value. Expired entries are treated as absent and
    /// removed on access; there is no eager sweep.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        self.get_at(namespace, key, now_ms())
    }

    fn get_at(&self, namespace: &str, key: &str, now_ms: i64) -> Option<serde_json::Value> {
        let mut namespaces = self.namespaces.lock().expect("cache mutex poisoned");
        let entries = namespaces.get_mut(namespace)?;
        let expired = entries.get(key).is_some_and(|e| e.is_expired(now_ms));
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    /// Store a value. Last writer wins; concurrent writers to the same key
    /// race benignly.
    pub fn set(&self, namespace: &str, key: &str, value: serde_json::Value, ttl_ms: u64) {
        self.set_at(namespace, key, value, ttl_ms, now_ms());
    }

    fn set_at(
        &self,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
        ttl_ms: u64,
        now_ms: i64,
    ) {
        let mut namespaces = self.namespaces.lock().expect("cache mutex poisoned");
        namespaces.entry(namespace.to_string()).or_default().insert(
            key.to_string(),
            CacheEntry {
                value,
                timestamp: now_ms,
                ttl: ttl_ms,
            },
        );
    }

    /// Drop a key, e.g. when a session artifact turned out to be invalid.
    pub fn remove(&self, namespace: &str, key: &str) {
        let mut namespaces = self.namespaces.lock().expect("cache mutex poisoned");
        if let Some(entries) = namespaces.get_mut(namespace) {
            entries.remove(key);
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_key_is_absent() {
        let cache = ArtifactCache::new("./unused");
        assert!(cache.get("session", "cookies").is_none());
    }

    #[test]
    fn forever_ttl_survives_arbitrary_elapsed_time() {
        let cache = ArtifactCache::new("./unused");
        cache.set_at("session", "cookies", json!("a=b"), TTL_FOREVER, 0);

        // Far beyond any plausible lifetime.
        let value = cache.get_at("session", "cookies", i64::MAX - 1);
        assert_eq!(value, Some(json!("a=b")));
    }

    #[test]
    fn positive_ttl_expires_and_removes_on_access() {
        let cache = ArtifactCache::new("./unused");
        cache.set_at("session", "cookies", json!("a=b"), 1_000, 0);

        assert_eq!(cache.get_at("session", "cookies", 1_000), Some(json!("a=b")));
        assert!(cache.get_at("session", "cookies", 1_001).is_none());
        // The expired entry was removed, not just hidden.
        let namespaces = cache.namespaces.lock().unwrap();
        assert!(!namespaces["session"].contains_key("cookies"));
    }

    #[test]
    fn last_writer_wins() {
        let cache = ArtifactCache::new("./unused");
        cache.set_at("session", "cookies", json!("old"), TTL_FOREVER, 0);
        cache.set_at("session", "cookies", json!("new"), TTL_FOREVER, 5);
        assert_eq!(cache.get_at("session", "cookies", 10), Some(json!("new")));
    }

    #[test]
    fn remove_invalidates_artifact() {
        let cache = ArtifactCache::new("./unused");
        cache.set_at("session", "cookies", json!("a=b"), TTL_FOREVER, 0);
        cache.remove("session", "cookies");
        assert!(cache.get_at("session", "cookies", 1).is_none());
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.set("headers", "search", json!({"x-token": "t"}), TTL_FOREVER);
        cache.persist("headers").await;

        let reloaded = ArtifactCache::new(dir.path());
        reloaded.load("headers").await;
        assert_eq!(
            reloaded.get("headers", "search"),
            Some(json!({"x-token": "t"}))
        );
    }

    #[tokio::test]
    async fn load_of_corrupt_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("broken.json"), b"not json")
            .await
            .unwrap();

        let cache = ArtifactCache::new(dir.path());
        cache.load("broken").await;
        assert!(cache.get("broken", "anything").is_none());
        // The namespace is usable despite the corrupt file.
        cache.set("broken", "k", json!(1), TTL_FOREVER);
        assert_eq!(cache.get("broken", "k"), Some(json!(1)));
    }

    #[tokio::test]
    async fn load_of_missing_file_is_silent() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.load("never_persisted").await;
        assert!(cache.get("never_persisted", "k").is_none());
    }
}
