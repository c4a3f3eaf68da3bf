//! Client-Local Storage
//!
//! A small key-value port standing in for browser storage, plus the two
//! typed stores the gating logic needs: the guest query counter (persistent
//! scope) and the dismissal flag (session scope).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::Result;

/// Persistent key holding the anonymous query count
pub const GUEST_QUERIES_KEY: &str = "farchat_guest_queries";

/// Session key set once the sticky call-to-action has been dismissed
pub const STICKY_CTA_DISMISSED_KEY: &str = "sticky-cta-dismissed";

/// String key-value storage.
///
/// Reads and writes are synchronous. Implementations never surface write
/// failures to callers; they log them instead.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

/// In-memory store. Lives as long as the process, which makes it the
/// session-scoped store as well as the test fake.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// Persistent store backed by a JSON object file.
///
/// The whole map is rewritten on every mutation. Concurrent writers in other
/// processes race with last-writer-wins semantics.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    const FILE_NAME: &'static str = "local_storage.json";

    /// Open (or lazily create) the store inside `dir`.
    ///
    /// A missing file starts empty. A corrupt file is logged and treated as
    /// empty; it is overwritten on the next write.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable storage file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Open the store in `FARCHAT_DATA_DIR`, or `./.farchat` when unset
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var("FARCHAT_DATA_DIR").unwrap_or_else(|_| ".farchat".into());
        Self::open(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let result = serde_json::to_vec_pretty(entries)
            .map_err(crate::FarchatError::from)
            .and_then(|bytes| std::fs::write(&self.path, bytes).map_err(Into::into));

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist storage");
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

/// Non-negative integer counter under a fixed key
#[derive(Clone)]
pub struct GuestCounterStore {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
}

impl GuestCounterStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, GUEST_QUERIES_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self { store, key }
    }

    /// Stored count; 0 when absent or not a non-negative integer
    pub fn read(&self) -> u32 {
        let Some(raw) = self.store.get(self.key) else {
            return 0;
        };

        raw.trim().parse().unwrap_or_else(|_| {
            tracing::debug!(key = self.key, value = %raw, "Ignoring unparsable guest counter");
            0
        })
    }

    pub fn write(&self, count: u32) {
        self.store.set(self.key, &count.to_string());
    }
}

/// Presence-only flag under a fixed key, meant for a session-scoped store
#[derive(Clone)]
pub struct DismissalStore {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
}

impl DismissalStore {
    pub fn new(session: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(session, STICKY_CTA_DISMISSED_KEY)
    }

    pub fn with_key(session: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self { store: session, key }
    }

    pub fn is_dismissed(&self) -> bool {
        self.store.get(self.key).is_some()
    }

    pub fn dismiss(&self) {
        self.store.set(self.key, "true");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_counter_reads_back_written_values() {
        let counter = GuestCounterStore::new(memory());
        for n in [0, 1, 5, 6, 1_000, u32::MAX] {
            counter.write(n);
            assert_eq!(counter.read(), n);
        }
    }

    #[test]
    fn test_counter_absent_is_zero() {
        let counter = GuestCounterStore::new(memory());
        assert_eq!(counter.read(), 0);
    }

    #[test]
    fn test_counter_corrupt_is_zero() {
        let store = memory();
        let counter = GuestCounterStore::new(store.clone());

        for junk in ["abc", "", "-3", "4.5", "NaN"] {
            store.set(GUEST_QUERIES_KEY, junk);
            assert_eq!(counter.read(), 0, "value {junk:?}");
        }
    }

    #[test]
    fn test_counter_uses_fixed_key() {
        let store = memory();
        GuestCounterStore::new(store.clone()).write(3);
        assert_eq!(store.get("farchat_guest_queries").as_deref(), Some("3"));
    }

    #[test]
    fn test_dismissal_is_per_session() {
        let session = memory();
        let flag = DismissalStore::new(session.clone());
        assert!(!flag.is_dismissed());

        flag.dismiss();
        assert!(flag.is_dismissed());
        assert!(session.get(STICKY_CTA_DISMISSED_KEY).is_some());

        // A fresh session starts undismissed
        let next_session = DismissalStore::new(memory());
        assert!(!next_session.is_dismissed());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();

        {
            let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(tmp.path()).unwrap());
            GuestCounterStore::new(store).write(4);
        }

        let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(tmp.path()).unwrap());
        assert_eq!(GuestCounterStore::new(reopened).read(), 4);
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("local_storage.json"), "{not json").unwrap();

        let store = JsonFileStore::open(tmp.path()).unwrap();
        assert_eq!(store.get(GUEST_QUERIES_KEY), None);

        store.set(GUEST_QUERIES_KEY, "2");
        let reopened = JsonFileStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get(GUEST_QUERIES_KEY).as_deref(), Some("2"));
    }
}
