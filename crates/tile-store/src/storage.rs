use crate::entry::StoredResponse;
use crate::expiry::is_expired;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A single named response store: request key → stored response.
///
/// One entry per key; `put` overwrites. Each operation takes the lock for
/// exactly one key access, so single-key reads and writes are atomic. There
/// is no cross-key transaction — a sweep enumerating keys and a concurrent
/// `put` on one of them resolves last-write-wins.
#[derive(Default)]
pub struct TileStore {
    entries: RwLock<HashMap<String, Arc<StoredResponse>>>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key. Clones the `Arc`, not the body.
    pub fn match_key(&self, key: &str) -> Option<Arc<StoredResponse>> {
        self.entries.read().get(key).cloned()
    }

    /// Write an entry, replacing any previous entry under the same key.
    pub fn put(&self, key: String, response: StoredResponse) {
        self.entries.write().insert(key, Arc::new(response));
    }

    /// Delete an entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Snapshot of all keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Registry of named stores, opened lazily (the `caches` object of this
/// component). Handlers reopen their store by name on every event rather
/// than holding one across events.
#[derive(Default)]
pub struct CacheStorage {
    stores: RwLock<HashMap<String, Arc<TileStore>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a named store, creating it on first use. Repeated opens of the
    /// same name return the same store.
    pub fn open(&self, name: &str) -> Arc<TileStore> {
        if let Some(store) = self.stores.read().get(name) {
            return Arc::clone(store);
        }
        let mut stores = self.stores.write();
        // Second lookup under the write lock: another task may have
        // created the store between lock acquisitions.
        Arc::clone(
            stores
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TileStore::new())),
        )
    }

    pub fn has(&self, name: &str) -> bool {
        self.stores.read().contains_key(name)
    }
}

/// One-shot purge sweep: enumerate all keys and delete every entry whose
/// expiration is at or before `now`.
///
/// The verdict for each key comes from re-reading that key, not from the
/// enumeration snapshot, so an entry refreshed mid-sweep survives. Entries
/// with no parseable expiration are left untouched, and a key that
/// disappears between enumeration and lookup is skipped. Returns the number
/// of entries deleted.
pub fn purge_expired(store: &TileStore, now: DateTime<Utc>) -> usize {
    let mut purged = 0;
    for key in store.keys() {
        let Some(entry) = store.match_key(&key) else {
            continue;
        };
        if is_expired(&entry, now) {
            tracing::debug!(key = %key, "purging expired entry");
            if store.delete(&key) {
                purged += 1;
            }
        }
    }
    purged
}
