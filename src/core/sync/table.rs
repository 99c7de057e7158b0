/*!
 * Lock Table
 * Reference-counted registry of per-key reader-writer locks
 */

use crate::core::errors::{LockError, LockResult};
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// Bounds every lock key must satisfy
pub trait LockKey: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

impl<T> LockKey for T where T: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

struct TableEntry {
    ref_count: usize,
    lock: Arc<RwLock<()>>,
}

/// Map from key to a shared reader-writer lock
///
/// An entry exists exactly while at least one request for its key is in flight
/// (waiting or granted). Entries are created on first reservation and evicted
/// when the last reservation is returned, so the key space can be unbounded.
///
/// # Performance
///
/// - **Structural lock**: a single `parking_lot::Mutex`, held for one hash map
///   operation and never across an `.await`
/// - **Hasher**: ahash
pub struct LockTable<K> {
    entries: Mutex<HashMap<K, TableEntry, RandomState>>,
}

impl<K: LockKey> LockTable<K> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::new(),
            )),
        }
    }

    /// Reserve the entry for `key`, creating it if needed
    ///
    /// Must be paired with exactly one [`release`](Self::release).
    pub fn get_or_create(&self, key: &K) -> Arc<RwLock<()>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.ref_count += 1;
            return entry.lock.clone();
        }

        let lock = Arc::new(RwLock::new(()));
        entries.insert(
            key.clone(),
            TableEntry {
                ref_count: 1,
                lock: lock.clone(),
            },
        );
        trace!(key = ?key, "lock table entry created");
        lock
    }

    /// Return one reservation for `key`, evicting the entry at zero
    pub fn release(&self, key: &K) -> LockResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| LockError::UnknownKey(format!("{:?}", key)))?;

        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            entries.remove(key);
            trace!(key = ?key, "lock table entry evicted");
        }
        Ok(())
    }

    /// Outstanding reservations for `key`
    pub fn ref_count(&self, key: &K) -> Option<usize> {
        self.entries.lock().get(key).map(|entry| entry.ref_count)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of keys with at least one reservation
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K: LockKey> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
