/*!
 * Keyed Reader-Writer Locker
 *
 * Independent reader-writer locks addressed by key, created on demand and
 * evicted once no request references them.
 *
 * # Timeouts
 *
 * - `Infinite`: wait until granted
 * - `Immediate`: one non-blocking attempt
 * - `After(d)`: the pending acquire is dropped when `d` elapses
 *
 * A timed-out request is not an error. It returns `None` after giving back its
 * table reservation.
 */

use super::config::LockerConfig;
use super::table::{LockKey, LockTable};
use crate::core::guard::{Guard, LockHandle, LockKind, Session, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Counters {
    read_grants: AtomicU64,
    write_grants: AtomicU64,
    timeouts: AtomicU64,
}

/// Snapshot of locker activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockerStats {
    pub read_grants: u64,
    pub write_grants: u64,
    /// Attempts that gave up before the lock was granted
    pub timeouts: u64,
    /// Keys with at least one in-flight request
    pub active_keys: usize,
}

/// Registry of per-key reader-writer locks
///
/// Cloning is cheap and clones share the same table.
///
/// # Example
///
/// ```ignore
/// let locker: KeyedLocker = KeyedLocker::new();
///
/// let read = locker.read_lock("invoice-42", TimeoutPolicy::Infinite).await;
/// assert!(locker.write_lock("invoice-42", Duration::ZERO).await.is_none());
/// drop(read);
/// assert!(locker.write_lock("invoice-42", Duration::ZERO).await.is_some());
/// ```
pub struct KeyedLocker<K: LockKey = String> {
    table: Arc<LockTable<K>>,
    config: LockerConfig,
    counters: Arc<Counters>,
}

impl<K: LockKey> KeyedLocker<K> {
    pub fn new() -> Self {
        Self::with_config(LockerConfig::default())
    }

    pub fn with_config(config: LockerConfig) -> Self {
        Self {
            table: Arc::new(LockTable::with_capacity(config.initial_capacity)),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    /// Acquire a shared lock on `key`
    ///
    /// Returns `None` if the timeout policy gave up before the lock was granted.
    pub async fn read_lock(
        &self,
        key: impl Into<K>,
        timeout: impl Into<TimeoutPolicy>,
    ) -> Option<LockHandle<K>> {
        self.acquire(key.into(), LockKind::Read, timeout.into()).await
    }

    /// Acquire an exclusive lock on `key`
    ///
    /// Returns `None` if the timeout policy gave up before the lock was granted.
    pub async fn write_lock(
        &self,
        key: impl Into<K>,
        timeout: impl Into<TimeoutPolicy>,
    ) -> Option<LockHandle<K>> {
        self.acquire(key.into(), LockKind::Write, timeout.into()).await
    }

    /// [`read_lock`](Self::read_lock) with the configured default timeout
    pub async fn read(&self, key: impl Into<K>) -> Option<LockHandle<K>> {
        self.acquire(key.into(), LockKind::Read, self.config.default_timeout)
            .await
    }

    /// [`write_lock`](Self::write_lock) with the configured default timeout
    pub async fn write(&self, key: impl Into<K>) -> Option<LockHandle<K>> {
        self.acquire(key.into(), LockKind::Write, self.config.default_timeout)
            .await
    }

    #[instrument(level = "debug", skip(self, kind), fields(kind = kind.as_str()))]
    async fn acquire(&self, key: K, kind: LockKind, timeout: TimeoutPolicy) -> Option<LockHandle<K>> {
        // The reservation lives in the handle from here on, so dropping this
        // future mid-wait still returns it.
        let (mut handle, lock) = LockHandle::reserve(
            self.table.clone(),
            key,
            kind,
            self.config.slow_hold_threshold,
        );

        let session = match timeout {
            TimeoutPolicy::Infinite => Some(lock_session(lock, kind).await),
            TimeoutPolicy::Immediate => try_session(lock, kind),
            TimeoutPolicy::After(limit) => tokio::time::timeout(limit, lock_session(lock, kind))
                .await
                .ok(),
        };

        match session {
            Some(session) => {
                handle.grant(session);
                let counter = match kind {
                    LockKind::Read => &self.counters.read_grants,
                    LockKind::Write => &self.counters.write_grants,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(
                    waited_us = handle.metadata().lifetime_micros(),
                    "keyed lock granted"
                );
                Some(handle)
            }
            None => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(policy = timeout.category(), "keyed lock not acquired");
                None
            }
        }
    }

    /// Whether any request for `key` is in flight
    pub fn is_tracked(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// In-flight requests (waiting or granted) for `key`
    pub fn pending(&self, key: &K) -> usize {
        self.table.ref_count(key).unwrap_or(0)
    }

    /// Number of keys with at least one in-flight request
    pub fn active_keys(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> LockerStats {
        LockerStats {
            read_grants: self.counters.read_grants.load(Ordering::Relaxed),
            write_grants: self.counters.write_grants.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            active_keys: self.table.len(),
        }
    }
}

impl<K: LockKey> Default for KeyedLocker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LockKey> Clone for KeyedLocker<K> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            config: self.config.clone(),
            counters: self.counters.clone(),
        }
    }
}

async fn lock_session(lock: Arc<RwLock<()>>, kind: LockKind) -> Session {
    match kind {
        LockKind::Read => Session::Read(lock.read_owned().await),
        LockKind::Write => Session::Write(lock.write_owned().await),
    }
}

fn try_session(lock: Arc<RwLock<()>>, kind: LockKind) -> Option<Session> {
    match kind {
        LockKind::Read => lock.try_read_owned().ok().map(Session::Read),
        LockKind::Write => lock.try_write_owned().ok().map(Session::Write),
    }
}
