/*!
 * Keyed Lock Handles
 *
 * RAII token for one acquisition attempt on a keyed lock
 */

use super::traits::{Guard, GuardDrop};
use super::GuardMetadata;
use crate::core::errors::{LockError, LockResult};
use crate::core::sync::{LockKey, LockTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, error, warn};

/// Which side of the reader-writer lock a handle asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Read,
    Write,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Resource name recorded in guard metadata
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Read => "keyed_read_lock",
            Self::Write => "keyed_write_lock",
        }
    }
}

/// Granted session on the underlying lock
pub(crate) enum Session {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

impl Session {
    pub(crate) fn kind(&self) -> LockKind {
        match self {
            Self::Read(_) => LockKind::Read,
            Self::Write(_) => LockKind::Write,
        }
    }
}

/// Handle for one keyed lock request
///
/// A handle is materialized as soon as the table entry is reserved, so the
/// reservation is returned on every exit path: explicit [`Guard::release`],
/// drop after a successful grant, drop after a timeout, or the acquiring
/// future being dropped mid-wait.
///
/// # Release order
///
/// The table entry is decremented first (evicting it at zero), then the
/// session, if one was granted, is released on the lock.
pub struct LockHandle<K: LockKey> {
    kind: LockKind,
    key: K,
    table: Arc<LockTable<K>>,
    session: Option<Session>,
    released: bool,
    granted_at: Option<Instant>,
    slow_hold_threshold: Duration,
    metadata: GuardMetadata,
}

impl<K: LockKey> LockHandle<K> {
    /// Reserve a table entry for `key` and return the handle owning it
    /// together with the lock to acquire.
    pub(crate) fn reserve(
        table: Arc<LockTable<K>>,
        key: K,
        kind: LockKind,
        slow_hold_threshold: Duration,
    ) -> (Self, Arc<RwLock<()>>) {
        let lock = table.get_or_create(&key);
        let handle = Self {
            kind,
            key,
            table,
            session: None,
            released: false,
            granted_at: None,
            slow_hold_threshold,
            metadata: GuardMetadata::new(kind.resource_type()),
        };
        (handle, lock)
    }

    /// Attach the granted session
    pub(crate) fn grant(&mut self, session: Session) {
        debug_assert_eq!(session.kind(), self.kind);
        debug_assert!(self.session.is_none(), "handle granted twice");
        self.session = Some(session);
        self.granted_at = Some(Instant::now());
    }

    /// Lock type this handle was requested for
    #[inline]
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether the underlying lock is currently held through this handle
    #[inline]
    pub fn is_granted(&self) -> bool {
        self.session.is_some()
    }

    /// How long the lock has been held, `None` if it was never granted
    pub fn held_for(&self) -> Option<Duration> {
        self.granted_at.map(|at| at.elapsed())
    }

    fn log_hold(&self) {
        let Some(held) = self.held_for() else {
            return;
        };
        if held > self.slow_hold_threshold {
            warn!(
                key = ?self.key,
                kind = self.kind.as_str(),
                held_ms = u64::try_from(held.as_millis()).unwrap_or(u64::MAX),
                slow = true,
                "slow keyed lock hold"
            );
        } else {
            debug!(
                key = ?self.key,
                kind = self.kind.as_str(),
                held_us = u64::try_from(held.as_micros()).unwrap_or(u64::MAX),
                "keyed lock released"
            );
        }
    }
}

impl<K: LockKey> Guard for LockHandle<K> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        !self.released
    }

    fn release(&mut self) -> LockResult<()> {
        if self.released {
            return Err(LockError::AlreadyReleased {
                key: format!("{:?}", self.key),
            });
        }
        self.released = true;

        let outcome = self.table.release(&self.key);
        self.log_hold();
        drop(self.session.take());
        outcome
    }
}

impl<K: LockKey> GuardDrop for LockHandle<K> {
    fn on_drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            error!(key = ?self.key, error = %e, "keyed lock bookkeeping violated");
            if !std::thread::panicking() {
                debug_assert!(false, "keyed lock bookkeeping violated: {e}");
            }
        }
    }
}

impl<K: LockKey> Drop for LockHandle<K> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl<K: LockKey> fmt::Debug for LockHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("granted", &self.is_granted())
            .field("released", &self.released)
            .finish()
    }
}
