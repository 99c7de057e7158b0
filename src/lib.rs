/*!
 * Keyed RwLock Library
 * Per-key async reader-writer locks and a reentrant async mutex
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{LockError, LockResult};
pub use crate::core::guard::{Guard, LockHandle, LockKind, TimeoutPolicy};
pub use crate::core::sync::{KeyedLocker, LockKey, LockerConfig, LockerStats, ReentrantMutex};
pub use monitoring::init_tracing;
