/*!
 * Core Module
 * Lock primitives, guards and error handling
 */

pub mod errors;
pub mod guard;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardDrop, LockHandle, LockKind, TimeoutPolicy};
pub use sync::{KeyedLocker, LockerConfig, LockerStats, ReentrantMutex};
