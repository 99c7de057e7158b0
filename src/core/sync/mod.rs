/*!
 * Synchronization Primitives
 *
 * Async locking primitives for task-based code:
 * - Keyed reader-writer locks with reference-counted lifecycle
 * - Reentrant mutex scoped to a call chain
 *
 * # Architecture
 *
 * `KeyedLocker` is a facade over a `LockTable`, which maps each key to a
 * shared `tokio::sync::RwLock<()>` for as long as a request for that key is in
 * flight. Every request reserves its table entry before waiting and returns
 * it through its `LockHandle`, whatever the outcome.
 *
 * `ReentrantMutex` is independent of the table. It chains one-permit
 * semaphores through a task-local so that nested calls never wait on a gate
 * their own call chain holds.
 */

mod config;
mod locker;
mod reentrant;
mod table;

pub use config::{LockerConfig, ENV_DEFAULT_TIMEOUT_MS, ENV_SLOW_HOLD_MS};
pub use locker::{KeyedLocker, LockerStats};
pub use reentrant::ReentrantMutex;
pub use table::{LockKey, LockTable};
