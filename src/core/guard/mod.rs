/*!
 * RAII Lock Guards
 *
 * Handles returned by the keyed locker, with exactly-once cleanup.
 *
 * ## Design Principles
 *
 * 1. **Reservation first**: A handle exists from the moment a table entry is
 *    reserved, before the underlying lock is granted
 * 2. **Exactly once**: Explicit release and drop share one release path
 * 3. **Observable**: Hold times are measured and slow holds are logged
 *
 * ## Example
 *
 * ```ignore
 * let locker = KeyedLocker::new();
 * if let Some(handle) = locker.write_lock("orders", Duration::from_millis(50)).await {
 *     // Exclusive section for "orders"
 * } // Released on drop
 * ```
 */

mod handle;
mod timeout;
mod traits;

pub use handle::{LockHandle, LockKind};
pub(crate) use handle::Session;
pub use timeout::TimeoutPolicy;
pub use traits::{Guard, GuardDrop};

use std::time::{Duration, Instant};

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime(&self) -> Duration {
        self.creation_time.elapsed()
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        u64::try_from(self.lifetime().as_micros()).unwrap_or(u64::MAX)
    }
}
