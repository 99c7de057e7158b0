/*!
 * Acquisition Timeout Policy
 *
 * Three-way timeout model for lock acquisition:
 *
 * - **Infinite**: wait until granted
 * - **Immediate**: single non-blocking attempt
 * - **After(d)**: wait at most `d`, then cancel the pending acquire
 *
 * ## Example
 *
 * ```ignore
 * locker.read_lock("key", TimeoutPolicy::Infinite).await;
 * locker.read_lock("key", Duration::ZERO).await;            // Immediate
 * locker.read_lock("key", Duration::from_millis(20)).await; // After(20ms)
 * locker.read_lock("key", None::<Duration>).await;          // Infinite
 * ```
 */

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout policy for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "duration", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// No timeout (infinite wait)
    #[default]
    Infinite,

    /// Fail instantly unless the lock is free right now
    Immediate,

    /// Give up once the duration elapses
    After(Duration),
}

impl TimeoutPolicy {
    /// Build a policy from a duration, folding the edge values
    ///
    /// `Duration::ZERO` means a non-blocking attempt and `Duration::MAX` means
    /// no timeout at all.
    pub const fn from_duration(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else if duration.as_secs() == u64::MAX && duration.subsec_nanos() == 999_999_999 {
            Self::Infinite
        } else {
            Self::After(duration)
        }
    }

    /// Get timeout category as string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Infinite => "infinite",
            Self::Immediate => "immediate",
            Self::After(_) => "bounded",
        }
    }
}

impl From<Duration> for TimeoutPolicy {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl From<Option<Duration>> for TimeoutPolicy {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Infinite, Self::from_duration)
    }
}
