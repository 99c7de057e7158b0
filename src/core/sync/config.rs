/*!
 * Locker Configuration
 *
 * Runtime configuration for the keyed locker
 */

use crate::core::guard::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the default acquire timeout in milliseconds
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "KEYED_RWLOCK_DEFAULT_TIMEOUT_MS";

/// Environment variable holding the slow-hold warning threshold in milliseconds
pub const ENV_SLOW_HOLD_MS: &str = "KEYED_RWLOCK_SLOW_HOLD_MS";

/// Keyed locker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Policy used by `read`/`write` when no timeout is given
    pub default_timeout: TimeoutPolicy,
    /// Pre-sized key capacity of the lock table
    pub initial_capacity: usize,
    /// Holds longer than this are logged as warnings
    pub slow_hold_threshold: Duration,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            default_timeout: TimeoutPolicy::Infinite,
            initial_capacity: 64,
            slow_hold_threshold: Duration::from_millis(100),
        }
    }
}

impl LockerConfig {
    /// Configuration where default acquisitions never wait
    pub const fn try_only() -> Self {
        Self {
            default_timeout: TimeoutPolicy::Immediate,
            initial_capacity: 64,
            slow_hold_threshold: Duration::from_millis(100),
        }
    }

    /// Configuration where default acquisitions wait at most `timeout`
    pub const fn bounded(timeout: Duration) -> Self {
        Self {
            default_timeout: TimeoutPolicy::from_duration(timeout),
            initial_capacity: 64,
            slow_hold_threshold: Duration::from_millis(100),
        }
    }

    /// Defaults overridden by `KEYED_RWLOCK_*` environment variables
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_millis(ENV_DEFAULT_TIMEOUT_MS) {
            config.default_timeout = TimeoutPolicy::from_duration(ms);
        }
        if let Some(ms) = env_millis(ENV_SLOW_HOLD_MS) {
            config.slow_hold_threshold = ms;
        }
        config
    }

    pub fn with_default_timeout(mut self, timeout: impl Into<TimeoutPolicy>) -> Self {
        self.default_timeout = timeout.into();
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_slow_hold_threshold(mut self, threshold: Duration) -> Self {
        self.slow_hold_threshold = threshold;
        self
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
