/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Errors raised by the keyed locker and the reentrant mutex
///
/// Acquisition timeouts are not errors: they surface as `None` from
/// [`KeyedLocker`](crate::core::sync::KeyedLocker). Everything here is either a
/// bookkeeping violation or a closed gate.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LockError {
    #[error("Lock handle for key {key} already released")]
    #[diagnostic(
        code(lock::already_released),
        help("A handle may be released once, either explicitly or by dropping it.")
    )]
    AlreadyReleased { key: String },

    #[error("No lock table entry for key {0}")]
    #[diagnostic(
        code(lock::unknown_key),
        help("Every release must match an earlier reservation. This is a bookkeeping bug.")
    )]
    UnknownKey(String),

    #[error("Reentrant gate closed before it could be acquired")]
    #[diagnostic(
        code(lock::gate_closed),
        help("A nested call outlived the run_exclusive call that installed its gate. Await spawned children before the body returns.")
    )]
    GateClosed,
}

impl From<tokio::sync::AcquireError> for LockError {
    fn from(_: tokio::sync::AcquireError) -> Self {
        LockError::GateClosed
    }
}
