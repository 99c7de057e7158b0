/*!
 * Guard Traits
 *
 * Core abstractions for RAII lock guards
 */

use super::GuardMetadata;
use crate::core::errors::LockResult;

/// Core guard trait
///
/// All guards must implement this to provide:
/// - Resource type identification
/// - Metadata access
/// - Manual release capability
pub trait Guard: Send {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get guard metadata
    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard still holds its reservation
    fn is_active(&self) -> bool;

    /// Manually release the resource
    ///
    /// Returns `Err` if already released
    fn release(&mut self) -> LockResult<()>;
}

/// Guards that run cleanup from `Drop`
///
/// Separates Drop logic for better testability and observability
pub trait GuardDrop: Guard {
    /// Perform cleanup on drop
    ///
    /// # Panics
    ///
    /// Should NOT panic in release builds. Log errors instead.
    fn on_drop(&mut self);
}
