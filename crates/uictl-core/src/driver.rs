//! Automation driver trait for backend-agnostic UI automation.
//!
//! This module defines the [`AutomationDriver`] trait, the contract consumed
//! from the UI tree provider: a tree query returning the current
//! [`ScreenDump`] and a synthetic-input primitive that taps a screen
//! coordinate. Everything above this trait (lookup, retry, scheduling) works
//! with any backend without knowing its implementation details.
//!
//! Drivers are never called directly from caller tasks; they are owned by a
//! [`UiContext`](crate::ui_context::UiContext), which serializes every query
//! and tap onto a single execution context.

use async_trait::async_trait;
use thiserror::Error;

use crate::element::ScreenDump;
use crate::snapshot::UiSnapshot;

/// Errors that can occur during automation driver operations.
///
/// This enum unifies errors from all backends behind a single type,
/// allowing consumers to handle errors uniformly regardless of the
/// underlying tree provider.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The backend is not available, or the UI context has shut down.
    #[error("Not connected to automation backend")]
    NotConnected,

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl DriverError {
    /// Returns true if retrying the same query later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DriverError::NotConnected)
    }
}

/// Trait for a live UI surface that can be inspected and tapped.
///
/// Implementors provide the two primitives the handler needs. The tree the
/// backend exposes mutates continuously, so every call to
/// [`dump_tree`](AutomationDriver::dump_tree) must reflect the screen at the
/// time of the call.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Get the current window stack and element hierarchy.
    async fn dump_tree(&self) -> Result<ScreenDump, DriverError>;

    /// Perform a synthetic tap at screen coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - The x-coordinate in screen pixels
    /// * `y` - The y-coordinate in screen pixels
    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError>;

    /// Take an immutable snapshot of the current tree.
    ///
    /// The default implementation calls [`dump_tree`](Self::dump_tree) and
    /// flattens the result.
    async fn snapshot(&self) -> Result<UiSnapshot, DriverError> {
        let dump = self.dump_tree().await?;
        Ok(UiSnapshot::from_dump(dump))
    }
}
