//! Error taxonomy for handler commands.

use thiserror::Error;

use crate::driver::DriverError;

/// Why a single command failed.
///
/// Failures are always scoped to the command that produced them; nothing
/// here is fatal to the hosting process.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The locator found no match within the retry budget.
    #[error("No element matching {criterion} after {attempts} attempts in {elapsed_ms}ms")]
    ElementNotFound {
        criterion: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// Strict matching was requested and more than one element matched.
    #[error("{count} elements match {criterion}, expected exactly one")]
    AmbiguousMatch { criterion: String, count: usize },

    /// The derived tap point cannot be reached.
    #[error("Unreachable target: {0}")]
    UnreachableTarget(String),

    /// A required argument was missing, null, empty or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The UI tree provider or its execution context failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CommandError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::ElementNotFound { .. } => "element_not_found",
            CommandError::AmbiguousMatch { .. } => "ambiguous_match",
            CommandError::UnreachableTarget(_) => "unreachable_target",
            CommandError::InvalidArgument(_) => "invalid_argument",
            CommandError::Driver(_) => "driver_error",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidArgument(message.into())
    }
}

/// Rejects empty or whitespace-only required string arguments.
pub(crate) fn require_non_blank(name: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        return Err(CommandError::invalid(format!("{} must not be empty", name)));
    }
    Ok(())
}
