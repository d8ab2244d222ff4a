//! Command types and logging for automation operations.
//!
//! This module defines the commands a caller can send to the handler, along
//! with the [`CommandLog`] type for recording executed commands.
//!
//! # Command Types
//!
//! - **Presentation**: [`Command::ShowShortToast`], [`Command::ShowLongToast`], [`Command::ShowDialog`]
//! - **Notifications**: [`Command::ShowNotification`], [`Command::CancelNotification`]
//! - **Find then act**: [`Command::FindAndClickViewByText`], [`Command::FindAndClickViewById`]
//! - **Coordinates**: [`Command::ClickDelay`]
//!
//! # Example
//!
//! ```
//! use uictl_core::command::{Command, CommandLog, CommandResult};
//!
//! let command = Command::FindAndClickViewByText {
//!     text: "Allow".to_string(),
//!     scope: None,
//! };
//! assert_eq!(command.name(), "find_and_click_view_by_text");
//!
//! let log = CommandLog::new(command, CommandResult::Success, Some(120));
//! println!("Command {} at {}", log.id, log.timestamp);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The result of executing a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    /// The command completed successfully.
    Success,

    /// The command failed with the given error code and message.
    Failure { code: String, message: String },
}

/// Commands accepted by the handler.
///
/// Commands are serialized as JSON with a `type` tag discriminator for
/// IPC transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Show a brief transient message.
    ShowShortToast {
        /// Any non-null value; strings are shown verbatim, others as JSON.
        message: Value,
    },

    /// Show a transient message for longer.
    ShowLongToast { message: Value },

    /// Show a modal prompt without waiting for the user.
    ShowDialog {
        #[serde(default)]
        title: Option<String>,
        message: String,
        /// Label of the affirmative button.
        #[serde(default)]
        positive_label: Option<String>,
    },

    /// Post or replace the notification identified by `tag`.
    ShowNotification {
        tag: String,
        title: String,
        message: String,
        /// High-visibility channel when true.
        important: bool,
    },

    /// Remove the notification identified by `tag`, if any.
    CancelNotification { tag: String },

    /// Find an element by text and tap it.
    FindAndClickViewByText {
        text: String,
        /// Optional component restricting the search.
        #[serde(default)]
        scope: Option<String>,
    },

    /// Find an element by resource id and tap it.
    FindAndClickViewById {
        id: String,
        #[serde(default)]
        scope: Option<String>,
    },

    /// Tap fixed coordinates after a delay.
    ClickDelay { x: i32, y: i32, delay_millis: i64 },
}

impl Command {
    /// Returns a short, static name for this command suitable for use in
    /// tracing span metadata. Avoids Debug-formatting large payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ShowShortToast { .. } => "show_short_toast",
            Command::ShowLongToast { .. } => "show_long_toast",
            Command::ShowDialog { .. } => "show_dialog",
            Command::ShowNotification { .. } => "show_notification",
            Command::CancelNotification { .. } => "cancel_notification",
            Command::FindAndClickViewByText { .. } => "find_and_click_view_by_text",
            Command::FindAndClickViewById { .. } => "find_and_click_view_by_id",
            Command::ClickDelay { .. } => "click_delay",
        }
    }
}

/// A logged command with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLog {
    /// Unique identifier for this log entry.
    pub id: Uuid,

    /// When the command finished.
    pub timestamp: DateTime<Utc>,

    /// The command that was executed.
    pub command: Command,

    /// The result of the command.
    pub result: CommandResult,

    /// How long the command took in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CommandLog {
    /// Creates a new log entry with a fresh UUID and the current time.
    pub fn new(command: Command, result: CommandResult, duration_ms: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            command,
            result,
            duration_ms,
        }
    }
}
