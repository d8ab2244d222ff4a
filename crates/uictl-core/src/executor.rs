//! Command execution for the handler's serialized surface.
//!
//! [`CommandExecutor`] takes a [`Command`] value (as delivered by the IPC
//! layer), runs it through the [`CommandHandler`], records it in the
//! session's command log and converts the outcome into an
//! [`ExecutionResult`]. It keeps transport code free of handler details.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uictl_core::command::Command;
//! use uictl_core::config::UictlConfig;
//! use uictl_core::executor::CommandExecutor;
//! use uictl_core::fixture::FixtureDriver;
//! use uictl_core::handler::CommandHandler;
//! use uictl_core::presenter::TracingPresenter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = CommandHandler::new(
//!         Arc::new(FixtureDriver::empty()),
//!         Arc::new(TracingPresenter::new()),
//!         UictlConfig::default(),
//!         "default",
//!     );
//!     let executor = CommandExecutor::new(Arc::new(handler));
//!
//!     let result = executor.execute(Command::ClickDelay { x: 10, y: 20, delay_millis: 500 }).await;
//!     assert!(result.success);
//! }
//! ```

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::command::{Command, CommandResult};
use crate::error::CommandError;
use crate::handler::CommandHandler;

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Whether the command completed successfully.
    pub success: bool,
    /// Human-readable description of the result.
    pub message: String,
    /// Stable error code when `success` is false.
    pub error_code: Option<String>,
    /// Structured data returned by the command.
    pub data: Option<Value>,
}

impl ExecutionResult {
    /// Creates a successful result with a message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            data: None,
        }
    }

    /// Creates a failure result from a command error.
    pub fn failure(error: &CommandError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            error_code: Some(error.code().to_string()),
            data: None,
        }
    }

    /// Adds data to the result.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Executes [`Command`]s against a shared [`CommandHandler`].
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    handler: Arc<CommandHandler>,
}

impl CommandExecutor {
    pub fn new(handler: Arc<CommandHandler>) -> Self {
        Self { handler }
    }

    /// Returns a reference to the underlying handler.
    pub fn handler(&self) -> &Arc<CommandHandler> {
        &self.handler
    }

    /// Executes a command, logs it to the current session and returns the result.
    pub async fn execute(&self, command: Command) -> ExecutionResult {
        let span = info_span!("execute_command", command = command.name());
        async {
            let start = Instant::now();
            let outcome = self.execute_inner(&command).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            debug!(elapsed_ms, success = outcome.is_ok(), "command complete");

            let (result, log_result) = match outcome {
                Ok(result) => (result, CommandResult::Success),
                Err(e) => (
                    ExecutionResult::failure(&e),
                    CommandResult::Failure {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                ),
            };
            self.handler
                .session()
                .await
                .log_command(command, log_result, Some(elapsed_ms))
                .await;
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, command: &Command) -> Result<ExecutionResult, CommandError> {
        let handler = &self.handler;
        match command {
            Command::ShowShortToast { message } => {
                handler.show_short_toast(message)?;
                Ok(ExecutionResult::success("Short toast queued"))
            }
            Command::ShowLongToast { message } => {
                handler.show_long_toast(message)?;
                Ok(ExecutionResult::success("Long toast queued"))
            }
            Command::ShowDialog { title, message, positive_label } => {
                handler.show_dialog(title.as_deref(), message, positive_label.as_deref())?;
                Ok(ExecutionResult::success("Dialog queued"))
            }
            Command::ShowNotification { tag, title, message, important } => {
                handler.show_notification(tag, title, message, *important).await?;
                Ok(ExecutionResult::success(format!("Notification '{}' posted", tag)))
            }
            Command::CancelNotification { tag } => {
                handler.cancel_notification(tag).await?;
                Ok(ExecutionResult::success(format!("Notification '{}' cancelled", tag)))
            }
            Command::FindAndClickViewByText { text, scope } => {
                let outcome = handler.find_and_click_view_by_text(text, scope.as_deref()).await?;
                Ok(ExecutionResult::success(format!(
                    "Clicked element with text '{}' at ({}, {})",
                    text, outcome.x, outcome.y
                ))
                .with_data(json!(outcome)))
            }
            Command::FindAndClickViewById { id, scope } => {
                let outcome = handler.find_and_click_view_by_id(id, scope.as_deref()).await?;
                Ok(ExecutionResult::success(format!(
                    "Clicked element '{}' at ({}, {})",
                    id, outcome.x, outcome.y
                ))
                .with_data(json!(outcome)))
            }
            Command::ClickDelay { x, y, delay_millis } => {
                let tap = handler.click_delay(*x, *y, *delay_millis).await?;
                Ok(ExecutionResult::success(format!(
                    "Tap at ({}, {}) scheduled in {}ms",
                    x, y, tap.delay_ms
                ))
                .with_data(json!(tap)))
            }
        }
    }
}
