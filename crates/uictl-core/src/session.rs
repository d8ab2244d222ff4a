//! Session state for a hosted command handler.
//!
//! This module provides the [`Session`] type, the hosting scope commands run
//! in. A session:
//!
//! - Owns the cancellation scope for delayed taps; ending the session
//!   cancels every tap that has not fired yet
//! - Keeps an in-memory ring buffer of recent [`CommandLog`] entries
//! - Broadcasts [`SessionEvent`]s to subscribers (e.g. IPC watchers)
//!
//! Nothing is persisted; a session's state disappears with it.
//!
//! # Example
//!
//! ```no_run
//! use uictl_core::session::Session;
//! use uictl_core::command::{Command, CommandResult};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = Session::new("default");
//!     let mut rx = session.subscribe();
//!
//!     session.log_command(
//!         Command::CancelNotification { tag: "sync".to_string() },
//!         CommandResult::Success,
//!         None,
//!     ).await;
//! }
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::command::{Command, CommandLog, CommandResult};
use crate::ipc::uictl_dir;

/// Maximum number of command log entries to retain in the ring buffer.
const MAX_COMMAND_LOG_SIZE: usize = 1000;

/// Returns the logs directory path (`~/.uictl/logs/`), used for tracing output.
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir() -> PathBuf {
    let dir = uictl_dir().join("logs");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Events broadcast to subscribers when session state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A command finished and was logged.
    CommandLogged(CommandLog),

    /// The session has ended; pending delayed taps were cancelled.
    Ended {
        /// The identifier of the session that ended.
        session_id: Uuid,
    },
}

/// Shared state of one hosting session.
///
/// Sessions are created via [`Session::new`], which returns an `Arc<Session>`
/// for safe sharing across async tasks.
pub struct Session {
    /// The unique identifier for this session.
    pub id: Uuid,

    /// Name the session is served under.
    pub name: String,

    /// When this session was created.
    pub created_at: DateTime<Utc>,

    /// Ring buffer of command log entries (private, access via methods).
    command_log: RwLock<VecDeque<CommandLog>>,

    /// Broadcast channel for session events.
    event_tx: broadcast::Sender<SessionEvent>,

    /// Cancelled when the session ends.
    cancel_token: CancellationToken,
}

impl Session {
    /// Creates a new session.
    pub fn new(name: &str) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            command_log: RwLock::new(VecDeque::with_capacity(MAX_COMMAND_LOG_SIZE)),
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribes to session events.
    ///
    /// Broadcast receivers may miss events if they lag too far behind.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// A token cancelled when this session ends.
    ///
    /// Work scoped to the session (such as delayed taps) should hold a child
    /// of this token.
    pub fn scope(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Returns whether [`end`](Self::end) has been called.
    pub fn is_ended(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Ends the session, cancelling all session-scoped work.
    pub fn end(&self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        self.cancel_token.cancel();
        // Ignore send errors - no subscribers is expected
        let _ = self.event_tx.send(SessionEvent::Ended { session_id: self.id });
    }

    /// Logs a command and broadcasts it to subscribers.
    ///
    /// When the ring buffer is full, the oldest entry is removed.
    pub async fn log_command(
        &self,
        command: Command,
        result: CommandResult,
        duration_ms: Option<u64>,
    ) -> CommandLog {
        let log = CommandLog::new(command, result, duration_ms);

        {
            let mut command_log = self.command_log.write().await;
            if command_log.len() >= MAX_COMMAND_LOG_SIZE {
                command_log.pop_front();
            }
            command_log.push_back(log.clone());
        }

        let _ = self.event_tx.send(SessionEvent::CommandLogged(log.clone()));

        log
    }

    /// Returns all command log entries in chronological order.
    pub async fn get_command_log(&self) -> Vec<CommandLog> {
        self.command_log.read().await.iter().cloned().collect()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("command_log", &"<RwLock<VecDeque<CommandLog>>>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}
