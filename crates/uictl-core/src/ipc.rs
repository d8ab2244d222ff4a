//! Inter-process communication for the command handler.
//!
//! This module provides Unix socket-based IPC using a JSON-over-newlines protocol.
//! A server process runs an [`IpcServer`] in front of one [`CommandExecutor`];
//! callers (the CLI, scripts, watchers) connect using [`IpcClient`].
//!
//! # Protocol
//!
//! Communication uses a simple line-based JSON protocol:
//! - Each message is a single line of JSON followed by a newline
//! - Requests are sent from client to server using [`IpcRequest`]
//! - Responses are sent from server to client using [`IpcResponse`]
//! - A line that is not a valid request is answered with an
//!   `invalid_argument` error; the connection stays open
//!
//! # Socket Location
//!
//! Sockets are created in `~/.uictl/` (or `$UICTL_HOME`) with the naming
//! pattern `uictl_{session_name}.sock`. Use [`socket_path`] to get the path
//! for a session.
//!
//! # Example
//!
//! ```no_run
//! use uictl_core::command::Command;
//! use uictl_core::ipc::{IpcClient, IpcRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = IpcClient::connect("my-session").await.unwrap();
//!
//!     let response = client
//!         .send(&IpcRequest::Execute {
//!             command: Command::FindAndClickViewByText {
//!                 text: "Allow".to_string(),
//!                 scope: None,
//!             },
//!         })
//!         .await
//!         .unwrap();
//!     println!("Response: {:?}", response);
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandLog};
use crate::dispatcher::PendingTap;
use crate::executor::CommandExecutor;
use crate::fixture::FixtureDriver;
use crate::router::ActiveNotification;
use crate::session::SessionEvent;

/// Errors that can occur during IPC operations.
#[derive(Error, Debug)]
pub enum IpcError {
    /// An I/O error occurred (connection, read, write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server closed the connection before answering.
    #[error("Connection closed by server")]
    Closed,
}

/// A request sent from client to server over the IPC connection.
///
/// Requests are serialized as JSON with a `type` tag discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcRequest {
    /// Execute a handler command.
    Execute {
        /// The command to run.
        command: Command,
    },

    /// Subscribe to session events.
    ///
    /// After sending this request, the server will stream [`IpcResponse::Event`]
    /// messages whenever the session state changes.
    Subscribe,

    /// Request the current session state.
    GetState,

    /// Request the command log of the current session.
    GetLog,

    /// End the current session (dropping pending delayed taps) and start a new one.
    EndSession,

    /// Replace the fixture screen with the dump stored at `path`.
    LoadScreen {
        /// Path to a JSON screen dump, as seen by the server.
        path: String,
    },

    /// Stop the server.
    Shutdown,
}

/// A response sent from server to client over the IPC connection.
///
/// Responses are serialized as JSON with a `type` tag discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Result of a command execution.
    CommandResult {
        /// Whether the command succeeded.
        success: bool,
        /// Human-readable description of the result.
        message: String,
        /// Stable error code when `success` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        /// Additional data returned by the command.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },

    /// Current session state.
    State {
        /// The session's unique identifier.
        session_id: String,
        /// Notifications currently posted.
        notifications: Vec<ActiveNotification>,
        /// Delayed taps waiting to fire.
        pending_taps: Vec<PendingTap>,
    },

    /// Command log history.
    Log {
        /// All logged commands in chronological order.
        entries: Vec<CommandLog>,
    },

    /// A session event (sent to subscribers).
    Event {
        /// The event that occurred.
        event: SessionEvent,
    },

    /// Acknowledges a shutdown request.
    ShutdownAck,

    /// An error occurred processing the request.
    Error {
        /// Stable error code, when one applies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Human-readable error message.
        message: String,
    },
}

/// Returns the uictl directory path (`~/.uictl/`, or `$UICTL_HOME` when set).
///
/// Creates the directory if it doesn't exist. Falls back to the system
/// temp directory when no home directory can be determined.
pub fn uictl_dir() -> PathBuf {
    let dir = match std::env::var_os("UICTL_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".uictl"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns the Unix socket path for a session
/// (e.g. `~/.uictl/uictl_my-session.sock`).
pub fn socket_path(session_name: &str) -> PathBuf {
    uictl_dir().join(format!("uictl_{}.sock", session_name))
}

/// Unix socket server for IPC communication.
///
/// The server accepts connections and answers requests with its
/// [`CommandExecutor`]. It removes the socket file when dropped.
pub struct IpcServer {
    executor: CommandExecutor,
    fixture: Option<Arc<FixtureDriver>>,
    socket_path: PathBuf,
    shutdown: Arc<Notify>,
}

impl IpcServer {
    /// Creates a new IPC server for the given executor (not yet running).
    pub fn new(executor: CommandExecutor, session_name: &str) -> Self {
        Self {
            executor,
            fixture: None,
            socket_path: socket_path(session_name),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Enables [`IpcRequest::LoadScreen`] against this fixture driver.
    pub fn with_fixture(mut self, fixture: Arc<FixtureDriver>) -> Self {
        self.fixture = Some(fixture);
        self
    }

    /// Starts the IPC server and begins accepting connections.
    ///
    /// Any existing socket file at the path is removed before binding. Each
    /// client is handled on its own task. Returns after a client sends
    /// [`IpcRequest::Shutdown`].
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the socket cannot be bound or an accept fails
    pub async fn run(&self) -> Result<(), IpcError> {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove existing socket");
            }
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "IPC server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted?;
                    debug!("client connected");
                    let executor = self.executor.clone();
                    let fixture = self.fixture.clone();
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, executor, fixture, shutdown).await {
                            debug!(error = %e, "client disconnected");
                        }
                    });
                }
                _ = self.shutdown.notified() => {
                    info!("shutdown requested via IPC");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_client(
        stream: UnixStream,
        executor: CommandExecutor,
        fixture: Option<Arc<FixtureDriver>>,
        shutdown: Arc<Notify>,
    ) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break; // Client disconnected
            }
            if line.trim().is_empty() {
                continue;
            }

            let request: IpcRequest = match serde_json::from_str(line.trim()) {
                Ok(request) => request,
                Err(e) => {
                    let response = IpcResponse::Error {
                        code: Some("invalid_argument".to_string()),
                        message: format!("Malformed request: {}", e),
                    };
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            match request {
                IpcRequest::Subscribe => {
                    let mut rx = executor.handler().session().await.subscribe();
                    while let Ok(event) = rx.recv().await {
                        let response = IpcResponse::Event { event };
                        if write_response(&mut writer, &response).await.is_err() {
                            debug!("subscriber went away");
                            break;
                        }
                    }
                    return Ok(());
                }
                IpcRequest::Shutdown => {
                    write_response(&mut writer, &IpcResponse::ShutdownAck).await?;
                    shutdown.notify_one();
                    return Ok(());
                }
                other => {
                    let response = Self::handle_request(other, &executor, fixture.as_deref()).await;
                    write_response(&mut writer, &response).await?;
                }
            }
        }
        Ok(())
    }

    /// Answers a single non-streaming request.
    async fn handle_request(
        request: IpcRequest,
        executor: &CommandExecutor,
        fixture: Option<&FixtureDriver>,
    ) -> IpcResponse {
        let handler = executor.handler();
        match request {
            IpcRequest::Execute { command } => {
                let result = executor.execute(command).await;
                IpcResponse::CommandResult {
                    success: result.success,
                    message: result.message,
                    error_code: result.error_code,
                    data: result.data,
                }
            }
            IpcRequest::GetState => IpcResponse::State {
                session_id: handler.session().await.id.to_string(),
                notifications: handler.active_notifications().await,
                pending_taps: handler.pending_taps().await,
            },
            IpcRequest::GetLog => IpcResponse::Log {
                entries: handler.session().await.get_command_log().await,
            },
            IpcRequest::EndSession => {
                let session = handler.end_session().await;
                IpcResponse::CommandResult {
                    success: true,
                    message: format!("Session ended; new session {}", session.id),
                    error_code: None,
                    data: None,
                }
            }
            IpcRequest::LoadScreen { path } => match fixture {
                Some(fixture) => match fixture.reload(Path::new(&path)) {
                    Ok(()) => IpcResponse::CommandResult {
                        success: true,
                        message: format!("Loaded screen from {}", path),
                        error_code: None,
                        data: None,
                    },
                    Err(e) => IpcResponse::Error {
                        code: Some("driver_error".to_string()),
                        message: e.to_string(),
                    },
                },
                None => IpcResponse::Error {
                    code: None,
                    message: "This server is not backed by a fixture screen".to_string(),
                },
            },
            IpcRequest::Subscribe | IpcRequest::Shutdown => IpcResponse::Error {
                code: None,
                message: "Streaming and shutdown requests are handled by the connection loop".to_string(),
            },
        }
    }

    /// Returns a reference to the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &IpcResponse) -> Result<(), IpcError> {
    let json = serde_json::to_string(response)? + "\n";
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to clean up socket on drop");
            }
        }
    }
}

/// Unix socket client for IPC communication.
pub struct IpcClient {
    /// Buffered reader for the socket's read half.
    stream: BufReader<tokio::net::unix::OwnedReadHalf>,
    /// Writer for the socket's write half.
    writer: OwnedWriteHalf,
}

impl IpcClient {
    /// Connects to the IPC server for the specified session.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the connection fails (e.g., server not running)
    pub async fn connect(session_name: &str) -> Result<Self, IpcError> {
        let path = socket_path(session_name);
        let stream = UnixStream::connect(&path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            stream: BufReader::new(reader),
            writer,
        })
    }

    /// Sends a request and waits for the response.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the send or receive fails
    /// - [`IpcError::Json`] if serialization or deserialization fails
    /// - [`IpcError::Closed`] if the server hung up without answering
    pub async fn send(&mut self, request: &IpcRequest) -> Result<IpcResponse, IpcError> {
        let json = serde_json::to_string(request)? + "\n";
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        self.read_event().await
    }

    /// Sends a subscribe request to the server.
    ///
    /// After calling this method, use [`Self::read_event`] to receive
    /// session events as they occur.
    pub async fn subscribe(&mut self) -> Result<(), IpcError> {
        let json = serde_json::to_string(&IpcRequest::Subscribe)? + "\n";
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads the next response line from the server.
    pub async fn read_event(&mut self) -> Result<IpcResponse, IpcError> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::Closed);
        }
        let response: IpcResponse = serde_json::from_str(line.trim())?;
        Ok(response)
    }
}
