//! CLI client for the uictl command server.
//!
//! This tool sends handler commands to a running `uictl-server` via Unix
//! socket IPC.
//!
//! # Usage
//!
//! ```bash
//! # Show a toast
//! uictl toast "Saved"
//! uictl toast --long "Sync finished"
//!
//! # Post and cancel a notification
//! uictl notify battery "Low battery" "15%" --important
//! uictl cancel-notification battery
//!
//! # Tap an element by text (case-insensitive substring) or resource id
//! uictl click-text Allow --scope com.android.permissioncontroller
//! uictl click-id com.android.settings:id/ok
//!
//! # Tap a coordinate after 500ms
//! uictl click-delay 540 1200 500
//!
//! # Inspect the session
//! uictl state
//! uictl -f json log > session.json
//! uictl convert session.json > replay.sh
//!
//! # Connect to a specific session
//! uictl -s my-session click-text OK
//! ```

mod converter;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use uictl_core::command::{Command as HandlerCommand, CommandResult};
use uictl_core::ipc::{uictl_dir, IpcClient, IpcRequest, IpcResponse};
use uictl_core::session::SessionEvent;

/// CLI client for the uictl command server.
#[derive(Parser)]
#[command(name = "uictl")]
#[command(about = "Send UI automation commands to a running uictl-server session")]
#[command(version)]
struct Cli {
    /// Session name to connect to
    #[arg(short, long, default_value = "default", env = "UICTL_SESSION")]
    session: String,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Show a transient message
    Toast {
        /// Message text
        message: String,
        /// Keep the message on screen longer
        #[arg(short, long)]
        long: bool,
    },

    /// Show a modal dialog
    Dialog {
        /// Dialog body
        message: String,
        /// Dialog title
        #[arg(short, long)]
        title: Option<String>,
        /// Label of the confirming button
        #[arg(short, long)]
        positive_label: Option<String>,
    },

    /// Post or replace the notification with a tag
    Notify {
        /// Notification key; posting the same tag replaces it
        tag: String,
        /// Notification title
        title: String,
        /// Notification body
        message: String,
        /// Use the high-visibility channel
        #[arg(short, long)]
        important: bool,
    },

    /// Remove the notification with a tag
    CancelNotification {
        /// Notification key
        tag: String,
    },

    /// Find an element by text and tap it
    ClickText {
        /// Text to look for
        text: String,
        /// Only search windows of this package or component
        #[arg(long)]
        scope: Option<String>,
    },

    /// Find an element by resource id and tap it
    ClickId {
        /// Full (`pkg:id/name`) or short resource id
        id: String,
        /// Only search windows of this package or component
        #[arg(long)]
        scope: Option<String>,
    },

    /// Tap a screen coordinate after a delay
    #[command(allow_negative_numbers = true)]
    ClickDelay {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
        /// Delay in milliseconds
        delay_ms: i64,
    },

    /// Get current session state
    State,

    /// Get command log history
    Log,

    /// Stream session events until interrupted
    Watch,

    /// End the session, dropping delayed taps that have not fired
    EndSession,

    /// Replace the server's fixture screen with a JSON dump
    LoadScreen {
        /// Path to the screen dump
        path: PathBuf,
    },

    /// List all running uictl sessions
    ListSessions,

    /// Convert a command log to a replay shell script
    Convert {
        /// Path to the log (JSON array or JSONL); reads stdin if omitted
        log: Option<PathBuf>,
    },

    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: Shell,
    },

    /// Stop the server for this session
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Connection(String),
    CommandFailed(String),
    Protocol(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Connection(_) => ExitCode::from(2),
            CliError::CommandFailed(_) => ExitCode::from(1),
            CliError::Protocol(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::CommandFailed(msg) => write!(f, "Command failed: {}", msg),
            CliError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::Protocol(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn discover_sessions() -> Vec<String> {
    let pattern = uictl_dir().join("uictl_*.sock");
    glob::glob(pattern.to_str().unwrap_or_default())
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            entry.ok().and_then(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix("uictl_"))
                    .map(String::from)
            })
        })
        .collect()
}

/// The handler command a subcommand maps to, if any.
fn handler_command(command: &Command) -> Option<HandlerCommand> {
    let command = match command {
        Command::Toast { message, long: false } => HandlerCommand::ShowShortToast {
            message: Value::String(message.clone()),
        },
        Command::Toast { message, long: true } => HandlerCommand::ShowLongToast {
            message: Value::String(message.clone()),
        },
        Command::Dialog { message, title, positive_label } => HandlerCommand::ShowDialog {
            title: title.clone(),
            message: message.clone(),
            positive_label: positive_label.clone(),
        },
        Command::Notify { tag, title, message, important } => HandlerCommand::ShowNotification {
            tag: tag.clone(),
            title: title.clone(),
            message: message.clone(),
            important: *important,
        },
        Command::CancelNotification { tag } => HandlerCommand::CancelNotification { tag: tag.clone() },
        Command::ClickText { text, scope } => HandlerCommand::FindAndClickViewByText {
            text: text.clone(),
            scope: scope.clone(),
        },
        Command::ClickId { id, scope } => HandlerCommand::FindAndClickViewById {
            id: id.clone(),
            scope: scope.clone(),
        },
        Command::ClickDelay { x, y, delay_ms } => HandlerCommand::ClickDelay {
            x: *x,
            y: *y,
            delay_millis: *delay_ms,
        },
        _ => return None,
    };
    Some(command)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // Handle commands that don't need an IPC connection
    match cli.command {
        Command::ListSessions => {
            let sessions = discover_sessions();
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "sessions": sessions }));
            } else if sessions.is_empty() {
                eprintln!("No running sessions found");
            } else {
                for session in sessions {
                    println!("{}", session);
                }
            }
            return Ok(());
        }
        Command::Convert { ref log } => {
            let script = match log {
                Some(path) => converter::LogConverter::convert_file(path)
                    .map_err(|e| CliError::CommandFailed(format!("Failed to convert log: {}", e)))?,
                None => converter::LogConverter::convert_stdin()
                    .map_err(|e| CliError::CommandFailed(format!("Failed to convert from stdin: {}", e)))?,
            };
            print!("{}", script);
            return Ok(());
        }
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "uictl", &mut io::stdout());
            return Ok(());
        }
        _ => {} // Fall through to IPC-connected commands
    }

    // Connect to the IPC server
    let mut client = IpcClient::connect(&cli.session)
        .await
        .map_err(|e| CliError::Connection(format!("Failed to connect to session '{}': {}", cli.session, e)))?;
    debug!(session = %cli.session, "connected");

    if let Some(command) = handler_command(&cli.command) {
        return execute_command(&mut client, command, &cli).await;
    }

    match cli.command {
        Command::State => get_state(&mut client, &cli).await,
        Command::Log => get_log(&mut client, &cli).await,
        Command::Watch => watch(&mut client, &cli).await,
        Command::EndSession => send_command(&mut client, IpcRequest::EndSession, &cli).await,
        Command::LoadScreen { ref path } => {
            // The server resolves the path, so hand it an absolute one.
            let path = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .map(|dir| dir.join(path))
                    .unwrap_or_else(|_| path.clone())
            };
            let request = IpcRequest::LoadScreen {
                path: path.display().to_string(),
            };
            send_command(&mut client, request, &cli).await
        }
        Command::Stop => stop_server(&mut client, &cli).await,
        _ => Err(CliError::Protocol("Command has no IPC request".to_string())),
    }
}

async fn send(client: &mut IpcClient, request: &IpcRequest) -> Result<IpcResponse, CliError> {
    client
        .send(request)
        .await
        .map_err(|e| CliError::Protocol(format!("Failed to send request: {}", e)))
}

fn error_response(code: Option<String>, message: String) -> CliError {
    match code {
        Some(code) => CliError::CommandFailed(format!("[{}] {}", code, message)),
        None => CliError::CommandFailed(message),
    }
}

/// Short description of a command's target for the timing line.
fn command_target(command: &HandlerCommand) -> String {
    match command {
        HandlerCommand::ShowShortToast { message } | HandlerCommand::ShowLongToast { message } => {
            message.to_string()
        }
        HandlerCommand::ShowDialog { message, .. } => message.clone(),
        HandlerCommand::ShowNotification { tag, .. } | HandlerCommand::CancelNotification { tag } => {
            tag.clone()
        }
        HandlerCommand::FindAndClickViewByText { text, .. } => text.clone(),
        HandlerCommand::FindAndClickViewById { id, .. } => id.clone(),
        HandlerCommand::ClickDelay { x, y, delay_millis } => format!("({},{})+{}ms", x, y, delay_millis),
    }
}

async fn execute_command(client: &mut IpcClient, command: HandlerCommand, cli: &Cli) -> Result<(), CliError> {
    let label = command.name();
    let target = command_target(&command);
    let is_click_delay = matches!(command, HandlerCommand::ClickDelay { .. });
    let start = std::time::Instant::now();
    let response = send(client, &IpcRequest::Execute { command }).await?;
    let elapsed = start.elapsed();

    match response {
        IpcResponse::CommandResult { success, message, error_code, data } => {
            if cli.format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "success": success,
                    "message": message,
                    "error_code": error_code,
                    "data": data,
                }))?;
                if !success {
                    return Err(error_response(error_code, message));
                }
                return Ok(());
            }
            if !success {
                return Err(error_response(error_code, message));
            }
            if let Some(ref data) = data {
                if is_click_delay {
                    if let Some(id) = data.get("id").and_then(Value::as_str) {
                        println!("{}", id);
                    }
                } else if let (Some(x), Some(y)) = (data.get("x"), data.get("y")) {
                    println!("{} {}", x, y);
                }
            }
            if !cli.quiet {
                let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ");
                eprintln!("|{}|{}|{}|{}ms|", now, label, target, elapsed.as_millis());
            }
            Ok(())
        }
        IpcResponse::Error { code, message } => Err(error_response(code, message)),
        _ => Err(CliError::Protocol("Unexpected response type".to_string())),
    }
}

async fn get_state(client: &mut IpcClient, cli: &Cli) -> Result<(), CliError> {
    match send(client, &IpcRequest::GetState).await? {
        IpcResponse::State { session_id, notifications, pending_taps } => {
            if cli.format == OutputFormat::Json {
                return print_json(&serde_json::json!({
                    "session_id": session_id,
                    "notifications": notifications,
                    "pending_taps": pending_taps,
                }));
            }
            println!("Session ID: {}", session_id);
            println!("Notifications: {}", notifications.len());
            for n in &notifications {
                println!("  [{}] {} - {} ({:?})", n.tag, n.title, n.message, n.channel);
            }
            println!("Pending taps: {}", pending_taps.len());
            for tap in &pending_taps {
                println!(
                    "  {} ({}, {}) +{}ms scheduled {}",
                    tap.id,
                    tap.x,
                    tap.y,
                    tap.delay_ms,
                    tap.scheduled_at.format("%H:%M:%S%.3f")
                );
            }
            Ok(())
        }
        IpcResponse::Error { code, message } => Err(error_response(code, message)),
        _ => Err(CliError::Protocol("Unexpected response type".to_string())),
    }
}

async fn get_log(client: &mut IpcClient, cli: &Cli) -> Result<(), CliError> {
    match send(client, &IpcRequest::GetLog).await? {
        IpcResponse::Log { entries } => {
            if cli.format == OutputFormat::Json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No commands logged");
            }
            for entry in entries {
                let result = match &entry.result {
                    CommandResult::Success => "ok".to_string(),
                    CommandResult::Failure { code, message } => format!("{}: {}", code, message),
                };
                println!(
                    "[{}] {} {} - {}",
                    entry.timestamp.format("%H:%M:%S"),
                    entry.command.name(),
                    command_target(&entry.command),
                    result
                );
            }
            Ok(())
        }
        IpcResponse::Error { code, message } => Err(error_response(code, message)),
        _ => Err(CliError::Protocol("Unexpected response type".to_string())),
    }
}

async fn watch(client: &mut IpcClient, cli: &Cli) -> Result<(), CliError> {
    client
        .subscribe()
        .await
        .map_err(|e| CliError::Protocol(format!("Failed to subscribe: {}", e)))?;
    if !cli.quiet {
        eprintln!("Watching session '{}' (Ctrl-C to stop)", cli.session);
    }
    loop {
        let event = match client.read_event().await {
            Ok(IpcResponse::Event { event }) => event,
            Ok(_) => return Err(CliError::Protocol("Unexpected response type".to_string())),
            Err(e) => return Err(CliError::Connection(format!("Event stream closed: {}", e))),
        };
        if cli.format == OutputFormat::Json {
            let line = serde_json::to_string(&event).map_err(|e| CliError::Protocol(e.to_string()))?;
            println!("{}", line);
            continue;
        }
        match event {
            SessionEvent::CommandLogged(log) => {
                let status = match log.result {
                    CommandResult::Success => "ok".to_string(),
                    CommandResult::Failure { code, .. } => code,
                };
                println!(
                    "[{}] {} {} {}",
                    log.timestamp.format("%H:%M:%S%.3f"),
                    log.command.name(),
                    command_target(&log.command),
                    status
                );
            }
            SessionEvent::Ended { session_id } => println!("session {} ended", session_id),
        }
    }
}

async fn send_command(client: &mut IpcClient, request: IpcRequest, cli: &Cli) -> Result<(), CliError> {
    match send(client, &request).await? {
        IpcResponse::CommandResult { success, message, error_code, .. } => {
            if !success {
                return Err(error_response(error_code, message));
            }
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "success": true, "message": message }));
            } else if !cli.quiet {
                eprintln!("{}", message);
            }
            Ok(())
        }
        IpcResponse::Error { code, message } => Err(error_response(code, message)),
        _ => Err(CliError::Protocol("Unexpected response".to_string())),
    }
}

async fn stop_server(client: &mut IpcClient, cli: &Cli) -> Result<(), CliError> {
    match send(client, &IpcRequest::Shutdown).await? {
        IpcResponse::ShutdownAck => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "success": true }));
            } else if !cli.quiet {
                eprintln!("Server stopped");
            }
            Ok(())
        }
        IpcResponse::Error { code, message } => Err(error_response(code, message)),
        _ => Err(CliError::Protocol("Unexpected response".to_string())),
    }
}
