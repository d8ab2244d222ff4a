use std::path::PathBuf;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod server;
use server::{parse_backoff, ServerOptions, ServerState};

use uictl_core::config::{Backoff, UictlConfig};

#[derive(Parser)]
#[command(name = "uictl-server")]
#[command(about = "Standalone UI automation command server")]
struct Args {
    /// Session name for IPC socket
    #[arg(short, long, default_value = "default", env = "UICTL_SESSION")]
    session: String,

    /// JSON screen dump to serve instead of a live tree
    #[arg(short, long, env = "UICTL_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Find-then-act retry timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// First delay between locator attempts in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Delay growth between attempts: fixed or exponential
    #[arg(long, value_parser = parse_backoff)]
    backoff: Option<Backoff>,

    /// Fail when several elements match instead of tapping the first
    #[arg(long)]
    strict: bool,

    /// Match text exactly instead of by case-insensitive substring
    #[arg(long)]
    exact_text: bool,

    /// Also log to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> ServerOptions {
        ServerOptions {
            session: self.session.clone(),
            fixture: self.fixture.clone(),
            timeout_ms: self.timeout_ms,
            interval_ms: self.interval_ms,
            backoff: self.backoff,
            strict: self.strict,
            exact_text: self.exact_text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let log_dir = uictl_core::session::logs_dir();
    let file_appender = tracing_appender::rolling::never(&log_dir, "uictl-server.log");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file_appender)
            .with_ansi(false)
            .init();
    }

    info!(session = %args.session, "Starting uictl-server");

    let options = args.options();
    let config = options.apply(UictlConfig::load());
    let state = match ServerState::new(&options, config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to load fixture");
            return Err(e.into());
        }
    };
    let ipc = state.ipc_server();

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = ipc.run() => {
            match result {
                Ok(()) => info!("Shutdown requested via IPC"),
                Err(e) => error!(error = %e, "IPC server exited"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }

    // Ending the session drops delayed taps that have not fired.
    state.executor.handler().end_session().await;
    drop(ipc);
    info!("Server stopped");

    Ok(())
}
