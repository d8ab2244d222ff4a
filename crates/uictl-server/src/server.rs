//! Server state and startup configuration.
//!
//! This module turns command-line options into a wired handler stack: the
//! persisted [`UictlConfig`] with per-run overrides applied, a fixture-backed
//! driver, a logging presenter and the executor the IPC server answers with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use uictl_core::config::{Backoff, UictlConfig};
use uictl_core::driver::DriverError;
use uictl_core::executor::CommandExecutor;
use uictl_core::fixture::FixtureDriver;
use uictl_core::handler::CommandHandler;
use uictl_core::ipc::IpcServer;
use uictl_core::locator::TextMatch;
use uictl_core::presenter::TracingPresenter;

/// Per-run overrides on top of the persisted configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub session: String,
    pub fixture: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub backoff: Option<Backoff>,
    pub strict: bool,
    pub exact_text: bool,
}

impl ServerOptions {
    /// Applies these overrides to `base`.
    pub fn apply(&self, mut base: UictlConfig) -> UictlConfig {
        if let Some(timeout_ms) = self.timeout_ms {
            base.retry.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = self.interval_ms {
            base.retry.interval_ms = interval_ms;
        }
        if let Some(backoff) = self.backoff {
            base.retry.backoff = backoff;
        }
        if self.strict {
            base.require_unique = true;
        }
        if self.exact_text {
            base.text_match = TextMatch::Equals;
        }
        base
    }
}

/// Parses a backoff name as accepted in the config file.
pub fn parse_backoff(value: &str) -> Result<Backoff, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| format!("unknown backoff '{}' (expected 'fixed' or 'exponential')", value))
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Everything the running server holds on to.
pub struct ServerState {
    pub session_name: String,
    pub fixture: Arc<FixtureDriver>,
    pub executor: CommandExecutor,
}

impl ServerState {
    /// Builds the handler stack. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] if the fixture file cannot be read or parsed.
    pub fn new(options: &ServerOptions, config: UictlConfig) -> Result<Self, DriverError> {
        let fixture = match &options.fixture {
            Some(path) => FixtureDriver::load(expand_home(path))?,
            None => FixtureDriver::empty(),
        };
        let fixture = Arc::new(fixture);

        info!(
            session = %options.session,
            fixture = ?options.fixture,
            timeout_ms = config.retry.timeout_ms,
            backoff = ?config.retry.backoff,
            strict = config.require_unique,
            "server state initialised"
        );

        let handler = CommandHandler::new(
            fixture.clone(),
            Arc::new(TracingPresenter::new()),
            config,
            &options.session,
        );

        Ok(Self {
            session_name: options.session.clone(),
            fixture,
            executor: CommandExecutor::new(Arc::new(handler)),
        })
    }

    /// The IPC server fronting this state.
    pub fn ipc_server(&self) -> IpcServer {
        IpcServer::new(self.executor.clone(), &self.session_name).with_fixture(self.fixture.clone())
    }
}
