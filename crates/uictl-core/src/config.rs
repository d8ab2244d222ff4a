//! Persistent configuration for uictl.
//!
//! Stores handler tuning in `~/.uictl/config.json`: the retry budget for
//! find-then-act commands, the text matching mode and whether ambiguous
//! matches should fail.
//!
//! # Example
//!
//! ```no_run
//! use uictl_core::config::UictlConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = UictlConfig::load();
//! println!("find timeout: {}ms", config.retry.timeout_ms);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ipc::uictl_dir;
use crate::locator::TextMatch;

const CONFIG_FILENAME: &str = "config.json";

/// How the delay between locator attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Always wait `interval_ms`.
    Fixed,
    /// Start at `interval_ms`, multiply each time, cap at `max_interval_ms`.
    #[default]
    Exponential,
}

/// Retry budget for find-then-act commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total time to keep looking before giving up.
    pub timeout_ms: u64,
    /// First delay between attempts.
    pub interval_ms: u64,
    /// Upper bound for exponential delays.
    pub max_interval_ms: u64,
    pub backoff: Backoff,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            interval_ms: 100,
            max_interval_ms: 1000,
            backoff: Backoff::Exponential,
            multiplier: 2.0,
        }
    }
}

/// Floor for the delay between locator attempts, so `interval_ms = 0` never
/// turns the retry loop into a busy poll of the UI context.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay to wait after the given (1-based) failed attempt. Never less
    /// than [`MIN_RETRY_DELAY`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.interval_ms as f64;
        let millis = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(32) as i32;
                let grown = base * self.multiplier.max(1.0).powi(exponent);
                grown.min(self.max_interval_ms.max(self.interval_ms) as f64)
            }
        };
        Duration::from_millis(millis as u64).max(MIN_RETRY_DELAY)
    }
}

/// Persistent uictl configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UictlConfig {
    pub retry: RetryConfig,
    /// Comparison used by find-by-text commands.
    pub text_match: TextMatch,
    /// Fail with an ambiguity error instead of tapping the first of several matches.
    pub require_unique: bool,
    /// Jobs that may queue for the UI context before callers wait.
    pub ui_queue_depth: usize,
}

impl Default for UictlConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            text_match: TextMatch::Contains,
            require_unique: false,
            ui_queue_depth: 64,
        }
    }
}

impl UictlConfig {
    /// Load config from `~/.uictl/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = uictl_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.uictl/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let path = uictl_dir().join(CONFIG_FILENAME);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
