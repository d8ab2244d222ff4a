//! # uictl-core
//!
//! Core library for remote UI automation: a command handler that shows
//! transient messages and notifications, finds on-screen elements by text or
//! resource id and taps them, and schedules coordinate taps.
//!
//! ## Modules
//!
//! - [`element`] - Raw accessibility tree types as delivered by a tree provider
//! - [`snapshot`] - Flattened, immutable tree snapshots and element handles
//! - [`locator`] - Match criteria and scope filtering over a snapshot
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) seam to the platform
//! - [`fixture`] - A file-backed driver used by the server and tests
//! - [`ui_context`] - The single task that owns the driver
//! - [`dispatcher`] - Immediate and delayed synthetic taps
//! - [`presenter`] - The [`Presenter`](presenter::Presenter) seam for toasts, dialogs and notifications
//! - [`router`] - Ordered delivery of presentation requests and the notification registry
//! - [`handler`] - The [`CommandHandler`](handler::CommandHandler) facade
//! - [`command`] - Serializable commands and the command log
//! - [`executor`] - Runs [`Command`](command::Command)s and logs them to the session
//! - [`session`] - Hosting session: cancellation scope, log ring buffer, events
//! - [`ipc`] - Unix socket IPC for the server and its clients
//! - [`config`] - Persistent settings in `~/.uictl/config.json`
//! - [`error`] - Command error taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uictl_core::config::UictlConfig;
//! use uictl_core::fixture::FixtureDriver;
//! use uictl_core::handler::CommandHandler;
//! use uictl_core::presenter::TracingPresenter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = CommandHandler::new(
//!         Arc::new(FixtureDriver::load("screen.json").expect("fixture")),
//!         Arc::new(TracingPresenter::new()),
//!         UictlConfig::default(),
//!         "default",
//!     );
//!
//!     handler.show_notification("battery", "Battery", "Low", true).await.unwrap();
//!     handler.find_and_click_view_by_id("com.android.settings:id/ok", None).await.unwrap();
//! }
//! ```

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod element;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod handler;
pub mod ipc;
pub mod locator;
pub mod presenter;
pub mod router;
pub mod session;
pub mod snapshot;
pub mod ui_context;
