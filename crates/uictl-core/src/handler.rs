//! The command handler facade.
//!
//! [`CommandHandler`] is the single entry point callers use. It validates
//! arguments on the caller's task, then routes each command either to the
//! presentation router or to the locator and dispatcher, whose tree queries
//! and taps run on the single [`UiContext`].
//!
//! Find-then-act commands poll the tree until a match appears or the retry
//! budget from [`RetryConfig`](crate::config::RetryConfig) runs out. A match
//! whose bounds are not yet tappable counts as a miss. Neither failure is
//! reported before the full timeout has elapsed and at least one retry has
//! been made.
//!
//! # Example
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
//!     let driver = Arc::new(FixtureDriver::load("screen.json").expect("fixture"));
//!     let handler = CommandHandler::new(
//!         driver,
//!         Arc::new(TracingPresenter::new()),
//!         UictlConfig::load(),
//!         "default",
//!     );
//!
//!     match handler.find_and_click_view_by_text("Allow", None).await {
//!         Ok(outcome) => println!("tapped ({}, {})", outcome.x, outcome.y),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::UictlConfig;
use crate::dispatcher::{ActionDispatcher, PendingTap};
use crate::driver::AutomationDriver;
use crate::error::{require_non_blank, CommandError};
use crate::locator::{self, Matcher, Scope};
use crate::presenter::{DialogRequest, NotificationChannel, NotificationRequest, Presenter, ToastLength};
use crate::router::{ActiveNotification, PresentationRouter};
use crate::session::Session;
use crate::ui_context::UiContext;

/// What a successful find-then-act command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    /// Tapped point.
    pub x: i32,
    pub y: i32,
    /// Tree queries made, including the successful one.
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Elements that matched on the successful attempt.
    pub match_count: usize,
}

/// Entry point for every automation command.
///
/// Must be created inside a Tokio runtime: construction spawns the UI
/// context and the presentation worker.
pub struct CommandHandler {
    ui: UiContext,
    dispatcher: ActionDispatcher,
    router: PresentationRouter,
    config: UictlConfig,
    session_name: String,
    session: RwLock<Arc<Session>>,
}

impl CommandHandler {
    pub fn new(
        driver: Arc<dyn AutomationDriver>,
        presenter: Arc<dyn Presenter>,
        config: UictlConfig,
        session_name: &str,
    ) -> Self {
        let (ui, _) = UiContext::spawn(driver, config.ui_queue_depth);
        Self {
            dispatcher: ActionDispatcher::new(ui.clone()),
            ui,
            router: PresentationRouter::new(presenter),
            config,
            session_name: session_name.to_string(),
            session: RwLock::new(Session::new(session_name)),
        }
    }

    pub fn config(&self) -> &UictlConfig {
        &self.config
    }

    /// The current hosting session.
    pub async fn session(&self) -> Arc<Session> {
        self.session.read().await.clone()
    }

    /// Ends the current session and starts a fresh one.
    ///
    /// Delayed taps scheduled in the old session that have not fired are
    /// dropped. Returns the new session.
    pub async fn end_session(&self) -> Arc<Session> {
        let mut current = self.session.write().await;
        current.end();
        info!(session_id = %current.id, "session ended");
        *current = Session::new(&self.session_name);
        current.clone()
    }

    // ── Presentation ────────────────────────────────────────────────────

    /// Shows a brief toast. Display failures are logged, never returned.
    pub fn show_short_toast(&self, message: &Value) -> Result<(), CommandError> {
        self.show_toast(message, ToastLength::Short)
    }

    /// Shows a long toast. Display failures are logged, never returned.
    pub fn show_long_toast(&self, message: &Value) -> Result<(), CommandError> {
        self.show_toast(message, ToastLength::Long)
    }

    fn show_toast(&self, message: &Value, length: ToastLength) -> Result<(), CommandError> {
        let text = display_text(message)?;
        self.router.show_toast(text, length);
        Ok(())
    }

    /// Shows a dialog without waiting for the user's answer.
    pub fn show_dialog(
        &self,
        title: Option<&str>,
        message: &str,
        positive_label: Option<&str>,
    ) -> Result<(), CommandError> {
        self.router.show_dialog(DialogRequest {
            title: title.map(String::from),
            message: message.to_string(),
            positive_label: positive_label.map(String::from),
        });
        Ok(())
    }

    /// Posts the notification for `tag`, replacing any existing one.
    pub async fn show_notification(
        &self,
        tag: &str,
        title: &str,
        message: &str,
        important: bool,
    ) -> Result<(), CommandError> {
        require_non_blank("tag", tag)?;
        self.router
            .post_notification(NotificationRequest {
                tag: tag.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                channel: NotificationChannel::for_importance(important),
            })
            .await;
        Ok(())
    }

    /// Removes the notification for `tag`. Unknown tags are not an error.
    pub async fn cancel_notification(&self, tag: &str) -> Result<(), CommandError> {
        require_non_blank("tag", tag)?;
        self.router.cancel_notification(tag).await;
        Ok(())
    }

    pub async fn active_notifications(&self) -> Vec<ActiveNotification> {
        self.router.active_notifications().await
    }

    /// Waits until every queued presentation request reached the presenter.
    pub async fn flush_presentation(&self) {
        self.router.flush().await;
    }

    // ── Find then act ───────────────────────────────────────────────────

    /// Finds an element whose text or description matches and taps it.
    pub async fn find_and_click_view_by_text(
        &self,
        text: &str,
        scope: Option<&str>,
    ) -> Result<ClickOutcome, CommandError> {
        require_non_blank("text", text)?;
        let matcher = Matcher::text_with_mode(text, self.config.text_match);
        self.find_and_click(matcher, Scope::from_arg(scope), self.config.require_unique)
            .await
    }

    /// Finds an element by resource id and taps it.
    pub async fn find_and_click_view_by_id(
        &self,
        id: &str,
        scope: Option<&str>,
    ) -> Result<ClickOutcome, CommandError> {
        require_non_blank("id", id)?;
        self.find_and_click(Matcher::id(id), Scope::from_arg(scope), self.config.require_unique)
            .await
    }

    /// Polls the tree for `matcher` and taps the first match.
    ///
    /// # Errors
    ///
    /// - [`CommandError::ElementNotFound`] once the retry timeout has elapsed
    ///   and at least two queries have missed
    /// - [`CommandError::AmbiguousMatch`] if `require_unique` and several
    ///   elements match
    /// - [`CommandError::UnreachableTarget`] if the match still has no
    ///   tappable point when the retry budget runs out
    /// - [`CommandError::Driver`] if the UI context is gone or the tap fails
    pub async fn find_and_click(
        &self,
        matcher: Matcher,
        scope: Option<Scope>,
        require_unique: bool,
    ) -> Result<ClickOutcome, CommandError> {
        let retry = &self.config.retry;
        let timeout = retry.timeout();
        let start = Instant::now();
        let mut attempts: u32 = 0;
        // Set when the latest match had no tappable point; it may still be
        // laid out, so keep polling.
        let mut unreachable: Option<CommandError> = None;

        loop {
            attempts += 1;
            match self.ui.snapshot().await {
                Ok(snapshot) => {
                    let mut matches = locator::find(&snapshot, &matcher, scope.as_ref());
                    match matches.next() {
                        Some(first) => {
                            let match_count = 1 + matches.count();
                            if require_unique && match_count > 1 {
                                return Err(CommandError::AmbiguousMatch {
                                    criterion: describe(&matcher, scope.as_ref()),
                                    count: match_count,
                                });
                            }
                            match ActionDispatcher::tap_point(&snapshot, first) {
                                Ok((x, y)) => {
                                    self.dispatcher.tap(x, y).await?;
                                    let elapsed_ms = start.elapsed().as_millis() as u64;
                                    debug!(attempts, elapsed_ms, match_count, "element tapped");
                                    return Ok(ClickOutcome {
                                        x,
                                        y,
                                        attempts,
                                        elapsed_ms,
                                        match_count,
                                    });
                                }
                                Err(e) => {
                                    debug!(attempt = attempts, criterion = %matcher, error = %e, "match not tappable yet");
                                    unreachable = Some(e);
                                }
                            }
                        }
                        None => {
                            debug!(
                                attempt = attempts,
                                criterion = %matcher,
                                snapshot = snapshot.id(),
                                age_ms = snapshot.taken_at().elapsed().as_millis() as u64,
                                "no match yet"
                            );
                            unreachable = None;
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    debug!(attempt = attempts, error = %e, "tree query failed; retrying");
                }
                Err(e) => return Err(e.into()),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout && attempts >= 2 {
                return Err(unreachable.unwrap_or_else(|| CommandError::ElementNotFound {
                    criterion: describe(&matcher, scope.as_ref()),
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                }));
            }
            let remaining = timeout.saturating_sub(elapsed);
            tokio::time::sleep(retry.delay_after(attempts).min(remaining)).await;
        }
    }

    // ── Coordinates ─────────────────────────────────────────────────────

    /// Schedules a tap at `(x, y)` after `delay_millis` and returns at once.
    ///
    /// The tap is bound to the current session and is dropped if the session
    /// ends first.
    pub async fn click_delay(&self, x: i32, y: i32, delay_millis: i64) -> Result<PendingTap, CommandError> {
        let delay = u64::try_from(delay_millis).map_err(|_| {
            CommandError::InvalidArgument(format!("delay must be >= 0 (got {})", delay_millis))
        })?;
        let scope = self.session().await.scope();
        let tap = self
            .dispatcher
            .schedule_delayed_tap(x, y, Duration::from_millis(delay), scope)
            .await;
        Ok(tap)
    }

    /// Delayed taps that have neither fired nor been cancelled.
    pub async fn pending_taps(&self) -> Vec<PendingTap> {
        self.dispatcher.pending().await
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("config", &self.config)
            .field("session_name", &self.session_name)
            .finish_non_exhaustive()
    }
}

/// Converts a toast payload to display text.
fn display_text(message: &Value) -> Result<String, CommandError> {
    match message {
        Value::Null => Err(CommandError::InvalidArgument("message must not be null".to_string())),
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

fn describe(matcher: &Matcher, scope: Option<&Scope>) -> String {
    match scope {
        Some(scope) => format!("{} in {}", matcher, scope),
        None => matcher.to_string(),
    }
}
