//! Shared test helpers for uictl-core integration tests.
//!
//! This module provides scripted driver and presenter doubles plus a
//! full-stack harness that serves a handler over IPC.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use uictl_core::config::UictlConfig;
use uictl_core::driver::{AutomationDriver, DriverError};
use uictl_core::element::{ElementFrame, ScreenDump, ScreenSize, UIElement, UiWindow};
use uictl_core::executor::CommandExecutor;
use uictl_core::fixture::FixtureDriver;
use uictl_core::handler::CommandHandler;
use uictl_core::ipc::{IpcClient, IpcServer};
use uictl_core::presenter::{
    DialogRequest, NotificationRequest, PresentationError, Presenter, ToastLength,
};

// ---------------------------------------------------------------------------
// Screen builders
// ---------------------------------------------------------------------------

/// A leaf element with text and bounds.
pub fn text_element(text: &str, frame: ElementFrame) -> UIElement {
    UIElement {
        text: Some(text.to_string()),
        element_type: Some("Button".to_string()),
        frame: Some(frame),
        ..Default::default()
    }
}

/// A leaf element with a resource id and bounds.
pub fn id_element(id: &str, frame: ElementFrame) -> UIElement {
    UIElement {
        identifier: Some(id.to_string()),
        element_type: Some("Button".to_string()),
        frame: Some(frame),
        ..Default::default()
    }
}

/// A window owned by `component` whose root holds `children`.
pub fn window(component: &str, children: Vec<UIElement>) -> UiWindow {
    UiWindow {
        component: Some(component.to_string()),
        root: UIElement {
            element_type: Some("FrameLayout".to_string()),
            frame: Some(ElementFrame::new(0.0, 0.0, 1080.0, 2400.0)),
            children,
            ..Default::default()
        },
    }
}

/// A 1080x2400 screen showing `windows`, topmost first.
pub fn screen(windows: Vec<UiWindow>) -> ScreenDump {
    ScreenDump {
        screen: ScreenSize::default(),
        windows,
    }
}

/// The permission prompt used across scenarios: an "Allow" button at
/// (100,200)-(300,260), so its center is (200,230).
pub fn permission_prompt(component: &str) -> ScreenDump {
    screen(vec![window(
        component,
        vec![text_element("Allow", ElementFrame::new(100.0, 200.0, 200.0, 60.0))],
    )])
}

// ---------------------------------------------------------------------------
// Scripted driver
// ---------------------------------------------------------------------------

/// What the scripted driver returns for one tree query.
#[derive(Debug, Clone)]
pub enum Step {
    Dump(ScreenDump),
    /// The query fails with a transient command error.
    Fail(String),
    /// The query fails because the device went away.
    Disconnected,
}

/// A tap observed by the scripted driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedTap {
    pub x: i32,
    pub y: i32,
    pub at: Instant,
}

/// Driver that plays back a script of tree dumps.
///
/// Each query consumes one step; the last step repeats once the script is
/// exhausted. Taps are recorded with the (possibly paused) Tokio clock.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    queries: Mutex<Vec<Instant>>,
    taps: Mutex<Vec<ObservedTap>>,
}

impl ScriptedDriver {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    /// A driver that always serves `dump`.
    pub fn fixed(dump: ScreenDump) -> Arc<Self> {
        Self::new(vec![Step::Dump(dump)])
    }

    pub fn taps(&self) -> Vec<ObservedTap> {
        self.taps.lock().unwrap().clone()
    }

    /// Times at which the tree was queried.
    pub fn queries(&self) -> Vec<Instant> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDriver for ScriptedDriver {
    async fn dump_tree(&self) -> Result<ScreenDump, DriverError> {
        self.queries.lock().unwrap().push(Instant::now());
        let step = {
            let mut steps = self.steps.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(step) = steps.pop_front() {
                *last = Some(step);
            }
            last.clone()
        };
        match step {
            Some(Step::Dump(dump)) => Ok(dump),
            Some(Step::Fail(message)) => Err(DriverError::CommandFailed(message)),
            Some(Step::Disconnected) => Err(DriverError::NotConnected),
            None => Ok(ScreenDump::default()),
        }
    }

    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError> {
        self.taps.lock().unwrap().push(ObservedTap { x, y, at: Instant::now() });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording presenter
// ---------------------------------------------------------------------------

/// One call received by the recording presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Presented {
    Toast(String, ToastLength),
    Dialog(DialogRequest),
    Post(NotificationRequest),
    Cancel(String),
}

/// Presenter that records every request, optionally failing some of them.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<Presented>>,
    fail_toasts: bool,
    fail_posts_for: Mutex<Option<String>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A presenter on which every toast fails to render.
    pub fn failing_toasts() -> Arc<Self> {
        Arc::new(Self {
            fail_toasts: true,
            ..Default::default()
        })
    }

    /// Makes posts for `tag` fail until cleared.
    pub fn fail_posts_for(&self, tag: Option<&str>) {
        *self.fail_posts_for.lock().unwrap() = tag.map(String::from);
    }

    pub fn calls(&self) -> Vec<Presented> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn show_toast(&self, text: &str, length: ToastLength) -> Result<(), PresentationError> {
        self.calls
            .lock()
            .unwrap()
            .push(Presented::Toast(text.to_string(), length));
        if self.fail_toasts {
            return Err(PresentationError::Unavailable("no window".into()));
        }
        Ok(())
    }

    async fn show_dialog(&self, dialog: &DialogRequest) -> Result<(), PresentationError> {
        self.calls.lock().unwrap().push(Presented::Dialog(dialog.clone()));
        Ok(())
    }

    async fn post_notification(
        &self,
        notification: &NotificationRequest,
    ) -> Result<(), PresentationError> {
        self.calls
            .lock()
            .unwrap()
            .push(Presented::Post(notification.clone()));
        if self.fail_posts_for.lock().unwrap().as_deref() == Some(notification.tag.as_str()) {
            return Err(PresentationError::Rejected("channel disabled".into()));
        }
        Ok(())
    }

    async fn cancel_notification(&self, tag: &str) -> Result<(), PresentationError> {
        self.calls
            .lock()
            .unwrap()
            .push(Presented::Cancel(tag.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handler construction
// ---------------------------------------------------------------------------

/// Generate a unique session name for test isolation.
pub fn unique_session_name() -> String {
    format!(
        "test_{}",
        &uuid::Uuid::new_v4().to_string().replace('-', "")[..8]
    )
}

/// Builds a handler over the given doubles with the default configuration.
pub fn handler_with(
    driver: Arc<dyn AutomationDriver>,
    presenter: Arc<dyn Presenter>,
) -> CommandHandler {
    handler_with_config(driver, presenter, UictlConfig::default())
}

pub fn handler_with_config(
    driver: Arc<dyn AutomationDriver>,
    presenter: Arc<dyn Presenter>,
    config: UictlConfig,
) -> CommandHandler {
    CommandHandler::new(driver, presenter, config, &unique_session_name())
}

// ---------------------------------------------------------------------------
// TestHarness: full-stack test fixture
// ---------------------------------------------------------------------------

/// Serves a handler backed by a [`FixtureDriver`] over IPC.
pub struct TestHarness {
    /// The fixture the handler taps against.
    pub fixture: Arc<FixtureDriver>,
    /// The presenter receiving presentation requests.
    pub presenter: Arc<RecordingPresenter>,
    /// The unique session name (used for IPC socket path).
    pub session_name: String,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl TestHarness {
    /// Starts a handler and IPC server showing `dump`.
    pub async fn start(dump: ScreenDump) -> Self {
        let session_name = unique_session_name();
        let fixture = Arc::new(FixtureDriver::new(dump));
        let presenter = RecordingPresenter::new();

        let mut config = UictlConfig::default();
        config.retry.timeout_ms = 300;
        config.retry.interval_ms = 50;

        let handler = CommandHandler::new(fixture.clone(), presenter.clone(), config, &session_name);
        let executor = CommandExecutor::new(Arc::new(handler));
        let server = IpcServer::new(executor, &session_name).with_fixture(fixture.clone());

        let server_handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Give the IPC server a moment to bind the Unix socket.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            fixture,
            presenter,
            session_name,
            _server_handle: server_handle,
        }
    }

    /// Connect an IPC client to this harness's session.
    pub async fn connect_client(&self) -> IpcClient {
        IpcClient::connect(&self.session_name).await.unwrap()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self._server_handle.abort();
    }
}
