//! Presentation subsystem contract.
//!
//! The [`Presenter`] trait is the interface consumed from whatever actually
//! renders toasts, dialogs and notifications. The core never renders
//! anything itself; it only issues requests through this trait.
//! [`TracingPresenter`] is a headless implementation that records every
//! request in the log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors reported by a presentation backend.
#[derive(Error, Debug)]
pub enum PresentationError {
    /// The backend is not able to present anything right now.
    #[error("Presentation unavailable: {0}")]
    Unavailable(String),

    /// The backend refused this particular request.
    #[error("Presentation rejected: {0}")]
    Rejected(String),
}

/// How long a toast stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLength {
    Short,
    Long,
}

/// A modal prompt. Absent fields fall back to the backend's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRequest {
    pub title: Option<String>,
    pub message: String,
    pub positive_label: Option<String>,
}

/// Visibility channel a notification is posted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Heads-up, high visibility.
    Important,
    /// Silent, low visibility.
    Default,
}

impl NotificationChannel {
    pub fn for_importance(important: bool) -> Self {
        if important {
            NotificationChannel::Important
        } else {
            NotificationChannel::Default
        }
    }
}

/// A status notification identified by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub tag: String,
    pub title: String,
    pub message: String,
    pub channel: NotificationChannel,
}

/// Renders presentation requests on the real surface.
///
/// Posting a notification whose tag is already showing must replace it.
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn show_toast(&self, text: &str, length: ToastLength) -> Result<(), PresentationError>;

    async fn show_dialog(&self, dialog: &DialogRequest) -> Result<(), PresentationError>;

    async fn post_notification(
        &self,
        notification: &NotificationRequest,
    ) -> Result<(), PresentationError>;

    async fn cancel_notification(&self, tag: &str) -> Result<(), PresentationError>;
}

/// Headless presenter that writes every request to the log.
#[derive(Debug, Clone)]
pub struct TracingPresenter {
    default_dialog_title: String,
    default_positive_label: String,
}

impl TracingPresenter {
    pub fn new() -> Self {
        Self {
            default_dialog_title: "Notice".to_string(),
            default_positive_label: "OK".to_string(),
        }
    }
}

impl Default for TracingPresenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Presenter for TracingPresenter {
    async fn show_toast(&self, text: &str, length: ToastLength) -> Result<(), PresentationError> {
        info!(?length, text, "toast");
        Ok(())
    }

    async fn show_dialog(&self, dialog: &DialogRequest) -> Result<(), PresentationError> {
        let title = dialog.title.as_deref().unwrap_or(&self.default_dialog_title);
        let positive = dialog
            .positive_label
            .as_deref()
            .unwrap_or(&self.default_positive_label);
        info!(title, message = %dialog.message, positive, "dialog");
        Ok(())
    }

    async fn post_notification(
        &self,
        notification: &NotificationRequest,
    ) -> Result<(), PresentationError> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            message = %notification.message,
            channel = ?notification.channel,
            "notification posted"
        );
        Ok(())
    }

    async fn cancel_notification(&self, tag: &str) -> Result<(), PresentationError> {
        info!(tag, "notification cancelled");
        Ok(())
    }
}
