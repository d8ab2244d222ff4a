//! Presentation routing: toasts, dialogs and tagged notifications.
//!
//! Every request is pushed onto one FIFO queue drained by a dedicated worker
//! task that talks to the [`Presenter`]. Callers never wait on the presenter
//! and never see its failures; those are logged and absorbed.
//!
//! Notifications are additionally tracked in a map keyed by tag. Updating
//! the map and enqueueing the presenter call happen under the same lock, so
//! the presenter observes post/cancel operations for a tag in exactly the
//! order the map applied them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::presenter::{
    DialogRequest, NotificationChannel, NotificationRequest, Presenter, ToastLength,
};

/// A notification currently believed to be on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveNotification {
    pub tag: String,
    pub title: String,
    pub message: String,
    pub channel: NotificationChannel,
    pub posted_at: DateTime<Utc>,
    /// Bumped on every post; lets a failed post tell whether it was superseded.
    pub revision: u64,
}

#[derive(Default)]
struct NotificationBook {
    active: HashMap<String, ActiveNotification>,
    next_revision: u64,
}

enum PresentationJob {
    Toast { text: String, length: ToastLength },
    Dialog(DialogRequest),
    Post { request: NotificationRequest, revision: u64 },
    Cancel { tag: String },
    Flush(oneshot::Sender<()>),
}

/// Routes presentation requests to a [`Presenter`] without blocking callers.
pub struct PresentationRouter {
    queue: mpsc::UnboundedSender<PresentationJob>,
    book: Arc<Mutex<NotificationBook>>,
}

impl PresentationRouter {
    /// Creates the router and spawns its presentation worker.
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let book = Arc::new(Mutex::new(NotificationBook::default()));
        tokio::spawn(Self::run_worker(presenter, rx, book.clone()));
        Self { queue, book }
    }

    async fn run_worker(
        presenter: Arc<dyn Presenter>,
        mut rx: mpsc::UnboundedReceiver<PresentationJob>,
        book: Arc<Mutex<NotificationBook>>,
    ) {
        while let Some(job) = rx.recv().await {
            match job {
                PresentationJob::Toast { text, length } => {
                    if let Err(e) = presenter.show_toast(&text, length).await {
                        warn!(error = %e, ?length, "toast not shown");
                    }
                }
                PresentationJob::Dialog(dialog) => {
                    if let Err(e) = presenter.show_dialog(&dialog).await {
                        warn!(error = %e, "dialog not shown");
                    }
                }
                PresentationJob::Post { request, revision } => {
                    if let Err(e) = presenter.post_notification(&request).await {
                        warn!(error = %e, tag = %request.tag, "notification not posted");
                        let mut book = book.lock().await;
                        let superseded = book
                            .active
                            .get(&request.tag)
                            .map_or(true, |n| n.revision != revision);
                        if !superseded {
                            book.active.remove(&request.tag);
                        }
                    }
                }
                PresentationJob::Cancel { tag } => {
                    if let Err(e) = presenter.cancel_notification(&tag).await {
                        warn!(error = %e, %tag, "notification not cancelled");
                    }
                }
                PresentationJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("presentation worker stopped");
    }

    fn enqueue(&self, job: PresentationJob) {
        if self.queue.send(job).is_err() {
            warn!("presentation worker is gone; request dropped");
        }
    }

    /// Queues a toast.
    pub fn show_toast(&self, text: String, length: ToastLength) {
        self.enqueue(PresentationJob::Toast { text, length });
    }

    /// Queues a dialog.
    pub fn show_dialog(&self, dialog: DialogRequest) {
        self.enqueue(PresentationJob::Dialog(dialog));
    }

    /// Posts or replaces the notification with this tag.
    pub async fn post_notification(&self, request: NotificationRequest) {
        let mut book = self.book.lock().await;
        book.next_revision += 1;
        let revision = book.next_revision;
        let previous = book.active.insert(
            request.tag.clone(),
            ActiveNotification {
                tag: request.tag.clone(),
                title: request.title.clone(),
                message: request.message.clone(),
                channel: request.channel,
                posted_at: Utc::now(),
                revision,
            },
        );
        debug!(tag = %request.tag, replaced = previous.is_some(), "notification upserted");
        self.enqueue(PresentationJob::Post { request, revision });
    }

    /// Cancels the notification with this tag. Unknown tags are ignored.
    ///
    /// Returns whether a notification was active.
    pub async fn cancel_notification(&self, tag: &str) -> bool {
        let mut book = self.book.lock().await;
        if book.active.remove(tag).is_none() {
            debug!(tag, "cancel for unknown notification ignored");
            return false;
        }
        self.enqueue(PresentationJob::Cancel {
            tag: tag.to_string(),
        });
        true
    }

    /// Active notifications, sorted by tag.
    pub async fn active_notifications(&self) -> Vec<ActiveNotification> {
        let book = self.book.lock().await;
        let mut active: Vec<_> = book.active.values().cloned().collect();
        active.sort_by(|a, b| a.tag.cmp(&b.tag));
        active
    }

    /// Waits until every request queued before this call has been handed to
    /// the presenter.
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        self.enqueue(PresentationJob::Flush(done));
        let _ = rx.await;
    }
}

impl std::fmt::Debug for PresentationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationRouter")
            .field("queue", &"<mpsc::UnboundedSender<PresentationJob>>")
            .field("book", &"<Mutex<NotificationBook>>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::presenter::PresentationError;

    #[derive(Default)]
    struct FlakyPresenter {
        fail_posts: bool,
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Presenter for FlakyPresenter {
        async fn show_toast(&self, text: &str, _: ToastLength) -> Result<(), PresentationError> {
            self.calls.lock().unwrap().push(format!("toast:{}", text));
            Err(PresentationError::Unavailable("no window token".into()))
        }

        async fn show_dialog(&self, dialog: &DialogRequest) -> Result<(), PresentationError> {
            self.calls.lock().unwrap().push(format!("dialog:{}", dialog.message));
            Ok(())
        }

        async fn post_notification(
            &self,
            notification: &NotificationRequest,
        ) -> Result<(), PresentationError> {
            self.calls.lock().unwrap().push(format!("post:{}", notification.tag));
            if self.fail_posts {
                Err(PresentationError::Rejected("channel disabled".into()))
            } else {
                Ok(())
            }
        }

        async fn cancel_notification(&self, tag: &str) -> Result<(), PresentationError> {
            self.calls.lock().unwrap().push(format!("cancel:{}", tag));
            Ok(())
        }
    }

    fn request(tag: &str, title: &str) -> NotificationRequest {
        NotificationRequest {
            tag: tag.into(),
            title: title.into(),
            message: "m".into(),
            channel: NotificationChannel::Default,
        }
    }

    #[tokio::test]
    async fn toast_failure_is_absorbed_and_queue_keeps_going() {
        let presenter = Arc::new(FlakyPresenter::default());
        let router = PresentationRouter::new(presenter.clone());

        router.show_toast("first".into(), ToastLength::Short);
        router.show_dialog(DialogRequest {
            title: None,
            message: "second".into(),
            positive_label: None,
        });
        router.flush().await;

        let calls = presenter.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["toast:first", "dialog:second"]);
    }

    #[tokio::test]
    async fn repost_replaces_by_tag() {
        let presenter = Arc::new(FlakyPresenter::default());
        let router = PresentationRouter::new(presenter.clone());

        router.post_notification(request("sync", "Syncing")).await;
        router.post_notification(request("sync", "Synced")).await;
        router.flush().await;

        let active = router.active_notifications().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Synced");
        assert_eq!(active[0].revision, 2);
    }

    #[tokio::test]
    async fn cancel_unknown_tag_is_noop() {
        let presenter = Arc::new(FlakyPresenter::default());
        let router = PresentationRouter::new(presenter.clone());

        assert!(!router.cancel_notification("ghost").await);
        router.flush().await;
        assert!(presenter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_post_is_forgotten() {
        let presenter = Arc::new(FlakyPresenter {
            fail_posts: true,
            ..Default::default()
        });
        let router = PresentationRouter::new(presenter.clone());

        router.post_notification(request("update", "Update ready")).await;
        router.flush().await;

        assert!(router.active_notifications().await.is_empty());
    }
}
