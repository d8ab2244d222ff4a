//! Single-writer execution context for the UI surface.
//!
//! The UI tree and the synthetic-input primitive must not be touched from
//! several contexts at once. [`UiContext::spawn`] moves the driver into one
//! dedicated task; callers hold a cheap, cloneable [`UiContext`] and submit
//! jobs over a bounded channel, awaiting the reply. Jobs run strictly one at a
//! time in submission order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, Instrument};

use crate::driver::{AutomationDriver, DriverError};
use crate::snapshot::UiSnapshot;

enum UiJob {
    Snapshot {
        reply: oneshot::Sender<Result<UiSnapshot, DriverError>>,
    },
    Tap {
        x: i32,
        y: i32,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
}

/// Handle to the task that owns the driver.
#[derive(Clone)]
pub struct UiContext {
    tx: mpsc::Sender<UiJob>,
}

impl UiContext {
    /// Spawns the owning task.
    ///
    /// The task stops once every `UiContext` clone has been dropped.
    ///
    /// # Arguments
    ///
    /// * `driver` - The tree provider and input backend
    /// * `queue_depth` - How many jobs may wait before submitters are back-pressured
    pub fn spawn(driver: Arc<dyn AutomationDriver>, queue_depth: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let join_handle = tokio::spawn(Self::run_loop(driver, rx));
        (Self { tx }, join_handle)
    }

    async fn run_loop(driver: Arc<dyn AutomationDriver>, mut rx: mpsc::Receiver<UiJob>) {
        while let Some(job) = rx.recv().await {
            match job {
                UiJob::Snapshot { reply } => {
                    let result = driver
                        .snapshot()
                        .instrument(debug_span!("ui_snapshot"))
                        .await;
                    if let Ok(ref snapshot) = result {
                        debug!(nodes = snapshot.len(), "snapshot taken");
                    }
                    let _ = reply.send(result);
                }
                UiJob::Tap { x, y, reply } => {
                    let result = driver
                        .tap_location(x, y)
                        .instrument(debug_span!("ui_tap", x, y))
                        .await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!("ui context stopped");
    }

    /// Queries the tree on the UI context.
    pub async fn snapshot(&self) -> Result<UiSnapshot, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.submit(UiJob::Snapshot { reply }).await?;
        rx.await.map_err(|_| DriverError::NotConnected)?
    }

    /// Taps a screen coordinate on the UI context.
    pub async fn tap(&self, x: i32, y: i32) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.submit(UiJob::Tap { x, y, reply }).await?;
        rx.await.map_err(|_| DriverError::NotConnected)?
    }

    async fn submit(&self, job: UiJob) -> Result<(), DriverError> {
        self.tx.send(job).await.map_err(|_| DriverError::NotConnected)
    }
}

impl std::fmt::Debug for UiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiContext")
            .field("tx", &"<mpsc::Sender<UiJob>>")
            .finish()
    }
}
