//! Synthetic taps, immediate and delayed.
//!
//! The [`ActionDispatcher`] derives tap points for element handles and sends
//! taps to the [`UiContext`]. Delayed taps are registered as [`PendingTap`]s and
//! fired by a timer task through the same primitive as immediate taps, so
//! both paths behave identically once the fire time is reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CommandError;
use crate::snapshot::{ElementHandle, UiSnapshot};
use crate::ui_context::UiContext;

/// A scheduled tap waiting for its fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTap {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
    pub delay_ms: u64,
    /// Wall-clock time the tap was scheduled.
    pub scheduled_at: DateTime<Utc>,
    /// Monotonic creation timestamp; the tap fires at `created_at + delay`.
    /// Only meaningful inside the process that scheduled the tap.
    #[serde(skip, default = "Instant::now")]
    pub created_at: Instant,
}

impl PendingTap {
    pub fn fire_at(&self) -> Instant {
        self.created_at + Duration::from_millis(self.delay_ms)
    }
}

/// Performs taps against the UI context.
pub struct ActionDispatcher {
    ui: UiContext,
    pending: Arc<Mutex<HashMap<Uuid, PendingTap>>>,
}

impl ActionDispatcher {
    pub fn new(ui: UiContext) -> Self {
        Self {
            ui,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Derives the tap point for an element: the center of the part of its
    /// bounds that is on screen.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnreachableTarget`] if the handle is not from this
    /// snapshot, the element has no bounds, its bounds have zero area, or no
    /// part of them is on screen.
    pub fn tap_point(snapshot: &UiSnapshot, handle: ElementHandle) -> Result<(i32, i32), CommandError> {
        let node = snapshot.get(handle).ok_or_else(|| {
            CommandError::UnreachableTarget("element handle is not from this snapshot".to_string())
        })?;
        let frame = node
            .frame
            .ok_or_else(|| CommandError::UnreachableTarget("element has no bounds".to_string()))?;
        if frame.is_empty() {
            return Err(CommandError::UnreachableTarget(format!(
                "element bounds have zero area ({}x{})",
                frame.width, frame.height
            )));
        }
        let visible = frame.clip_to(&snapshot.screen()).ok_or_else(|| {
            CommandError::UnreachableTarget(format!(
                "element at ({}, {}) is off-screen",
                frame.x, frame.y
            ))
        })?;
        Ok(visible.center())
    }

    /// Taps a coordinate. No existence check is made.
    pub async fn tap(&self, x: i32, y: i32) -> Result<(), CommandError> {
        self.ui.tap(x, y).await?;
        info!(x, y, "tapped");
        Ok(())
    }

    /// Registers a tap to fire after `delay` and returns immediately.
    ///
    /// The tap is dropped without firing if `cancel` is triggered first.
    pub async fn schedule_delayed_tap(
        &self,
        x: i32,
        y: i32,
        delay: Duration,
        cancel: CancellationToken,
    ) -> PendingTap {
        let tap = PendingTap {
            id: Uuid::new_v4(),
            x,
            y,
            delay_ms: delay.as_millis() as u64,
            scheduled_at: Utc::now(),
            created_at: Instant::now(),
        };
        self.pending.lock().await.insert(tap.id, tap.clone());
        debug!(id = %tap.id, x, y, delay_ms = tap.delay_ms, "delayed tap scheduled");

        let ui = self.ui.clone();
        let pending = self.pending.clone();
        let id = tap.id;
        let fire_at = tap.fire_at();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    pending.lock().await.remove(&id);
                    debug!(%id, "delayed tap cancelled");
                }
                _ = tokio::time::sleep_until(fire_at) => {
                    pending.lock().await.remove(&id);
                    match ui.tap(x, y).await {
                        Ok(()) => info!(%id, x, y, "delayed tap fired"),
                        Err(e) => warn!(%id, x, y, error = %e, "delayed tap failed"),
                    }
                }
            }
        });

        tap
    }

    /// Taps scheduled but not yet fired or cancelled, oldest first.
    pub async fn pending(&self) -> Vec<PendingTap> {
        let mut taps: Vec<_> = self.pending.lock().await.values().cloned().collect();
        taps.sort_by_key(|t| t.created_at);
        taps
    }
}
