//! Integration tests for the command handler.
//!
//! Tests cover:
//! - Notification upsert/cancel semantics, including concurrent callers
//! - Presentation failures being absorbed
//! - Find-then-act polling, timeouts and scope filtering
//! - Delayed taps and their session binding
//!
//! Timing-sensitive tests run on a paused clock so the retry budget elapses
//! instantly and deterministically.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use common::*;
use uictl_core::config::{Backoff, UictlConfig};
use uictl_core::element::ElementFrame;
use uictl_core::error::CommandError;
use uictl_core::locator::{Matcher, Scope};
use uictl_core::presenter::{NotificationChannel, ToastLength};

const GRANT: &str = "com.android.permissioncontroller/.GrantPermissionsActivity";
const OVERLAY: &str = "com.example.overlay/.FloatingActivity";

fn fast_retry(timeout_ms: u64) -> UictlConfig {
    let mut config = UictlConfig::default();
    config.retry.timeout_ms = timeout_ms;
    config.retry.interval_ms = 100;
    config.retry.backoff = Backoff::Fixed;
    config
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn battery_notification_is_posted_then_cancelled() {
    let presenter = RecordingPresenter::new();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler
        .show_notification("battery", "Low battery", "15%", true)
        .await
        .unwrap();

    let active = handler.active_notifications().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].tag, "battery");
    assert_eq!(active[0].title, "Low battery");
    assert_eq!(active[0].channel, NotificationChannel::Important);

    handler.cancel_notification("battery").await.unwrap();
    assert!(handler
        .active_notifications()
        .await
        .iter()
        .all(|n| n.tag != "battery"));

    handler.flush_presentation().await;
    let calls = presenter.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], Presented::Post(n) if n.tag == "battery" && n.message == "15%"));
    assert_eq!(calls[1], Presented::Cancel("battery".to_string()));
}

#[tokio::test]
async fn reposting_a_tag_replaces_the_notification() {
    let presenter = RecordingPresenter::new();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler.show_notification("sync", "Sync", "Started", false).await.unwrap();
    handler.show_notification("sync", "Sync", "Done", false).await.unwrap();

    let active = handler.active_notifications().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "Done");
    assert_eq!(active[0].channel, NotificationChannel::Default);
}

#[tokio::test]
async fn cancelling_an_unknown_tag_is_a_noop() {
    let presenter = RecordingPresenter::new();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler.cancel_notification("never-posted").await.unwrap();

    handler.flush_presentation().await;
    assert!(handler.active_notifications().await.is_empty());
    assert!(presenter.calls().is_empty());
}

#[tokio::test]
async fn blank_tag_is_rejected() {
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), RecordingPresenter::new());

    let err = handler.show_notification("  ", "t", "m", false).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
    let err = handler.cancel_notification("").await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
}

#[tokio::test]
async fn failed_post_is_not_reported_active() {
    let presenter = RecordingPresenter::new();
    presenter.fail_posts_for(Some("sync"));
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler.show_notification("sync", "Sync", "Started", false).await.unwrap();
    handler.flush_presentation().await;

    assert!(handler.active_notifications().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_post_and_cancel_never_duplicate_a_tag() {
    let handler = Arc::new(handler_with(
        ScriptedDriver::fixed(screen(vec![])),
        RecordingPresenter::new(),
    ));

    let mut tasks = Vec::new();
    for i in 0..200 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            if i % 3 == 0 {
                handler.cancel_notification("download").await.unwrap();
            } else {
                handler
                    .show_notification("download", "Download", &format!("{}%", i), false)
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let active = handler.active_notifications().await;
    assert!(active.iter().filter(|n| n.tag == "download").count() <= 1);
}

// =============================================================================
// Toasts and dialogs
// =============================================================================

#[tokio::test]
async fn toast_failures_are_absorbed() {
    let presenter = RecordingPresenter::failing_toasts();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler.show_short_toast(&json!("Saved")).unwrap();
    handler.show_long_toast(&json!(42)).unwrap();
    handler.flush_presentation().await;

    assert_eq!(
        presenter.calls(),
        vec![
            Presented::Toast("Saved".into(), ToastLength::Short),
            Presented::Toast("42".into(), ToastLength::Long),
        ]
    );
}

#[tokio::test]
async fn null_toast_message_is_rejected() {
    let presenter = RecordingPresenter::new();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    let err = handler.show_short_toast(&serde_json::Value::Null).unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));

    handler.flush_presentation().await;
    assert!(presenter.calls().is_empty());
}

#[tokio::test]
async fn dialog_is_queued_with_optional_fields() {
    let presenter = RecordingPresenter::new();
    let handler = handler_with(ScriptedDriver::fixed(screen(vec![])), presenter.clone());

    handler.show_dialog(None, "Update ready", Some("Install")).unwrap();
    handler.flush_presentation().await;

    match &presenter.calls()[0] {
        Presented::Dialog(dialog) => {
            assert_eq!(dialog.title, None);
            assert_eq!(dialog.message, "Update ready");
            assert_eq!(dialog.positive_label.as_deref(), Some("Install"));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

// =============================================================================
// Find then act
// =============================================================================

#[tokio::test(start_paused = true)]
async fn allow_not_found_after_full_timeout() {
    let driver = ScriptedDriver::fixed(screen(vec![window(
        GRANT,
        vec![text_element("Deny", ElementFrame::new(0.0, 0.0, 100.0, 50.0))],
    )]));
    let handler = handler_with(driver.clone(), RecordingPresenter::new());
    let timeout = handler.config().retry.timeout();

    let start = Instant::now();
    let err = handler.find_and_click_view_by_text("Allow", None).await.unwrap_err();

    assert!(start.elapsed() >= timeout);
    match err {
        CommandError::ElementNotFound { attempts, elapsed_ms, .. } => {
            assert!(attempts >= 2);
            assert!(elapsed_ms >= timeout.as_millis() as u64);
        }
        other => panic!("expected ElementNotFound, got {:?}", other),
    }
    assert!(driver.queries().len() >= 2);
    assert!(driver.taps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_tree_still_retries_with_zero_timeout() {
    let driver = ScriptedDriver::fixed(screen(vec![]));
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(0));

    let err = handler.find_and_click_view_by_text("Allow", None).await.unwrap_err();

    assert!(matches!(err, CommandError::ElementNotFound { attempts: 2, .. }));
    assert_eq!(driver.queries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn element_appearing_later_is_tapped() {
    let empty = screen(vec![window(GRANT, vec![])]);
    let driver = ScriptedDriver::new(vec![
        Step::Dump(empty.clone()),
        Step::Fail("tree not ready".into()),
        Step::Dump(empty),
        Step::Dump(permission_prompt(GRANT)),
    ]);
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(5000));

    let outcome = handler.find_and_click_view_by_text("allow", None).await.unwrap();

    assert_eq!((outcome.x, outcome.y), (200, 230));
    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.elapsed_ms, 300);
    assert_eq!(driver.taps().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_connection_fails_without_waiting() {
    let driver = ScriptedDriver::new(vec![Step::Disconnected]);
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let start = Instant::now();
    let err = handler.find_and_click_view_by_id("ok", None).await.unwrap_err();

    assert_eq!(err.code(), "driver_error");
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn scope_excludes_matches_in_other_components() {
    let dump = screen(vec![
        window(
            OVERLAY,
            vec![
                text_element("Allow", ElementFrame::new(0.0, 0.0, 100.0, 100.0)),
                id_element("com.example.overlay:id/ok", ElementFrame::new(0.0, 100.0, 100.0, 100.0)),
            ],
        ),
        window(
            GRANT,
            vec![
                text_element("Allow", ElementFrame::new(100.0, 200.0, 200.0, 60.0)),
                id_element(
                    "com.android.permissioncontroller:id/ok",
                    ElementFrame::new(500.0, 1000.0, 200.0, 100.0),
                ),
            ],
        ),
    ]);
    let driver = ScriptedDriver::fixed(dump);
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let by_text = handler
        .find_and_click_view_by_text("Allow", Some("com.android.permissioncontroller"))
        .await
        .unwrap();
    assert_eq!((by_text.x, by_text.y), (200, 230));
    assert_eq!(by_text.match_count, 1);

    let by_id = handler.find_and_click_view_by_id("ok", Some(GRANT)).await.unwrap();
    assert_eq!((by_id.x, by_id.y), (600, 1050));

    // Without a scope the topmost window wins.
    let unscoped = handler.find_and_click_view_by_text("Allow", None).await.unwrap();
    assert_eq!((unscoped.x, unscoped.y), (50, 50));
    assert_eq!(unscoped.match_count, 2);

    let taps: Vec<_> = driver.taps().iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(taps, vec![(200, 230), (600, 1050), (50, 50)]);
}

#[tokio::test(start_paused = true)]
async fn scope_with_no_matching_component_is_not_found() {
    let driver = ScriptedDriver::fixed(permission_prompt(OVERLAY));
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(500));

    let err = handler
        .find_and_click_view_by_text("Allow", Some("com.android.permissioncontroller"))
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::ElementNotFound { .. }));
    assert!(driver.taps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn strict_mode_reports_ambiguity() {
    let dump = screen(vec![
        window(OVERLAY, vec![text_element("OK", ElementFrame::new(0.0, 0.0, 100.0, 100.0))]),
        window(GRANT, vec![text_element("OK", ElementFrame::new(0.0, 200.0, 100.0, 100.0))]),
    ]);
    let driver = ScriptedDriver::fixed(dump);
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let err = handler
        .find_and_click(Matcher::text("OK"), None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::AmbiguousMatch { count: 2, .. }));

    let scoped = handler
        .find_and_click(Matcher::text("OK"), Some(Scope::new(GRANT)), true)
        .await
        .unwrap();
    assert_eq!((scoped.x, scoped.y), (50, 250));
}

#[tokio::test(start_paused = true)]
async fn zero_area_match_is_unreachable_after_full_timeout() {
    let dump = screen(vec![window(
        GRANT,
        vec![text_element("Allow", ElementFrame::new(100.0, 200.0, 0.0, 0.0))],
    )]);
    let driver = ScriptedDriver::fixed(dump);
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(2000));

    let start = Instant::now();
    let err = handler.find_and_click_view_by_text("Allow", None).await.unwrap_err();

    assert!(matches!(err, CommandError::UnreachableTarget(ref m) if m.contains("zero area")));
    assert!(start.elapsed() >= Duration::from_millis(2000));
    assert!(driver.queries().len() >= 2);
    assert!(driver.taps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn match_is_tapped_once_it_has_been_laid_out() {
    let unlaid = screen(vec![window(
        GRANT,
        vec![text_element("Allow", ElementFrame::new(100.0, 200.0, 0.0, 0.0))],
    )]);
    let driver = ScriptedDriver::new(vec![Step::Dump(unlaid), Step::Dump(permission_prompt(GRANT))]);
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(2000));

    let outcome = handler.find_and_click_view_by_text("Allow", None).await.unwrap();

    assert_eq!((outcome.x, outcome.y), (200, 230));
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.elapsed_ms, 100);
    let taps: Vec<_> = driver.taps().iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(taps, vec![(200, 230)]);
}

#[tokio::test(start_paused = true)]
async fn unreachable_then_gone_is_not_found() {
    let unlaid = screen(vec![window(
        GRANT,
        vec![text_element("Allow", ElementFrame::new(100.0, 200.0, 0.0, 0.0))],
    )]);
    let driver = ScriptedDriver::new(vec![Step::Dump(unlaid), Step::Dump(screen(vec![]))]);
    let handler = handler_with_config(driver.clone(), RecordingPresenter::new(), fast_retry(500));

    let err = handler.find_and_click_view_by_text("Allow", None).await.unwrap_err();

    assert!(matches!(err, CommandError::ElementNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn partially_visible_match_is_tapped_on_screen() {
    let dump = screen(vec![window(
        GRANT,
        vec![text_element("Allow", ElementFrame::new(-1000.0, 200.0, 1100.0, 60.0))],
    )]);
    let driver = ScriptedDriver::fixed(dump);
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let outcome = handler.find_and_click_view_by_text("Allow", None).await.unwrap();

    assert_eq!((outcome.x, outcome.y), (50, 230));
    let taps: Vec<_> = driver.taps().iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(taps, vec![(50, 230)]);
}

#[tokio::test]
async fn blank_selectors_are_rejected_immediately() {
    let driver = ScriptedDriver::fixed(screen(vec![]));
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let err = handler.find_and_click_view_by_text("", None).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
    let err = handler.find_and_click_view_by_id(" ", None).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
    assert!(driver.queries().is_empty());
}

// =============================================================================
// Delayed taps
// =============================================================================

#[tokio::test(start_paused = true)]
async fn immediate_and_delayed_taps_hit_the_same_point() {
    let driver = ScriptedDriver::fixed(screen(vec![]));
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let now = handler.click_delay(540, 1200, 0).await.unwrap();
    // A zero delay is still scheduled; nothing is tapped before the caller yields.
    assert!(driver.taps().is_empty());
    assert_eq!(handler.pending_taps().await.len(), 1);
    let later = handler.click_delay(540, 1200, 750).await.unwrap();
    assert_eq!(later.delay_ms, 750);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let pending = handler.pending_taps().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, later.id);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let taps = driver.taps();
    assert_eq!(taps.len(), 2);
    assert!(taps.iter().all(|t| (t.x, t.y) == (540, 1200)));
    assert!(taps[0].at >= now.created_at);
    assert!(taps[1].at >= later.created_at + Duration::from_millis(750));
    assert!(handler.pending_taps().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn negative_delay_is_rejected() {
    let driver = ScriptedDriver::fixed(screen(vec![]));
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let err = handler.click_delay(1, 1, -5).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
    assert!(handler.pending_taps().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ending_the_session_drops_pending_taps() {
    let driver = ScriptedDriver::fixed(screen(vec![]));
    let handler = handler_with(driver.clone(), RecordingPresenter::new());

    let old = handler.session().await;
    handler.click_delay(10, 20, 1000).await.unwrap();
    let new = handler.end_session().await;
    assert!(old.is_ended());
    assert_ne!(old.id, new.id);

    handler.click_delay(30, 40, 500).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let taps: Vec<_> = driver.taps().iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(taps, vec![(30, 40)]);
    assert!(handler.pending_taps().await.is_empty());
}
