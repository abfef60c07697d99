//! Integration tests for the engine state machine, driven entirely against
//! mock backends.

use std::{sync::Arc, time::Duration};

use mac_winlist::{Rect, WindowInfo, ops::MockWinList};
use pin_engine::{
    Engine, MemoryPrefs, MockCapture, MockOverlayFactory, OverlayEvent, PinError, Prefs,
};
use pin_protocol::StateName;
use tokio::time::sleep;

struct Harness {
    engine: Engine,
    winlist: MockWinList,
    capture: MockCapture,
    overlays: MockOverlayFactory,
    prefs: Arc<MemoryPrefs>,
}

fn harness() -> Harness {
    let winlist = MockWinList::new();
    let capture = MockCapture::new();
    let overlays = MockOverlayFactory::new();
    let prefs = Arc::new(MemoryPrefs::new());
    let engine = Engine::new(
        Arc::new(winlist.clone()),
        Arc::new(capture.clone()),
        Arc::new(overlays.clone()),
        prefs.clone(),
    );
    Harness {
        engine,
        winlist,
        capture,
        overlays,
        prefs,
    }
}

fn win(pid: i32, id: u32, app: &str, bundle: &str) -> WindowInfo {
    WindowInfo {
        pid,
        id,
        app: app.into(),
        title: Some(format!("{app} window")),
        bundle_id: bundle.into(),
        bounds: Rect::new(100.0, 100.0, 800.0, 600.0),
        layer: 0,
        is_on_screen: true,
    }
}

/// Pinning the frontmost window skips an excluded launcher sitting in front.
#[tokio::test]
async fn pin_active_skips_excluded_frontmost() {
    let h = harness();
    h.winlist.set_windows(vec![
        win(1, 10, "Launcher", "com.raycast.macos"),
        win(2, 20, "Editor", "com.example.editor"),
    ]);

    h.engine.pin_active().await.unwrap();

    let status = h.engine.status();
    assert_eq!(status.state, StateName::Mirroring);
    assert!(status.pinned);
    assert!(status.mirror_visible);
    assert_eq!(status.target_app_name.as_deref(), Some("Editor"));
    assert!(status.pinned_since.is_some());
    assert_eq!(h.capture.started_ids(), vec![20]);
    assert!(h.overlays.last().unwrap().shown());
}

/// An unknown window id fails without leaving Idle.
#[tokio::test]
async fn pin_unknown_window_stays_idle() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);

    let err = h.engine.pin_window(u32::MAX).await.unwrap_err();
    assert!(matches!(err, PinError::NoTargetWindow));
    assert_eq!(err.to_string(), "No target window found");

    let status = h.engine.status();
    assert_eq!(status.state, StateName::Idle);
    assert!(!status.pinned);
    assert!(h.capture.started_ids().is_empty());
}

#[tokio::test]
async fn pin_active_with_no_candidates_fails() {
    let h = harness();
    let err = h.engine.pin_active().await.unwrap_err();
    assert!(matches!(err, PinError::NoTargetWindow));
    assert_eq!(h.engine.status().state, StateName::Idle);
}

/// Hover-enter hides the mirror; hover-exit restores it.
#[tokio::test]
async fn hover_see_through_and_restore() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    let overlay = h.overlays.last().unwrap();
    let events = h.overlays.last_events().unwrap();

    events.send(OverlayEvent::HoverEnter).unwrap();
    sleep(Duration::from_millis(30)).await;
    let status = h.engine.status();
    assert_eq!(status.state, StateName::MirrorHidden);
    assert!(status.pinned);
    assert!(!status.mirror_visible);
    assert!(overlay.hidden_mode());

    events.send(OverlayEvent::HoverExit).unwrap();
    sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.status().state, StateName::Mirroring);
    assert!(!overlay.hidden_mode());
}

/// A disappearing target auto-unpins within the liveness window.
#[tokio::test]
async fn target_disappearance_unpins() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();

    h.winlist.remove_window(20);
    sleep(Duration::from_millis(1400)).await;

    let status = h.engine.status();
    assert_eq!(status.state, StateName::Idle);
    assert!(!status.pinned);
    assert!(status.target_app_name.is_none());
    assert!(status.pinned_since.is_none());
    assert!(h.overlays.last().unwrap().closed());
    assert_eq!(h.capture.stop_count(), 1);
}

/// Re-pinning tears the old epoch down before the new one starts.
#[tokio::test]
async fn repin_replaces_target() {
    let h = harness();
    h.winlist.set_windows(vec![
        win(2, 20, "Editor", "com.example.editor"),
        win(3, 30, "Terminal", "com.example.term"),
    ]);
    h.engine.pin_active().await.unwrap();
    h.engine.pin_window(30).await.unwrap();

    let status = h.engine.status();
    assert_eq!(status.state, StateName::Mirroring);
    assert_eq!(status.target_app_name.as_deref(), Some("Terminal"));
    assert_eq!(h.capture.started_ids(), vec![20, 30]);
    assert_eq!(h.capture.stop_count(), 1);
    assert!(h.capture.is_capturing());

    let overlays = h.overlays.created();
    assert_eq!(overlays.len(), 2);
    assert!(overlays[0].closed(), "first overlay torn down");
    assert!(overlays[0].callbacks_cleared());
    assert!(!overlays[1].closed(), "second overlay live");
}

#[tokio::test]
async fn pin_while_pinned_requires_no_explicit_unpin() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    // Same target again: still a full unpin/pin cycle per the re-pin rule.
    h.engine.pin_active().await.unwrap();
    assert_eq!(h.capture.started_ids(), vec![20, 20]);
    assert_eq!(h.engine.status().state, StateName::Mirroring);
}

#[tokio::test]
async fn unpin_and_panic_are_idempotent() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();

    h.engine.unpin();
    h.engine.unpin();
    assert_eq!(h.engine.status().state, StateName::Idle);
    assert_eq!(h.capture.stop_count(), 1);

    h.engine.panic();
    h.engine.panic();
    assert_eq!(h.engine.status().state, StateName::Idle);
    assert_eq!(h.capture.stop_count(), 1);
}

#[tokio::test]
async fn hide_show_hide_round_trip() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();

    h.engine.hide_mirror().unwrap();
    h.engine.show_mirror().unwrap();
    h.engine.hide_mirror().unwrap();
    assert_eq!(h.engine.status().state, StateName::MirrorHidden);

    // Hiding twice is an invalid transition, not a state change.
    let err = h.engine.hide_mirror().unwrap_err();
    assert!(matches!(err, PinError::InvalidStateTransition { .. }));
    assert_eq!(h.engine.status().state, StateName::MirrorHidden);
}

#[tokio::test]
async fn unpin_clicked_from_overlay_unpins() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    let events = h.overlays.last_events().unwrap();

    events.send(OverlayEvent::UnpinRequested).unwrap();
    sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.status().state, StateName::Idle);
    assert!(h.overlays.last().unwrap().closed());
}

#[tokio::test]
async fn opacity_clamps_and_persists_across_restart() {
    let h = harness();
    assert_eq!(h.engine.set_opacity(0.0), 0.1);
    assert_eq!(h.prefs.get_f64("mirrorOpacity"), Some(0.1));
    assert_eq!(h.engine.set_opacity(2.0), 1.0);
    assert_eq!(h.prefs.get_f64("mirrorOpacity"), Some(1.0));

    // A fresh engine over the same store sees the persisted value and
    // applies it to the next pin's overlay.
    h.engine.set_opacity(0.3);
    let winlist = MockWinList::new();
    winlist.set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    let overlays = MockOverlayFactory::new();
    let restarted = Engine::new(
        Arc::new(winlist),
        Arc::new(MockCapture::new()),
        Arc::new(overlays.clone()),
        h.prefs.clone(),
    );
    assert_eq!(restarted.opacity(), 0.3);
    restarted.pin_active().await.unwrap();
    assert_eq!(overlays.last().unwrap().opacity(), Some(0.3));
}

#[tokio::test]
async fn opacity_applies_to_live_overlay() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    h.engine.set_opacity(0.5);
    assert_eq!(h.overlays.last().unwrap().opacity(), Some(0.5));
}

#[tokio::test]
async fn permission_denied_lands_in_error_and_recovers() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.capture.set_deny_permission(true);

    let err = h.engine.pin_active().await.unwrap_err();
    assert!(matches!(err, PinError::PermissionDenied("capture")));
    assert_eq!(h.engine.status().state, StateName::Error);
    assert!(!h.engine.status().pinned);
    // The partially built overlay was torn down.
    assert!(h.overlays.last().unwrap().closed());

    // Pinning from Error is illegal until unpin.
    h.capture.set_deny_permission(false);
    let err = h.engine.pin_active().await.unwrap_err();
    assert!(matches!(err, PinError::InvalidStateTransition { .. }));

    h.engine.unpin();
    assert_eq!(h.engine.status().state, StateName::Idle);
    h.engine.pin_active().await.unwrap();
    assert_eq!(h.engine.status().state, StateName::Mirroring);
}

#[tokio::test]
async fn missing_shareable_content_is_a_capture_failure() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.capture.set_not_shareable(true);

    let err = h.engine.pin_active().await.unwrap_err();
    match err {
        PinError::CaptureFailure(reason) => assert_eq!(reason, "not-in-shareable-content"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.engine.status().state, StateName::Error);
}

#[tokio::test]
async fn geometry_changes_flow_to_overlay_and_capture() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();

    let moved = Rect::new(300.0, 150.0, 640.0, 480.0);
    h.winlist.set_bounds(20, moved);
    sleep(Duration::from_millis(300)).await;

    let overlay = h.overlays.last().unwrap();
    assert_eq!(overlay.frames_set().last(), Some(&moved));
    assert_eq!(h.capture.resizes().last(), Some(&moved));
}

#[tokio::test]
async fn frontmost_target_keeps_mirror_hidden() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    h.engine.hide_mirror().unwrap();

    // The target app coming forward is exactly the see-through scenario.
    h.engine.on_frontmost_changed(2);
    sleep(Duration::from_millis(700)).await;
    assert_eq!(h.engine.status().state, StateName::MirrorHidden);
}

#[tokio::test]
async fn early_foreground_change_reshows_after_settle() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    h.engine.hide_mirror().unwrap();

    // Foreground flips to a third app immediately after hiding: the re-show
    // is deferred to the 500 ms mark, then fires.
    h.engine.on_frontmost_changed(9);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(h.engine.status().state, StateName::MirrorHidden);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.engine.status().state, StateName::Mirroring);
}

#[tokio::test]
async fn late_foreground_change_reshows_immediately() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    h.engine.hide_mirror().unwrap();

    sleep(Duration::from_millis(600)).await;
    h.engine.on_frontmost_changed(9);
    sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.status().state, StateName::Mirroring);
}

#[tokio::test]
async fn deferred_reshow_cancelled_when_target_returns() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);
    h.engine.pin_active().await.unwrap();
    h.engine.hide_mirror().unwrap();

    h.engine.on_frontmost_changed(9);
    sleep(Duration::from_millis(100)).await;
    // Target comes back before the re-check fires; the mirror stays hidden.
    h.engine.on_frontmost_changed(2);
    sleep(Duration::from_millis(600)).await;
    assert_eq!(h.engine.status().state, StateName::MirrorHidden);
}

#[tokio::test]
async fn status_reflects_each_state() {
    let h = harness();
    h.winlist
        .set_windows(vec![win(2, 20, "Editor", "com.example.editor")]);

    let idle = h.engine.status();
    assert_eq!(idle.state, StateName::Idle);
    assert!(!idle.pinned && !idle.mirror_visible);
    assert!(idle.target_app_name.is_none());

    h.engine.pin_active().await.unwrap();
    let pinned = h.engine.status();
    assert!(pinned.pinned && pinned.mirror_visible);
    assert_eq!(
        pinned.target_window_title.as_deref(),
        Some("Editor window")
    );

    h.engine.hide_mirror().unwrap();
    let hidden = h.engine.status();
    assert!(hidden.pinned && !hidden.mirror_visible);
    assert_eq!(hidden.state, StateName::MirrorHidden);
}
