//! Pin Engine
//!
//! The engine coordinates the pin lifecycle: it owns the only mutable
//! [`AgentState`], the current target, the capture session and the overlay,
//! and enforces the legal transitions between Idle, Mirroring, MirrorHidden
//! and Error. Platform work happens behind the seams in [`deps`]:
//! window queries through `mac_winlist::ops::WinList`, frames through
//! [`deps::CaptureBackend`], windows through [`deps::OverlayFactory`].
//!
//! Construct an [`Engine`] inside a tokio runtime; it spawns one task to
//! pump overlay events and short-lived tasks for the hover re-show
//! re-check. The liveness (1 Hz) and geometry (10 Hz) polls run on a
//! [`Ticker`] and stop with the pin that started them.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use mac_winlist::{Rect, TargetDescriptor, WindowId, ops::WinList};
use parking_lot::Mutex;
use pin_protocol::AgentStatus;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

pub mod deps;
mod error;
mod prefs;
mod state;
mod ticker;

pub use deps::{
    CaptureBackend, Frame, FrameSink, MockCapture, MockOverlay, MockOverlayFactory, MockSink,
    Overlay, OverlayEvent, OverlayFactory,
};
pub use error::{PinError, Result};
pub use prefs::{
    MemoryPrefs, OPACITY_KEY, Prefs, UserDefaultsPrefs, clamp_opacity, decode_opacity,
};
pub use state::AgentState;
pub use ticker::Ticker;

/// Liveness poll interval: notice a closed target within about a second.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Geometry poll interval for tracking target moves and resizes.
const GEOMETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum time the mirror stays hidden before a foreground change may
/// re-show it, letting the focus handoff settle.
const RESHOW_SETTLE: Duration = Duration::from_millis(500);

const LIVENESS_TICKER: &str = "liveness";
const GEOMETRY_TICKER: &str = "geometry";

struct Inner {
    state: AgentState,
    target: Option<TargetDescriptor>,
    overlay: Option<Arc<dyn Overlay>>,
    last_bounds: Option<Rect>,
    pinned_since: Option<DateTime<Utc>>,
    mirror_hidden_at: Option<Instant>,
    last_frontmost_pid: i32,
    hover_epoch: u64,
    last_error: Option<String>,
}

impl Inner {
    fn empty() -> Self {
        Self {
            state: AgentState::Idle,
            target: None,
            overlay: None,
            last_bounds: None,
            pinned_since: None,
            mirror_hidden_at: None,
            last_frontmost_pid: -1,
            hover_epoch: 0,
            last_error: None,
        }
    }
}

enum ReshowAction {
    Now,
    Recheck { delay: Duration, epoch: u64 },
}

/// The agent state machine. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Engine {
    winlist: Arc<dyn WinList>,
    capture: Arc<dyn CaptureBackend>,
    overlay_factory: Arc<dyn OverlayFactory>,
    prefs: Arc<dyn Prefs>,
    ticker: Ticker,
    events_tx: UnboundedSender<OverlayEvent>,
    inner: Arc<Mutex<Inner>>,
}

impl Engine {
    /// Create an engine over the given backends.
    ///
    /// Must be called within a tokio runtime; the overlay event pump is
    /// spawned here.
    pub fn new(
        winlist: Arc<dyn WinList>,
        capture: Arc<dyn CaptureBackend>,
        overlay_factory: Arc<dyn OverlayFactory>,
        prefs: Arc<dyn Prefs>,
    ) -> Self {
        let (events_tx, mut events_rx) = unbounded_channel();
        let engine = Self {
            winlist,
            capture,
            overlay_factory,
            prefs,
            ticker: Ticker::new(),
            events_tx,
            inner: Arc::new(Mutex::new(Inner::empty())),
        };
        let pump = engine.clone();
        tokio::spawn(async move {
            while let Some(ev) = events_rx.recv().await {
                pump.handle_overlay_event(ev);
            }
        });
        engine
    }

    /// The window-list seam, shared with the dispatcher for `list-windows`.
    pub fn winlist(&self) -> Arc<dyn WinList> {
        self.winlist.clone()
    }

    // ---- Operations ----

    /// Pin the frontmost candidate window.
    ///
    /// If something is already pinned it is unpinned first, so the
    /// enumeration sees the desktop as the user does.
    pub async fn pin_active(&self) -> Result<()> {
        if self.current_state().pinned() {
            self.unpin();
        }
        let target = self
            .winlist
            .frontmost_candidate()
            .ok_or(PinError::NoTargetWindow)?;
        self.pin(target).await
    }

    /// Pin a specific window by CoreGraphics id.
    ///
    /// The id is resolved before any implicit unpin, so an unknown id
    /// leaves an existing pin untouched.
    pub async fn pin_window(&self, id: WindowId) -> Result<()> {
        let target = self
            .winlist
            .list_candidates()
            .into_iter()
            .find(|t| t.window_id == id)
            .ok_or(PinError::NoTargetWindow)?;
        if self.current_state().pinned() {
            self.unpin();
        }
        self.pin(target).await
    }

    /// Pin `target`: build the overlay, start capture, begin monitoring.
    ///
    /// Transactional: on any failure every partial resource is torn down
    /// and the machine lands in [`AgentState::Error`].
    pub async fn pin(&self, target: TargetDescriptor) -> Result<()> {
        {
            let inner = self.inner.lock();
            match inner.state {
                AgentState::Idle => {}
                from @ (AgentState::Mirroring | AgentState::MirrorHidden | AgentState::Error) => {
                    return Err(PinError::InvalidStateTransition {
                        from,
                        to: AgentState::Mirroring,
                    });
                }
            }
        }
        info!(app = %target.app_name, window_id = target.window_id, "pin_start");

        let overlay = match self.overlay_factory.create(&target, self.events_tx.clone()) {
            Ok(o) => o,
            Err(e) => return self.fail_pin(e),
        };
        overlay.set_opacity(self.opacity());
        overlay.show();

        let sink = overlay.frame_sink();
        if let Err(e) = self.capture.start(&target, sink).await {
            overlay.clear_callbacks();
            overlay.close();
            return self.fail_pin(e);
        }
        debug!("capture_started");

        let liveness = self.clone();
        self.ticker.start(LIVENESS_TICKER, LIVENESS_INTERVAL, move || {
            liveness.liveness_tick();
        });
        let geometry = self.clone();
        self.ticker.start(GEOMETRY_TICKER, GEOMETRY_INTERVAL, move || {
            geometry.geometry_tick();
        });

        {
            let mut inner = self.inner.lock();
            inner.state = AgentState::Mirroring;
            inner.last_bounds = Some(target.bounds);
            inner.target = Some(target);
            inner.overlay = Some(overlay);
            inner.pinned_since = Some(Utc::now());
            inner.mirror_hidden_at = None;
            inner.last_error = None;
        }
        debug!("state_transition: idle -> mirroring");
        Ok(())
    }

    fn fail_pin(&self, e: PinError) -> Result<()> {
        warn!(error = %e, "pin_failed");
        {
            let mut inner = self.inner.lock();
            inner.state = AgentState::Error;
            inner.last_error = Some(e.to_string());
            inner.target = None;
            inner.overlay = None;
            inner.last_bounds = None;
            inner.pinned_since = None;
            inner.mirror_hidden_at = None;
        }
        Err(e)
    }

    /// Unconditional cleanup back to Idle. Idempotent.
    pub fn unpin(&self) {
        self.ticker.stop(LIVENESS_TICKER);
        self.ticker.stop(GEOMETRY_TICKER);
        let (overlay, was) = {
            let mut inner = self.inner.lock();
            let was = inner.state;
            inner.state = AgentState::Idle;
            inner.target = None;
            inner.last_bounds = None;
            inner.pinned_since = None;
            inner.mirror_hidden_at = None;
            inner.last_error = None;
            inner.hover_epoch += 1;
            (inner.overlay.take(), was)
        };
        if let Some(overlay) = overlay {
            // Callbacks first so nothing re-enters during teardown, then the
            // deferred capture stop, then the window teardown.
            overlay.clear_callbacks();
            self.capture.stop(Box::new(|| {}));
            overlay.close();
        }
        if was != AgentState::Idle {
            info!(from = %was, "state_transition: -> idle");
        }
    }

    /// Force-restore: semantically `unpin`, callable from any state.
    pub fn panic(&self) {
        self.unpin();
    }

    /// Mirroring -> MirrorHidden (hover see-through engaged).
    pub fn hide_mirror(&self) -> Result<()> {
        let overlay = {
            let mut inner = self.inner.lock();
            match inner.state {
                AgentState::Mirroring => {
                    inner.state = AgentState::MirrorHidden;
                    inner.mirror_hidden_at = Some(Instant::now());
                    inner.overlay.clone()
                }
                from @ (AgentState::Idle | AgentState::MirrorHidden | AgentState::Error) => {
                    return Err(PinError::InvalidStateTransition {
                        from,
                        to: AgentState::MirrorHidden,
                    });
                }
            }
        };
        if let Some(o) = overlay {
            o.set_hidden_mode(true);
        }
        debug!("state_transition: mirroring -> mirror_hidden");
        Ok(())
    }

    /// MirrorHidden -> Mirroring.
    pub fn show_mirror(&self) -> Result<()> {
        let overlay = {
            let mut inner = self.inner.lock();
            match inner.state {
                AgentState::MirrorHidden => {
                    inner.state = AgentState::Mirroring;
                    inner.mirror_hidden_at = None;
                    inner.hover_epoch += 1;
                    inner.overlay.clone()
                }
                from @ (AgentState::Idle | AgentState::Mirroring | AgentState::Error) => {
                    return Err(PinError::InvalidStateTransition {
                        from,
                        to: AgentState::Mirroring,
                    });
                }
            }
        };
        if let Some(o) = overlay {
            o.set_hidden_mode(false);
        }
        debug!("state_transition: mirror_hidden -> mirroring");
        Ok(())
    }

    /// Clamp, persist and apply an overlay opacity. Returns the value that
    /// was persisted.
    pub fn set_opacity(&self, value: f64) -> f64 {
        let clamped = clamp_opacity(value);
        self.prefs.set_f64(OPACITY_KEY, clamped);
        let overlay = self.inner.lock().overlay.clone();
        if let Some(o) = overlay {
            o.set_opacity(clamped);
        }
        clamped
    }

    /// The persisted opacity, decoded with its default.
    pub fn opacity(&self) -> f64 {
        decode_opacity(self.prefs.get_f64(OPACITY_KEY))
    }

    /// Read-only status projection.
    pub fn status(&self) -> AgentStatus {
        let inner = self.inner.lock();
        AgentStatus {
            state: inner.state.name(),
            pinned: inner.state.pinned(),
            target_app_name: inner.target.as_ref().map(|t| t.app_name.clone()),
            target_window_title: inner.target.as_ref().and_then(|t| t.window_title.clone()),
            mirror_visible: inner.state == AgentState::Mirroring,
            pinned_since: inner.pinned_since,
        }
    }

    // ---- Event inputs ----

    /// Feed one frontmost-application change into the re-show policy.
    pub fn on_frontmost_changed(&self, pid: i32) {
        let action = {
            let mut inner = self.inner.lock();
            inner.last_frontmost_pid = pid;
            if inner.state != AgentState::MirrorHidden {
                None
            } else {
                let target_pid = inner.target.as_ref().map(|t| t.pid).unwrap_or(-1);
                if pid == target_pid {
                    // Target came forward under the mirror; stay hidden.
                    None
                } else {
                    let elapsed = inner
                        .mirror_hidden_at
                        .map(|t| t.elapsed())
                        .unwrap_or(RESHOW_SETTLE);
                    if elapsed < RESHOW_SETTLE {
                        inner.hover_epoch += 1;
                        Some(ReshowAction::Recheck {
                            delay: RESHOW_SETTLE - elapsed,
                            epoch: inner.hover_epoch,
                        })
                    } else {
                        Some(ReshowAction::Now)
                    }
                }
            }
        };
        match action {
            Some(ReshowAction::Now) => {
                let _ = self.show_mirror();
            }
            Some(ReshowAction::Recheck { delay, epoch }) => {
                let engine = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    engine.reshow_recheck(epoch);
                });
            }
            None => {}
        }
    }

    fn reshow_recheck(&self, epoch: u64) {
        let show = {
            let inner = self.inner.lock();
            inner.hover_epoch == epoch
                && inner.state == AgentState::MirrorHidden
                && inner.target.as_ref().map(|t| t.pid) != Some(inner.last_frontmost_pid)
        };
        if show {
            let _ = self.show_mirror();
        }
    }

    fn handle_overlay_event(&self, ev: OverlayEvent) {
        match ev {
            OverlayEvent::HoverEnter => {
                if self.current_state() == AgentState::Mirroring {
                    let _ = self.hide_mirror();
                }
            }
            OverlayEvent::HoverExit => {
                if self.current_state() == AgentState::MirrorHidden {
                    let _ = self.show_mirror();
                }
            }
            OverlayEvent::UnpinRequested => self.unpin(),
        }
    }

    // ---- Monitors ----

    fn liveness_tick(&self) {
        let target_id = {
            let inner = self.inner.lock();
            if !inner.state.pinned() {
                return;
            }
            match &inner.target {
                Some(t) => t.window_id,
                None => return,
            }
        };
        if !self.winlist.exists(target_id) {
            info!(window_id = target_id, "target_gone");
            // Orderly transition, not a panic: a status subscriber simply
            // sees pinned flip to false.
            self.unpin();
        }
    }

    fn geometry_tick(&self) {
        let probe = {
            let inner = self.inner.lock();
            if !inner.state.pinned() {
                return;
            }
            inner
                .target
                .as_ref()
                .map(|t| (t.window_id, inner.last_bounds))
        };
        let Some((target_id, last)) = probe else {
            return;
        };
        let Some(bounds) = self.winlist.bounds(target_id) else {
            return;
        };
        if last.is_some_and(|l| mac_winlist::geom::rect_approx_eq(&l, &bounds, 0.5)) {
            return;
        }
        let overlay = {
            let mut inner = self.inner.lock();
            if !inner.state.pinned() {
                return;
            }
            inner.last_bounds = Some(bounds);
            inner.overlay.clone()
        };
        if let Some(o) = overlay {
            o.set_frame(bounds);
        }
        self.capture.resize(bounds);
    }

    fn current_state(&self) -> AgentState {
        self.inner.lock().state
    }
}
