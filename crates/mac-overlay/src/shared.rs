//! Send + Sync overlay state shared between the engine-facing handle, the
//! pointer monitors and the delayed hover task.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use mac_winlist::Rect;
use parking_lot::Mutex;
use pin_engine::{Frame, OverlayEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Delay between activating the target app and reporting hover-enter, so
/// the focus handoff completes before the mirror goes transparent.
pub(crate) const HOVER_SETTLE: Duration = Duration::from_millis(250);

/// What a pointer sample asks the overlay to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointerAction {
    /// Nothing changed.
    None,
    /// Pointer entered the visible mirror: activate the target and arm the
    /// delayed hover-enter report.
    BeginHover,
    /// Pointer left again within the settle delay: disarm the report.
    CancelHover,
    /// Pointer left the hidden mirror's region: report hover-exit.
    ExitHover,
}

/// Pure enter/exit edge detection over pointer samples.
#[derive(Debug, Default)]
pub(crate) struct HoverTracker {
    inside: bool,
}

impl HoverTracker {
    pub(crate) fn on_pointer(&mut self, inside_mirror: bool, hidden: bool) -> PointerAction {
        if hidden {
            if !inside_mirror && self.inside {
                self.inside = false;
                return PointerAction::ExitHover;
            }
            self.inside = inside_mirror;
            return PointerAction::None;
        }
        match (inside_mirror, self.inside) {
            (true, false) => {
                self.inside = true;
                PointerAction::BeginHover
            }
            (false, true) => {
                self.inside = false;
                PointerAction::CancelHover
            }
            _ => PointerAction::None,
        }
    }

    /// Forget the pointer position, forcing the next inside sample to read
    /// as a fresh entry.
    pub(crate) fn reset(&mut self) {
        self.inside = false;
    }

    pub(crate) fn inside(&self) -> bool {
        self.inside
    }
}

/// State one overlay shares across threads.
pub(crate) struct OverlayShared {
    /// Target process, activated when hover begins.
    pub(crate) target_pid: i32,
    /// Mirror rectangle in top-left global points, kept current by
    /// `set_frame` for pointer hit tests.
    pub(crate) mirror_rect: Mutex<Rect>,
    /// Unpin button rectangle in the same space.
    pub(crate) button_rect: Mutex<Rect>,
    /// Mirror-hidden flag (see-through engaged).
    pub(crate) hidden: AtomicBool,
    /// Set once teardown starts; silences monitors and pending tasks.
    pub(crate) closed: AtomicBool,
    /// Invalidates armed hover reports when it advances.
    pub(crate) hover_nonce: AtomicU64,
    pub(crate) tracker: Mutex<HoverTracker>,
    /// Outward event channel; dropped by `clear_callbacks`.
    pub(crate) events: Mutex<Option<UnboundedSender<OverlayEvent>>>,
    /// Display-layer opacity to restore when leaving hidden mode.
    pub(crate) opacity: Mutex<f64>,
    /// Latest-frame slot: the sink coalesces here so a busy main thread
    /// drops stale frames instead of queueing them.
    pub(crate) latest_frame: Mutex<Option<Frame>>,
}

impl OverlayShared {
    pub(crate) fn new(
        target_pid: i32,
        mirror_rect: Rect,
        button_rect: Rect,
        events: UnboundedSender<OverlayEvent>,
    ) -> Self {
        Self {
            target_pid,
            mirror_rect: Mutex::new(mirror_rect),
            button_rect: Mutex::new(button_rect),
            hidden: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            hover_nonce: AtomicU64::new(0),
            tracker: Mutex::new(HoverTracker::default()),
            events: Mutex::new(Some(events)),
            opacity: Mutex::new(1.0),
            latest_frame: Mutex::new(None),
        }
    }

    pub(crate) fn send(&self, ev: OverlayEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = &*self.events.lock()
            && tx.send(ev).is_err()
        {
            warn!("overlay event receiver gone");
        }
    }

    /// Process one pointer sample in top-left global coordinates.
    pub(crate) fn pointer_moved(self: &std::sync::Arc<Self>, x: f64, y: f64) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let inside = self.mirror_rect.lock().contains(x, y);
        let hidden = self.hidden.load(Ordering::SeqCst);
        let action = self.tracker.lock().on_pointer(inside, hidden);
        match action {
            PointerAction::None => {}
            PointerAction::BeginHover => self.begin_hover(),
            PointerAction::CancelHover => {
                self.hover_nonce.fetch_add(1, Ordering::SeqCst);
            }
            PointerAction::ExitHover => {
                debug!("hover_exit");
                self.send(OverlayEvent::HoverExit);
            }
        }
    }

    /// Process one click in top-left global coordinates.
    pub(crate) fn pointer_clicked(&self, x: f64, y: f64) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        if self.button_rect.lock().contains(x, y) {
            debug!("unpin_clicked");
            self.send(OverlayEvent::UnpinRequested);
            return true;
        }
        false
    }

    fn begin_hover(self: &std::sync::Arc<Self>) {
        let nonce = self.hover_nonce.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(pid = self.target_pid, "hover_begin");
        // Bring the real window forward under the mirror first; the report
        // follows once focus has settled.
        if let Err(e) = mac_winlist::activate_pid(self.target_pid) {
            warn!(error = %e, "target activation failed");
        }
        let shared = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(HOVER_SETTLE);
            if shared.closed.load(Ordering::SeqCst) {
                return;
            }
            if shared.hover_nonce.load(Ordering::SeqCst) != nonce {
                return;
            }
            if !shared.tracker.lock().inside() {
                return;
            }
            shared.send(OverlayEvent::HoverEnter);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_then_leave_visible_mirror() {
        let mut t = HoverTracker::default();
        assert_eq!(t.on_pointer(false, false), PointerAction::None);
        assert_eq!(t.on_pointer(true, false), PointerAction::BeginHover);
        assert_eq!(t.on_pointer(true, false), PointerAction::None);
        assert_eq!(t.on_pointer(false, false), PointerAction::CancelHover);
    }

    #[test]
    fn exit_fires_only_while_hidden() {
        let mut t = HoverTracker::default();
        assert_eq!(t.on_pointer(true, false), PointerAction::BeginHover);
        // Mirror goes hidden; staying inside is quiet.
        assert_eq!(t.on_pointer(true, true), PointerAction::None);
        assert_eq!(t.on_pointer(false, true), PointerAction::ExitHover);
        assert_eq!(t.on_pointer(false, true), PointerAction::None);
    }

    #[test]
    fn reset_rearms_entry() {
        let mut t = HoverTracker::default();
        assert_eq!(t.on_pointer(true, false), PointerAction::BeginHover);
        t.reset();
        assert_eq!(t.on_pointer(true, false), PointerAction::BeginHover);
    }
}
