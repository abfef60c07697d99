use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use mac_winlist::{Rect, TargetDescriptor};
use pin_engine::{FrameSink, Overlay, OverlayEvent, OverlayFactory};
use tokio::sync::mpsc::UnboundedSender;

use crate::{main_ops, shared::OverlayShared, sink::MirrorSink, window};

/// Engine-facing handle to one overlay. Methods never touch AppKit
/// directly: shared state is updated immediately (pointer hit tests read
/// it), the window mutation rides the main-thread op queue.
pub struct OverlayHandle {
    id: u64,
    shared: Arc<OverlayShared>,
}

impl Overlay for OverlayHandle {
    fn show(&self) {
        let id = self.id;
        main_ops::post(move |mtm| window::show(mtm, id));
    }

    fn set_frame(&self, bounds: Rect) {
        *self.shared.mirror_rect.lock() = bounds;
        *self.shared.button_rect.lock() = window::button_rect_for(&bounds);
        let id = self.id;
        main_ops::post(move |mtm| window::apply_frame(mtm, id, bounds));
    }

    fn set_hidden_mode(&self, hidden: bool) {
        self.shared.hidden.store(hidden, Ordering::SeqCst);
        if !hidden {
            // Re-arm entry detection: if the pointer still sits inside the
            // re-shown mirror, the next move counts as a fresh entry.
            self.shared.tracker.lock().reset();
        }
        let opacity = *self.shared.opacity.lock();
        let id = self.id;
        main_ops::post(move |mtm| window::apply_hidden(mtm, id, hidden, opacity));
    }

    fn set_opacity(&self, value: f64) {
        *self.shared.opacity.lock() = value;
        if !self.shared.hidden.load(Ordering::SeqCst) {
            let id = self.id;
            main_ops::post(move |mtm| window::apply_opacity(mtm, id, value));
        }
    }

    fn frame_sink(&self) -> Arc<dyn FrameSink> {
        Arc::new(MirrorSink {
            id: self.id,
            shared: self.shared.clone(),
        })
    }

    fn clear_callbacks(&self) {
        self.shared.events.lock().take();
        self.shared.hover_nonce.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let id = self.id;
        main_ops::post(move |mtm| window::teardown(mtm, id));
    }
}

/// Builds the real window pair for each pin.
#[derive(Default)]
pub struct MacOverlayFactory {
    next_id: AtomicU64,
}

impl MacOverlayFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayFactory for MacOverlayFactory {
    fn create(
        &self,
        target: &TargetDescriptor,
        events: UnboundedSender<OverlayEvent>,
    ) -> pin_engine::Result<Arc<dyn Overlay>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let bounds = target.bounds;
        let shared = Arc::new(OverlayShared::new(
            target.pid,
            bounds,
            window::button_rect_for(&bounds),
            events,
        ));
        let creation = shared.clone();
        main_ops::post(move |mtm| window::create_windows(mtm, id, creation, bounds));
        Ok(Arc::new(OverlayHandle { id, shared }))
    }
}
