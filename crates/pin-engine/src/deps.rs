//! Trait seams between the engine and its platform backends.
//!
//! The engine owns lifecycle and policy; everything that touches the OS sits
//! behind one of these traits. Production implementations live in
//! `mac-capture` and `mac-overlay`; the mocks here let the state machine be
//! exercised without a window server.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use mac_winlist::{Rect, TargetDescriptor};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{PinError, Result};

// ---- Frame delivery ----

/// One decoded BGRA frame from the capture stream.
#[derive(Clone)]
pub struct Frame {
    /// Width in device pixels.
    pub width: u32,
    /// Height in device pixels.
    pub height: u32,
    /// Stride of `data` in bytes.
    pub bytes_per_row: usize,
    /// Tightly packed BGRA pixel data, `bytes_per_row * height` bytes.
    pub data: Vec<u8>,
}

/// Destination for validated frames; owned by the overlay, fed by the
/// capture session.
pub trait FrameSink: Send + Sync {
    /// Accept one frame. Implementations marshal to the UI thread and may
    /// drop stale frames under load.
    fn submit(&self, frame: Frame);
}

// ---- Overlay ----

/// Events the overlay raises back into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    /// Pointer entered the mirror and the activation delay elapsed.
    HoverEnter,
    /// Pointer left the mirror region while hidden.
    HoverExit,
    /// The unpin affordance was clicked.
    UnpinRequested,
}

/// Handle to one pin's pair of floating windows.
///
/// All methods are callable from any thread; implementations marshal AppKit
/// work to the main thread internally.
pub trait Overlay: Send + Sync {
    /// Order the windows in, above everything.
    fn show(&self);
    /// Move/resize the mirror to track the target (top-left-origin bounds).
    fn set_frame(&self, bounds: Rect);
    /// Engage or release hidden mode: pointer transparency, zero layer
    /// opacity, no shadow. The unpin button stays clickable either way.
    fn set_hidden_mode(&self, hidden: bool);
    /// Apply a display-layer opacity in [0.1, 1.0].
    fn set_opacity(&self, value: f64);
    /// The sink the capture session should feed.
    fn frame_sink(&self) -> Arc<dyn FrameSink>;
    /// Disconnect all outward callbacks so late events cannot reach a
    /// torn-down engine. First step of teardown.
    fn clear_callbacks(&self);
    /// Ordered teardown: monitors, tracking, layer, subviews, order-out.
    fn close(&self);
}

/// Creates one [`Overlay`] per pin.
pub trait OverlayFactory: Send + Sync {
    /// Build the window pair for `target`, wiring events into `events`.
    fn create(
        &self,
        target: &TargetDescriptor,
        events: UnboundedSender<OverlayEvent>,
    ) -> Result<Arc<dyn Overlay>>;
}

// ---- Capture ----

/// A restartable per-window capture stream.
///
/// One backend instance lives as long as the engine; each `start`..`stop`
/// pair delimits one capture epoch, matching the overlay created alongside
/// it.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Open the stream for `target` and begin feeding `sink`.
    ///
    /// Fails with [`PinError::PermissionDenied`] when Screen Recording is
    /// not granted, and [`PinError::CaptureFailure`] when the target is
    /// missing from shareable content or the stream refuses to start.
    /// Idempotent when already capturing the same target.
    async fn start(&self, target: &TargetDescriptor, sink: Arc<dyn FrameSink>) -> Result<()>;

    /// The target moved or resized; reconfigure pixel dimensions for its
    /// current display. Errors are logged, never fatal.
    fn resize(&self, bounds: Rect);

    /// Request asynchronous stream termination. Returns immediately;
    /// `on_complete` runs after in-flight frames drain and internal state
    /// is reset. Until then a new `start` is refused.
    fn stop(&self, on_complete: Box<dyn FnOnce() + Send + 'static>);

    /// True between a successful `start` and its stop completion.
    fn is_capturing(&self) -> bool;
}

// ---- Mocks ----

/// Frame sink that counts submissions.
#[derive(Default)]
pub struct MockSink {
    frames: AtomicUsize,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl FrameSink for MockSink {
    fn submit(&self, _frame: Frame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock capture backend with scriptable failure modes.
#[derive(Clone, Default)]
pub struct MockCapture {
    capturing: Arc<AtomicBool>,
    deny_permission: Arc<AtomicBool>,
    not_shareable: Arc<AtomicBool>,
    starts: Arc<Mutex<Vec<u32>>>,
    resizes: Arc<Mutex<Vec<Rect>>>,
    stops: Arc<AtomicUsize>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }
    /// Simulate missing Screen Recording permission.
    pub fn set_deny_permission(&self, v: bool) {
        self.deny_permission.store(v, Ordering::SeqCst);
    }
    /// Simulate the target being absent from shareable content.
    pub fn set_not_shareable(&self, v: bool) {
        self.not_shareable.store(v, Ordering::SeqCst);
    }
    /// Window ids passed to `start`, in order.
    pub fn started_ids(&self) -> Vec<u32> {
        self.starts.lock().clone()
    }
    /// Bounds passed to `resize`, in order.
    pub fn resizes(&self) -> Vec<Rect> {
        self.resizes.lock().clone()
    }
    /// Number of completed stops.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for MockCapture {
    async fn start(&self, target: &TargetDescriptor, _sink: Arc<dyn FrameSink>) -> Result<()> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(PinError::PermissionDenied("capture"));
        }
        if self.not_shareable.load(Ordering::SeqCst) {
            return Err(PinError::CaptureFailure("not-in-shareable-content".into()));
        }
        self.starts.lock().push(target.window_id);
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resize(&self, bounds: Rect) {
        self.resizes.lock().push(bounds);
    }

    fn stop(&self, on_complete: Box<dyn FnOnce() + Send + 'static>) {
        self.capturing.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
        on_complete();
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

/// Mock overlay recording every interaction.
#[derive(Default)]
pub struct MockOverlay {
    pub(crate) sink: Arc<MockSink>,
    shown: AtomicBool,
    hidden_mode: AtomicBool,
    closed: AtomicBool,
    callbacks_cleared: AtomicBool,
    frames_set: Mutex<Vec<Rect>>,
    opacity: Mutex<Option<f64>>,
}

impl MockOverlay {
    pub fn shown(&self) -> bool {
        self.shown.load(Ordering::SeqCst)
    }
    pub fn hidden_mode(&self) -> bool {
        self.hidden_mode.load(Ordering::SeqCst)
    }
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
    pub fn callbacks_cleared(&self) -> bool {
        self.callbacks_cleared.load(Ordering::SeqCst)
    }
    pub fn frames_set(&self) -> Vec<Rect> {
        self.frames_set.lock().clone()
    }
    pub fn opacity(&self) -> Option<f64> {
        *self.opacity.lock()
    }
}

impl Overlay for MockOverlay {
    fn show(&self) {
        self.shown.store(true, Ordering::SeqCst);
    }
    fn set_frame(&self, bounds: Rect) {
        self.frames_set.lock().push(bounds);
    }
    fn set_hidden_mode(&self, hidden: bool) {
        self.hidden_mode.store(hidden, Ordering::SeqCst);
    }
    fn set_opacity(&self, value: f64) {
        *self.opacity.lock() = Some(value);
    }
    fn frame_sink(&self) -> Arc<dyn FrameSink> {
        self.sink.clone()
    }
    fn clear_callbacks(&self) {
        self.callbacks_cleared.store(true, Ordering::SeqCst);
    }
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory that hands out [`MockOverlay`]s and remembers them.
#[derive(Clone, Default)]
pub struct MockOverlayFactory {
    created: Arc<Mutex<Vec<Arc<MockOverlay>>>>,
    senders: Arc<Mutex<Vec<UnboundedSender<OverlayEvent>>>>,
    fail_create: Arc<AtomicBool>,
}

impl MockOverlayFactory {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_fail_create(&self, v: bool) {
        self.fail_create.store(v, Ordering::SeqCst);
    }
    /// Overlays created so far, oldest first.
    pub fn created(&self) -> Vec<Arc<MockOverlay>> {
        self.created.lock().clone()
    }
    /// The overlay backing the current pin, if any was created.
    pub fn last(&self) -> Option<Arc<MockOverlay>> {
        self.created.lock().last().cloned()
    }
    /// The event channel handed to the most recent overlay; tests use it to
    /// play the overlay's part (hover, unpin clicks).
    pub fn last_events(&self) -> Option<UnboundedSender<OverlayEvent>> {
        self.senders.lock().last().cloned()
    }
}

impl OverlayFactory for MockOverlayFactory {
    fn create(
        &self,
        _target: &TargetDescriptor,
        events: UnboundedSender<OverlayEvent>,
    ) -> Result<Arc<dyn Overlay>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PinError::OverlayFailure("window creation refused".into()));
        }
        let overlay = Arc::new(MockOverlay::default());
        self.created.lock().push(overlay.clone());
        self.senders.lock().push(events);
        Ok(overlay)
    }
}
