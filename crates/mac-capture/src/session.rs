use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use mac_winlist::{Rect, TargetDescriptor, WindowId, screen};
use parking_lot::Mutex;
use pin_engine::{CaptureBackend, Frame, FrameSink, PinError};
use screencapturekit::{
    async_api::{AsyncSCShareableContent, AsyncSCStream},
    cv::CVPixelBufferLockFlags,
    prelude::PixelFormat,
    stream::{
        configuration::SCStreamConfiguration, content_filter::SCContentFilter,
        output_type::SCStreamOutputType,
    },
};
use tokio::{sync::watch, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamSpec;

/// How long to wait for the shareable-content enumeration before giving up;
/// the call can hang when the window server is wedged.
const SHAREABLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a deferred stop to complete.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on that wait before a new start gives up.
const STOP_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Frames buffered between delivery and the pump before old ones drop.
const FRAME_BUFFER_CAPACITY: usize = 4;

struct SessionState {
    capturing: bool,
    capture_error: bool,
    stop_pending: bool,
    target: Option<WindowId>,
    spec_tx: Option<watch::Sender<StreamSpec>>,
    cancel: Option<CancellationToken>,
    on_stopped: Option<Box<dyn FnOnce() + Send>>,
    sink: Option<Arc<dyn FrameSink>>,
}

impl SessionState {
    fn empty() -> Self {
        Self {
            capturing: false,
            capture_error: false,
            stop_pending: false,
            target: None,
            spec_tx: None,
            cancel: None,
            on_stopped: None,
            sink: None,
        }
    }
}

/// A restartable per-window ScreenCaptureKit stream.
///
/// Lifecycle: `start` validates permission and shareable-content membership,
/// opens the stream and hands it to a pump task. The pump owns the stream
/// from then on; reconfiguration requests and the stop request both reach it
/// over channels, so stream teardown always happens in one place after any
/// in-flight frame is drained.
pub struct CaptureSession {
    state: Arc<Mutex<SessionState>>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::empty())),
        }
    }

    /// True if the last epoch ended in a delivery error.
    pub fn capture_error(&self) -> bool {
        self.state.lock().capture_error
    }
}

#[async_trait]
impl CaptureBackend for CaptureSession {
    async fn start(&self, target: &TargetDescriptor, sink: Arc<dyn FrameSink>) -> pin_engine::Result<()> {
        // A deferred stop may still be draining; a new epoch must not open
        // until its completion callback has run.
        let mut waited = Duration::ZERO;
        while self.state.lock().stop_pending {
            if waited >= STOP_WAIT_TIMEOUT {
                return Err(PinError::CaptureFailure("stop did not complete".into()));
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
            waited += STOP_POLL_INTERVAL;
        }
        {
            let state = self.state.lock();
            if state.capturing {
                if state.target == Some(target.window_id) {
                    return Ok(());
                }
                return Err(PinError::CaptureFailure("already capturing".into()));
            }
        }
        if !permissions::capture_ok() {
            return Err(PinError::PermissionDenied("capture"));
        }

        let display = screen::display_containing(&target.bounds);
        let spec = StreamSpec::for_bounds(&target.bounds, &display);
        info!(
            window_id = target.window_id,
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            "capture_start"
        );

        let stream = open_stream(target.window_id, spec).await?;

        let (spec_tx, spec_rx) = watch::channel(spec);
        let cancel = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.capturing = true;
            state.capture_error = false;
            state.target = Some(target.window_id);
            state.spec_tx = Some(spec_tx);
            state.cancel = Some(cancel.clone());
            state.sink = Some(sink.clone());
        }
        let shared = self.state.clone();
        let window_id = target.window_id;
        tokio::spawn(async move {
            pump(stream, window_id, sink, spec_rx, cancel, shared).await;
        });
        Ok(())
    }

    fn resize(&self, bounds: Rect) {
        let spec_tx = {
            let state = self.state.lock();
            if !state.capturing {
                return;
            }
            state.spec_tx.clone()
        };
        let Some(tx) = spec_tx else { return };
        let display = screen::display_containing(&bounds);
        let spec = StreamSpec::for_bounds(&bounds, &display);
        // Position-only moves keep the same spec; the watch channel dedupes
        // by comparison so the pump only reconfigures on real size changes.
        let _ = tx.send_if_modified(|current| {
            if *current == spec {
                false
            } else {
                debug!(width = spec.width, height = spec.height, fps = spec.fps, "capture_resize");
                *current = spec;
                true
            }
        });
    }

    fn stop(&self, on_complete: Box<dyn FnOnce() + Send + 'static>) {
        let cancel = {
            let mut state = self.state.lock();
            if !state.capturing && state.cancel.is_none() {
                // Nothing running; complete immediately.
                drop(state);
                on_complete();
                return;
            }
            state.stop_pending = true;
            state.on_stopped = Some(on_complete);
            state.cancel.clone()
        };
        if let Some(token) = cancel {
            token.cancel();
        }
    }

    fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }
}

/// Fetch shareable content, locate the window, build and start a stream.
async fn open_stream(window_id: WindowId, spec: StreamSpec) -> pin_engine::Result<AsyncSCStream> {
    let content = match timeout(SHAREABLE_TIMEOUT, AsyncSCShareableContent::get()).await {
        Ok(Ok(c)) => c,
        Ok(Err(e)) => {
            return Err(PinError::CaptureFailure(format!(
                "shareable content unavailable: {e}"
            )));
        }
        Err(_) => {
            return Err(PinError::CaptureFailure(
                "shareable content timed out".into(),
            ));
        }
    };
    let windows = content.windows();
    let Some(window) = windows.iter().find(|w| w.window_id() == window_id) else {
        return Err(PinError::CaptureFailure("not-in-shareable-content".into()));
    };

    let filter = SCContentFilter::create()
        .with_desktop_independent_window(window)
        .build();
    let config = SCStreamConfiguration::new()
        .with_width(spec.width)
        .with_height(spec.height)
        .with_pixel_format(PixelFormat::BGRA)
        .with_shows_cursor(false);

    let stream = AsyncSCStream::new(&filter, &config, FRAME_BUFFER_CAPACITY, SCStreamOutputType::Screen);
    stream
        .start_capture()
        .map_err(|e| PinError::CaptureFailure(format!("stream start refused: {e}")))?;
    Ok(stream)
}

/// Pump loop: drain samples into the sink, reopen on spec changes, and run
/// the deferred-stop epilogue when cancelled. The epilogue is the only place
/// session members are reset, so frames already marshalled stay valid.
async fn pump(
    first_stream: AsyncSCStream,
    window_id: WindowId,
    sink: Arc<dyn FrameSink>,
    mut spec_rx: watch::Receiver<StreamSpec>,
    cancel: CancellationToken,
    shared: Arc<Mutex<SessionState>>,
) {
    let mut stream = Some(first_stream);
    let mut failed = false;

    'session: loop {
        let spec = *spec_rx.borrow_and_update();
        let current = match stream.take() {
            Some(s) => s,
            None => match open_stream(window_id, spec).await {
                Ok(s) => s,
                Err(e) => {
                    // Reconfiguration failure is logged, not fatal to the
                    // session contract; the next resize retries.
                    warn!(error = %e, "capture reconfigure failed");
                    failed = true;
                    break 'session;
                }
            },
        };

        let interval = Duration::from_millis(1000 / u64::from(spec.fps.max(1)));
        let mut next_frame = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = current.stop_capture();
                    break 'session;
                }
                changed = spec_rx.changed() => {
                    if changed.is_err() {
                        let _ = current.stop_capture();
                        break 'session;
                    }
                    debug!("capture spec changed; reopening stream");
                    let _ = current.stop_capture();
                    continue 'session;
                }
                sample = current.next() => {
                    let Some(sample) = sample else {
                        warn!("capture stream ended unexpectedly");
                        failed = true;
                        break 'session;
                    };
                    let now = Instant::now();
                    if now < next_frame {
                        continue;
                    }
                    next_frame = now + interval;

                    // Validate and repack the sample into a tightly packed
                    // BGRA frame before it crosses to the sink.
                    let Some(pixel_buffer) = sample.image_buffer() else {
                        continue;
                    };
                    let width = pixel_buffer.width() as u32;
                    let height = pixel_buffer.height() as u32;
                    if width == 0 || height == 0 {
                        continue;
                    }
                    let guard = match pixel_buffer.lock(CVPixelBufferLockFlags::READ_ONLY) {
                        Ok(g) => g,
                        Err(e) => {
                            warn!(error = %e, "pixel buffer lock failed");
                            continue;
                        }
                    };
                    let bgra = guard.as_slice();
                    let bytes_per_row = pixel_buffer.bytes_per_row();
                    let packed_row = width as usize * 4;
                    if bytes_per_row < packed_row
                        || bgra.len() < bytes_per_row * height as usize
                    {
                        continue;
                    }
                    let mut data = Vec::with_capacity(packed_row * height as usize);
                    if bytes_per_row == packed_row {
                        data.extend_from_slice(&bgra[..packed_row * height as usize]);
                    } else {
                        // Row padding present; repack row by row.
                        for row in 0..height as usize {
                            let start = row * bytes_per_row;
                            data.extend_from_slice(&bgra[start..start + packed_row]);
                        }
                    }
                    drop(guard);
                    sink.submit(Frame {
                        width,
                        height,
                        bytes_per_row: packed_row,
                        data,
                    });
                }
            }
        }
    }

    // Epilogue: the single legitimate place to reset session members.
    let on_stopped = {
        let mut state = shared.lock();
        state.capturing = false;
        state.capture_error = failed;
        state.stop_pending = false;
        state.target = None;
        state.spec_tx = None;
        state.cancel = None;
        state.sink = None;
        state.on_stopped.take()
    };
    if let Some(done) = on_stopped {
        trace!("capture stop complete");
        done();
    }
}
