//! mac-capture: the live per-window pixel stream behind the mirror.
//!
//! Implements the engine's `CaptureBackend` seam on ScreenCaptureKit. One
//! [`CaptureSession`] lives for the process; each `start`..`stop` pair is
//! one capture epoch bound to one overlay. Frames arrive from the system on
//! a background queue, get validated and repacked, and are handed to the
//! overlay's frame sink, paced to the refresh rate of the display hosting
//! the target.
//!
//! Stopping is deferred by design: `stop` returns at once and all member
//! reset happens in the pump epilogue after in-flight samples drain. A new
//! `start` is refused until that epilogue has run.

mod config;
mod session;

pub use config::StreamSpec;
pub use session::CaptureSession;
