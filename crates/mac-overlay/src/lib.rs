//! mac-overlay: the floating window pair that displays the mirror.
//!
//! Each pin gets two borderless floating windows: the mirror, sized and
//! positioned like the target and hosting the capture display layer, and a
//! small always-clickable unpin button anchored at its top-left corner.
//! Pointer monitors implement the hover see-through handshake: entering the
//! visible mirror activates the target app and, 250 ms later, reports
//! hover-enter; while hidden, a global monitor watches for the pointer
//! leaving the mirror rectangle, since the window itself no longer receives
//! events.
//!
//! AppKit objects live exclusively on the main thread. The engine-facing
//! [`MacOverlayFactory`] and its handles communicate with them through the
//! [`main_ops`] queue, which the application's event loop drains; register
//! a waker with [`main_ops::set_waker`] before the first pin.

mod handle;
pub mod main_ops;
mod shared;
mod sink;
mod window;

pub use handle::{MacOverlayFactory, OverlayHandle};
