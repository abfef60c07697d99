//! mac-frontmost: observe frontmost-application changes on macOS.
//!
//! The agent's hover re-show policy keys off which application is in front.
//! This crate installs an NSWorkspace activation observer on the AppKit main
//! thread and forwards each change as a [`FrontmostEvent`] into a tokio
//! channel.
//!
//! Integration:
//! - Call [`start_watcher`] with a sender once the runtime is up; then call
//!   [`install_frontmost_observer`] from the main thread (the tao event loop
//!   startup is the natural place). Installation is idempotent.

mod event;
mod ns;

pub use event::FrontmostEvent;
pub use ns::install_frontmost_observer;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Errors from the public watcher API.
#[derive(Debug, Error)]
pub enum Error {
    /// The observer bookkeeping mutex was poisoned.
    #[error("NS observer state mutex poisoned")]
    ObserverPoisoned,
}

/// Register `tx` as the sink for [`FrontmostEvent`]s.
///
/// May be called from any thread. Events start flowing once
/// [`install_frontmost_observer`] has run on the main thread.
pub fn start_watcher(tx: UnboundedSender<FrontmostEvent>) {
    ns::set_sink(tx);
}
