//! Queue of operations that must run on the AppKit main thread.
//!
//! Overlay handles are driven from the runtime's worker threads, but every
//! AppKit mutation has to happen on the main thread. Handles push closures
//! here and nudge the event loop through the registered waker; the tao loop
//! drains the queue on each wake.

use std::{collections::VecDeque, sync::Mutex};

use objc2_foundation::MainThreadMarker;
use once_cell::sync::Lazy;
use tracing::warn;

type MainOp = Box<dyn FnOnce(MainThreadMarker) + Send + 'static>;

static MAIN_OPS: Lazy<Mutex<VecDeque<MainOp>>> = Lazy::new(|| Mutex::new(VecDeque::new()));

static WAKER: Lazy<Mutex<Option<Box<dyn Fn() + Send + Sync>>>> = Lazy::new(|| Mutex::new(None));

/// Register the callback that wakes the main event loop (typically posting
/// a tao user event). Call once at startup, before any overlay exists.
pub fn set_waker(waker: Box<dyn Fn() + Send + Sync>) {
    if let Ok(mut guard) = WAKER.lock() {
        *guard = Some(waker);
    }
}

/// Enqueue `op` for the main thread and wake the event loop.
pub fn post(op: impl FnOnce(MainThreadMarker) + Send + 'static) {
    match MAIN_OPS.lock() {
        Ok(mut q) => q.push_back(Box::new(op)),
        Err(_) => {
            warn!("main op queue poisoned; dropping op");
            return;
        }
    }
    if let Ok(guard) = WAKER.lock()
        && let Some(wake) = &*guard
    {
        wake();
    }
}

/// Run every queued op, FIFO. Must be called from the main event loop.
pub fn drain(mtm: MainThreadMarker) {
    loop {
        let op = match MAIN_OPS.lock() {
            Ok(mut q) => q.pop_front(),
            Err(_) => return,
        };
        match op {
            Some(op) => op(mtm),
            None => return,
        }
    }
}
