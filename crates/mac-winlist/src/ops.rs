//! Trait abstraction over window-list operations to improve testability.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    Rect, Result, TargetDescriptor, WindowId, WindowInfo, error::Error, is_candidate,
    picker_eligible,
};

/// The window questions the engine asks, behind a seam.
pub trait WinList: Send + Sync {
    /// Ordered pinnable candidates, front-to-back.
    fn list_candidates(&self) -> Vec<TargetDescriptor>;
    /// First candidate in z-order, skipping excluded frontmost windows.
    fn frontmost_candidate(&self) -> Option<TargetDescriptor>;
    /// True iff the window is still on screen.
    fn exists(&self, id: WindowId) -> bool;
    /// Current bounds, top-left origin.
    fn bounds(&self, id: WindowId) -> Option<Rect>;
    /// One window per app, for the picker.
    fn list_by_app(&self) -> Vec<TargetDescriptor>;
    /// Bring the app owning `pid` frontmost.
    fn activate_pid(&self, pid: i32) -> Result<()>;
}

/// Production implementation delegating to crate functions.
pub struct RealWinList;

impl WinList for RealWinList {
    fn list_candidates(&self) -> Vec<TargetDescriptor> {
        crate::list_candidates()
    }
    fn frontmost_candidate(&self) -> Option<TargetDescriptor> {
        crate::frontmost_candidate()
    }
    fn exists(&self, id: WindowId) -> bool {
        crate::exists(id)
    }
    fn bounds(&self, id: WindowId) -> Option<Rect> {
        crate::bounds(id)
    }
    fn list_by_app(&self) -> Vec<TargetDescriptor> {
        crate::list_by_app()
    }
    fn activate_pid(&self, pid: i32) -> Result<()> {
        crate::activate_pid(pid)
    }
}

/// Simple mock implementation for tests.
///
/// Tests install a window set front-to-back; existence and bounds answer
/// from that set, and activations are recorded for assertion.
#[derive(Clone, Default)]
pub struct MockWinList {
    windows: Arc<Mutex<Vec<WindowInfo>>>,
    activations: Arc<Mutex<Vec<i32>>>,
    fail_activate: Arc<AtomicBool>,
}

impl MockWinList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the simulated window set (front-to-back order).
    pub fn set_windows(&self, wins: Vec<WindowInfo>) {
        *self.windows.lock() = wins;
    }

    /// Remove a window, simulating the target closing.
    pub fn remove_window(&self, id: WindowId) {
        self.windows.lock().retain(|w| w.id != id);
    }

    /// Move a window, simulating the target being dragged or resized.
    pub fn set_bounds(&self, id: WindowId, bounds: Rect) {
        for w in self.windows.lock().iter_mut() {
            if w.id == id {
                w.bounds = bounds;
            }
        }
    }

    /// Pids activated so far, in order.
    pub fn activations(&self) -> Vec<i32> {
        self.activations.lock().clone()
    }

    pub fn set_fail_activate(&self, v: bool) {
        self.fail_activate.store(v, Ordering::SeqCst);
    }
}

impl WinList for MockWinList {
    fn list_candidates(&self) -> Vec<TargetDescriptor> {
        self.windows
            .lock()
            .iter()
            .filter(|w| is_candidate(w))
            .map(TargetDescriptor::from)
            .collect()
    }
    fn frontmost_candidate(&self) -> Option<TargetDescriptor> {
        self.windows
            .lock()
            .iter()
            .find(|w| is_candidate(w))
            .map(TargetDescriptor::from)
    }
    fn exists(&self, id: WindowId) -> bool {
        self.windows.lock().iter().any(|w| w.id == id)
    }
    fn bounds(&self, id: WindowId) -> Option<Rect> {
        self.windows.lock().iter().find(|w| w.id == id).map(|w| w.bounds)
    }
    fn list_by_app(&self) -> Vec<TargetDescriptor> {
        let mut seen: Vec<i32> = Vec::new();
        let mut out = Vec::new();
        for w in self.windows.lock().iter() {
            if !picker_eligible(w) || seen.contains(&w.pid) {
                continue;
            }
            seen.push(w.pid);
            out.push(TargetDescriptor::from(w));
        }
        out
    }
    fn activate_pid(&self, pid: i32) -> Result<()> {
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(Error::ActivationFailed(pid));
        }
        self.activations.lock().push(pid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(pid: i32, id: WindowId, w: f64, h: f64, bundle: &str) -> WindowInfo {
        WindowInfo {
            pid,
            id,
            app: format!("App{pid}"),
            title: Some(format!("Title{id}")),
            bundle_id: bundle.into(),
            bounds: Rect::new(0.0, 0.0, w, h),
            layer: 0,
            is_on_screen: true,
        }
    }

    #[test]
    fn frontmost_skips_excluded_windows() {
        let mock = MockWinList::new();
        mock.set_windows(vec![
            win(1, 10, 600.0, 400.0, "com.raycast.macos"),
            win(2, 20, 800.0, 600.0, "com.example.editor"),
        ]);
        let front = mock.frontmost_candidate().unwrap();
        assert_eq!(front.window_id, 20);
        assert_eq!(front.app_name, "App2");
    }

    #[test]
    fn list_by_app_dedupes_per_pid() {
        let mock = MockWinList::new();
        mock.set_windows(vec![
            win(1, 10, 600.0, 400.0, "com.example.editor"),
            win(1, 11, 700.0, 500.0, "com.example.editor"),
            win(2, 20, 120.0, 90.0, "com.example.term"), // below picker floor
            win(3, 30, 300.0, 300.0, "com.example.mail"),
        ]);
        let apps = mock.list_by_app();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].window_id, 10);
        assert_eq!(apps[1].window_id, 30);
    }

    #[test]
    fn exists_and_bounds_follow_the_window_set() {
        let mock = MockWinList::new();
        mock.set_windows(vec![win(1, 10, 600.0, 400.0, "com.example.editor")]);
        assert!(mock.exists(10));
        assert_eq!(mock.bounds(10), Some(Rect::new(0.0, 0.0, 600.0, 400.0)));
        mock.remove_window(10);
        assert!(!mock.exists(10));
        assert_eq!(mock.bounds(10), None);
    }
}
