//! mac-winlist: on-screen window enumeration and target selection for Pin.
//!
//! Wraps `CGWindowListCopyWindowInfo` to answer the questions the agent
//! asks: which windows can be pinned, which one is frontmost, does a given
//! window still exist, and where is it right now. Also carries the geometry
//! primitives shared by the capture and overlay layers, display lookup, and
//! app activation.
//!
//! The [`ops::WinList`] trait abstracts all of it so the engine can be
//! driven against a mock in tests.
//!
//! Window titles require Screen Recording permission; without it the
//! enumerator still works but titles come back empty.

mod activate;
mod cfutil;
mod enumerate;
mod error;
pub mod geom;
pub mod ops;
pub mod screen;

pub use activate::{activate_pid, bundle_id_for_pid};
pub use enumerate::{bounds, exists, frontmost_candidate, list_by_app, list_candidates, list_windows};
pub use error::{Error, Result};
pub use geom::Rect;

/// Alias for CoreGraphics CGWindowID (kCGWindowNumber).
pub type WindowId = u32;

/// Bundle identifiers never offered as pin targets: ourselves, the launcher
/// front-end that issues commands, and system chrome that briefly takes the
/// front spot.
pub const EXCLUDED_BUNDLE_IDS: &[&str] = &[
    "dev.pinapp.Pin",
    "com.raycast.macos",
    "com.apple.Spotlight",
    "com.apple.dock",
];

/// Minimum candidate dimensions; anything smaller is tooltip-grade chrome.
const MIN_CANDIDATE_DIM: f64 = 50.0;

/// Stricter minimum for the menu-bar picker.
const MIN_PICKER_DIM: f64 = 100.0;

/// One on-screen window as reported by CoreGraphics.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    /// Owning process id.
    pub pid: i32,
    /// CGWindowID.
    pub id: WindowId,
    /// Owner application name.
    pub app: String,
    /// Window title, when present and non-empty.
    pub title: Option<String>,
    /// Owner bundle identifier; empty when unresolvable.
    pub bundle_id: String,
    /// Bounds in top-left-origin screen points.
    pub bounds: Rect,
    /// CoreGraphics window layer (0 = standard app windows).
    pub layer: i32,
    /// True if CoreGraphics reports the window as currently on-screen.
    pub is_on_screen: bool,
}

/// Immutable description of a pin target.
///
/// Created by the enumerator when a target is chosen; consumed by the
/// capture session (content filter + pixel sizing) and the overlay
/// (placement). Never mutated: re-pinning produces a fresh descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescriptor {
    /// Owning process id.
    pub pid: i32,
    /// CGWindowID of the target.
    pub window_id: WindowId,
    /// Owner application name.
    pub app_name: String,
    /// Window title, when the window has one.
    pub window_title: Option<String>,
    /// Bounds at selection time, top-left-origin screen points.
    pub bounds: Rect,
}

impl From<&WindowInfo> for TargetDescriptor {
    fn from(w: &WindowInfo) -> Self {
        Self {
            pid: w.pid,
            window_id: w.id,
            app_name: w.app.clone(),
            window_title: w.title.clone(),
            bounds: w.bounds,
        }
    }
}

/// Candidate filter: normal layer, on screen, big enough, not excluded.
pub fn is_candidate(w: &WindowInfo) -> bool {
    w.layer == 0
        && w.is_on_screen
        && w.bounds.w > MIN_CANDIDATE_DIM
        && w.bounds.h > MIN_CANDIDATE_DIM
        && !EXCLUDED_BUNDLE_IDS.iter().any(|b| *b == w.bundle_id)
}

/// Picker filter: candidate rules with the larger size floor.
pub fn picker_eligible(w: &WindowInfo) -> bool {
    is_candidate(w) && w.bounds.w >= MIN_PICKER_DIM && w.bounds.h >= MIN_PICKER_DIM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(w: f64, h: f64, layer: i32, bundle_id: &str) -> WindowInfo {
        WindowInfo {
            pid: 100,
            id: 1,
            app: "App".into(),
            title: Some("Title".into()),
            bundle_id: bundle_id.into(),
            bounds: Rect::new(0.0, 0.0, w, h),
            layer,
            is_on_screen: true,
        }
    }

    #[test]
    fn candidate_rejects_small_windows() {
        assert!(is_candidate(&win(51.0, 51.0, 0, "com.example.editor")));
        assert!(!is_candidate(&win(50.0, 51.0, 0, "com.example.editor")));
        assert!(!is_candidate(&win(51.0, 50.0, 0, "com.example.editor")));
    }

    #[test]
    fn candidate_rejects_nonzero_layer() {
        assert!(!is_candidate(&win(400.0, 300.0, 25, "com.example.editor")));
    }

    #[test]
    fn candidate_rejects_excluded_bundles() {
        assert!(!is_candidate(&win(400.0, 300.0, 0, "com.raycast.macos")));
        assert!(!is_candidate(&win(400.0, 300.0, 0, "com.apple.Spotlight")));
        // An unresolved (empty) bundle id is not excluded.
        assert!(is_candidate(&win(400.0, 300.0, 0, "")));
    }

    #[test]
    fn picker_needs_larger_windows() {
        assert!(!picker_eligible(&win(99.0, 300.0, 0, "com.example.editor")));
        assert!(picker_eligible(&win(100.0, 100.0, 0, "com.example.editor")));
    }
}
