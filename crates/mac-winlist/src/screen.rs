//! Display lookup for capture sizing and overlay placement.
//!
//! CoreGraphics display APIs are callable off the main thread, unlike
//! `NSScreen`, so pin-entry code running on the runtime can size its capture
//! without a main-thread hop. Display bounds come back in the same global
//! top-left space the window enumerator reports.

use core_graphics::display::CGDisplay;
use tracing::warn;

use crate::geom::Rect;

/// Frame-rate fallback when the display does not report one.
pub const FALLBACK_FPS: u32 = 60;

/// A display eligible to host the mirror.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    /// CGDirectDisplayID.
    pub id: u32,
    /// Global bounds, top-left origin.
    pub bounds: Rect,
    /// Backing scale factor (pixels per point).
    pub scale: f64,
    /// Maximum refresh rate in frames per second.
    pub max_fps: u32,
}

fn display_info(display: CGDisplay) -> DisplayInfo {
    let b = display.bounds();
    let bounds = Rect::new(b.origin.x, b.origin.y, b.size.width, b.size.height);
    let (scale, max_fps) = match display.display_mode() {
        Some(mode) => {
            let scale = if b.size.width > 0.0 {
                mode.pixel_width() as f64 / b.size.width
            } else {
                1.0
            };
            let rate = mode.refresh_rate();
            let fps = if rate > 0.0 {
                rate.round() as u32
            } else {
                FALLBACK_FPS
            };
            (scale.max(1.0), fps)
        }
        None => (1.0, FALLBACK_FPS),
    };
    DisplayInfo {
        id: display.id,
        bounds,
        scale,
        max_fps,
    }
}

/// All active displays.
pub fn active_displays() -> Vec<DisplayInfo> {
    match CGDisplay::active_displays() {
        Ok(ids) => ids.into_iter().map(|id| display_info(CGDisplay::new(id))).collect(),
        Err(code) => {
            warn!(code, "CGGetActiveDisplayList failed");
            Vec::new()
        }
    }
}

/// The display whose frame overlaps `rect` the most, falling back to the
/// main display when the rect is off-screen.
pub fn display_containing(rect: &Rect) -> DisplayInfo {
    let mut best: Option<(f64, DisplayInfo)> = None;
    for info in active_displays() {
        let area = info.bounds.intersection_area(rect);
        if area > 0.0 && best.map(|(a, _)| area > a).unwrap_or(true) {
            best = Some((area, info));
        }
    }
    match best {
        Some((_, info)) => info,
        None => display_info(CGDisplay::main()),
    }
}

/// Height to pivot the AppKit bottom-left flip on for `rect`: the height
/// of the display containing it, so placement and hit-testing stay correct
/// when the mirror sits on a secondary display of differing size. Falls
/// back to the main display when the rect is off-screen.
pub fn flip_height_for(rect: &Rect) -> f64 {
    display_containing(rect).bounds.h
}
