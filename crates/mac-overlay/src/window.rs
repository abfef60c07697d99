//! Main-thread window management for one overlay: the mirror window, the
//! unpin button window, their layers and the pointer monitors.
//!
//! Everything here runs inside ops drained by the event loop; the registry
//! keeps the AppKit objects out of reach of other threads.

use std::{collections::HashMap, ptr::NonNull, sync::Arc};

use block2::StackBlock;
use core_foundation::base::TCFType;
use mac_winlist::{Rect, screen};
use objc2::runtime::AnyObject;
use objc2_app_kit::{
    NSBackingStoreType, NSColor, NSEvent, NSEventMask, NSScreen, NSWindow,
    NSWindowCollectionBehavior, NSWindowStyleMask,
};
use objc2_foundation::{MainThreadMarker, NSPoint, NSRect, NSSize};
use objc2_quartz_core::CALayer;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pin_engine::Frame;
use tracing::warn;

use crate::{shared::OverlayShared, sink::cg_image_for};

/// NSFloatingWindowLevel; the mirror rides here, above normal windows.
const MIRROR_LEVEL: isize = 3;

/// One above the mirror so the unpin affordance is always reachable.
const BUTTON_LEVEL: isize = 4;

/// Edge length of the unpin button window in points.
pub(crate) const BUTTON_SIZE: f64 = 22.0;

/// Offset of the button from the mirror's top-left corner.
pub(crate) const BUTTON_OFFSET: f64 = -8.0;

/// Button rectangle (top-left space) for a given mirror rectangle.
pub(crate) fn button_rect_for(mirror: &Rect) -> Rect {
    Rect::new(
        mirror.x + BUTTON_OFFSET,
        mirror.y + BUTTON_OFFSET,
        BUTTON_SIZE,
        BUTTON_SIZE,
    )
}

struct OverlayWindows {
    mirror: objc2::rc::Retained<NSWindow>,
    button: objc2::rc::Retained<NSWindow>,
    display_layer: objc2::rc::Retained<CALayer>,
    monitors: Vec<objc2::rc::Retained<AnyObject>>,
}

/// Wrapper asserting main-thread-only access. Every read goes through an op
/// holding a `MainThreadMarker`; the registry mutex only guards the map.
struct MainThreadCell<T>(T);
// SAFETY: cells are inserted, used and removed exclusively from main-thread
// ops; the types inside are never touched from another thread.
unsafe impl<T> Send for MainThreadCell<T> {}

static REGISTRY: Lazy<Mutex<HashMap<u64, MainThreadCell<OverlayWindows>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn appkit_rect(r: &Rect) -> NSRect {
    let (x, y) = r.to_appkit_origin(screen::flip_height_for(r));
    NSRect::new(NSPoint::new(x, y), NSSize::new(r.w, r.h))
}

fn borderless_window(mtm: MainThreadMarker, frame: NSRect, level: isize) -> objc2::rc::Retained<NSWindow> {
    let window = unsafe {
        NSWindow::initWithContentRect_styleMask_backing_defer(
            mtm.alloc(),
            frame,
            NSWindowStyleMask::Borderless,
            NSBackingStoreType::NSBackingStoreBuffered,
            false,
        )
    };
    window.setLevel(level);
    window.setOpaque(false);
    unsafe { window.setBackgroundColor(Some(&NSColor::clearColor())) };
    window.setCollectionBehavior(
        NSWindowCollectionBehavior::CanJoinAllSpaces | NSWindowCollectionBehavior::Stationary,
    );
    // Ordered out on teardown, never closed: closing deallocates while
    // in-flight animation blocks may still reference the window.
    unsafe { window.setReleasedWhenClosed(false) };
    window
}

/// Build both windows, the display layer and the pointer monitors.
pub(crate) fn create_windows(mtm: MainThreadMarker, id: u64, shared: Arc<OverlayShared>, bounds: Rect) {
    let mirror = borderless_window(mtm, appkit_rect(&bounds), MIRROR_LEVEL);
    mirror.setHasShadow(true);
    mirror.setIgnoresMouseEvents(false);
    unsafe { mirror.setAcceptsMouseMovedEvents(true) };

    let display_layer = CALayer::new();
    if let Some(view) = mirror.contentView() {
        view.setWantsLayer(true);
        if let Some(root) = unsafe { view.layer() } {
            display_layer.setFrame(NSRect::new(
                NSPoint::new(0.0, 0.0),
                NSSize::new(bounds.w, bounds.h),
            ));
            if let Some(ns_screen) = NSScreen::mainScreen(mtm) {
                display_layer.setContentsScale(ns_screen.backingScaleFactor());
            }
            root.addSublayer(&display_layer);
        }
    }

    let button_rect = button_rect_for(&bounds);
    let button = borderless_window(mtm, appkit_rect(&button_rect), BUTTON_LEVEL);
    button.setHasShadow(true);
    // The unpin affordance takes clicks in every state.
    button.setIgnoresMouseEvents(false);
    unsafe {
        let red = NSColor::colorWithSRGBRed_green_blue_alpha(0.85, 0.22, 0.2, 0.95);
        button.setBackgroundColor(Some(&red));
    }
    if let Some(view) = button.contentView() {
        view.setWantsLayer(true);
        if let Some(layer) = unsafe { view.layer() } {
            layer.setMasksToBounds(true);
            layer.setCornerRadius(BUTTON_SIZE / 2.0);
        }
    }

    let monitors = install_pointer_monitors(&shared);

    REGISTRY.lock().insert(
        id,
        MainThreadCell(OverlayWindows {
            mirror,
            button,
            display_layer,
            monitors,
        }),
    );
}

/// Current pointer position in top-left global points, flipped with the
/// same height that positions the mirror so hit-tests agree with placement
/// on every display.
fn pointer_topleft(shared: &OverlayShared) -> (f64, f64) {
    let p = unsafe { NSEvent::mouseLocation() };
    let flip = screen::flip_height_for(&shared.mirror_rect.lock());
    (p.x, flip - p.y)
}

/// Pointer monitors feeding [`OverlayShared`].
///
/// The global monitor covers events delivered to other applications, which
/// is the only signal left once the mirror ignores pointer events; the
/// local pair covers movement over our own windows and the unpin click.
fn install_pointer_monitors(shared: &Arc<OverlayShared>) -> Vec<objc2::rc::Retained<AnyObject>> {
    let mut monitors = Vec::new();
    let move_mask = NSEventMask::MouseMoved | NSEventMask::LeftMouseDragged;

    let s = shared.clone();
    let global_block = StackBlock::new(move |_event: NonNull<NSEvent>| {
        let (x, y) = pointer_topleft(&s);
        s.pointer_moved(x, y);
    })
    .copy();
    if let Some(token) =
        unsafe { NSEvent::addGlobalMonitorForEventsMatchingMask_handler(move_mask, &global_block) }
    {
        monitors.push(token);
    } else {
        warn!("global pointer monitor unavailable");
    }

    let s = shared.clone();
    let local_move_block = StackBlock::new(move |event: NonNull<NSEvent>| -> *mut NSEvent {
        let (x, y) = pointer_topleft(&s);
        s.pointer_moved(x, y);
        event.as_ptr()
    })
    .copy();
    if let Some(token) = unsafe {
        NSEvent::addLocalMonitorForEventsMatchingMask_handler(move_mask, &local_move_block)
    } {
        monitors.push(token);
    }

    let s = shared.clone();
    let click_block = StackBlock::new(move |event: NonNull<NSEvent>| -> *mut NSEvent {
        let (x, y) = pointer_topleft(&s);
        if s.pointer_clicked(x, y) {
            return std::ptr::null_mut();
        }
        event.as_ptr()
    })
    .copy();
    if let Some(token) = unsafe {
        NSEvent::addLocalMonitorForEventsMatchingMask_handler(NSEventMask::LeftMouseDown, &click_block)
    } {
        monitors.push(token);
    }

    monitors
}

/// Order both windows in, button above mirror.
pub(crate) fn show(mtm: MainThreadMarker, id: u64) {
    let _ = mtm;
    let registry = REGISTRY.lock();
    if let Some(MainThreadCell(w)) = registry.get(&id) {
        w.mirror.orderFrontRegardless();
        w.button.orderFrontRegardless();
    }
}

/// Track the target: move both windows and resize the display layer. No
/// animation, matching the 100 ms polling cadence.
pub(crate) fn apply_frame(mtm: MainThreadMarker, id: u64, bounds: Rect) {
    let _ = mtm;
    let registry = REGISTRY.lock();
    if let Some(MainThreadCell(w)) = registry.get(&id) {
        w.mirror.setFrame_display(appkit_rect(&bounds), false);
        w.button
            .setFrame_display(appkit_rect(&button_rect_for(&bounds)), false);
        w.display_layer.setFrame(NSRect::new(
            NSPoint::new(0.0, 0.0),
            NSSize::new(bounds.w, bounds.h),
        ));
    }
}

/// Engage or release see-through mode.
pub(crate) fn apply_hidden(mtm: MainThreadMarker, id: u64, hidden: bool, opacity: f64) {
    let _ = mtm;
    let registry = REGISTRY.lock();
    if let Some(MainThreadCell(w)) = registry.get(&id) {
        w.mirror.setIgnoresMouseEvents(hidden);
        w.mirror.setHasShadow(!hidden);
        w.display_layer.setOpacity(if hidden { 0.0 } else { opacity as f32 });
    }
}

pub(crate) fn apply_opacity(mtm: MainThreadMarker, id: u64, opacity: f64) {
    let _ = mtm;
    let registry = REGISTRY.lock();
    if let Some(MainThreadCell(w)) = registry.get(&id) {
        w.display_layer.setOpacity(opacity as f32);
    }
}

/// Put the latest coalesced frame on the display layer.
///
/// CGImageRef is toll-free as a layer-contents id; the layer retains it on
/// assignment, so the Rust wrapper may drop right after.
pub(crate) fn apply_frame_contents(mtm: MainThreadMarker, id: u64, frame: Frame) {
    let _ = mtm;
    let registry = REGISTRY.lock();
    if let Some(MainThreadCell(w)) = registry.get(&id)
        && let Some(image) = cg_image_for(&frame)
    {
        unsafe {
            let contents = image.as_concrete_TypeRef() as *mut AnyObject;
            w.display_layer.setContents(Some(&*(contents as *const AnyObject)));
        }
    }
}

/// Ordered teardown. The engine has already stopped its polls and cleared
/// callbacks; this removes the monitors, detaches layers, and hides the
/// windows before dropping the owning references.
pub(crate) fn teardown(mtm: MainThreadMarker, id: u64) {
    let _ = mtm;
    let removed = REGISTRY.lock().remove(&id);
    let Some(MainThreadCell(w)) = removed else {
        return;
    };
    for token in &w.monitors {
        unsafe { NSEvent::removeMonitor(token) };
    }
    w.display_layer.removeFromSuperlayer();
    w.mirror.orderOut(None);
    w.button.orderOut(None);
    // Owning references drop here; AppKit deallocates once in-flight
    // callback blocks release theirs.
}
