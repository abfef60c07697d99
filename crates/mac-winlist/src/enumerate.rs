use std::{collections::HashMap, ffi::c_void};

use core_foundation::{
    array::{CFArray, CFArrayGetCount, CFArrayGetValueAtIndex},
    base::{CFTypeRef, TCFType},
    dictionary::CFDictionaryRef,
    string::CFString,
};
use tracing::{trace, warn};

use crate::{
    TargetDescriptor, WindowId, WindowInfo,
    cfutil::{dict_get_bool, dict_get_i32, dict_get_rect, dict_get_string},
    geom::Rect,
    is_candidate, picker_eligible,
};

#[allow(non_snake_case)]
unsafe extern "C" {
    fn CFGetTypeID(cf: CFTypeRef) -> u64;
    fn CFDictionaryGetTypeID() -> u64;
}

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGWindowListCopyWindowInfo(option: u32, relativeToWindow: u32) -> CFTypeRef; // CFArrayRef
}

const K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY: u32 = 1 << 0;
const K_CG_WINDOW_LIST_OPTION_INCLUDING_WINDOW: u32 = 1 << 3;
const K_CG_WINDOW_LIST_OPTION_EXCLUDE_DESKTOP_ELEMENTS: u32 = 1 << 4;

/// Enumerate on-screen windows front-to-back, desktop elements excluded.
///
/// Bundle identifiers are resolved per owning pid through
/// `NSRunningApplication`; windows whose pid cannot be resolved keep an
/// empty identifier and are never excluded by it.
pub fn list_windows() -> Vec<WindowInfo> {
    trace!("list_windows");
    let mut out = Vec::new();
    let mut bundle_cache: HashMap<i32, String> = HashMap::new();
    unsafe {
        let arr_ref = CGWindowListCopyWindowInfo(
            K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY | K_CG_WINDOW_LIST_OPTION_EXCLUDE_DESKTOP_ELEMENTS,
            0,
        );
        if arr_ref.is_null() {
            warn!("list_windows: CGWindowListCopyWindowInfo returned null");
            return out;
        }
        let arr: CFArray<*const c_void> = CFArray::wrap_under_create_rule(arr_ref as _);
        let key_pid = CFString::from_static_string("kCGWindowOwnerPID");
        let key_layer = CFString::from_static_string("kCGWindowLayer");
        let key_num = CFString::from_static_string("kCGWindowNumber");
        let key_app = CFString::from_static_string("kCGWindowOwnerName");
        let key_title = CFString::from_static_string("kCGWindowName");
        let key_bounds = CFString::from_static_string("kCGWindowBounds");
        let key_onscreen = CFString::from_static_string("kCGWindowIsOnscreen");

        for i in 0..CFArrayGetCount(arr.as_concrete_TypeRef()) {
            let item = CFArrayGetValueAtIndex(arr.as_concrete_TypeRef(), i) as CFTypeRef;
            if item.is_null() || CFGetTypeID(item) != CFDictionaryGetTypeID() {
                continue;
            }
            let d = item as CFDictionaryRef;
            let pid = match dict_get_i32(d, key_pid.as_concrete_TypeRef()) {
                Some(p) => p,
                None => continue,
            };
            let id = match dict_get_i32(d, key_num.as_concrete_TypeRef()) {
                Some(n) if n > 0 => n as WindowId,
                _ => continue,
            };
            let bounds = match dict_get_rect(d, key_bounds.as_concrete_TypeRef()) {
                Some(r) => r,
                None => continue,
            };
            let app = dict_get_string(d, key_app.as_concrete_TypeRef()).unwrap_or_default();
            let title = dict_get_string(d, key_title.as_concrete_TypeRef())
                .filter(|t| !t.is_empty());
            let layer = dict_get_i32(d, key_layer.as_concrete_TypeRef()).unwrap_or(0);
            let is_on_screen =
                dict_get_bool(d, key_onscreen.as_concrete_TypeRef()).unwrap_or(true);
            let bundle_id = bundle_cache
                .entry(pid)
                .or_insert_with(|| crate::activate::bundle_id_for_pid(pid).unwrap_or_default())
                .clone();

            out.push(WindowInfo {
                pid,
                id,
                app,
                title,
                bundle_id,
                bounds,
                layer,
                is_on_screen,
            });
        }
    }
    out
}

/// Ordered pinnable candidates, front-to-back.
pub fn list_candidates() -> Vec<TargetDescriptor> {
    list_windows()
        .iter()
        .filter(|w| is_candidate(w))
        .map(TargetDescriptor::from)
        .collect()
}

/// The frontmost pinnable candidate.
///
/// Excluded frontmost windows (the launcher itself, Spotlight) are skipped,
/// so "pin" invoked from a launcher pins the window underneath it.
pub fn frontmost_candidate() -> Option<TargetDescriptor> {
    list_windows()
        .iter()
        .find(|w| is_candidate(w))
        .map(TargetDescriptor::from)
}

/// At most one window per owning process, for the menu-bar picker.
pub fn list_by_app() -> Vec<TargetDescriptor> {
    let mut seen: Vec<i32> = Vec::new();
    let mut out = Vec::new();
    for w in list_windows() {
        if !picker_eligible(&w) || seen.contains(&w.pid) {
            continue;
        }
        seen.push(w.pid);
        out.push(TargetDescriptor::from(&w));
    }
    out
}

fn probe_window(id: WindowId) -> Option<Rect> {
    unsafe {
        let arr_ref = CGWindowListCopyWindowInfo(
            K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY | K_CG_WINDOW_LIST_OPTION_INCLUDING_WINDOW,
            id,
        );
        if arr_ref.is_null() {
            return None;
        }
        let arr: CFArray<*const c_void> = CFArray::wrap_under_create_rule(arr_ref as _);
        let key_num = CFString::from_static_string("kCGWindowNumber");
        let key_bounds = CFString::from_static_string("kCGWindowBounds");
        for i in 0..CFArrayGetCount(arr.as_concrete_TypeRef()) {
            let item = CFArrayGetValueAtIndex(arr.as_concrete_TypeRef(), i) as CFTypeRef;
            if item.is_null() || CFGetTypeID(item) != CFDictionaryGetTypeID() {
                continue;
            }
            let d = item as CFDictionaryRef;
            if dict_get_i32(d, key_num.as_concrete_TypeRef()) == Some(id as i32) {
                return dict_get_rect(d, key_bounds.as_concrete_TypeRef());
            }
        }
        None
    }
}

/// True iff the OS still reports the window on screen.
pub fn exists(id: WindowId) -> bool {
    probe_window(id).is_some()
}

/// Current top-left-origin bounds for the window, if it is on screen.
pub fn bounds(id: WindowId) -> Option<Rect> {
    probe_window(id)
}
