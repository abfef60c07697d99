use core_foundation::{
    base::TCFType,
    dictionary::CFDictionaryRef,
    number::CFNumber,
    string::{CFString, CFStringRef},
};

use crate::geom::Rect;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGRectMakeWithDictionaryRepresentation(
        dict: CFDictionaryRef,
        rect: *mut CGRectFFI,
    ) -> bool;
}

// CGRect layout for the dictionary-representation call; fields mirror
// CGPoint/CGSize (f64 each).
#[repr(C)]
#[derive(Default)]
struct CGRectFFI {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

fn dict_value(dict: CFDictionaryRef, key: CFStringRef) -> *const core::ffi::c_void {
    unsafe {
        core_foundation::dictionary::CFDictionaryGetValue(dict, key as *const core::ffi::c_void)
    }
}

/// Borrow a CFStringRef and convert to Rust String.
pub(crate) fn cfstring_to_string(s: CFStringRef) -> String {
    // SAFETY: CFStringRef obtained from system APIs; wrap under get rule.
    let cf = unsafe { CFString::wrap_under_get_rule(s) };
    cf.to_string()
}

/// Get a String value for the given CFDictionary key.
pub(crate) fn dict_get_string(dict: CFDictionaryRef, key: CFStringRef) -> Option<String> {
    let value = dict_value(dict, key);
    if value.is_null() {
        return None;
    }
    Some(cfstring_to_string(value as CFStringRef))
}

/// Get a 32-bit integer from CFDictionary for the given key.
pub(crate) fn dict_get_i32(dict: CFDictionaryRef, key: CFStringRef) -> Option<i32> {
    let value = dict_value(dict, key);
    if value.is_null() {
        return None;
    }
    let n = unsafe { CFNumber::wrap_under_get_rule(value as _) };
    n.to_i64().map(|v| v as i32)
}

/// Get a bool from CFDictionary for the given key.
pub(crate) fn dict_get_bool(dict: CFDictionaryRef, key: CFStringRef) -> Option<bool> {
    unsafe extern "C" {
        fn CFBooleanGetValue(b: core_foundation::base::CFTypeRef) -> bool;
    }
    let value = dict_value(dict, key);
    if value.is_null() {
        return None;
    }
    Some(unsafe { CFBooleanGetValue(value as _) })
}

/// Decode a kCGWindowBounds-style sub-dictionary into a [`Rect`].
pub(crate) fn dict_get_rect(dict: CFDictionaryRef, key: CFStringRef) -> Option<Rect> {
    let value = dict_value(dict, key);
    if value.is_null() {
        return None;
    }
    let mut out = CGRectFFI::default();
    let ok = unsafe { CGRectMakeWithDictionaryRepresentation(value as CFDictionaryRef, &mut out) };
    if !ok {
        return None;
    }
    Some(Rect::new(out.x, out.y, out.w, out.h))
}
