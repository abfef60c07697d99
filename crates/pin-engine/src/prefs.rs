//! The agent's single persisted preference: overlay opacity.

use std::collections::HashMap;

use objc2_foundation::{NSString, NSUserDefaults};
use parking_lot::Mutex;

/// Preference key for the persisted overlay opacity.
pub const OPACITY_KEY: &str = "mirrorOpacity";

/// Lower opacity bound; a fully invisible mirror would be unrecoverable by
/// eye, so requests below this floor are raised to it.
pub const OPACITY_MIN: f64 = 0.1;

/// Upper opacity bound.
pub const OPACITY_MAX: f64 = 1.0;

/// Clamp a requested opacity into the legal range. Non-finite input maps to
/// fully opaque.
pub fn clamp_opacity(v: f64) -> f64 {
    if !v.is_finite() {
        return OPACITY_MAX;
    }
    v.clamp(OPACITY_MIN, OPACITY_MAX)
}

/// Decode a stored value: unset or zero reads as fully opaque.
pub fn decode_opacity(stored: Option<f64>) -> f64 {
    match stored {
        Some(v) if v != 0.0 => clamp_opacity(v),
        _ => OPACITY_MAX,
    }
}

/// Scalar preference store keyed by string.
pub trait Prefs: Send + Sync {
    /// Read a float, `None` when the key was never written.
    fn get_f64(&self, key: &str) -> Option<f64>;
    /// Write a float synchronously.
    fn set_f64(&self, key: &str, value: f64);
}

/// Process-wide `NSUserDefaults`-backed store.
pub struct UserDefaultsPrefs;

impl Prefs for UserDefaultsPrefs {
    fn get_f64(&self, key: &str) -> Option<f64> {
        let key = NSString::from_str(key);
        let defaults = unsafe { NSUserDefaults::standardUserDefaults() };
        unsafe { defaults.objectForKey(&key) }?;
        Some(unsafe { defaults.doubleForKey(&key) })
    }

    fn set_f64(&self, key: &str, value: f64) {
        let key = NSString::from_str(key);
        let defaults = unsafe { NSUserDefaults::standardUserDefaults() };
        unsafe { defaults.setDouble_forKey(value, &key) };
    }
}

/// In-memory store for tests; survives engine restarts within a process by
/// sharing the same instance.
#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, f64>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Prefs for MemoryPrefs {
    fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.lock().get(key).copied()
    }
    fn set_f64(&self, key: &str, value: f64) {
        self.values.lock().insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_range() {
        assert_eq!(clamp_opacity(0.0), 0.1);
        assert_eq!(clamp_opacity(2.0), 1.0);
        assert_eq!(clamp_opacity(0.55), 0.55);
        assert_eq!(clamp_opacity(f64::NAN), 1.0);
    }

    #[test]
    fn unset_or_zero_reads_fully_opaque() {
        assert_eq!(decode_opacity(None), 1.0);
        assert_eq!(decode_opacity(Some(0.0)), 1.0);
        assert_eq!(decode_opacity(Some(0.3)), 0.3);
    }
}
