//! Simple, macOS-only permission checks for Pin.
//!
//! Two permissions matter to the agent: Screen Recording (required to obtain
//! frames from the capture facility) and Accessibility (used to observe other
//! applications' windows with better fidelity). This crate exposes
//! non-prompting probes plus the two user-facing escalation paths: the
//! Accessibility consent prompt and the Screen Recording privacy pane.
//!
//! Notes
//! - [`probe`] performs only fast, side-effect-free queries.
//! - Missing Screen Recording is a hard block for pinning; missing
//!   Accessibility merely degrades geometry precision and is non-fatal.

use core_foundation::{
    base::TCFType,
    boolean::CFBoolean,
    dictionary::{CFDictionary, CFDictionaryRef},
    string::CFString,
};
use objc2_foundation::NSURL;
use tracing::warn;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
    fn CGPreflightScreenCaptureAccess() -> bool;
}

/// Privacy-pane deep link for Screen Recording consent.
const SCREEN_CAPTURE_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";

/// AX option key that makes the trust check present the system prompt.
const AX_TRUSTED_CHECK_OPTION_PROMPT: &str = "AXTrustedCheckOptionPrompt";

/// Check the global Accessibility permission without prompting.
pub fn accessibility_ok() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Check the Screen Recording permission.
///
/// Uses the CoreGraphics preflight query, which is side-effect free; any
/// failure mode is treated as not granted.
pub fn capture_ok() -> bool {
    unsafe { CGPreflightScreenCaptureAccess() }
}

/// Current permission status for the process.
#[derive(Debug, Clone, Copy)]
pub struct PermissionsStatus {
    /// Screen Recording permission; `true` if granted.
    pub capture_ok: bool,
    /// Accessibility (AX) permission; `true` if granted.
    pub accessibility_ok: bool,
}

impl PermissionsStatus {
    /// True when everything the agent wants is granted.
    pub fn all_granted(&self) -> bool {
        self.capture_ok && self.accessibility_ok
    }
}

/// Query both permissions. No prompting, no side effects.
pub fn probe() -> PermissionsStatus {
    PermissionsStatus {
        capture_ok: capture_ok(),
        accessibility_ok: accessibility_ok(),
    }
}

/// Trigger the system Accessibility consent prompt.
///
/// Non-blocking: returns the current trust state immediately; the user's
/// decision lands in System Settings and is picked up by later probes.
pub fn prompt_accessibility() -> bool {
    let key = CFString::from_static_string(AX_TRUSTED_CHECK_OPTION_PROMPT);
    let options =
        CFDictionary::from_CFType_pairs(&[(key.as_CFType(), CFBoolean::true_value().as_CFType())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}

/// Open the Screen Recording privacy pane in System Settings.
///
/// There is no programmatic grant path for Screen Recording; guiding the
/// user to the pane is the expected remedy when [`capture_ok`] is false.
pub fn guide_to_capture_settings() {
    let url = NSURL::from_str(SCREEN_CAPTURE_SETTINGS_URL);
    let workspace = unsafe { objc2_app_kit::NSWorkspace::sharedWorkspace() };
    if !unsafe { workspace.openURL(&url) } {
        warn!("failed to open Screen Recording privacy pane");
    }
}
