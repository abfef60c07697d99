use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication};
use tracing::warn;

use crate::error::{Error, Result};

/// Bundle identifier for the application owning `pid`, when resolvable.
pub fn bundle_id_for_pid(pid: i32) -> Option<String> {
    let app =
        unsafe { NSRunningApplication::runningApplicationWithProcessIdentifier(pid as libc::pid_t) }?;
    let bid = unsafe { app.bundleIdentifier() }?;
    Some(bid.to_string())
}

/// Bring the application owning `pid` to the foreground.
///
/// The hover see-through path uses this so clicks land on the real window
/// while the mirror fades out.
pub fn activate_pid(pid: i32) -> Result<()> {
    let Some(app) =
        (unsafe { NSRunningApplication::runningApplicationWithProcessIdentifier(pid as libc::pid_t) })
    else {
        warn!(pid, "NSRunningApplication not found");
        return Err(Error::AppNotFound(pid));
    };
    if !unsafe { app.activateWithOptions(NSApplicationActivationOptions::ActivateAllWindows) } {
        warn!(pid, "activateWithOptions(ActivateAllWindows) returned false");
        return Err(Error::ActivationFailed(pid));
    }
    Ok(())
}
