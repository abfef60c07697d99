use std::{ptr::NonNull, sync::Mutex};

use block2::StackBlock;
use objc2_app_kit::{
    NSRunningApplication, NSWorkspace, NSWorkspaceApplicationKey,
    NSWorkspaceDidActivateApplicationNotification,
};
use objc2_foundation::NSNotification;
use once_cell::sync::Lazy;
use tracing::info;

use crate::event::FrontmostEvent;

// Global sink for NSWorkspace activation events.
static NS_SINK: Lazy<Mutex<Option<tokio::sync::mpsc::UnboundedSender<FrontmostEvent>>>> =
    Lazy::new(|| Mutex::new(None));

/// Set the sink used by NSWorkspace notifications to forward events.
///
/// Must be called before [`install_frontmost_observer`].
pub(crate) fn set_sink(tx: tokio::sync::mpsc::UnboundedSender<FrontmostEvent>) {
    if let Ok(mut guard) = NS_SINK.lock() {
        *guard = Some(tx);
    }
}

fn emit(app: String, pid: i32) {
    if let Ok(guard) = NS_SINK.lock()
        && let Some(tx) = &*guard
    {
        let _ = tx.send(FrontmostEvent { pid, app });
    }
}

fn app_fields(app: &NSRunningApplication) -> (String, i32) {
    let pid = unsafe { app.processIdentifier() };
    if let Some(name) = unsafe { app.localizedName() } {
        return (name.to_string(), pid);
    }
    if let Some(bid) = unsafe { app.bundleIdentifier() } {
        return (bid.to_string(), pid);
    }
    (String::new(), pid)
}

// Tracks whether the process-global observer is installed.
static NS_OBS_TOKEN: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Install the NSWorkspace activation observer on the current (main) thread.
///
/// Notes:
/// - Must run on the AppKit main thread.
/// - Idempotent: subsequent calls are no-ops; only the first call performs
///   the install. The notification center retains the handler block, which
///   keeps the observer alive for the process lifetime.
pub fn install_frontmost_observer() -> Result<(), crate::Error> {
    if let Ok(mut installed) = NS_OBS_TOKEN.lock() {
        if *installed {
            return Ok(());
        }
        unsafe {
            let ws = NSWorkspace::sharedWorkspace();
            let center = ws.notificationCenter();
            let block = StackBlock::new(move |notif: NonNull<NSNotification>| {
                let notif = notif.as_ref();
                let mut sent = false;
                if let Some(info) = notif.userInfo()
                    && let Some(obj) = info.objectForKey(NSWorkspaceApplicationKey)
                    && let Some(app) = obj.downcast_ref::<NSRunningApplication>()
                {
                    let (name, pid) = app_fields(app);
                    emit(name, pid);
                    sent = true;
                }
                if !sent
                    && let Some(obj) = notif.object()
                    && let Some(app) = obj.downcast_ref::<NSRunningApplication>()
                {
                    let (name, pid) = app_fields(app);
                    emit(name, pid);
                    sent = true;
                }
                if !sent {
                    emit(String::new(), -1);
                }
            })
            .copy();
            let _token = center.addObserverForName_object_queue_usingBlock(
                Some(NSWorkspaceDidActivateApplicationNotification),
                None,
                None,
                &block,
            );
            *installed = true;
            info!("NSWorkspace activation observer installed");
        }
        Ok(())
    } else {
        Err(crate::Error::ObserverPoisoned)
    }
}
