//! `pin://` URL-scheme reception via Apple Events.
//!
//! The launcher front-end issues commands by opening URLs; launch services
//! delivers them as kAEGetURL Apple Events. A tiny Objective-C handler
//! class forwards the URL string to the event loop, where it joins the same
//! command queue as tray actions.

use std::sync::Mutex;

use objc2::{ClassType, DeclaredClass, declare_class, msg_send_id, mutability, rc::Retained, sel};
use objc2_foundation::{
    MainThreadMarker, NSAppleEventDescriptor, NSAppleEventManager, NSObject,
};
use once_cell::sync::Lazy;
use tao::event_loop::EventLoopProxy;
use tracing::{debug, warn};

use crate::app::AppEvent;

/// 'GURL', both the internet event class and the get-URL event id.
const K_AE_GET_URL: u32 = 0x4755_524C;

/// '----', the direct-object parameter keyword.
const KEY_DIRECT_OBJECT: u32 = 0x2D2D_2D2D;

static PROXY: Lazy<Mutex<Option<EventLoopProxy<AppEvent>>>> = Lazy::new(|| Mutex::new(None));

/// Store the event-loop proxy the handler forwards URLs to. Call before
/// [`install`].
pub fn set_proxy(proxy: EventLoopProxy<AppEvent>) {
    if let Ok(mut guard) = PROXY.lock() {
        *guard = Some(proxy);
    }
}

fn forward(url: String) {
    debug!(url, "url_activation");
    if let Ok(guard) = PROXY.lock()
        && let Some(proxy) = &*guard
    {
        let _ = proxy.send_event(AppEvent::Command(url));
    }
}

declare_class!(
    struct UrlHandler;

    // SAFETY: no ivars, only installed and invoked on the main thread by
    // the Apple Event manager.
    unsafe impl ClassType for UrlHandler {
        type Super = NSObject;
        type Mutability = mutability::MainThreadOnly;
        const NAME: &'static str = "PinUrlHandler";
    }

    impl DeclaredClass for UrlHandler {}

    unsafe impl UrlHandler {
        #[method(handleGetURLEvent:withReplyEvent:)]
        fn handle_get_url(
            &self,
            event: &NSAppleEventDescriptor,
            _reply: &NSAppleEventDescriptor,
        ) {
            let url = unsafe { event.paramDescriptorForKeyword(KEY_DIRECT_OBJECT) }
                .and_then(|d| unsafe { d.stringValue() })
                .map(|s| s.to_string());
            match url {
                Some(url) => forward(url),
                None => warn!("kAEGetURL event without a URL payload"),
            }
        }
    }
);

impl UrlHandler {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        unsafe { msg_send_id![mtm.alloc(), init] }
    }
}

/// Register the handler for kAEGetURL. Main thread only; call once at
/// startup.
pub fn install(mtm: MainThreadMarker) {
    let handler = UrlHandler::new(mtm);
    let manager = unsafe { NSAppleEventManager::sharedAppleEventManager() };
    unsafe {
        manager.setEventHandler_andSelector_forEventClass_andEventID(
            &handler,
            sel!(handleGetURLEvent:withReplyEvent:),
            K_AE_GET_URL,
            K_AE_GET_URL,
        );
    }
    // The event manager keeps dispatching to this instance for the process
    // lifetime; keep our reference alive alongside it.
    std::mem::forget(handler);
}
