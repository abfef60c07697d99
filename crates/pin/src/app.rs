//! Application wiring: the tao event loop on the main thread, the tokio
//! runtime driving the engine, and the channels between them.

use std::{path::PathBuf, sync::Arc};

use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
use objc2_foundation::MainThreadMarker;
use pin_dispatch::Dispatcher;
use pin_engine::{Engine, UserDefaultsPrefs};
use pin_protocol::DEFAULT_RESPONSE_PATH;
use tao::{
    event::{Event, StartCause},
    event_loop::{ControlFlow, EventLoopBuilder},
};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info};

use crate::tray::{Tray, TrayAction};

/// Events posted to the main loop from other threads.
#[derive(Debug)]
pub enum AppEvent {
    /// An external command URL arrived (Apple Event or tray action).
    Command(String),
    /// Main-thread ops are waiting to be drained.
    Wake,
    /// Refresh the tray status line and window picker.
    RefreshTray,
    /// Tray menu item was activated.
    Menu(tray_icon::menu::MenuId),
}

pub fn run(response_file: Option<PathBuf>) -> ! {
    let event_loop = EventLoopBuilder::<AppEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    // AppKit mutations queue up until the loop drains them; the waker keeps
    // the loop from sleeping through a pending op.
    let wake_proxy = proxy.clone();
    mac_overlay::main_ops::set_waker(Box::new(move || {
        let _ = wake_proxy.send_event(AppEvent::Wake);
    }));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    let engine = {
        let _guard = runtime.enter();
        Engine::new(
            Arc::new(mac_winlist::ops::RealWinList),
            Arc::new(mac_capture::CaptureSession::new()),
            Arc::new(mac_overlay::MacOverlayFactory::new()),
            Arc::new(UserDefaultsPrefs),
        )
    };
    let dispatcher = Dispatcher::with_response_path(
        engine.clone(),
        response_file.unwrap_or_else(|| PathBuf::from(DEFAULT_RESPONSE_PATH)),
    );

    // Commands run through one consumer so they execute strictly in
    // arrival order.
    let (cmd_tx, cmd_rx) = unbounded_channel::<String>();
    {
        let dispatcher = dispatcher.clone();
        let refresh = proxy.clone();
        runtime.spawn(async move {
            let mut rx = cmd_rx;
            while let Some(url) = rx.recv().await {
                dispatcher.handle_url(&url).await;
                let _ = refresh.send_event(AppEvent::RefreshTray);
            }
        });
    }

    // Frontmost-app changes feed the hover re-show policy.
    let (fm_tx, mut fm_rx) = unbounded_channel::<mac_frontmost::FrontmostEvent>();
    mac_frontmost::start_watcher(fm_tx);
    {
        let engine = engine.clone();
        runtime.spawn(async move {
            while let Some(ev) = fm_rx.recv().await {
                engine.on_frontmost_changed(ev.pid);
            }
        });
    }

    crate::urlscheme::set_proxy(proxy.clone());
    Tray::start_forwarder(proxy.clone());

    let mut tray: Option<Tray> = None;
    let engine_for_loop = engine.clone();

    info!("pin agent starting");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        match event {
            Event::NewEvents(StartCause::Init) => {
                let Some(mtm) = MainThreadMarker::new() else {
                    return;
                };
                let app = NSApplication::sharedApplication(mtm);
                app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
                crate::urlscheme::install(mtm);
                let _ = mac_frontmost::install_frontmost_observer();
                let mut t = Tray::build();
                t.refresh(
                    &engine_for_loop.status(),
                    &engine_for_loop.winlist().list_by_app(),
                );
                tray = Some(t);
            }
            Event::UserEvent(AppEvent::Command(url)) => {
                let _ = cmd_tx.send(url);
            }
            Event::UserEvent(AppEvent::Wake) => {
                if let Some(mtm) = MainThreadMarker::new() {
                    mac_overlay::main_ops::drain(mtm);
                }
            }
            Event::UserEvent(AppEvent::RefreshTray) => {
                if let Some(t) = tray.as_mut() {
                    t.refresh(
                        &engine_for_loop.status(),
                        &engine_for_loop.winlist().list_by_app(),
                    );
                }
            }
            Event::UserEvent(AppEvent::Menu(id)) => {
                let Some(t) = tray.as_mut() else { return };
                match t.action_for(&id) {
                    Some(TrayAction::Command(url)) => {
                        let _ = cmd_tx.send(url);
                    }
                    Some(TrayAction::PermissionsHelp) => {
                        permissions::prompt_accessibility();
                        permissions::guide_to_capture_settings();
                    }
                    Some(TrayAction::Quit) => {
                        debug!("quit from tray");
                        engine_for_loop.panic();
                        if let Some(mtm) = MainThreadMarker::new() {
                            mac_overlay::main_ops::drain(mtm);
                        }
                        *control_flow = ControlFlow::Exit;
                    }
                    None => {}
                }
            }
            _ => {}
        }
    })
}
