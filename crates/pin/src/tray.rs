//! Menu-bar presenter: a thin client of the command dispatcher.
//!
//! The tray shows the current status, offers pin-frontmost / unpin, and a
//! per-application window picker built from the enumerator. Every action is
//! translated to the same command URLs the external channel uses.

use std::thread;

use mac_winlist::TargetDescriptor;
use pin_protocol::{AgentStatus, StateName};
use tao::event_loop::EventLoopProxy;
use tracing::warn;
use tray_icon::{
    Icon, TrayIcon, TrayIconBuilder, TrayIconEvent,
    menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
};

use crate::app::AppEvent;

const ICON_SIZE: u32 = 22;

/// What a menu activation should do.
pub enum TrayAction {
    /// Dispatch this command URL.
    Command(String),
    /// Open the permission prompts/panes.
    PermissionsHelp,
    /// Leave the agent.
    Quit,
}

pub struct Tray {
    _tray: Option<TrayIcon>,
    status_item: MenuItem,
    pin_id: MenuId,
    unpin_id: MenuId,
    perms_id: MenuId,
    quit_id: MenuId,
    picker: Submenu,
    picker_items: Vec<(MenuItem, u32)>,
}

impl Tray {
    /// Build the tray icon and its static menu skeleton. Main thread only.
    pub fn build() -> Self {
        let menu = Menu::new();
        let status_item = MenuItem::new("Pin: idle", false, None);
        let pin = MenuItem::new("Pin Frontmost Window", true, None);
        let picker = Submenu::new("Pin Window", true);
        let unpin = MenuItem::new("Unpin", true, None);
        let perms = MenuItem::new("Permissions…", true, None);
        let quit = MenuItem::new("Quit Pin", true, None);

        let _ = menu.append(&status_item);
        let _ = menu.append(&PredefinedMenuItem::separator());
        let _ = menu.append(&pin);
        let _ = menu.append(&picker);
        let _ = menu.append(&unpin);
        let _ = menu.append(&PredefinedMenuItem::separator());
        let _ = menu.append(&perms);
        let _ = menu.append(&quit);

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_icon(tray_icon_image())
            .with_tooltip("Pin")
            .build();
        if let Err(e) = &tray {
            warn!(error = %e, "tray icon unavailable");
        }

        Self {
            _tray: tray.ok(),
            status_item,
            pin_id: pin.id().clone(),
            unpin_id: unpin.id().clone(),
            perms_id: perms.id().clone(),
            quit_id: quit.id().clone(),
            picker,
            picker_items: Vec::new(),
        }
    }

    /// Update the status line and rebuild the window picker.
    pub fn refresh(&mut self, status: &AgentStatus, windows: &[TargetDescriptor]) {
        self.status_item.set_text(status_line(status));

        for (item, _) in &self.picker_items {
            let _ = self.picker.remove(item);
        }
        self.picker_items.clear();
        for w in windows {
            let label = match &w.window_title {
                Some(title) => format!("{} \u{2014} {}", w.app_name, title),
                None => w.app_name.clone(),
            };
            let item = MenuItem::new(label, true, None);
            let _ = self.picker.append(&item);
            self.picker_items.push((item, w.window_id));
        }
    }

    /// Map a menu activation to its action.
    pub fn action_for(&self, id: &MenuId) -> Option<TrayAction> {
        if *id == self.pin_id {
            return Some(TrayAction::Command("pin://pin".into()));
        }
        if *id == self.unpin_id {
            return Some(TrayAction::Command("pin://unpin".into()));
        }
        if *id == self.perms_id {
            return Some(TrayAction::PermissionsHelp);
        }
        if *id == self.quit_id {
            return Some(TrayAction::Quit);
        }
        self.picker_items
            .iter()
            .find(|(item, _)| item.id() == id)
            .map(|(_, wid)| TrayAction::Command(format!("pin://pin-window?id={wid}")))
    }

    /// Forward menu and tray events from their process-global channels into
    /// the event loop.
    pub fn start_forwarder(proxy: EventLoopProxy<AppEvent>) {
        let menu_proxy = proxy.clone();
        thread::spawn(move || {
            let rx = MenuEvent::receiver();
            while let Ok(ev) = rx.recv() {
                let _ = menu_proxy.send_event(AppEvent::Menu(ev.id().clone()));
            }
        });
        thread::spawn(move || {
            let rx = TrayIconEvent::receiver();
            while rx.recv().is_ok() {
                // Any tray interaction is a chance to freshen the picker.
                let _ = proxy.send_event(AppEvent::RefreshTray);
            }
        });
    }
}

fn status_line(status: &AgentStatus) -> String {
    match (status.state, &status.target_app_name) {
        (StateName::Idle, _) => "Pin: idle".to_string(),
        (StateName::Error, _) => "Pin: error (unpin to reset)".to_string(),
        (StateName::Mirroring, Some(app)) => format!("Pinned: {app}"),
        (StateName::MirrorHidden, Some(app)) => format!("Pinned: {app} (see-through)"),
        (_, None) => "Pin: idle".to_string(),
    }
}

/// Procedural tray glyph: a filled circle with a pin-head dot, template
/// style so it adapts to the menu bar appearance.
fn tray_icon_image() -> Icon {
    let s = ICON_SIZE as i32;
    let mut rgba = Vec::with_capacity((s * s * 4) as usize);
    let center = (s - 1) as f64 / 2.0;
    let ring_outer = center - 1.0;
    let ring_inner = ring_outer - 2.5;
    let dot = 2.5;
    for y in 0..s {
        for x in 0..s {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let d = (dx * dx + dy * dy).sqrt();
            let on = (d <= ring_outer && d >= ring_inner) || d <= dot;
            let alpha = if on { 255 } else { 0 };
            rgba.extend_from_slice(&[0, 0, 0, alpha]);
        }
    }
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).expect("static icon dimensions")
}
