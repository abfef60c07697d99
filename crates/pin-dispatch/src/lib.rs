//! Command dispatcher: the thin layer between the external command channel
//! and the engine.
//!
//! URL activations (`pin://…`) arrive as strings, get parsed into
//! [`Command`]s, run against the engine strictly in arrival order, and every
//! command's [`Reply`] is written atomically to the well-known response file
//! for the caller to poll.

use std::{path::PathBuf, sync::Arc};

use mac_winlist::TargetDescriptor;
use pin_engine::Engine;
use pin_protocol::{Bounds, Command, DEFAULT_RESPONSE_PATH, ParseError, Reply, WindowEntry};
use tracing::{info, warn};

mod respond;

/// Dispatches parsed commands into the engine and records replies.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Engine,
    response_path: Arc<PathBuf>,
}

impl Dispatcher {
    /// Dispatcher writing replies to the default response path.
    pub fn new(engine: Engine) -> Self {
        Self::with_response_path(engine, PathBuf::from(DEFAULT_RESPONSE_PATH))
    }

    /// Dispatcher writing replies to `path` (tests, scripting).
    pub fn with_response_path(engine: Engine, path: PathBuf) -> Self {
        Self {
            engine,
            response_path: Arc::new(path),
        }
    }

    /// Parse and execute one activation URL, writing the reply.
    ///
    /// Callers must serialize invocations (the application runs a single
    /// consumer task): a command's full await chain completes before the
    /// next is parsed, which is the arrival-order guarantee.
    pub async fn handle_url(&self, url: &str) -> Reply {
        info!(url, "command_received");
        let reply = match Command::parse_url(url) {
            Ok(cmd) => self.dispatch(cmd).await,
            Err(ParseError::UnknownCommand(cmd)) => Reply::Unknown {
                error: format!("unknown_command: {cmd}"),
            },
            Err(e) => Reply::failed(e.to_string()),
        };
        self.record(&reply);
        reply
    }

    /// Execute one parsed command against the engine.
    pub async fn dispatch(&self, cmd: Command) -> Reply {
        match cmd {
            Command::Pin => match self.engine.pin_active().await {
                Ok(()) => Reply::ok("pinned"),
                Err(e) => Reply::failed(e.to_string()),
            },
            Command::PinWindow { id } => match self.engine.pin_window(id).await {
                Ok(()) => Reply::ok("pinned"),
                Err(e) => Reply::failed(e.to_string()),
            },
            Command::ListWindows => {
                let windows = self
                    .engine
                    .winlist()
                    .list_candidates()
                    .iter()
                    .map(entry_for)
                    .collect();
                Reply::windows(windows)
            }
            Command::Unpin => {
                self.engine.unpin();
                Reply::ok("unpinned")
            }
            Command::Panic => {
                self.engine.panic();
                Reply::ok("panic_complete")
            }
            Command::Status => Reply::Status(self.engine.status()),
            Command::SetOpacity { value } => {
                let applied = self.engine.set_opacity(value);
                Reply::ok(format!("opacity set to {applied:.2}"))
            }
        }
    }

    fn record(&self, reply: &Reply) {
        let json = reply.to_json_pretty();
        if let Err(e) = respond::write_atomic(&self.response_path, &json) {
            warn!(path = %self.response_path.display(), error = %e, "response write failed");
        }
    }
}

fn entry_for(t: &TargetDescriptor) -> WindowEntry {
    WindowEntry {
        window_id: t.window_id,
        pid: t.pid,
        app_name: t.app_name.clone(),
        window_title: t.window_title.clone(),
        bounds: Bounds {
            x: t.bounds.x,
            y: t.bounds.y,
            width: t.bounds.w,
            height: t.bounds.h,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mac_winlist::{Rect, WindowInfo, ops::MockWinList};
    use pin_engine::{MemoryPrefs, MockCapture, MockOverlayFactory};
    use pin_protocol::StateName;

    use super::*;

    fn win(pid: i32, id: u32, app: &str, bundle: &str) -> WindowInfo {
        WindowInfo {
            pid,
            id,
            app: app.into(),
            title: Some(format!("{app} window")),
            bundle_id: bundle.into(),
            bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
            layer: 0,
            is_on_screen: true,
        }
    }

    fn dispatcher_with(windows: Vec<WindowInfo>) -> (Dispatcher, tempfile::TempDir) {
        let winlist = MockWinList::new();
        winlist.set_windows(windows);
        let engine = Engine::new(
            Arc::new(winlist),
            Arc::new(MockCapture::new()),
            Arc::new(MockOverlayFactory::new()),
            Arc::new(MemoryPrefs::new()),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin-response.json");
        (Dispatcher::with_response_path(engine, path.clone()), dir)
    }

    fn read_response(dir: &tempfile::TempDir) -> serde_json::Value {
        let raw = std::fs::read_to_string(dir.path().join("pin-response.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn pin_writes_success_reply() {
        let (d, dir) = dispatcher_with(vec![
            win(1, 10, "Launcher", "com.raycast.macos"),
            win(2, 20, "Editor", "com.example.editor"),
        ]);
        d.handle_url("pin://pin").await;
        let v = read_response(&dir);
        assert_eq!(v["success"], true);
        assert_eq!(v["message"], "pinned");

        d.handle_url("pin://status").await;
        let v = read_response(&dir);
        assert_eq!(v["state"], "mirroring");
        assert_eq!(v["targetAppName"], "Editor");
    }

    #[tokio::test]
    async fn pin_unknown_window_reports_no_target() {
        let (d, dir) = dispatcher_with(vec![win(2, 20, "Editor", "com.example.editor")]);
        d.handle_url("pin://pin-window?id=4294967295").await;
        let v = read_response(&dir);
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "No target window found");

        d.handle_url("pin://status").await;
        assert_eq!(read_response(&dir)["state"], "idle");
    }

    #[tokio::test]
    async fn list_windows_serializes_entries() {
        let (d, dir) = dispatcher_with(vec![
            win(2, 20, "Editor", "com.example.editor"),
            win(3, 30, "Terminal", "com.example.term"),
        ]);
        d.handle_url("pin://list-windows").await;
        let v = read_response(&dir);
        assert_eq!(v["success"], true);
        assert_eq!(v["windows"].as_array().unwrap().len(), 2);
        assert_eq!(v["windows"][0]["windowID"], 20);
        assert_eq!(v["windows"][1]["appName"], "Terminal");
        assert_eq!(v["windows"][0]["bounds"]["height"], 600.0);
    }

    #[tokio::test]
    async fn unknown_command_is_echoed() {
        let (d, dir) = dispatcher_with(vec![]);
        d.handle_url("pin://warp").await;
        let v = read_response(&dir);
        assert_eq!(v["error"], "unknown_command: warp");
    }

    #[tokio::test]
    async fn unpin_and_panic_reply_messages() {
        let (d, dir) = dispatcher_with(vec![win(2, 20, "Editor", "com.example.editor")]);
        d.handle_url("pin://pin").await;
        d.handle_url("pin://unpin").await;
        assert_eq!(read_response(&dir)["message"], "unpinned");
        d.handle_url("pin://panic").await;
        assert_eq!(read_response(&dir)["message"], "panic_complete");
    }

    #[tokio::test]
    async fn set_opacity_round_trips_through_the_engine() {
        let (d, dir) = dispatcher_with(vec![]);
        let reply = d.handle_url("pin://set-opacity?value=2.5").await;
        assert_eq!(reply, Reply::ok("opacity set to 1.00"));
        assert_eq!(read_response(&dir)["success"], true);
    }

    #[tokio::test]
    async fn status_reply_uses_protocol_projection() {
        let (d, _dir) = dispatcher_with(vec![]);
        match d.dispatch(Command::Status).await {
            Reply::Status(s) => {
                assert_eq!(s.state, StateName::Idle);
                assert!(!s.pinned);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
