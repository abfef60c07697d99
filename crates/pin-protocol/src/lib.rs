//! Pin protocol types for the external command surface.
//!
//! This crate defines the commands the agent accepts (delivered as
//! `pin://<command>?<k=v>` URL activations), the JSON replies written to the
//! response file, and the serializable status projection. It is pure data:
//! no platform calls, no I/O.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// URL scheme the agent registers for command delivery.
pub const URL_SCHEME: &str = "pin";

/// Default path of the JSON response file callers poll.
pub const DEFAULT_RESPONSE_PATH: &str = "/tmp/pin-response.json";

/// Errors produced while interpreting an incoming command URL.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// The activation did not carry the `pin://` scheme.
    #[error("not a pin:// url: {0}")]
    BadScheme(String),
    /// The command name is not one the dispatcher knows.
    #[error("unknown_command: {0}")]
    UnknownCommand(String),
    /// A required argument is missing or malformed.
    #[error("bad argument for {command}: {detail}")]
    BadArgument {
        /// Command the argument belongs to.
        command: &'static str,
        /// What was wrong with it.
        detail: String,
    },
}

/// A parsed agent command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Pin the frontmost non-excluded window.
    Pin,
    /// Pin the window with the given CoreGraphics window id.
    PinWindow {
        /// CGWindowID of the requested target.
        id: u32,
    },
    /// List pinnable windows.
    ListWindows,
    /// Unpin the current target, if any.
    Unpin,
    /// Force-restore the agent to Idle from any state.
    Panic,
    /// Report agent status.
    Status,
    /// Set and persist the overlay opacity.
    SetOpacity {
        /// Requested opacity; clamped to [0.1, 1.0] by the engine.
        value: f64,
    },
}

impl Command {
    /// Parse a `pin://<command>?<k=v>&…` activation URL.
    ///
    /// Query keys the command does not use are ignored, matching how
    /// launcher front-ends append tracking parameters.
    pub fn parse_url(url: &str) -> Result<Self, ParseError> {
        let rest = url
            .strip_prefix("pin://")
            .ok_or_else(|| ParseError::BadScheme(url.to_string()))?;
        let (name, query) = match rest.split_once('?') {
            Some((n, q)) => (n, q),
            None => (rest, ""),
        };
        let name = name.trim_end_matches('/');
        let arg = |key: &str| -> Option<&str> {
            query
                .split('&')
                .filter_map(|kv| kv.split_once('='))
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v)
        };
        match name {
            "pin" => Ok(Self::Pin),
            "pin-window" => {
                let raw = arg("id").ok_or(ParseError::BadArgument {
                    command: "pin-window",
                    detail: "missing id".into(),
                })?;
                let id = raw.parse::<u32>().map_err(|_| ParseError::BadArgument {
                    command: "pin-window",
                    detail: format!("id is not a u32: {raw}"),
                })?;
                Ok(Self::PinWindow { id })
            }
            "list-windows" => Ok(Self::ListWindows),
            "unpin" => Ok(Self::Unpin),
            "panic" => Ok(Self::Panic),
            "status" => Ok(Self::Status),
            "set-opacity" => {
                let raw = arg("value").ok_or(ParseError::BadArgument {
                    command: "set-opacity",
                    detail: "missing value".into(),
                })?;
                let value = raw.parse::<f64>().map_err(|_| ParseError::BadArgument {
                    command: "set-opacity",
                    detail: format!("value is not a float: {raw}"),
                })?;
                Ok(Self::SetOpacity { value })
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

/// Window bounds on the wire, top-left-origin screen points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

/// One pinnable window as reported by `list-windows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    /// CoreGraphics window id.
    #[serde(rename = "windowID")]
    pub window_id: u32,
    /// Owning process id.
    pub pid: i32,
    /// Owning application name.
    #[serde(rename = "appName")]
    pub app_name: String,
    /// Window title, when the window has one.
    #[serde(rename = "windowTitle")]
    pub window_title: Option<String>,
    /// Window bounds.
    pub bounds: Bounds,
}

/// The four lifecycle states of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateName {
    /// No target; nothing mirrored.
    Idle,
    /// Target pinned, mirror visible above all windows.
    Mirroring,
    /// Target pinned, mirror transparent and click-through (hover
    /// see-through engaged).
    MirrorHidden,
    /// The last pin attempt failed; recover with unpin/panic.
    Error,
}

fn iso8601<S: Serializer>(t: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => s.serialize_none(),
    }
}

/// Read-only status projection of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Current state.
    pub state: StateName,
    /// True iff state is Mirroring or MirrorHidden.
    pub pinned: bool,
    /// Application name of the pinned target, when pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_app_name: Option<String>,
    /// Window title of the pinned target, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_window_title: Option<String>,
    /// True iff the mirror is currently visible (state is Mirroring).
    pub mirror_visible: bool,
    /// Instant the latest successful pin completed; cleared on unpin.
    #[serde(serialize_with = "iso8601", skip_serializing_if = "Option::is_none")]
    pub pinned_since: Option<DateTime<Utc>>,
}

/// A reply written to the response file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Successful command with a short confirmation message.
    Ok {
        /// Always `true`.
        success: bool,
        /// Human-readable confirmation, e.g. `"pinned"`.
        message: String,
    },
    /// Failed command.
    Failed {
        /// Always `false`.
        success: bool,
        /// Stable error description.
        error: String,
    },
    /// `list-windows` payload.
    Windows {
        /// Always `true`.
        success: bool,
        /// Candidates front-to-back.
        windows: Vec<WindowEntry>,
    },
    /// `status` payload.
    Status(AgentStatus),
    /// Unrecognized command echo.
    Unknown {
        /// `unknown_command: <cmd>` text.
        error: String,
    },
}

impl Reply {
    /// Successful reply with the given confirmation message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::Ok {
            success: true,
            message: message.into(),
        }
    }

    /// Failed reply with the given error text.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            success: false,
            error: error.into(),
        }
    }

    /// Window-listing reply.
    pub fn windows(windows: Vec<WindowEntry>) -> Self {
        Self::Windows {
            success: true,
            windows,
        }
    }

    /// Render the reply as pretty-printed JSON for the response file.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            // Serialization of these shapes cannot fail; keep a readable
            // fallback for the caller anyway.
            "{\n  \"success\": false,\n  \"error\": \"serialization failure\"\n}".to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_bare_commands() {
        assert_eq!(Command::parse_url("pin://pin"), Ok(Command::Pin));
        assert_eq!(Command::parse_url("pin://unpin"), Ok(Command::Unpin));
        assert_eq!(Command::parse_url("pin://panic"), Ok(Command::Panic));
        assert_eq!(Command::parse_url("pin://status"), Ok(Command::Status));
        assert_eq!(
            Command::parse_url("pin://list-windows"),
            Ok(Command::ListWindows)
        );
    }

    #[test]
    fn parses_pin_window_id() {
        assert_eq!(
            Command::parse_url("pin://pin-window?id=4242"),
            Ok(Command::PinWindow { id: 4242 })
        );
        // Extra query keys are ignored.
        assert_eq!(
            Command::parse_url("pin://pin-window?source=menu&id=7"),
            Ok(Command::PinWindow { id: 7 })
        );
    }

    #[test]
    fn parses_set_opacity() {
        assert_eq!(
            Command::parse_url("pin://set-opacity?value=0.3"),
            Ok(Command::SetOpacity { value: 0.3 })
        );
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert_eq!(Command::parse_url("pin://pin/"), Ok(Command::Pin));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Command::parse_url("http://pin"),
            Err(ParseError::BadScheme(_))
        ));
        assert_eq!(
            Command::parse_url("pin://warp"),
            Err(ParseError::UnknownCommand("warp".into()))
        );
        assert!(matches!(
            Command::parse_url("pin://pin-window?id=banana"),
            Err(ParseError::BadArgument { .. })
        ));
        assert!(matches!(
            Command::parse_url("pin://pin-window"),
            Err(ParseError::BadArgument { .. })
        ));
    }

    #[test]
    fn reply_shapes_match_the_wire_contract() {
        let ok = serde_json::to_value(Reply::ok("pinned")).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["message"], "pinned");

        let failed = serde_json::to_value(Reply::failed("No target window found")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "No target window found");

        let windows = serde_json::to_value(Reply::windows(vec![WindowEntry {
            window_id: 9,
            pid: 321,
            app_name: "Editor".into(),
            window_title: Some("notes.txt".into()),
            bounds: Bounds {
                x: 10.0,
                y: 20.0,
                width: 640.0,
                height: 480.0,
            },
        }]))
        .unwrap();
        assert_eq!(windows["windows"][0]["windowID"], 9);
        assert_eq!(windows["windows"][0]["appName"], "Editor");
        assert_eq!(windows["windows"][0]["bounds"]["width"], 640.0);
    }

    #[test]
    fn status_serializes_camel_case_and_iso8601() {
        let status = AgentStatus {
            state: StateName::MirrorHidden,
            pinned: true,
            target_app_name: Some("Editor".into()),
            target_window_title: None,
            mirror_visible: false,
            pinned_since: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
        };
        let v = serde_json::to_value(Reply::Status(status)).unwrap();
        assert_eq!(v["state"], "mirrorHidden");
        assert_eq!(v["pinned"], true);
        assert_eq!(v["mirrorVisible"], false);
        assert_eq!(v["pinnedSince"], "2025-06-01T12:00:00Z");
        assert!(v.get("targetWindowTitle").is_none());
    }

    #[test]
    fn idle_status_has_no_target_fields() {
        let status = AgentStatus {
            state: StateName::Idle,
            pinned: false,
            target_app_name: None,
            target_window_title: None,
            mirror_visible: false,
            pinned_since: None,
        };
        let v = serde_json::to_value(Reply::Status(status)).unwrap();
        assert_eq!(v["state"], "idle");
        assert!(v.get("pinnedSince").is_none());
        assert!(v.get("targetAppName").is_none());
    }
}
