use thiserror::Error;

use crate::state::AgentState;

/// Errors surfaced by engine operations.
///
/// Every variant is recoverable: the machine never wedges, and unpin/panic
/// is always a legal way back to Idle.
#[derive(Error, Debug)]
pub enum PinError {
    /// The requested operation is not legal from the current state. No
    /// state change occurred.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// State the machine was in.
        from: AgentState,
        /// State the operation would have entered.
        to: AgentState,
    },

    /// No candidate window to pin, or an unknown window identifier.
    #[error("No target window found")]
    NoTargetWindow,

    /// The platform capture facility refused: target absent from shareable
    /// content, stream creation or start failed.
    #[error("capture failure: {0}")]
    CaptureFailure(String),

    /// A required permission is missing ("capture" or "accessibility").
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// The overlay windows could not be created.
    #[error("overlay failure: {0}")]
    OverlayFailure(String),
}

pub type Result<T> = std::result::Result<T, PinError>;
