use std::fmt;

use pin_protocol::StateName;

/// Lifecycle state of the agent. Exactly four values; transition logic
/// matches on all of them so a new state cannot be added without the
/// compiler pointing at every policy site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No target, no overlay, no capture.
    Idle,
    /// Target pinned; mirror visible and ordered above all windows.
    Mirroring,
    /// Target pinned; mirror transparent and click-through while the
    /// pointer interacts with the real window.
    MirrorHidden,
    /// The last pin attempt failed. Recoverable: unpin/panic returns to
    /// Idle.
    Error,
}

impl AgentState {
    /// True for the two states in which a target exists.
    pub fn pinned(self) -> bool {
        match self {
            Self::Mirroring | Self::MirrorHidden => true,
            Self::Idle | Self::Error => false,
        }
    }

    /// Wire name for the status projection.
    pub fn name(self) -> StateName {
        match self {
            Self::Idle => StateName::Idle,
            Self::Mirroring => StateName::Mirroring,
            Self::MirrorHidden => StateName::MirrorHidden,
            Self::Error => StateName::Error,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Mirroring => "mirroring",
            Self::MirrorHidden => "mirror_hidden",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_is_true_only_while_a_target_exists() {
        assert!(!AgentState::Idle.pinned());
        assert!(AgentState::Mirroring.pinned());
        assert!(AgentState::MirrorHidden.pinned());
        assert!(!AgentState::Error.pinned());
    }
}
