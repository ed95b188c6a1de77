//! State enumerations for sessions.

/// Connection state of a client session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClientState {
    /// No reply from the server yet; the probe is sent every tick.
    #[default]
    Probing,
    /// At least one datagram has been received from the server.
    Established,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientState::Probing => write!(f, "Probing"),
            ClientState::Established => write!(f, "Established"),
        }
    }
}

/// Lifecycle state of a session's background loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Both loops are running.
    Running,
    /// Stop was requested; loops exit at their next check.
    Stopping,
    /// Both loops have exited.
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => write!(f, "Running"),
            SessionState::Stopping => write!(f, "Stopping"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}
