//! Agent lifecycle states.

use std::fmt;

/// `CREATED → CONFIGURED → RUNNING → STOPPING → STOPPED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Created,
    Configured,
    Running,
    Stopping,
    Stopped,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Created => "CREATED",
            AgentState::Configured => "CONFIGURED",
            AgentState::Running => "RUNNING",
            AgentState::Stopping => "STOPPING",
            AgentState::Stopped => "STOPPED",
        }
    }

    /// Whether handlers, strategies and callbacks may still be registered.
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, AgentState::Created | AgentState::Configured)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
