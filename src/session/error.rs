use thiserror::Error;

use super::state::{Command, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The command is not accepted in the current state. Nothing changed.
    #[error("{command} is not allowed while {state}")]
    InvalidTransition {
        command: Command,
        state: SessionState,
    },

    #[error("session controller is no longer running")]
    Closed,
}
