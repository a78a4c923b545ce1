//! Domain errors
//!
//! Pure domain errors with no infrastructure dependencies

use thiserror::Error;

use crate::task::TaskStatus;

/// A raw command could not be turned into a typed [`crate::Command`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Command target must not be empty")]
    EmptyTarget,

    #[error("Action '{action}' requires parameter '{param}'")]
    MissingParameter { action: String, param: String },

    #[error("Invalid parameter for '{action}': {reason}")]
    InvalidParameter { action: String, reason: String },
}

/// Illegal task lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    Invalid {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}
