//! Orchestrator errors
//!
//! Expected outcomes (rejections, runtime failures, supersession) are data;
//! these cover configuration problems and invariant breaches.

use commander_core::CoreError;
use commander_domain::TransitionError;
use commander_fleet::FleetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("Task transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Unknown task group '{0}'")]
    UnknownGroup(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
