//! Core functionality for the Commander fleet execution engine.
//!
//! This crate provides the ambient pieces shared by every other crate in the
//! workspace: error types, logging initialization, TOML loading helpers and the
//! hash-chained timeline event schema.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod timeline;

pub use config::{load_toml, parse_toml, LoggingConfig};
pub use error::{CoreError, Result};
pub use event::{EventBuilder, EventKind, EventPayload, TimelineEvent, GENESIS_HASH};
pub use timeline::{verify_chain, ChainError, Timeline};
