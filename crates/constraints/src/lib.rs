//! Constraints Engine
//!
//! Deterministic safety gate for fleet commands. [`ConstraintsEngine::check`]
//! is a pure function of a command and a [`commander_domain::FleetSnapshot`];
//! it never consults the clock or mutates state, and every rejectable
//! condition comes back as data in a [`ConstraintVerdict`].
//!
//! Checks run in a fixed order: target admission, speed, world bounds,
//! no-go zones, minimum separation, comms timeout. Admission failures reject
//! immediately; the remaining checks aggregate the first violation of each
//! kind so the operator sees the complete picture.

pub mod config;
pub mod engine;
pub mod geometry;
mod plan;
mod rewrite;
pub mod verdict;

pub use config::{ConstraintsConfig, NoGoZone, SeparationPolicy, SpeedLimits, WorldBounds};
pub use engine::{resolve_formation_leader, ConstraintsEngine};
pub use verdict::{ConstraintVerdict, FieldChange, Rewrite, VerdictKind, Violation, ViolationKind};
