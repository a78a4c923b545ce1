//! End-to-end tests for the Commander engine
//!
//! This suite drives a demo fleet through the public orchestrator API:
//! - Constraint verdicts for speed, zones, path crossing and separation
//! - Task lifecycle, supersession and idempotent holds
//! - World-box containment under motion controllers
//! - The broadcast feed and deterministic replay

pub mod test_utils;

#[cfg(test)]
mod acceptance_scenarios;

#[cfg(test)]
mod feed_and_replay_tests;
