//! Controller Set
//!
//! Per-task motion controllers. Each tick the orchestrator calls
//! [`Controller::step`] with the platform's current state and a fixed Δt and
//! writes the returned kinematic state back to the registry. Controllers are
//! plain, non-blocking computations; positions they produce are not
//! re-validated against constraints.

pub mod follow;
pub mod formation;
pub mod goto;
pub mod hold;
pub mod motion;
pub mod observe;
pub mod orbit;
pub mod patrol;
pub mod tuning;

use commander_domain::{ControllerKind, Platform, PlatformStatus, Vec3};
use commander_fleet::{Kinematics, PlatformRegistry, PodRegistry};
use std::fmt;

pub use follow::FollowController;
pub use formation::FormationController;
pub use goto::GoToController;
pub use hold::HoldController;
pub use observe::{ObserveController, ObserveMode};
pub use orbit::OrbitController;
pub use patrol::PatrolController;
pub use tuning::ControllerTuning;

/// Everything a controller may read during one step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub platform: &'a Platform,
    pub registry: &'a PlatformRegistry,
    pub pods: &'a PodRegistry,
    /// Fixed tick period in seconds
    pub dt: f64,
    pub tuning: &'a ControllerTuning,
    /// Speed limit for the platform's kind
    pub max_speed: f64,
}

impl StepContext<'_> {
    pub fn arrival_tolerance(&self) -> f64 {
        self.tuning.arrival_tolerance(self.platform.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Continue,
    Completed,
    Failed(String),
}

/// Result of one controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub kinematics: Kinematics,
    pub progress: f64,
    pub signal: Signal,
    /// Platform status while this controller is in charge
    pub status: PlatformStatus,
}

impl StepOutcome {
    pub fn running(kinematics: Kinematics, progress: f64, status: PlatformStatus) -> Self {
        Self {
            kinematics,
            progress,
            signal: Signal::Continue,
            status,
        }
    }

    pub fn completed(kinematics: Kinematics, status: PlatformStatus) -> Self {
        Self {
            kinematics,
            progress: 1.0,
            signal: Signal::Completed,
            status,
        }
    }

    /// Stop in place and report an unrecoverable condition.
    pub fn failed(platform: &Platform, reason: impl Into<String>) -> Self {
        Self {
            kinematics: Kinematics::stopped(platform),
            progress: 0.0,
            signal: Signal::Failed(reason.into()),
            status: PlatformStatus::Error,
        }
    }
}

/// A motion controller driving one platform for one task.
pub trait Controller: Send + fmt::Debug {
    fn kind(&self) -> ControllerKind;

    /// Advance by `ctx.dt`.
    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome;

    /// Platform the controller tracks, if any; a fault there fails the task.
    fn leader(&self) -> Option<&str> {
        None
    }

    /// Fixed final destination, for controllers that have one.
    fn destination(&self) -> Option<Vec3> {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use commander_domain::{PlatformKind, PlatformSpec, Vec3};

    pub fn fleet(specs: &[(&str, PlatformKind, Vec3)]) -> (PlatformRegistry, PodRegistry) {
        let roster: Vec<PlatformSpec> = specs
            .iter()
            .map(|(id, kind, pos)| PlatformSpec::new(*id, *kind, *pos))
            .collect();
        let registry = PlatformRegistry::from_roster(&roster, 0, 0.5, 400).unwrap();
        (registry, PodRegistry::new())
    }

    /// Step `controller` for platform `id` until it stops continuing or
    /// `max_ticks` pass; returns the last outcome and ticks taken.
    pub fn run(
        controller: &mut dyn Controller,
        registry: &mut PlatformRegistry,
        pods: &PodRegistry,
        id: &str,
        max_speed: f64,
        max_ticks: usize,
    ) -> (StepOutcome, usize) {
        let tuning = ControllerTuning::default();
        let mut last = None;
        for tick in 1..=max_ticks {
            let outcome = {
                let platform = registry.get(id).unwrap();
                let ctx = StepContext {
                    platform,
                    registry,
                    pods,
                    dt: 0.02,
                    tuning: &tuning,
                    max_speed,
                };
                controller.step(&ctx)
            };
            registry.apply_kinematics(id, outcome.kinematics).unwrap();
            if outcome.signal != Signal::Continue {
                return (outcome, tick);
            }
            last = Some(outcome);
        }
        (last.unwrap(), max_ticks)
    }
}
