//! Waypoint patrol, optionally looping.

use commander_domain::{ControllerKind, PlatformStatus, Vec3};
use tracing::debug;

use crate::motion::{approach, cruise_speed};
use crate::{Controller, StepContext, StepOutcome};

#[derive(Debug, Clone)]
pub struct PatrolController {
    waypoints: Vec<Vec3>,
    looped: bool,
    speed: Option<f64>,
    index: usize,
    laps: u32,
}

impl PatrolController {
    pub fn new(waypoints: Vec<Vec3>, looped: bool, speed: Option<f64>) -> Self {
        Self {
            waypoints,
            looped,
            speed,
            index: 0,
            laps: 0,
        }
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }
}

impl Controller for PatrolController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Patrol
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let Some(&target) = self.waypoints.get(self.index) else {
            return StepOutcome::failed(ctx.platform, "patrol has no waypoints");
        };
        let count = self.waypoints.len();
        let last_leg = !self.looped && self.index + 1 == count;

        let result = approach(ctx, target, cruise_speed(self.speed, ctx.max_speed));
        let reached = if last_leg {
            result.arrived(ctx)
        } else {
            result.remaining_m <= ctx.arrival_tolerance()
        };

        if reached {
            debug!(platform_id = %ctx.platform.id, waypoint = self.index, "Patrol waypoint reached");
            if last_leg {
                let mut kinematics = result.kinematics;
                kinematics.velocity = Vec3::ZERO;
                return StepOutcome::completed(kinematics, PlatformStatus::Moving);
            }
            self.index += 1;
            if self.index == count {
                self.index = 0;
                self.laps += 1;
            }
        }

        let progress = if self.looped {
            0.0
        } else {
            self.index as f64 / count as f64
        };
        StepOutcome::running(result.kinematics, progress, PlatformStatus::Moving)
    }
}
