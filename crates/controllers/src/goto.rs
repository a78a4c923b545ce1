//! Point-to-point navigation; also drives `return_home`.

use commander_domain::{ControllerKind, PlatformStatus, Vec3};
use tracing::debug;

use crate::motion::{approach, cruise_speed};
use crate::{Controller, StepContext, StepOutcome};

#[derive(Debug, Clone)]
pub struct GoToController {
    target: Vec3,
    speed: Option<f64>,
    initial_distance: Option<f64>,
}

impl GoToController {
    pub fn new(target: Vec3, speed: Option<f64>) -> Self {
        Self {
            target,
            speed,
            initial_distance: None,
        }
    }
}

impl Controller for GoToController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::GoTo
    }

    fn destination(&self) -> Option<Vec3> {
        Some(self.target)
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let target = ctx.platform.constrain(self.target);
        let initial = *self
            .initial_distance
            .get_or_insert_with(|| ctx.platform.position.distance_to(&target));

        let result = approach(ctx, target, cruise_speed(self.speed, ctx.max_speed));
        if result.arrived(ctx) {
            debug!(platform_id = %ctx.platform.id, "Arrived at destination");
            let mut kinematics = result.kinematics;
            kinematics.velocity = Vec3::ZERO;
            return StepOutcome::completed(kinematics, PlatformStatus::Moving);
        }

        let progress = if initial > 0.0 {
            1.0 - result.remaining_m / initial
        } else {
            1.0
        };
        StepOutcome::running(result.kinematics, progress, PlatformStatus::Moving)
    }
}
