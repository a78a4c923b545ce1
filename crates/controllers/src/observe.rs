//! Spotlight and laser pointing: hover in place facing a ground target.

use commander_domain::{ControllerKind, PlatformStatus, Point2};
use commander_fleet::Kinematics;
use serde::{Deserialize, Serialize};

use crate::{Controller, StepContext, StepOutcome};

const TIME_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserveMode {
    Spotlight,
    Laser,
}

#[derive(Debug, Clone)]
pub struct ObserveController {
    mode: ObserveMode,
    target: Point2,
    duration_s: Option<f64>,
    elapsed_s: f64,
}

impl ObserveController {
    pub fn new(mode: ObserveMode, target: Point2, duration_s: Option<f64>) -> Self {
        Self {
            mode,
            target,
            duration_s,
            elapsed_s: 0.0,
        }
    }

    pub fn mode(&self) -> ObserveMode {
        self.mode
    }
}

impl Controller for ObserveController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Observe
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        self.elapsed_s += ctx.dt;
        let position = ctx.platform.position;
        let dx = self.target.x - position.x;
        let dy = self.target.y - position.y;
        let mut kinematics = Kinematics::stopped(ctx.platform);
        if dx.hypot(dy) > TIME_EPS {
            kinematics.heading_rad = dy.atan2(dx);
        }

        match self.duration_s {
            Some(duration) if self.elapsed_s + TIME_EPS >= duration => {
                StepOutcome::completed(kinematics, PlatformStatus::Executing)
            }
            Some(duration) => {
                StepOutcome::running(kinematics, self.elapsed_s / duration, PlatformStatus::Executing)
            }
            None => StepOutcome::running(kinematics, 0.0, PlatformStatus::Executing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fleet, run};
    use crate::Signal;
    use commander_domain::{PlatformKind, Vec3};

    #[test]
    fn test_spotlight_faces_target_and_times_out() {
        let (mut registry, pods) = fleet(&[("uav1", PlatformKind::Aerial, Vec3::new(0.0, 0.0, 15.0))]);
        let mut controller = ObserveController::new(ObserveMode::Spotlight, Point2::new(0.0, 10.0), Some(2.0));
        let (outcome, ticks) = run(&mut controller, &mut registry, &pods, "uav1", 15.0, 1_000);

        assert_eq!(outcome.signal, Signal::Completed);
        assert_eq!(ticks, 100);
        assert_eq!(outcome.status, PlatformStatus::Executing);
        let uav = registry.get("uav1").unwrap();
        assert!((uav.heading_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(uav.position, Vec3::new(0.0, 0.0, 15.0));
    }

    #[test]
    fn test_laser_without_duration_runs_until_stopped() {
        let (mut registry, pods) = fleet(&[("uav1", PlatformKind::Aerial, Vec3::new(0.0, 0.0, 15.0))]);
        let mut controller = ObserveController::new(ObserveMode::Laser, Point2::new(3.0, 0.0), None);
        let (outcome, _) = run(&mut controller, &mut registry, &pods, "uav1", 15.0, 200);
        assert_eq!(outcome.signal, Signal::Continue);
        assert_eq!(controller.mode(), ObserveMode::Laser);
    }
}
