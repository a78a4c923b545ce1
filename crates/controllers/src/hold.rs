//! Station keeping, optionally for a fixed duration.

use commander_domain::{ControllerKind, PlatformStatus};
use commander_fleet::Kinematics;

use crate::{Controller, StepContext, StepOutcome};

const TIME_EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct HoldController {
    duration_s: Option<f64>,
    elapsed_s: f64,
}

impl HoldController {
    /// Hold for `duration_s`, or until cancelled when `None`.
    pub fn new(duration_s: Option<f64>) -> Self {
        Self {
            duration_s,
            elapsed_s: 0.0,
        }
    }

    pub fn elapsed_s(&self) -> f64 {
        self.elapsed_s
    }
}

impl Controller for HoldController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Hold
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        self.elapsed_s += ctx.dt;
        let kinematics = Kinematics::stopped(ctx.platform);

        match self.duration_s {
            Some(duration) if self.elapsed_s + TIME_EPS >= duration => {
                StepOutcome::completed(kinematics, PlatformStatus::Holding)
            }
            Some(duration) => {
                StepOutcome::running(kinematics, self.elapsed_s / duration, PlatformStatus::Holding)
            }
            None => StepOutcome::running(kinematics, 0.0, PlatformStatus::Holding),
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
    fn test_hold_completes_after_duration() {
        let (mut registry, pods) = fleet(&[("ugv1", PlatformKind::Ground, Vec3::ZERO)]);
        let mut controller = HoldController::new(Some(1.0));
        let (outcome, ticks) = run(&mut controller, &mut registry, &pods, "ugv1", 5.0, 1_000);
        assert_eq!(outcome.signal, Signal::Completed);
        // 1.0 s at 50 Hz
        assert_eq!(ticks, 50);
        assert_eq!(outcome.kinematics.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_indefinite_hold_never_completes() {
        let (mut registry, pods) = fleet(&[("ugv1", PlatformKind::Ground, Vec3::ZERO)]);
        let mut controller = HoldController::new(None);
        let (outcome, _) = run(&mut controller, &mut registry, &pods, "ugv1", 5.0, 500);
        assert_eq!(outcome.signal, Signal::Continue);
        assert_eq!(outcome.status, PlatformStatus::Holding);
        assert!((controller.elapsed_s() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let (mut registry, pods) = fleet(&[("ugv1", PlatformKind::Ground, Vec3::ZERO)]);
        let mut controller = HoldController::new(Some(0.0));
        let (_, ticks) = run(&mut controller, &mut registry, &pods, "ugv1", 5.0, 10);
        assert_eq!(ticks, 1);
    }
}
