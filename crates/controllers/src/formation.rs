//! Formation keeping relative to a leader's pose.

use commander_domain::{ControllerKind, FormationType, PlatformStatus};
use commander_fleet::Kinematics;

use crate::motion::approach;
use crate::{Controller, StepContext, StepOutcome};

/// Drives one pod member toward its continuously recomputed slot.
///
/// The leader's own task uses `slot = None` and keeps station.
#[derive(Debug, Clone)]
pub struct FormationController {
    formation: FormationType,
    leader: String,
    slot: Option<usize>,
    spacing_m: f64,
}

impl FormationController {
    pub fn member(formation: FormationType, leader: impl Into<String>, slot: usize, spacing_m: f64) -> Self {
        Self {
            formation,
            leader: leader.into(),
            slot: Some(slot),
            spacing_m,
        }
    }

    pub fn leader_station(formation: FormationType, leader: impl Into<String>, spacing_m: f64) -> Self {
        Self {
            formation,
            leader: leader.into(),
            slot: None,
            spacing_m,
        }
    }
}

impl Controller for FormationController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Formation
    }

    fn leader(&self) -> Option<&str> {
        self.slot.map(|_| self.leader.as_str())
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let platform = ctx.platform;
        let Some(slot) = self.slot else {
            return StepOutcome::running(Kinematics::stopped(platform), 0.0, PlatformStatus::Holding);
        };

        let leader = match ctx.registry.get(&self.leader) {
            Some(leader) if leader.health_ok => leader,
            Some(_) => {
                return StepOutcome::failed(platform, format!("leader '{}' health fault", self.leader))
            }
            None => return StepOutcome::failed(platform, format!("leader '{}' not found", self.leader)),
        };

        let target = self
            .formation
            .slot_position(leader.position, leader.heading_rad, slot, self.spacing_m)
            .with_z(platform.position.z);

        let result = approach(ctx, target, ctx.max_speed);
        let status = if result.arrived(ctx) {
            PlatformStatus::Holding
        } else {
            PlatformStatus::Moving
        };
        StepOutcome::running(result.kinematics, 0.0, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fleet, run};
    use crate::Signal;
    use commander_domain::{PlatformKind, Vec3};

    #[test]
    fn test_member_settles_into_slot() {
        let (mut registry, pods) = fleet(&[
            ("ugv1", PlatformKind::Ground, Vec3::new(0.0, 0.0, 0.0)),
            ("ugv2", PlatformKind::Ground, Vec3::new(5.0, 0.0, 0.0)),
        ]);
        let mut controller = FormationController::member(FormationType::Column, "ugv1", 0, 3.0);
        let (outcome, _) = run(&mut controller, &mut registry, &pods, "ugv2", 5.0, 1_000);

        assert_eq!(outcome.signal, Signal::Continue);
        assert_eq!(outcome.status, PlatformStatus::Holding);
        let position = registry.get("ugv2").unwrap().position;
        assert!(position.distance_to(&Vec3::new(-3.0, 0.0, 0.0)) <= 0.5, "{position:?}");
    }

    #[test]
    fn test_aerial_member_keeps_altitude() {
        let (mut registry, pods) = fleet(&[
            ("uav1", PlatformKind::Aerial, Vec3::new(0.0, 0.0, 15.0)),
            ("uav2", PlatformKind::Aerial, Vec3::new(5.0, 0.0, 20.0)),
        ]);
        let mut controller = FormationController::member(FormationType::Line, "uav1", 1, 4.0);
        run(&mut controller, &mut registry, &pods, "uav2", 15.0, 1_000);

        let position = registry.get("uav2").unwrap().position;
        assert!(position.distance_to(&Vec3::new(-4.0, -4.0, 20.0)) <= 1.0, "{position:?}");
    }

    #[test]
    fn test_leader_station_holds() {
        let (mut registry, pods) = fleet(&[("ugv1", PlatformKind::Ground, Vec3::new(1.0, 2.0, 0.0))]);
        let mut controller = FormationController::leader_station(FormationType::Wedge, "ugv1", 3.0);
        let (outcome, _) = run(&mut controller, &mut registry, &pods, "ugv1", 5.0, 10);
        assert_eq!(outcome.status, PlatformStatus::Holding);
        assert_eq!(registry.get("ugv1").unwrap().position, Vec3::new(1.0, 2.0, 0.0));
        assert!(controller.leader().is_none());
    }

    #[test]
    fn test_missing_leader_fails() {
        let (mut registry, pods) = fleet(&[("ugv2", PlatformKind::Ground, Vec3::ZERO)]);
        let mut controller = FormationController::member(FormationType::Line, "ghost", 0, 3.0);
        let (outcome, ticks) = run(&mut controller, &mut registry, &pods, "ugv2", 5.0, 10);
        assert_eq!(ticks, 1);
        assert_eq!(outcome.signal, Signal::Failed("leader 'ghost' not found".into()));
    }
}
