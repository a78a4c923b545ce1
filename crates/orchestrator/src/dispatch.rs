//! Controller construction for approved commands.

use commander_constraints::ConstraintsEngine;
use commander_controllers::{
    Controller, FollowController, FormationController, GoToController, HoldController, ObserveController,
    ObserveMode, OrbitController, PatrolController,
};
use commander_domain::{Action, ControllerKind, Platform};

/// Controller kind driving `action`, or `None` for actions handled at
/// submission.
pub fn controller_kind(action: &Action) -> Option<ControllerKind> {
    let kind = match action {
        Action::GoTo { .. } | Action::ReturnHome => ControllerKind::GoTo,
        Action::HoldPosition { .. } => ControllerKind::Hold,
        Action::Patrol { .. } => ControllerKind::Patrol,
        Action::Orbit { .. } => ControllerKind::Orbit,
        Action::Spotlight { .. } | Action::PointLaser { .. } => ControllerKind::Observe,
        Action::FollowLeader { .. } => ControllerKind::FollowLeader,
        Action::FormFormation { .. } => ControllerKind::Formation,
        Action::AssignRoles { .. } | Action::ReportStatus | Action::Stop => return None,
    };
    Some(kind)
}

/// Group context captured when the task was created.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    /// Every platform the command addressed, sorted
    pub members: Vec<String>,
    pub formation_leader: Option<String>,
}

/// Build the controller for `platform`'s share of `action`.
pub fn build_controller(
    engine: &ConstraintsEngine,
    action: &Action,
    platform: &Platform,
    assignment: &Assignment,
) -> Result<Box<dyn Controller>, String> {
    let controller: Box<dyn Controller> = match action {
        Action::GoTo { destination, speed } => {
            let target = engine
                .resolve_destination(destination, platform)
                .map_err(|v| v.message)?;
            Box::new(GoToController::new(target, *speed))
        }
        Action::ReturnHome => Box::new(GoToController::new(platform.home, None)),
        Action::HoldPosition { duration_s } => Box::new(HoldController::new(*duration_s)),
        Action::Patrol {
            waypoints,
            looped,
            speed,
        } => {
            let points = waypoints
                .iter()
                .map(|w| platform.constrain(w.resolve(platform.position.z)))
                .collect();
            Box::new(PatrolController::new(points, *looped, *speed))
        }
        Action::Orbit {
            center,
            radius_m,
            altitude_m,
            speed,
        } => Box::new(OrbitController::new(*center, *radius_m, *altitude_m, *speed)),
        Action::Spotlight { target, duration_s } => {
            Box::new(ObserveController::new(ObserveMode::Spotlight, *target, *duration_s))
        }
        Action::PointLaser { target, duration_s } => {
            Box::new(ObserveController::new(ObserveMode::Laser, *target, *duration_s))
        }
        Action::FollowLeader { leader, gap_m } => Box::new(FollowController::new(leader.clone(), *gap_m)),
        Action::FormFormation {
            formation,
            spacing_m,
            ..
        } => {
            let Some(leader) = assignment.formation_leader.as_deref() else {
                return Err(format!("formation for '{}' has no leader", platform.id));
            };
            if platform.id == leader {
                Box::new(FormationController::leader_station(*formation, leader, *spacing_m))
            } else {
                let slot = assignment
                    .members
                    .iter()
                    .filter(|m| m.as_str() != leader)
                    .position(|m| *m == platform.id)
                    .ok_or_else(|| format!("platform '{}' is not part of the formation", platform.id))?;
                Box::new(FormationController::member(*formation, leader, slot, *spacing_m))
            }
        }
        Action::AssignRoles { .. } | Action::ReportStatus | Action::Stop => {
            return Err(format!("'{}' does not run on a controller", action.name()))
        }
    };
    Ok(controller)
}
