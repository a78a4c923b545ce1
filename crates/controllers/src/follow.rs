//! Leader following along the leader's breadcrumb trail.
//!
//! The follower targets a point `gap` metres behind the leader along the
//! path the leader actually drove, not its current position, so it does not
//! cut corners. A chain of followers resolves to its root leader with the
//! gaps summed.

use commander_domain::{ControllerKind, PlatformStatus};

use crate::motion::approach;
use crate::{Controller, StepContext, StepOutcome};

#[derive(Debug, Clone)]
pub struct FollowController {
    leader: String,
    gap_m: f64,
}

impl FollowController {
    pub fn new(leader: impl Into<String>, gap_m: f64) -> Self {
        Self {
            leader: leader.into(),
            gap_m,
        }
    }
}

impl Controller for FollowController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::FollowLeader
    }

    fn leader(&self) -> Option<&str> {
        Some(&self.leader)
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let platform = ctx.platform;

        let (root_id, gap) = match ctx.pods.follow_link(&platform.id) {
            Some(link) if link.leader == self.leader => match ctx.pods.resolve_chain(&platform.id) {
                Ok(chain) => chain,
                Err(e) => return StepOutcome::failed(platform, e.to_string()),
            },
            _ => (self.leader.clone(), self.gap_m),
        };

        for id in [self.leader.as_str(), root_id.as_str()] {
            match ctx.registry.get(id) {
                None => return StepOutcome::failed(platform, format!("leader '{id}' not found")),
                Some(leader) if !leader.health_ok => {
                    return StepOutcome::failed(platform, format!("leader '{id}' health fault"))
                }
                Some(_) => {}
            }
        }

        let Some(root) = ctx.registry.get(&root_id) else {
            return StepOutcome::failed(platform, format!("leader '{root_id}' not found"));
        };
        let behind = match ctx.registry.trail(&root_id) {
            Some(trail) => trail.point_behind(root.position, gap, root.heading_rad),
            None => root.position,
        };
        let target = behind.with_z(platform.position.z);

        let result = approach(ctx, target, ctx.max_speed);
        StepOutcome::running(result.kinematics, 0.0, PlatformStatus::Moving)
    }
}
