//! Shared point-approach kinematics.

use commander_domain::Vec3;
use commander_fleet::Kinematics;

use crate::StepContext;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    pub kinematics: Kinematics,
    /// Distance left to the target after this step
    pub remaining_m: f64,
}

impl Approach {
    /// Within tolerance and moving slower than the idle threshold
    pub fn arrived(&self, ctx: &StepContext<'_>) -> bool {
        self.remaining_m <= ctx.arrival_tolerance()
            && self.kinematics.velocity.norm() < ctx.tuning.idle_speed_mps
    }
}

/// Move toward `target` at up to `cruise` m/s for one tick.
///
/// Speed ramps down proportionally to the distance left and never
/// overshoots the target.
pub fn approach(ctx: &StepContext<'_>, target: Vec3, cruise: f64) -> Approach {
    let platform = ctx.platform;
    let target = platform.constrain(target);
    let delta = target - platform.position;
    let distance = delta.norm();

    if distance < EPS || ctx.dt <= 0.0 {
        return Approach {
            kinematics: Kinematics {
                position: if distance < EPS { target } else { platform.position },
                velocity: Vec3::ZERO,
                heading_rad: platform.heading_rad,
            },
            remaining_m: if distance < EPS { 0.0 } else { distance },
        };
    }

    let cruise = cruise.max(0.0);
    let floor = ctx.tuning.min_approach_speed_mps.min(cruise);
    let speed = cruise.min(ctx.tuning.approach_gain * distance).max(floor);
    let step = (speed * ctx.dt).min(distance);
    let direction = delta * (1.0 / distance);

    let heading_rad = if delta.norm_2d() > EPS {
        delta.y.atan2(delta.x)
    } else {
        platform.heading_rad
    };

    Approach {
        kinematics: Kinematics {
            position: platform.position + direction * step,
            velocity: direction * (step / ctx.dt),
            heading_rad,
        },
        remaining_m: distance - step,
    }
}

/// Cruise speed for a requested speed, capped at the kind limit.
pub fn cruise_speed(requested: Option<f64>, max_speed: f64) -> f64 {
    requested.unwrap_or(max_speed).min(max_speed)
}
