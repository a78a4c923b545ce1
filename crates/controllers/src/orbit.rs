//! Constant-radius orbit at a fixed altitude.
//!
//! The platform first flies to the entry point (on the circle, at its
//! bearing from the center), then advances its angular position by
//! `speed / radius` rad/s. Orbits never complete on their own.

use commander_domain::{ControllerKind, PlatformStatus, Point2, Vec3};
use commander_fleet::Kinematics;
use std::f64::consts::FRAC_PI_2;

use crate::motion::{approach, cruise_speed};
use crate::{Controller, StepContext, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Approaching { entry: Vec3, angle: f64 },
    Circling { angle: f64 },
}

#[derive(Debug, Clone)]
pub struct OrbitController {
    center: Point2,
    radius_m: f64,
    altitude_m: f64,
    speed: Option<f64>,
    phase: Option<Phase>,
}

impl OrbitController {
    pub fn new(center: Point2, radius_m: f64, altitude_m: f64, speed: Option<f64>) -> Self {
        Self {
            center,
            radius_m,
            altitude_m,
            speed,
            phase: None,
        }
    }

    fn point_at(&self, angle: f64) -> Vec3 {
        Vec3::new(
            self.center.x + self.radius_m * angle.cos(),
            self.center.y + self.radius_m * angle.sin(),
            self.altitude_m,
        )
    }

    pub fn is_circling(&self) -> bool {
        matches!(self.phase, Some(Phase::Circling { .. }))
    }
}

impl Controller for OrbitController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Orbit
    }

    fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let speed = cruise_speed(
            self.speed
                .or(Some(ctx.max_speed * ctx.tuning.orbit_speed_factor)),
            ctx.max_speed,
        );

        let phase = *self.phase.get_or_insert_with(|| {
            let from = ctx.platform.position;
            let angle = (from.y - self.center.y).atan2(from.x - self.center.x);
            Phase::Approaching {
                entry: Vec3::new(
                    self.center.x + self.radius_m * angle.cos(),
                    self.center.y + self.radius_m * angle.sin(),
                    self.altitude_m,
                ),
                angle,
            }
        });

        match phase {
            Phase::Approaching { entry, angle } => {
                let result = approach(ctx, entry, speed);
                if result.remaining_m <= ctx.arrival_tolerance() {
                    self.phase = Some(Phase::Circling { angle });
                }
                StepOutcome::running(result.kinematics, 0.0, PlatformStatus::Executing)
            }
            Phase::Circling { angle } => {
                let next = angle + speed / self.radius_m * ctx.dt;
                self.phase = Some(Phase::Circling { angle: next });
                let heading = next + FRAC_PI_2;
                let kinematics = Kinematics {
                    position: self.point_at(next),
                    velocity: Vec3::new(heading.cos() * speed, heading.sin() * speed, 0.0),
                    heading_rad: heading,
                };
                StepOutcome::running(kinematics, 0.0, PlatformStatus::Executing)
            }
        }
    }
}
