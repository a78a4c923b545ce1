//! Controller tuning parameters.

use commander_domain::PlatformKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    pub arrival_tolerance_ground_m: f64,
    pub arrival_tolerance_aerial_m: f64,
    /// Below this speed a platform counts as stopped
    pub idle_speed_mps: f64,
    /// Approach speed per metre remaining (1/s); decelerates near the target
    pub approach_gain: f64,
    /// Floor on approach speed so the final centimetres are covered
    pub min_approach_speed_mps: f64,
    pub trail_spacing_m: f64,
    pub trail_capacity: usize,
    /// Orbit speed as a fraction of the kind limit when none is given
    pub orbit_speed_factor: f64,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            arrival_tolerance_ground_m: 0.5,
            arrival_tolerance_aerial_m: 1.0,
            idle_speed_mps: 1.0,
            approach_gain: 1.0,
            min_approach_speed_mps: 0.2,
            trail_spacing_m: 0.5,
            trail_capacity: 400,
            orbit_speed_factor: 0.5,
        }
    }
}

impl ControllerTuning {
    pub fn arrival_tolerance(&self, kind: PlatformKind) -> f64 {
        match kind {
            PlatformKind::Ground => self.arrival_tolerance_ground_m,
            PlatformKind::Aerial => self.arrival_tolerance_aerial_m,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("arrival_tolerance_ground_m", self.arrival_tolerance_ground_m),
            ("arrival_tolerance_aerial_m", self.arrival_tolerance_aerial_m),
            ("idle_speed_mps", self.idle_speed_mps),
            ("approach_gain", self.approach_gain),
            ("trail_spacing_m", self.trail_spacing_m),
            ("orbit_speed_factor", self.orbit_speed_factor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("controllers.{name} must be positive, got {value}"));
            }
        }
        if self.trail_capacity < 2 {
            return Err("controllers.trail_capacity must be at least 2".to_string());
        }
        Ok(())
    }
}
