//! `[constraints]` configuration section.

use commander_core::CoreError;
use commander_domain::{PlatformKind, Point2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::{point_in_polygon, segment_intersects_polygon, Rect};

/// Maximum speed per platform kind, m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedLimits {
    pub ugv: f64,
    pub uav: f64,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self { ugv: 5.0, uav: 15.0 }
    }
}

impl SpeedLimits {
    pub fn for_kind(&self, kind: PlatformKind) -> f64 {
        match kind {
            PlatformKind::Ground => self.ugv,
            PlatformKind::Aerial => self.uav,
        }
    }
}

/// Axis-aligned operating box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            x_min: -50.0,
            x_max: 50.0,
            y_min: -50.0,
            y_max: 50.0,
            z_min: 0.0,
            z_max: 30.0,
        }
    }
}

impl WorldBounds {
    pub fn contains(&self, p: Vec3) -> bool {
        (self.x_min..=self.x_max).contains(&p.x)
            && (self.y_min..=self.y_max).contains(&p.y)
            && (self.z_min..=self.z_max).contains(&p.z)
    }

    pub fn clamp(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.x_min, self.x_max),
            p.y.clamp(self.y_min, self.y_max),
            p.z.clamp(self.z_min, self.z_max),
        )
    }

    /// Human-readable list of the axes `p` falls outside of.
    pub fn describe_violation(&self, p: Vec3) -> Option<String> {
        let axes = [
            ("x", p.x, self.x_min, self.x_max),
            ("y", p.y, self.y_min, self.y_max),
            ("z", p.z, self.z_min, self.z_max),
        ];
        let parts: Vec<String> = axes
            .iter()
            .filter(|(_, v, lo, hi)| v < lo || v > hi)
            .map(|(axis, v, lo, hi)| format!("{axis}={v:.1} outside [{lo}, {hi}]"))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    fn is_well_formed(&self) -> bool {
        [self.x_min, self.x_max, self.y_min, self.y_max, self.z_min, self.z_max]
            .iter()
            .all(|v| v.is_finite())
            && self.x_min < self.x_max
            && self.y_min < self.y_max
            && self.z_min <= self.z_max
    }
}

/// Named polygon platforms must never enter or cross.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoGoZone {
    pub name: String,
    pub vertices: Vec<Point2>,
}

impl NoGoZone {
    pub fn new(name: impl Into<String>, vertices: &[(f64, f64)]) -> Self {
        Self {
            name: name.into(),
            vertices: vertices.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
        }
    }

    pub fn contains(&self, p: Point2) -> bool {
        point_in_polygon(p, &self.vertices)
    }

    pub fn intersects_segment(&self, a: Point2, b: Point2) -> bool {
        segment_intersects_polygon(a, b, &self.vertices)
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        Rect::from_points(&self.vertices)
    }
}

/// How a minimum-separation violation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationPolicy {
    /// Violation; rejected unless a safe rewrite exists
    #[default]
    Reject,
    /// Reported as a warning on an approved verdict
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    pub speed_limits: SpeedLimits,
    pub world_bounds: WorldBounds,
    /// Checked in order; the first zone hit is the one reported
    pub no_go_zones: Vec<NoGoZone>,
    pub min_separation_m: f64,
    pub comms_timeout_s: f64,
    pub allow_rewrite: bool,
    pub separation_policy: SeparationPolicy,
    /// Margin around a zone's bounding box for suggested detours
    pub no_go_margin_m: f64,
    /// Chords used to approximate an orbit circle
    pub orbit_chords: usize,
    /// Named waypoints usable as `go_to` destinations
    pub waypoints: BTreeMap<String, Point2>,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            speed_limits: SpeedLimits::default(),
            world_bounds: WorldBounds::default(),
            no_go_zones: Vec::new(),
            min_separation_m: 2.0,
            comms_timeout_s: 5.0,
            allow_rewrite: false,
            separation_policy: SeparationPolicy::Reject,
            no_go_margin_m: 2.0,
            orbit_chords: 32,
            waypoints: BTreeMap::new(),
        }
    }
}

impl ConstraintsConfig {
    /// Demo world: one restricted zone and the standard checkpoints.
    pub fn demo() -> Self {
        let waypoints = [
            ("checkpoint_alpha", 20.0, 30.0),
            ("checkpoint_bravo", 40.0, 50.0),
            ("checkpoint_charlie", 10.0, -20.0),
            ("home_base", 0.0, 0.0),
            ("observation_point", 30.0, 0.0),
        ]
        .into_iter()
        .map(|(name, x, y)| (name.to_string(), Point2::new(x, y)))
        .collect();

        Self {
            no_go_zones: vec![NoGoZone::new(
                "R1",
                &[(-20.0, -20.0), (-20.0, -10.0), (-10.0, -10.0), (-10.0, -20.0)],
            )],
            waypoints,
            ..Self::default()
        }
    }

    pub fn waypoint(&self, name: &str) -> Option<Point2> {
        self.waypoints.get(name).copied()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));

        let limits = self.speed_limits;
        if !(limits.ugv.is_finite() && limits.ugv > 0.0 && limits.uav.is_finite() && limits.uav > 0.0) {
            return invalid("speed limits must be positive".into());
        }
        if !self.world_bounds.is_well_formed() {
            return invalid("world bounds must satisfy min < max on every axis".into());
        }
        if self.world_bounds.z_min > 0.0 || self.world_bounds.z_max < 0.0 {
            return invalid("world bounds must include z = 0 for ground platforms".into());
        }
        if !(self.min_separation_m.is_finite() && self.min_separation_m >= 0.0) {
            return invalid("min_separation_m must be non-negative".into());
        }
        if !(self.comms_timeout_s.is_finite() && self.comms_timeout_s > 0.0) {
            return invalid("comms_timeout_s must be positive".into());
        }
        if !(self.no_go_margin_m.is_finite() && self.no_go_margin_m >= 0.0) {
            return invalid("no_go_margin_m must be non-negative".into());
        }
        if self.orbit_chords < 8 {
            return invalid("orbit_chords must be at least 8".into());
        }
        for zone in &self.no_go_zones {
            if zone.vertices.len() < 3 {
                return invalid(format!("no-go zone '{}' needs at least 3 vertices", zone.name));
            }
            if zone.vertices.iter().any(|v| !(v.x.is_finite() && v.y.is_finite())) {
                return invalid(format!("no-go zone '{}' has a non-finite vertex", zone.name));
            }
        }
        for (name, point) in &self.waypoints {
            if !self.world_bounds.contains(point.with_z(0.0)) {
                return invalid(format!("waypoint '{name}' lies outside the world bounds"));
            }
        }
        Ok(())
    }
}
