//! Platform state records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Vec3;

/// Platform kind. Ground platforms (`ugv`) move in the plane at z = 0;
/// aerial platforms (`uav`) move in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlatformKind {
    #[serde(rename = "ugv", alias = "ground")]
    Ground,
    #[serde(rename = "uav", alias = "aerial")]
    Aerial,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Ground => "ugv",
            PlatformKind::Aerial => "uav",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformStatus {
    Idle,
    Moving,
    Executing,
    Holding,
    Error,
    Offline,
}

impl PlatformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformStatus::Idle => "idle",
            PlatformStatus::Moving => "moving",
            PlatformStatus::Executing => "executing",
            PlatformStatus::Holding => "holding",
            PlatformStatus::Error => "error",
            PlatformStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roster entry used to seed the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: PlatformKind,
    pub position: Vec3,
}

impl PlatformSpec {
    pub fn new(id: impl Into<String>, kind: PlatformKind, position: Vec3) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            position,
        }
    }
}

/// Live platform record owned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub kind: PlatformKind,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Heading in radians, counter-clockwise from +x
    pub heading_rad: f64,
    pub battery_pct: f64,
    pub health_ok: bool,
    pub status: PlatformStatus,
    /// Simulation time of the last heartbeat
    pub last_heartbeat_ms: u64,
    /// Initial position; `return_home` destination
    pub home: Vec3,
}

impl Platform {
    pub fn from_spec(spec: &PlatformSpec, now_ms: u64) -> Self {
        let position = match spec.kind {
            PlatformKind::Ground => spec.position.with_z(0.0),
            PlatformKind::Aerial => spec.position,
        };
        Self {
            id: spec.id.clone(),
            name: spec.name.clone().unwrap_or_else(|| spec.id.clone()),
            kind: spec.kind,
            position,
            velocity: Vec3::ZERO,
            heading_rad: 0.0,
            battery_pct: 100.0,
            health_ok: true,
            status: PlatformStatus::Idle,
            last_heartbeat_ms: now_ms,
            home: position,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn is_ground(&self) -> bool {
        self.kind == PlatformKind::Ground
    }

    pub fn seconds_since_heartbeat(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.last_heartbeat_ms) as f64 / 1000.0
    }

    /// Project a point onto the platform's operating space (z = 0 for ground).
    pub fn constrain(&self, point: Vec3) -> Vec3 {
        match self.kind {
            PlatformKind::Ground => point.with_z(0.0),
            PlatformKind::Aerial => point,
        }
    }
}
