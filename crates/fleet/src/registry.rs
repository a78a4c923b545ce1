//! Platform registry
//!
//! Owns the live record of every platform in the roster. Positions are
//! written only through [`PlatformRegistry::apply_kinematics`] so the trail
//! history and battery stay in step with motion.

use commander_domain::{FleetSnapshot, Platform, PlatformSpec, PlatformStatus, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::FleetError;
use crate::pods::PodRegistry;
use crate::trail::Trail;

/// Kinematic state produced by a controller for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub heading_rad: f64,
}

impl Kinematics {
    /// Current state of a platform, unchanged
    pub fn of(platform: &Platform) -> Self {
        Self {
            position: platform.position,
            velocity: platform.velocity,
            heading_rad: platform.heading_rad,
        }
    }

    /// Stationary at the platform's current pose
    pub fn stopped(platform: &Platform) -> Self {
        Self {
            velocity: Vec3::ZERO,
            ..Self::of(platform)
        }
    }
}

/// Fleet registry for managing platform state
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, Platform>,
    trails: BTreeMap<String, Trail>,
    links_down: BTreeSet<String>,
    trail_spacing_m: f64,
    trail_capacity: usize,
}

impl PlatformRegistry {
    /// Create a new empty registry
    pub fn new(trail_spacing_m: f64, trail_capacity: usize) -> Self {
        Self {
            platforms: BTreeMap::new(),
            trails: BTreeMap::new(),
            links_down: BTreeSet::new(),
            trail_spacing_m,
            trail_capacity,
        }
    }

    /// Build a registry from the fixed roster
    pub fn from_roster(
        roster: &[PlatformSpec],
        now_ms: u64,
        trail_spacing_m: f64,
        trail_capacity: usize,
    ) -> Result<Self, FleetError> {
        let mut registry = Self::new(trail_spacing_m, trail_capacity);
        for spec in roster {
            registry.register(spec, now_ms)?;
        }
        info!(platforms = registry.len(), "Platform registry initialised");
        Ok(registry)
    }

    /// Register a platform
    pub fn register(&mut self, spec: &PlatformSpec, now_ms: u64) -> Result<(), FleetError> {
        if self.platforms.contains_key(&spec.id) {
            return Err(FleetError::DuplicatePlatform(spec.id.clone()));
        }
        let platform = Platform::from_spec(spec, now_ms);
        let mut trail = Trail::new(self.trail_spacing_m, self.trail_capacity);
        trail.record(platform.position);
        self.trails.insert(spec.id.clone(), trail);
        self.platforms.insert(spec.id.clone(), platform);
        Ok(())
    }

    /// Get a platform by ID
    pub fn get(&self, id: &str) -> Option<&Platform> {
        self.platforms.get(id)
    }

    /// Get a platform by ID, or `UnknownPlatform`
    pub fn require(&self, id: &str) -> Result<&Platform, FleetError> {
        self.platforms
            .get(id)
            .ok_or_else(|| FleetError::UnknownPlatform(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Platform, FleetError> {
        self.platforms
            .get_mut(id)
            .ok_or_else(|| FleetError::UnknownPlatform(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.platforms.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.platforms.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.values()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn trail(&self, id: &str) -> Option<&Trail> {
        self.trails.get(id)
    }

    /// Write a controller's output back to the platform.
    ///
    /// Ground platforms are pinned to z = 0. Returns the distance moved.
    pub fn apply_kinematics(&mut self, id: &str, kinematics: Kinematics) -> Result<f64, FleetError> {
        let platform = self.require_mut(id)?;
        let position = platform.constrain(kinematics.position);
        let moved = platform.position.distance_to(&position);

        platform.position = position;
        platform.velocity = platform.constrain(kinematics.velocity);
        platform.heading_rad = kinematics.heading_rad;

        if let Some(trail) = self.trails.get_mut(id) {
            trail.record(position);
        }
        Ok(moved)
    }

    /// Drain battery by `amount` percent, never below 0. Returns the new level.
    pub fn drain_battery(&mut self, id: &str, amount: f64) -> Result<f64, FleetError> {
        let platform = self.require_mut(id)?;
        platform.battery_pct = (platform.battery_pct - amount.max(0.0)).clamp(0.0, 100.0);
        Ok(platform.battery_pct)
    }

    /// Set platform status.
    ///
    /// Returns the previous status when it changed.
    pub fn set_status(
        &mut self,
        id: &str,
        status: PlatformStatus,
    ) -> Result<Option<PlatformStatus>, FleetError> {
        let platform = self.require_mut(id)?;
        if platform.status == status {
            return Ok(None);
        }
        let previous = platform.status;
        platform.status = status;
        debug!(platform_id = id, from = %previous, to = %status, "Platform status changed");
        Ok(Some(previous))
    }

    /// Zero velocity, keeping position and heading
    pub fn halt(&mut self, id: &str) -> Result<(), FleetError> {
        let platform = self.require_mut(id)?;
        platform.velocity = Vec3::ZERO;
        Ok(())
    }

    pub fn set_health(&mut self, id: &str, ok: bool) -> Result<(), FleetError> {
        let platform = self.require_mut(id)?;
        if platform.health_ok != ok {
            if ok {
                info!(platform_id = id, "Platform health restored");
            } else {
                warn!(platform_id = id, "Platform health fault");
            }
        }
        platform.health_ok = ok;
        Ok(())
    }

    /// Simulate comms link up/down
    pub fn set_link(&mut self, id: &str, up: bool) -> Result<(), FleetError> {
        self.require(id)?;
        if up {
            self.links_down.remove(id);
        } else {
            self.links_down.insert(id.to_string());
        }
        info!(platform_id = id, up, "Comms link changed");
        Ok(())
    }

    pub fn is_link_up(&self, id: &str) -> bool {
        self.platforms.contains_key(id) && !self.links_down.contains(id)
    }

    /// Record a heartbeat for a single platform
    pub fn record_heartbeat(&mut self, id: &str, now_ms: u64) -> Result<(), FleetError> {
        let platform = self.require_mut(id)?;
        platform.last_heartbeat_ms = platform.last_heartbeat_ms.max(now_ms);
        Ok(())
    }

    /// Refresh the heartbeat of every platform whose link is up
    pub fn refresh_heartbeats(&mut self, now_ms: u64) {
        for (id, platform) in self.platforms.iter_mut() {
            if !self.links_down.contains(id) {
                platform.last_heartbeat_ms = platform.last_heartbeat_ms.max(now_ms);
            }
        }
    }

    /// Platforms within `radius` of `position` (3D distance)
    pub fn query_near(&self, position: &Vec3, radius: f64) -> Vec<&Platform> {
        self.platforms
            .values()
            .filter(|p| p.position.distance_to(position) <= radius)
            .collect()
    }

    /// Read-only view for constraint evaluation
    pub fn snapshot(&self, now_ms: u64, pods: &PodRegistry) -> FleetSnapshot {
        FleetSnapshot {
            now_ms,
            platforms: self.platforms.clone(),
            pods: pods.pod_map(),
            follow_links: pods.follow_links(),
        }
    }
}
