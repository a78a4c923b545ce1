//! Engine configuration (TOML).

use commander_constraints::ConstraintsConfig;
use commander_controllers::ControllerTuning;
use commander_core::{load_toml, parse_toml, CoreError, LoggingConfig};
use commander_domain::{PlatformKind, PlatformSpec, PodMembership, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Tick rate; Δt = 1 / tick_hz
    pub tick_hz: f64,
    /// Pose deltas are broadcast every this many ticks
    pub pose_every_ticks: u64,
    /// Sleep between ticks instead of free-running
    pub realtime: bool,
    /// Recent events kept for snapshots
    pub max_timeline_events: usize,
    /// Refresh heartbeats of platforms with an up link every tick
    pub heartbeat_refresh: bool,
    /// Battery percent drained per metre travelled
    pub battery_drain_per_m: f64,
    /// Buffered messages per feed subscriber
    pub feed_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: 50.0,
            pose_every_ticks: 5,
            realtime: true,
            max_timeline_events: 1000,
            heartbeat_refresh: true,
            battery_drain_per_m: 0.01,
            feed_capacity: 1000,
        }
    }
}

impl SimulationConfig {
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_hz
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommanderConfig {
    pub simulation: SimulationConfig,
    pub constraints: ConstraintsConfig,
    pub controllers: ControllerTuning,
    pub roster: Vec<PlatformSpec>,
    pub pods: Vec<PodMembership>,
    pub logging: LoggingConfig,
}

impl CommanderConfig {
    /// Demo world: three UGVs, two UAVs, zone R1 and the named checkpoints.
    pub fn demo() -> Self {
        let roster = vec![
            ("ugv1", PlatformKind::Ground, Vec3::new(0.0, 0.0, 0.0)),
            ("ugv2", PlatformKind::Ground, Vec3::new(5.0, 0.0, 0.0)),
            ("ugv3", PlatformKind::Ground, Vec3::new(10.0, 0.0, 0.0)),
            ("uav1", PlatformKind::Aerial, Vec3::new(0.0, 0.0, 15.0)),
            ("uav2", PlatformKind::Aerial, Vec3::new(5.0, 0.0, 20.0)),
        ]
        .into_iter()
        .map(|(id, kind, position)| PlatformSpec::new(id, kind, position))
        .collect();

        Self {
            constraints: ConstraintsConfig::demo(),
            roster,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: Self = parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));
        let sim = &self.simulation;

        if !(sim.tick_hz.is_finite() && sim.tick_hz > 0.0) {
            return invalid(format!("simulation.tick_hz must be positive, got {}", sim.tick_hz));
        }
        if sim.pose_every_ticks == 0 {
            return invalid("simulation.pose_every_ticks must be at least 1".into());
        }
        if sim.max_timeline_events == 0 || sim.feed_capacity == 0 {
            return invalid("simulation buffer sizes must be at least 1".into());
        }
        if !(sim.battery_drain_per_m.is_finite() && sim.battery_drain_per_m >= 0.0) {
            return invalid("simulation.battery_drain_per_m must be non-negative".into());
        }
        self.constraints.validate()?;
        self.controllers.validate().map_err(CoreError::InvalidConfig)?;

        let mut ids = BTreeSet::new();
        for spec in &self.roster {
            if spec.id.trim().is_empty() {
                return invalid("roster entries need a non-empty id".into());
            }
            if !ids.insert(spec.id.as_str()) {
                return invalid(format!("duplicate roster id '{}'", spec.id));
            }
            if !spec.position.is_finite() {
                return invalid(format!("platform '{}' has a non-finite position", spec.id));
            }
        }

        let mut pod_ids = BTreeSet::new();
        let mut assigned = BTreeSet::new();
        for pod in &self.pods {
            if PodMembership::is_builtin_id(&pod.id) && pod.id != "ugv_pod" && pod.id != "uav_pod" {
                return invalid(format!("'{}' is reserved and cannot be a pod id", pod.id));
            }
            if ids.contains(pod.id.as_str()) {
                return invalid(format!("pod id '{}' collides with a platform id", pod.id));
            }
            if !pod_ids.insert(pod.id.as_str()) {
                return invalid(format!("duplicate pod id '{}'", pod.id));
            }
            for member in &pod.members {
                if !ids.contains(member.as_str()) {
                    return invalid(format!("pod '{}' names unknown platform '{member}'", pod.id));
                }
                if !assigned.insert(member.as_str()) {
                    return invalid(format!("platform '{member}' is in more than one pod"));
                }
            }
            if let Some(leader) = &pod.leader {
                if !pod.contains(leader) {
                    return invalid(format!("pod '{}' leader '{leader}' is not a member", pod.id));
                }
            }
        }
        Ok(())
    }
}
