//! Tick-consistent read models.

use commander_core::TimelineEvent;
use commander_domain::{Platform, PlatformKind, PlatformStatus, PodMembership, Task, Vec3};
use serde::{Deserialize, Serialize};

/// Fleet, task and event state as of the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub sim_time_ms: u64,
    pub platforms: Vec<Platform>,
    pub pods: Vec<PodMembership>,
    pub tasks: Vec<Task>,
    pub recent_events: Vec<TimelineEvent>,
}

impl Snapshot {
    pub fn platform(&self, id: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks that are queued or running.
    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_active())
    }
}

/// Answer to `report_status` for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform_id: String,
    pub kind: PlatformKind,
    pub status: PlatformStatus,
    pub position: Vec3,
    pub speed_mps: f64,
    pub heading_rad: f64,
    pub battery_pct: f64,
    pub health_ok: bool,
    pub link_up: bool,
    pub seconds_since_heartbeat: f64,
    pub active_task: Option<String>,
    pub pod: Option<String>,
}
