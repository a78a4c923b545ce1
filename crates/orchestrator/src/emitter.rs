//! Event Emitter
//!
//! Every lifecycle transition is appended to the hash-chained [`Timeline`]
//! and handed to each registered [`EventSink`]. Pose deltas bypass the
//! timeline and go to sinks only.

use commander_core::{EventBuilder, TimelineEvent, Timeline};
use commander_domain::{Platform, PlatformStatus, Vec3};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Pose of one platform at a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDelta {
    pub platform_id: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub heading_rad: f64,
    pub status: PlatformStatus,
    pub battery_pct: f64,
}

impl PoseDelta {
    pub fn of(platform: &Platform) -> Self {
        Self {
            platform_id: platform.id.clone(),
            position: platform.position,
            velocity: platform.velocity,
            heading_rad: platform.heading_rad,
            status: platform.status,
            battery_pct: platform.battery_pct,
        }
    }
}

/// Message pushed to feed subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Lifecycle event, pushed immediately
    Event(TimelineEvent),
    /// Platforms whose pose changed since the last push
    Poses {
        tick: u64,
        sim_time_ms: u64,
        poses: Vec<PoseDelta>,
    },
}

/// Receiver of emitted events.
pub trait EventSink: Send {
    fn emit(&mut self, event: &TimelineEvent);

    fn poses(&mut self, _tick: u64, _sim_time_ms: u64, _poses: &[PoseDelta]) {}
}

/// Forwards everything onto a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<FeedMessage>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<FeedMessage>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn emit(&mut self, event: &TimelineEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(FeedMessage::Event(event.clone()));
    }

    fn poses(&mut self, tick: u64, sim_time_ms: u64, poses: &[PoseDelta]) {
        let _ = self.tx.send(FeedMessage::Poses {
            tick,
            sim_time_ms,
            poses: poses.to_vec(),
        });
    }
}

/// Logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &TimelineEvent) {
        info!(
            seq = event.seq,
            kind = %event.kind,
            timestamp_ms = event.timestamp_ms,
            task_id = event.task_id.as_deref().unwrap_or(""),
            platform_id = event.platform_id.as_deref().unwrap_or(""),
            payload = %serde_json::to_string(&event.payload).unwrap_or_default(),
            "timeline event"
        );
    }

    fn poses(&mut self, tick: u64, _sim_time_ms: u64, poses: &[PoseDelta]) {
        debug!(tick, platforms = poses.len(), "pose delta");
    }
}

/// Owns the timeline and fans events out to sinks.
pub struct EventEmitter {
    timeline: Timeline,
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        Self {
            timeline: Timeline::new(capacity),
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Seal `builder` onto the timeline and notify every sink.
    pub fn emit(&mut self, builder: EventBuilder) -> TimelineEvent {
        let event = self.timeline.append(builder);
        for sink in &mut self.sinks {
            sink.emit(&event);
        }
        event
    }

    pub fn publish_poses(&mut self, tick: u64, sim_time_ms: u64, poses: &[PoseDelta]) {
        for sink in &mut self.sinks {
            sink.poses(tick, sim_time_ms, poses);
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn recent(&self, limit: usize) -> Vec<TimelineEvent> {
        self.timeline.recent(limit)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("events", &self.timeline.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
