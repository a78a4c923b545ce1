//! Timeline event schema.
//!
//! Every externally visible state change in the engine is recorded as a
//! [`TimelineEvent`]. Events are sequenced and hash-chained with BLAKE3 so a
//! consumer can detect gaps or tampering in a recorded timeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `prev_hash` of the first event in a fresh timeline.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskStarted,
    TaskSucceeded,
    TaskFailed,
    TaskCancelled,
    PlatformStateChanged,
    ConstraintViolation,
    System,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task_created",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskSucceeded => "task_succeeded",
            EventKind::TaskFailed => "task_failed",
            EventKind::TaskCancelled => "task_cancelled",
            EventKind::PlatformStateChanged => "platform_state_changed",
            EventKind::ConstraintViolation => "constraint_violation",
            EventKind::System => "system",
        }
    }

    /// True for the three events that close a task's lifecycle.
    pub fn is_task_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::TaskSucceeded | EventKind::TaskFailed | EventKind::TaskCancelled
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload attached to an event.
///
/// Backed by a `BTreeMap` so serialization order, and therefore the event
/// hash, is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventPayload {
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl EventPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// String value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// A sealed, hash-chained timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Monotonic sequence number within one engine instance
    pub seq: u64,
    pub kind: EventKind,
    /// Simulation time in milliseconds
    pub timestamp_ms: u64,
    pub task_id: Option<String>,
    pub platform_id: Option<String>,
    pub payload: EventPayload,
    /// Hash of the preceding event (hex)
    pub prev_hash: String,
    /// BLAKE3 hash over this event's content and `prev_hash` (hex)
    pub hash: String,
}

impl TimelineEvent {
    /// Recompute the hash from the event's fields.
    pub fn compute_hash(&self) -> String {
        content_hash(
            self.seq,
            self.kind,
            self.timestamp_ms,
            self.task_id.as_deref(),
            self.platform_id.as_deref(),
            &self.payload,
            &self.prev_hash,
        )
    }

    pub fn is_sealed_correctly(&self) -> bool {
        self.compute_hash() == self.hash
    }
}

fn content_hash(
    seq: u64,
    kind: EventKind,
    timestamp_ms: u64,
    task_id: Option<&str>,
    platform_id: Option<&str>,
    payload: &EventPayload,
    prev_hash: &str,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(kind.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(&timestamp_ms.to_le_bytes());
    for field in [task_id, platform_id] {
        match field {
            Some(value) => {
                hasher.update(&[1]);
                hasher.update(value.as_bytes());
                hasher.update(&[0]);
            }
            None => {
                hasher.update(&[0]);
            }
        }
    }
    let payload_bytes = serde_json::to_vec(&payload.data).unwrap_or_default();
    hasher.update(&payload_bytes);
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Builder for events; sealing assigns `seq` and the chain hashes.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: EventKind,
    timestamp_ms: u64,
    task_id: Option<String>,
    platform_id: Option<String>,
    payload: EventPayload,
}

impl EventBuilder {
    pub fn new(kind: EventKind, timestamp_ms: u64) -> Self {
        Self {
            kind,
            timestamp_ms,
            task_id: None,
            platform_id: None,
            payload: EventPayload::new(),
        }
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn platform(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    /// Add a payload field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key, value);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Seal the event at position `seq` following `prev_hash`.
    pub fn seal(self, seq: u64, prev_hash: &str) -> TimelineEvent {
        let hash = content_hash(
            seq,
            self.kind,
            self.timestamp_ms,
            self.task_id.as_deref(),
            self.platform_id.as_deref(),
            &self.payload,
            prev_hash,
        );
        TimelineEvent {
            seq,
            kind: self.kind,
            timestamp_ms: self.timestamp_ms,
            task_id: self.task_id,
            platform_id: self.platform_id,
            payload: self.payload,
            prev_hash: prev_hash.to_string(),
            hash,
        }
    }
}
