//! Task lifecycle.
//!
//! A task binds one approved command to one platform and one controller.
//! Lifecycle: `queued -> running -> {succeeded | failed | cancelled}`, with
//! `queued -> cancelled` also allowed. Terminal states never change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::Command;
use crate::error::TransitionError;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        match (self, new_status) {
            (TaskStatus::Queued, TaskStatus::Running) => true,
            (TaskStatus::Queued, TaskStatus::Cancelled) => true,
            (TaskStatus::Running, TaskStatus::Succeeded) => true,
            (TaskStatus::Running, TaskStatus::Failed) => true,
            (TaskStatus::Running, TaskStatus::Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which controller drives a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    GoTo,
    Hold,
    Orbit,
    FollowLeader,
    Formation,
    Patrol,
    Observe,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::GoTo => "go_to",
            ControllerKind::Hold => "hold",
            ControllerKind::Orbit => "orbit",
            ControllerKind::FollowLeader => "follow_leader",
            ControllerKind::Formation => "formation",
            ControllerKind::Patrol => "patrol",
            ControllerKind::Observe => "observe",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub command: Command,
    pub platform_id: String,
    /// Shared by every task created from one pod-scoped command
    pub group_id: Option<String>,
    pub controller: ControllerKind,
    pub status: TaskStatus,
    /// Progress in [0, 1]
    pub progress: f64,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub error: Option<String>,
    pub cancel_reason: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        command: Command,
        platform_id: impl Into<String>,
        group_id: Option<String>,
        controller: ControllerKind,
        now_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            command,
            platform_id: platform_id.into(),
            group_id,
            controller,
            status: TaskStatus::Queued,
            progress: 0.0,
            created_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
            error: None,
            cancel_reason: None,
        }
    }

    /// Move to `new_status`, stamping start/completion times.
    pub fn transition(&mut self, new_status: TaskStatus, now_ms: u64) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(new_status) {
            return Err(TransitionError::Invalid {
                task_id: self.id.clone(),
                from: self.status,
                to: new_status,
            });
        }
        self.status = new_status;
        if new_status == TaskStatus::Running {
            self.started_at_ms = Some(now_ms);
        }
        if new_status.is_terminal() {
            self.completed_at_ms = Some(now_ms);
        }
        Ok(())
    }

    pub fn start(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running, now_ms)
    }

    pub fn succeed(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Succeeded, now_ms)?;
        self.progress = 1.0;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed, now_ms)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Cancelled, now_ms)?;
        self.cancel_reason = Some(reason.into());
        Ok(())
    }

    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() {
            self.progress = progress.clamp(0.0, 1.0);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
