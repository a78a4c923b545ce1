//! Task Orchestrator
//!
//! Single owner of mutable engine state: the platform registry, pods, tasks
//! and their controllers. Commands pass through the constraints engine and
//! become tasks; each [`Orchestrator::tick`] promotes queued tasks, fails
//! tasks hit by runtime faults, steps every running controller against a
//! tick-consistent view of the fleet and applies the results.
//!
//! At most one task is active per platform. A new command addressed to a
//! busy platform cancels the prior task ("superseded") before the new one is
//! created, in the same call.

use std::collections::BTreeMap;
use std::sync::Arc;

use commander_constraints::{
    resolve_formation_leader, ConstraintVerdict, ConstraintsConfig, ConstraintsEngine, SeparationPolicy,
    VerdictKind, Violation, ViolationKind,
};
use commander_controllers::{Controller, Signal, StepContext, StepOutcome};
use commander_core::{EventBuilder, EventKind, TimelineEvent};
use commander_domain::{
    Action, Command, ControllerKind, FleetSnapshot, Interpretation, Platform, PlatformStatus, RawCommand,
    Task, TaskStatus, TransitionError,
};
use commander_fleet::{HeartbeatMonitor, HeartbeatStatus, PlatformRegistry, PodRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CommanderConfig;
use crate::dispatch::{build_controller, controller_kind, Assignment};
use crate::emitter::{EventEmitter, EventSink, PoseDelta};
use crate::error::{OrchestratorError, Result};
use crate::replay::{CommandInput, CommandLog, ReplayOutcome};
use crate::snapshot::{PlatformReport, Snapshot};

const SUPERSEDED: &str = "superseded";
const STOPPED: &str = "stopped by operator";

/// Synchronous answer to a submitted command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub verdict: ConstraintVerdict,
    /// Tasks created, one per addressed platform
    pub tasks: Vec<Task>,
    /// Status report for `report_status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Vec<PlatformReport>>,
}

impl SubmitResult {
    fn without_tasks(verdict: ConstraintVerdict) -> Self {
        Self {
            verdict,
            tasks: Vec::new(),
            report: None,
        }
    }
}

enum Ending {
    Succeeded,
    Failed(String),
    Cancelled(String),
}

#[derive(Debug)]
struct ActiveTask {
    /// Attached when the task starts
    controller: Option<Box<dyn Controller>>,
    assignment: Assignment,
}

#[derive(Debug)]
pub struct Orchestrator {
    config: CommanderConfig,
    engine: ConstraintsEngine,
    registry: PlatformRegistry,
    pods: PodRegistry,
    heartbeat: HeartbeatMonitor,
    tasks: BTreeMap<String, Task>,
    active: BTreeMap<String, ActiveTask>,
    /// Platform id to its active task id
    by_platform: BTreeMap<String, String>,
    emitter: EventEmitter,
    log: CommandLog,
    tick: u64,
    dt: f64,
    next_task_seq: u64,
    next_group_seq: u64,
    last_poses: BTreeMap<String, PoseDelta>,
}

impl Orchestrator {
    pub fn new(config: CommanderConfig) -> Result<Self> {
        config.validate()?;

        let registry = PlatformRegistry::from_roster(
            &config.roster,
            0,
            config.controllers.trail_spacing_m,
            config.controllers.trail_capacity,
        )?;
        let mut pods = PodRegistry::new();
        for pod in &config.pods {
            pods.assign(&pod.id, &pod.members, pod.leader.clone(), pod.roles.clone());
        }

        let mut orchestrator = Self {
            engine: ConstraintsEngine::new(config.constraints.clone()),
            heartbeat: HeartbeatMonitor::new(config.constraints.comms_timeout_s),
            emitter: EventEmitter::new(config.simulation.max_timeline_events),
            dt: config.simulation.dt(),
            registry,
            pods,
            tasks: BTreeMap::new(),
            active: BTreeMap::new(),
            by_platform: BTreeMap::new(),
            log: CommandLog::new(),
            tick: 0,
            next_task_seq: 0,
            next_group_seq: 0,
            last_poses: BTreeMap::new(),
            config,
        };

        orchestrator.emitter.emit(
            EventBuilder::new(EventKind::System, 0)
                .field("message", "engine started")
                .field("platforms", orchestrator.registry.len() as u64)
                .field("tick_hz", orchestrator.config.simulation.tick_hz),
        );
        info!(
            platforms = orchestrator.registry.len(),
            tick_hz = orchestrator.config.simulation.tick_hz,
            "Orchestrator initialised"
        );
        Ok(orchestrator)
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.emitter.add_sink(sink);
    }

    pub fn config(&self) -> &CommanderConfig {
        &self.config
    }

    /// Read-only constraints configuration, for map and UI rendering.
    pub fn constraints_config(&self) -> Arc<ConstraintsConfig> {
        self.engine.shared_config()
    }

    pub fn engine(&self) -> &ConstraintsEngine {
        &self.engine
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn pods(&self) -> &PodRegistry {
        &self.pods
    }

    /// Ticks completed so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Simulation time in milliseconds
    pub fn now_ms(&self) -> u64 {
        (self.tick as f64 * self.dt * 1000.0).round() as u64
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// All tasks ever created, in creation order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn active_task_for(&self, platform_id: &str) -> Option<&Task> {
        self.by_platform
            .get(platform_id)
            .and_then(|task_id| self.tasks.get(task_id))
    }

    pub fn command_log(&self) -> &CommandLog {
        &self.log
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.emitter.timeline().iter()
    }

    pub fn fleet_snapshot(&self) -> FleetSnapshot {
        self.registry.snapshot(self.now_ms(), &self.pods)
    }

    /// Fleet, tasks and recent events as of the last completed tick.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            sim_time_ms: self.now_ms(),
            platforms: self.registry.iter().cloned().collect(),
            pods: self.pods.pods().cloned().collect(),
            tasks: self.tasks.values().cloned().collect(),
            recent_events: self.emitter.recent(self.config.simulation.max_timeline_events),
        }
    }

    /// Verdicts so far and the current state of every task.
    pub fn outcome(&self) -> ReplayOutcome {
        ReplayOutcome::new(
            self.tick,
            self.log.verdicts(),
            self.tasks
                .values()
                .map(|t| (t.id.clone(), t.status))
                .collect(),
        )
    }

    /// Apply one recorded input. Returns the submit result for commands.
    pub fn apply_input(&mut self, input: CommandInput) -> Option<SubmitResult> {
        match input {
            CommandInput::Command { command } => Some(self.submit(command)),
            CommandInput::Raw { raw } => Some(self.submit_raw(&raw)),
            CommandInput::CancelTask { task_id, reason } => {
                if let Err(e) = self.cancel_task(&task_id, &reason) {
                    warn!(task_id = %task_id, error = %e, "Recorded cancel did not apply");
                }
                None
            }
            CommandInput::CancelGroup { group_id, reason } => {
                if let Err(e) = self.cancel_group(&group_id, &reason) {
                    warn!(group_id = %group_id, error = %e, "Recorded group cancel did not apply");
                }
                None
            }
            CommandInput::SetLink { platform_id, up } => {
                if let Err(e) = self.set_link(&platform_id, up) {
                    warn!(platform_id = %platform_id, error = %e, "Recorded link change did not apply");
                }
                None
            }
            CommandInput::SetHealth { platform_id, ok } => {
                if let Err(e) = self.set_health(&platform_id, ok) {
                    warn!(platform_id = %platform_id, error = %e, "Recorded health change did not apply");
                }
                None
            }
        }
    }

    /// Submit a typed command.
    pub fn submit(&mut self, command: Command) -> SubmitResult {
        let tick = self.tick;
        let result = self.process(command.clone());
        self.log
            .record(tick, CommandInput::Command { command }, Some(result.verdict.verdict));
        result
    }

    /// Submit a loosely structured command from an interpreter.
    pub fn submit_raw(&mut self, raw: &RawCommand) -> SubmitResult {
        let tick = self.tick;
        let result = match Command::from_raw(raw) {
            Ok(command) => self.process(command),
            Err(err) => {
                let verdict = ConstraintVerdict::invalid_command(&err);
                warn!(action = %raw.action, target = %raw.target, error = %err, "Command rejected");
                self.record_violation(&raw.action, raw.target.trim(), "", &verdict);
                SubmitResult::without_tasks(verdict)
            }
        };
        self.log.record(
            tick,
            CommandInput::Raw { raw: raw.clone() },
            Some(result.verdict.verdict),
        );
        result
    }

    /// Apply an interpreter result. Commands are submitted in order; a
    /// clarification or plain response is recorded and changes nothing.
    pub fn apply_interpretation(&mut self, interpretation: &Interpretation) -> Vec<SubmitResult> {
        let now = self.now_ms();
        match interpretation {
            Interpretation::Commands { commands, explanation } => {
                debug!(
                    commands = commands.len(),
                    explanation = explanation.as_deref().unwrap_or(""),
                    "Applying interpreted commands"
                );
                commands.iter().map(|raw| self.submit_raw(raw)).collect()
            }
            Interpretation::Clarification { question, options } => {
                info!(question = %question, options = options.len(), "Interpreter asked for clarification");
                self.emitter.emit(
                    EventBuilder::new(EventKind::System, now)
                        .field("message", "clarification requested")
                        .field("question", question.as_str())
                        .field("options", options.clone()),
                );
                Vec::new()
            }
            Interpretation::Response { message } => {
                self.emitter.emit(
                    EventBuilder::new(EventKind::System, now)
                        .field("message", "interpreter response")
                        .field("response", message.as_str()),
                );
                Vec::new()
            }
        }
    }

    fn process(&mut self, command: Command) -> SubmitResult {
        let now = self.now_ms();
        let snapshot = self.fleet_snapshot();
        let verdict = self.engine.check(&command, &snapshot);
        let action = command.action.name();

        if verdict.is_rejected() {
            warn!(
                trace_id = %command.trace_id,
                action,
                target = %command.target,
                reason = %verdict.summary(),
                "Command rejected"
            );
            self.record_violation(action, &command.target, &command.trace_id, &verdict);
            return SubmitResult::without_tasks(verdict);
        }
        if !verdict.warnings.is_empty() || verdict.verdict == VerdictKind::Rewritten {
            self.record_violation(action, &command.target, &command.trace_id, &verdict);
        }

        let effective = verdict.effective_command(&command).clone();
        info!(
            trace_id = %command.trace_id,
            action,
            target = %command.target,
            verdict = %verdict.verdict,
            detail = %verdict.summary(),
            "Command accepted"
        );

        let members = match &effective.action {
            Action::AssignRoles { members, .. } => {
                let mut members = members.clone();
                members.sort();
                members.dedup();
                members
            }
            _ => snapshot.resolve_target(&effective.target).unwrap_or_default(),
        };

        match effective.action.clone() {
            Action::Stop => {
                self.stop_platforms(&effective, &members, now);
                SubmitResult::without_tasks(verdict)
            }
            Action::ReportStatus => {
                let report = self.status_report(&members);
                self.emitter.emit(
                    EventBuilder::new(EventKind::System, now)
                        .field("message", "status report")
                        .field("target", effective.target.as_str())
                        .field("trace_id", effective.trace_id.as_str())
                        .field("report", serde_json::to_value(&report).unwrap_or_default()),
                );
                SubmitResult {
                    verdict,
                    tasks: Vec::new(),
                    report: Some(report),
                }
            }
            Action::AssignRoles { leader, roles, .. } => {
                let pod = self.pods.assign(&effective.target, &members, leader, roles).clone();
                self.emitter.emit(
                    EventBuilder::new(EventKind::System, now)
                        .field("message", "pod assigned")
                        .field("pod", pod.id.as_str())
                        .field("members", pod.members.clone())
                        .field("leader", pod.leader.clone().unwrap_or_default())
                        .field("trace_id", effective.trace_id.as_str()),
                );
                SubmitResult::without_tasks(verdict)
            }
            _ => self.dispatch(effective, verdict, members, &snapshot, now),
        }
    }

    /// Create one task per addressed platform, superseding prior work.
    fn dispatch(
        &mut self,
        command: Command,
        verdict: ConstraintVerdict,
        members: Vec<String>,
        snapshot: &FleetSnapshot,
        now: u64,
    ) -> SubmitResult {
        let Some(kind) = controller_kind(&command.action) else {
            let err = OrchestratorError::Invariant(format!(
                "'{}' reached dispatch without a controller",
                command.action.name()
            ));
            error!(error = %err, "Dispatch failed");
            let verdict = ConstraintVerdict::reject(Violation::new(ViolationKind::InvalidCommand, err.to_string()), None);
            return SubmitResult::without_tasks(verdict);
        };

        let task_platforms: Vec<String> = match &command.action {
            Action::FollowLeader { leader, .. } => members.iter().filter(|m| *m != leader).cloned().collect(),
            _ => members.clone(),
        };

        // Pod and follow changes are staged and committed only once every
        // link is known to be acyclic.
        let mut pods = self.pods.clone();
        for platform_id in &task_platforms {
            pods.clear_follow(platform_id);
        }
        let mut assignment = Assignment {
            members: members.clone(),
            formation_leader: None,
        };
        match &command.action {
            Action::FollowLeader { leader, gap_m } => {
                for follower in &task_platforms {
                    if let Err(e) = pods.set_follow(follower, leader, *gap_m) {
                        let verdict = ConstraintVerdict::reject(
                            Violation::new(ViolationKind::InvalidCommand, e.to_string()).platform(follower),
                            None,
                        );
                        warn!(trace_id = %command.trace_id, error = %e, "Command rejected");
                        self.record_violation(command.action.name(), &command.target, &command.trace_id, &verdict);
                        return SubmitResult::without_tasks(verdict);
                    }
                }
            }
            Action::FormFormation { leader, .. } => {
                let leader = resolve_formation_leader(leader.as_deref(), &command.target, &members, snapshot);
                let roles = pods
                    .get(&command.target)
                    .map(|pod| pod.roles.clone())
                    .unwrap_or_default();
                pods.assign(&command.target, &members, leader.clone(), roles);
                assignment.formation_leader = leader;
            }
            _ => {}
        }

        let group_id = (snapshot.is_group_target(&command.target) || task_platforms.len() > 1)
            .then(|| self.next_group_id());

        for platform_id in &task_platforms {
            self.supersede(platform_id, now);
        }
        self.pods = pods;

        let mut created = Vec::with_capacity(task_platforms.len());
        for platform_id in task_platforms {
            let task_id = self.next_task_id();
            let task = Task::new(
                task_id.clone(),
                command.clone(),
                platform_id.clone(),
                group_id.clone(),
                kind,
                now,
            );

            let mut event = EventBuilder::new(EventKind::TaskCreated, now)
                .task(&task_id)
                .platform(&platform_id)
                .field("action", command.action.name())
                .field("target", command.target.as_str())
                .field("trace_id", command.trace_id.as_str())
                .field("controller", kind.as_str());
            if let Some(group) = &group_id {
                event = event.field("group_id", group.as_str());
            }
            self.emitter.emit(event);
            info!(task_id = %task_id, platform_id = %platform_id, action = command.action.name(), "Task created");

            self.by_platform.insert(platform_id, task_id.clone());
            self.active.insert(
                task_id.clone(),
                ActiveTask {
                    controller: None,
                    assignment: assignment.clone(),
                },
            );
            created.push(task.clone());
            self.tasks.insert(task_id, task);
        }

        SubmitResult {
            verdict,
            tasks: created,
            report: None,
        }
    }

    fn next_task_id(&mut self) -> String {
        self.next_task_seq += 1;
        format!("task_{:06}", self.next_task_seq)
    }

    fn next_group_id(&mut self) -> String {
        self.next_group_seq += 1;
        format!("grp_{:06}", self.next_group_seq)
    }

    fn supersede(&mut self, platform_id: &str, now: u64) {
        if let Some(task_id) = self.by_platform.get(platform_id).cloned() {
            self.finish(&task_id, Ending::Cancelled(SUPERSEDED.to_string()), None, now);
        }
    }

    /// Stop: indefinite running tasks succeed, everything else is cancelled.
    fn stop_platforms(&mut self, command: &Command, members: &[String], now: u64) {
        for platform_id in members {
            if let Some(task_id) = self.by_platform.get(platform_id).cloned() {
                let ending = match self.tasks.get(&task_id) {
                    Some(task) if task.status == TaskStatus::Running && task.command.action.is_indefinite() => {
                        Ending::Succeeded
                    }
                    _ => Ending::Cancelled(STOPPED.to_string()),
                };
                self.finish(&task_id, ending, None, now);
            }
            self.pods.clear_follow(platform_id);
            if let Err(e) = self.registry.halt(platform_id) {
                error!(platform_id = %platform_id, error = %e, "Stop on unknown platform");
                continue;
            }
            self.set_platform_status(platform_id, PlatformStatus::Idle, now);
        }
        self.emitter.emit(
            EventBuilder::new(EventKind::System, now)
                .field("message", "stop")
                .field("target", command.target.as_str())
                .field("platforms", members.to_vec())
                .field("trace_id", command.trace_id.as_str()),
        );
    }

    fn status_report(&self, members: &[String]) -> Vec<PlatformReport> {
        let now = self.now_ms();
        members
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|p| PlatformReport {
                platform_id: p.id.clone(),
                kind: p.kind,
                status: p.status,
                position: p.position,
                speed_mps: p.speed(),
                heading_rad: p.heading_rad,
                battery_pct: p.battery_pct,
                health_ok: p.health_ok,
                link_up: self.registry.is_link_up(&p.id),
                seconds_since_heartbeat: p.seconds_since_heartbeat(now),
                active_task: self.by_platform.get(&p.id).cloned(),
                pod: self.pods.pod_of(&p.id).map(|pod| pod.id.clone()),
            })
            .collect()
    }

    /// Cancel one task.
    pub fn cancel_task(&mut self, task_id: &str, reason: &str) -> Result<Task> {
        self.log.record(
            self.tick,
            CommandInput::CancelTask {
                task_id: task_id.to_string(),
                reason: reason.to_string(),
            },
            None,
        );
        let status = self
            .tasks
            .get(task_id)
            .map(|t| t.status)
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.to_string()))?;
        if status.is_terminal() {
            return Err(TransitionError::Invalid {
                task_id: task_id.to_string(),
                from: status,
                to: TaskStatus::Cancelled,
            }
            .into());
        }
        let now = self.now_ms();
        self.finish(task_id, Ending::Cancelled(reason.to_string()), Some(PlatformStatus::Idle), now);
        self.tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.to_string()))
    }

    /// Cancel every active task of a pod-scoped command together.
    pub fn cancel_group(&mut self, group_id: &str, reason: &str) -> Result<Vec<Task>> {
        self.log.record(
            self.tick,
            CommandInput::CancelGroup {
                group_id: group_id.to_string(),
                reason: reason.to_string(),
            },
            None,
        );
        let members: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.group_id.as_deref() == Some(group_id))
            .map(|t| t.id.clone())
            .collect();
        if members.is_empty() {
            return Err(OrchestratorError::UnknownGroup(group_id.to_string()));
        }

        let now = self.now_ms();
        let mut cancelled = Vec::new();
        for task_id in members {
            if self.tasks.get(&task_id).map_or(false, |t| t.is_active()) {
                self.finish(&task_id, Ending::Cancelled(reason.to_string()), Some(PlatformStatus::Idle), now);
                if let Some(task) = self.tasks.get(&task_id) {
                    cancelled.push(task.clone());
                }
            }
        }
        Ok(cancelled)
    }

    /// Simulate a comms link going down or coming back.
    pub fn set_link(&mut self, platform_id: &str, up: bool) -> Result<()> {
        self.log.record(
            self.tick,
            CommandInput::SetLink {
                platform_id: platform_id.to_string(),
                up,
            },
            None,
        );
        self.registry.set_link(platform_id, up)?;
        let now = self.now_ms();
        if up {
            self.registry.record_heartbeat(platform_id, now)?;
            if self.registry.get(platform_id).map(|p| p.status) == Some(PlatformStatus::Offline) {
                self.set_platform_status(platform_id, PlatformStatus::Idle, now);
            }
        }
        self.emitter.emit(
            EventBuilder::new(EventKind::System, now)
                .platform(platform_id)
                .field("message", if up { "link up" } else { "link down" }),
        );
        Ok(())
    }

    /// Simulate a platform health fault or recovery.
    pub fn set_health(&mut self, platform_id: &str, ok: bool) -> Result<()> {
        self.log.record(
            self.tick,
            CommandInput::SetHealth {
                platform_id: platform_id.to_string(),
                ok,
            },
            None,
        );
        self.registry.set_health(platform_id, ok)?;
        let now = self.now_ms();
        if ok && self.registry.get(platform_id).map(|p| p.status) == Some(PlatformStatus::Error) {
            self.set_platform_status(platform_id, PlatformStatus::Idle, now);
        }
        self.emitter.emit(
            EventBuilder::new(EventKind::System, now)
                .platform(platform_id)
                .field("message", if ok { "health restored" } else { "health fault" }),
        );
        Ok(())
    }

    /// Advance the simulation by one fixed Δt.
    pub fn tick(&mut self) {
        self.tick += 1;
        let now = self.now_ms();

        if self.config.simulation.heartbeat_refresh {
            self.registry.refresh_heartbeats(now);
        }
        self.promote_queued(now);
        self.check_runtime_faults(now);
        let outcomes = self.step_controllers();
        self.apply_outcomes(outcomes, now);

        if self.tick % self.config.simulation.pose_every_ticks == 0 {
            self.publish_poses(now);
        }
    }

    fn running_tasks(&self) -> Vec<(String, String)> {
        self.active
            .keys()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| (t.id.clone(), t.platform_id.clone()))
            .collect()
    }

    fn promote_queued(&mut self, now: u64) {
        let queued: Vec<String> = self
            .active
            .keys()
            .filter(|id| self.tasks.get(*id).map_or(false, |t| t.status == TaskStatus::Queued))
            .cloned()
            .collect();

        for task_id in queued {
            let (Some(task), Some(active)) = (self.tasks.get(&task_id), self.active.get(&task_id)) else {
                continue;
            };
            let platform_known = self.registry.contains(&task.platform_id);
            let built = match self.registry.get(&task.platform_id) {
                Some(platform) => build_controller(&self.engine, &task.command.action, platform, &active.assignment),
                None => Err(OrchestratorError::Invariant(format!(
                    "task {task_id} targets platform '{}' which is not in the registry",
                    task.platform_id
                ))
                .to_string()),
            };

            let Some(task) = self.tasks.get_mut(&task_id) else {
                continue;
            };
            if let Err(e) = task.start(now) {
                error!(task_id = %task_id, error = %e, "Task could not start");
                continue;
            }
            let event = EventBuilder::new(EventKind::TaskStarted, now)
                .task(&task_id)
                .platform(&task.platform_id)
                .field("action", task.command.action.name())
                .field("controller", task.controller.as_str());
            info!(task_id = %task_id, platform_id = %task.platform_id, "Task started");
            self.emitter.emit(event);

            match built {
                Ok(controller) => {
                    if let Some(active) = self.active.get_mut(&task_id) {
                        active.controller = Some(controller);
                    }
                }
                Err(reason) => {
                    error!(task_id = %task_id, reason = %reason, "Controller could not be attached");
                    let status = platform_known.then_some(PlatformStatus::Error);
                    self.finish(&task_id, Ending::Failed(reason), status, now);
                }
            }
        }
    }

    fn check_runtime_faults(&mut self, now: u64) {
        let timeout_s = self.engine.config().comms_timeout_s;
        for (task_id, platform_id) in self.running_tasks() {
            let Some(platform) = self.registry.get(&platform_id) else {
                let err = OrchestratorError::Invariant(format!(
                    "controller invoked for platform '{platform_id}' which is not in the registry"
                ));
                error!(task_id = %task_id, error = %err, "Invariant breach");
                self.finish(&task_id, Ending::Failed(err.to_string()), None, now);
                continue;
            };

            let fault = if !platform.health_ok {
                Some(("platform health fault".to_string(), PlatformStatus::Error))
            } else if self.heartbeat.check(platform.last_heartbeat_ms, now) == HeartbeatStatus::Expired {
                Some((
                    format!(
                        "comms timeout: no heartbeat for {:.1}s (timeout: {timeout_s}s)",
                        platform.seconds_since_heartbeat(now)
                    ),
                    PlatformStatus::Offline,
                ))
            } else if platform.battery_pct <= 0.0 {
                Some(("battery depleted".to_string(), PlatformStatus::Error))
            } else {
                self.destination_conflict(&task_id, platform)
                    .map(|reason| (reason, PlatformStatus::Error))
            };

            if let Some((reason, status)) = fault {
                warn!(task_id = %task_id, platform_id = %platform_id, reason = %reason, "Task failed at runtime");
                self.finish(&task_id, Ending::Failed(reason), Some(status), now);
            }
        }
    }

    /// A stationary platform outside the task's group sitting within the
    /// minimum separation of a fixed destination.
    fn destination_conflict(&self, task_id: &str, platform: &Platform) -> Option<String> {
        let constraints = self.engine.config();
        if constraints.separation_policy != SeparationPolicy::Reject {
            return None;
        }
        let destination = self.active.get(task_id)?.controller.as_ref()?.destination()?;
        let group = self.tasks.get(task_id)?.group_id.as_deref();
        let idle = self.config.controllers.idle_speed_mps;
        let min = constraints.min_separation_m;

        self.registry
            .iter()
            .filter(|other| other.id != platform.id)
            .filter(|other| other.speed() < idle)
            .filter(|other| match self.active_task_for(&other.id) {
                Some(task) => {
                    (group.is_none() || task.group_id.as_deref() != group) && !is_moving_controller(task.controller)
                }
                None => true,
            })
            .map(|other| (other, other.position.distance_to(&destination)))
            .find(|(_, distance)| *distance < min)
            .map(|(other, distance)| {
                format!(
                    "destination occupied by '{}' ({distance:.1}m away, minimum separation {min:.1}m)",
                    other.id
                )
            })
    }

    fn step_controllers(&mut self) -> Vec<(String, String, StepOutcome)> {
        let registry = &self.registry;
        let pods = &self.pods;
        let tasks = &self.tasks;
        let tuning = &self.config.controllers;
        let limits = self.engine.config().speed_limits;
        let dt = self.dt;

        let mut outcomes = Vec::new();
        for (task_id, active) in self.active.iter_mut() {
            let Some(task) = tasks.get(task_id).filter(|t| t.status == TaskStatus::Running) else {
                continue;
            };
            let (Some(controller), Some(platform)) = (active.controller.as_mut(), registry.get(&task.platform_id))
            else {
                continue;
            };
            let ctx = StepContext {
                platform,
                registry,
                pods,
                dt,
                tuning,
                max_speed: limits.for_kind(platform.kind),
            };
            let outcome = controller.step(&ctx);
            debug!(
                task_id = %task_id,
                platform_id = %platform.id,
                progress = outcome.progress,
                "controller step"
            );
            outcomes.push((task_id.clone(), task.platform_id.clone(), outcome));
        }
        outcomes
    }

    fn apply_outcomes(&mut self, outcomes: Vec<(String, String, StepOutcome)>, now: u64) {
        let drain_per_m = self.config.simulation.battery_drain_per_m;
        for (task_id, platform_id, outcome) in outcomes {
            let moved = match self.registry.apply_kinematics(&platform_id, outcome.kinematics) {
                Ok(moved) => moved,
                Err(e) => {
                    let err = OrchestratorError::Invariant(e.to_string());
                    error!(task_id = %task_id, error = %err, "Invariant breach");
                    self.finish(&task_id, Ending::Failed(err.to_string()), None, now);
                    continue;
                }
            };
            if moved > 0.0 && drain_per_m > 0.0 {
                if let Err(e) = self.registry.drain_battery(&platform_id, moved * drain_per_m) {
                    error!(platform_id = %platform_id, error = %e, "Battery update failed");
                }
            }
            if let Some(task) = self.tasks.get_mut(&task_id) {
                task.set_progress(outcome.progress);
            }
            self.set_platform_status(&platform_id, outcome.status, now);

            match outcome.signal {
                Signal::Continue => {}
                Signal::Completed => {
                    self.finish(&task_id, Ending::Succeeded, Some(PlatformStatus::Idle), now);
                }
                Signal::Failed(reason) => {
                    warn!(task_id = %task_id, platform_id = %platform_id, reason = %reason, "Controller failed");
                    self.finish(&task_id, Ending::Failed(reason), Some(PlatformStatus::Error), now);
                }
            }
        }
    }

    fn publish_poses(&mut self, now: u64) {
        let mut changed = Vec::new();
        for platform in self.registry.iter() {
            let pose = PoseDelta::of(platform);
            if self.last_poses.get(&platform.id) != Some(&pose) {
                self.last_poses.insert(platform.id.clone(), pose.clone());
                changed.push(pose);
            }
        }
        if !changed.is_empty() {
            self.emitter.publish_poses(self.tick, now, &changed);
        }
    }

    /// Move a task to a terminal state, detach its controller and emit the
    /// matching event. `platform_status` is applied (with velocity zeroed)
    /// when given.
    fn finish(&mut self, task_id: &str, ending: Ending, platform_status: Option<PlatformStatus>, now: u64) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            error!(task_id, "Finish requested for unknown task");
            return;
        };
        let (kind, result) = match &ending {
            Ending::Succeeded => (EventKind::TaskSucceeded, task.succeed(now)),
            Ending::Failed(reason) => (EventKind::TaskFailed, task.fail(reason.clone(), now)),
            Ending::Cancelled(reason) => (EventKind::TaskCancelled, task.cancel(reason.clone(), now)),
        };
        if let Err(e) = result {
            error!(task_id, error = %e, "Task transition rejected");
            return;
        }

        let platform_id = task.platform_id.clone();
        let controller = task.controller;
        let mut event = EventBuilder::new(kind, now)
            .task(task_id)
            .platform(&platform_id)
            .field("action", task.command.action.name())
            .field("progress", task.progress);
        match &ending {
            Ending::Succeeded => {
                info!(task_id, platform_id = %platform_id, "Task succeeded");
            }
            Ending::Failed(reason) => {
                warn!(task_id, platform_id = %platform_id, reason = %reason, "Task failed");
                event = event.field("error", reason.as_str());
            }
            Ending::Cancelled(reason) => {
                info!(task_id, platform_id = %platform_id, reason = %reason, "Task cancelled");
                event = event.field("reason", reason.as_str());
            }
        }

        self.active.remove(task_id);
        if self.by_platform.get(&platform_id).map(String::as_str) == Some(task_id) {
            self.by_platform.remove(&platform_id);
        }
        if controller == ControllerKind::FollowLeader {
            self.pods.clear_follow(&platform_id);
        }
        self.emitter.emit(event);

        if let Some(status) = platform_status {
            if let Err(e) = self.registry.halt(&platform_id) {
                error!(platform_id = %platform_id, error = %e, "Halt failed");
                return;
            }
            self.set_platform_status(&platform_id, status, now);
        }
    }

    fn set_platform_status(&mut self, platform_id: &str, status: PlatformStatus, now: u64) {
        match self.registry.set_status(platform_id, status) {
            Ok(Some(previous)) => {
                self.emitter.emit(
                    EventBuilder::new(EventKind::PlatformStateChanged, now)
                        .platform(platform_id)
                        .field("from", previous.as_str())
                        .field("to", status.as_str()),
                );
            }
            Ok(None) => {}
            Err(e) => error!(platform_id, error = %e, "Status update failed"),
        }
    }

    fn record_violation(&mut self, action: &str, target: &str, trace_id: &str, verdict: &ConstraintVerdict) {
        let now = self.now_ms();
        let severity = match verdict.verdict {
            VerdictKind::Rejected => "rejected",
            VerdictKind::Rewritten => "rewritten",
            VerdictKind::Approved => "warning",
        };
        let mut event = EventBuilder::new(EventKind::ConstraintViolation, now)
            .field("action", action)
            .field("target", target)
            .field("severity", severity)
            .field("verdict", verdict.verdict.as_str())
            .field("violations", serde_json::to_value(&verdict.violations).unwrap_or_default())
            .field("warnings", verdict.warnings.clone())
            .field("suggestions", verdict.suggestions.clone());
        if let Some(rewrite) = &verdict.rewrite {
            event = event.field("changes", serde_json::to_value(&rewrite.changes).unwrap_or_default());
        }
        if !trace_id.is_empty() {
            event = event.field("trace_id", trace_id);
        }
        if self.registry.contains(target) {
            event = event.platform(target);
        }
        self.emitter.emit(event);
    }
}

fn is_moving_controller(kind: ControllerKind) -> bool {
    matches!(
        kind,
        ControllerKind::GoTo | ControllerKind::Patrol | ControllerKind::FollowLeader | ControllerKind::Formation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use commander_domain::{Destination, FormationType, Point2, PointSpec, Vec3};
    use serde_json::json;

    fn demo() -> Orchestrator {
        let mut config = CommanderConfig::demo();
        config.simulation.realtime = false;
        Orchestrator::new(config).unwrap()
    }

    fn go_to(target: &str, x: f64, y: f64) -> Command {
        Command::new(
            target,
            Action::GoTo {
                destination: Destination::Coordinates(PointSpec::new(x, y)),
                speed: None,
            },
        )
    }

    fn hold(target: &str, duration_s: Option<f64>) -> Command {
        Command::new(target, Action::HoldPosition { duration_s })
    }

    fn run(orchestrator: &mut Orchestrator, ticks: usize) {
        for _ in 0..ticks {
            orchestrator.tick();
        }
    }

    fn events_of(orchestrator: &Orchestrator, kind: EventKind) -> Vec<TimelineEvent> {
        orchestrator.events().filter(|e| e.kind == kind).cloned().collect()
    }

    #[test]
    fn test_task_lifecycle_queued_running_succeeded() {
        let mut orchestrator = demo();
        let result = orchestrator.submit(go_to("ugv3", 15.0, 5.0));
        assert_eq!(result.verdict.verdict, VerdictKind::Approved);
        assert_eq!(result.tasks.len(), 1);
        let task_id = result.tasks[0].id.clone();
        assert_eq!(result.tasks[0].status, TaskStatus::Queued);

        orchestrator.tick();
        assert_eq!(orchestrator.task(&task_id).unwrap().status, TaskStatus::Running);
        assert_eq!(orchestrator.registry().get("ugv3").unwrap().status, PlatformStatus::Moving);

        run(&mut orchestrator, 1_000);
        let task = orchestrator.task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.progress, 1.0);
        assert!(orchestrator.active_task_for("ugv3").is_none());

        let ugv = orchestrator.registry().get("ugv3").unwrap();
        assert_eq!(ugv.status, PlatformStatus::Idle);
        assert!(ugv.position.distance_to(&Vec3::new(15.0, 5.0, 0.0)) <= 0.5);
        assert!(ugv.battery_pct < 100.0);
        assert!(orchestrator.emitter.timeline().verify().is_ok());
    }

    #[test]
    fn test_new_command_supersedes_running_task() {
        let mut orchestrator = demo();
        let first = orchestrator.submit(hold("ugv1", None)).tasks[0].id.clone();
        orchestrator.tick();
        let second = orchestrator.submit(go_to("ugv1", 0.0, 10.0)).tasks[0].id.clone();

        let first_task = orchestrator.task(&first).unwrap();
        assert_eq!(first_task.status, TaskStatus::Cancelled);
        assert_eq!(first_task.cancel_reason.as_deref(), Some("superseded"));
        assert_eq!(orchestrator.active_task_for("ugv1").unwrap().id, second);
    }

    #[test]
    fn test_rejected_command_creates_no_task() {
        let mut orchestrator = demo();
        let result = orchestrator.submit(go_to("ugv2", -15.0, -15.0));
        assert!(result.verdict.is_rejected());
        assert!(result.tasks.is_empty());
        assert_eq!(orchestrator.tasks().count(), 0);

        let violations = events_of(&orchestrator, EventKind::ConstraintViolation);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].platform_id.as_deref(), Some("ugv2"));
        assert_eq!(violations[0].payload.get_str("severity"), Some("rejected"));
    }

    #[test]
    fn test_raw_command_validation_errors() {
        let mut orchestrator = demo();
        let result = orchestrator.submit_raw(&RawCommand::new("dance", "ugv1", json!({})));
        assert!(result.verdict.has_violation(ViolationKind::UnknownAction));

        let result = orchestrator.submit_raw(&RawCommand::new("go_to", "ugv1", json!({"x": 1.0})));
        assert!(result.verdict.has_violation(ViolationKind::InvalidParameter));

        let result = orchestrator.submit_raw(&RawCommand::new("go_to", "ugv1", json!({"x": 1.0, "y": 5.0})));
        assert!(result.verdict.is_approved());
        assert_eq!(orchestrator.command_log().len(), 3);
    }

    #[test]
    fn test_interpretation_commands_and_clarification() {
        let mut orchestrator = demo();
        let interpreted = Interpretation::Commands {
            commands: vec![
                RawCommand::new("go_to", "ugv1", json!({"x": 0.0, "y": 10.0})),
                RawCommand::new("hold_position", "uav_pod", json!({"duration_s": 2.0})),
            ],
            explanation: Some("move out and hold".to_string()),
        };
        let results = orchestrator.apply_interpretation(&interpreted);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tasks.len(), 1);
        assert_eq!(results[1].tasks.len(), 2);
        assert_eq!(orchestrator.command_log().len(), 2);

        let question = Interpretation::Clarification {
            question: "Which ugv?".to_string(),
            options: vec!["ugv1".to_string(), "ugv2".to_string()],
        };
        assert!(orchestrator.apply_interpretation(&question).is_empty());
        assert_eq!(orchestrator.tasks().count(), 3);
        assert_eq!(orchestrator.command_log().len(), 2);
        assert!(orchestrator
            .events()
            .any(|e| e.payload.get_str("message") == Some("clarification requested")));
    }

    #[test]
    fn test_typed_commands_with_bad_parameters_never_reach_controllers() {
        let mut orchestrator = demo();
        let orbit = orchestrator.submit(Command::new(
            "uav1",
            Action::Orbit {
                center: Point2::new(0.0, 20.0),
                radius_m: 0.0,
                altitude_m: 15.0,
                speed: None,
            },
        ));
        assert!(orbit.verdict.has_violation(ViolationKind::InvalidParameter));
        assert!(orbit.tasks.is_empty());

        let reverse = orchestrator.submit(Command::new(
            "ugv3",
            Action::GoTo {
                destination: Destination::Coordinates(PointSpec::new(20.0, 20.0)),
                speed: Some(-3.0),
            },
        ));
        assert!(reverse.verdict.has_violation(ViolationKind::InvalidParameter));
        assert!(reverse.tasks.is_empty());

        let start = orchestrator.registry().get("uav1").unwrap().position;
        run(&mut orchestrator, 50);
        let uav1 = orchestrator.registry().get("uav1").unwrap();
        assert_eq!(uav1.position, start);
        assert!(orchestrator.tasks().next().is_none());
        assert!(orchestrator
            .events()
            .any(|e| e.kind == EventKind::ConstraintViolation && e.payload.get_str("severity") == Some("rejected")));
    }

    #[test]
    fn test_rewritten_command_is_recorded_on_timeline() {
        let mut config = CommanderConfig::demo();
        config.simulation.realtime = false;
        config.constraints.allow_rewrite = true;
        let mut orchestrator = Orchestrator::new(config).unwrap();

        let result = orchestrator.submit(Command::new(
            "ugv2",
            Action::GoTo {
                destination: Destination::Coordinates(PointSpec::new(0.0, 10.0)),
                speed: Some(10.0),
            },
        ));
        assert_eq!(result.verdict.verdict, VerdictKind::Rewritten);
        assert_eq!(result.tasks[0].command.action.speed(), Some(5.0));

        let event = orchestrator
            .events()
            .find(|e| e.kind == EventKind::ConstraintViolation)
            .unwrap();
        assert_eq!(event.payload.get_str("severity"), Some("rewritten"));
        assert_eq!(event.payload.get_str("verdict"), Some("rewritten"));
        assert!(result
            .verdict
            .warnings
            .iter()
            .any(|w| w.contains("exceeds maximum 5 m/s")));
    }

    #[test]
    fn test_stop_succeeds_indefinite_and_cancels_finite() {
        let mut orchestrator = demo();
        let orbit = orchestrator
            .submit(Command::new(
                "uav1",
                Action::Orbit {
                    center: Point2::new(0.0, 20.0),
                    radius_m: 5.0,
                    altitude_m: 15.0,
                    speed: None,
                },
            ))
            .tasks[0]
            .id
            .clone();
        let go = orchestrator.submit(go_to("ugv3", 20.0, 20.0)).tasks[0].id.clone();
        run(&mut orchestrator, 10);

        let result = orchestrator.submit(Command::new("all", Action::Stop));
        assert!(result.verdict.is_approved());
        assert!(result.tasks.is_empty());

        assert_eq!(orchestrator.task(&orbit).unwrap().status, TaskStatus::Succeeded);
        let go_task = orchestrator.task(&go).unwrap();
        assert_eq!(go_task.status, TaskStatus::Cancelled);
        assert_eq!(go_task.cancel_reason.as_deref(), Some("stopped by operator"));
        for platform in orchestrator.registry().iter() {
            assert_eq!(platform.status, PlatformStatus::Idle);
            assert_eq!(platform.velocity, Vec3::ZERO);
        }
    }

    #[test]
    fn test_stop_before_start_cancels() {
        let mut orchestrator = demo();
        let task_id = orchestrator.submit(hold("ugv1", None)).tasks[0].id.clone();
        orchestrator.submit(Command::new("ugv1", Action::Stop));
        assert_eq!(orchestrator.task(&task_id).unwrap().status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_report_status_creates_no_task() {
        let mut orchestrator = demo();
        let busy = orchestrator.submit(hold("ugv1", None)).tasks[0].id.clone();
        orchestrator.tick();

        let result = orchestrator.submit(Command::new("ugv_pod", Action::ReportStatus));
        assert!(result.tasks.is_empty());
        let report = result.report.unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].platform_id, "ugv1");
        assert_eq!(report[0].active_task.as_deref(), Some(busy.as_str()));
        assert_eq!(orchestrator.task(&busy).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn test_report_status_ignores_comms_timeout() {
        let mut orchestrator = demo();
        orchestrator.set_link("uav2", false).unwrap();
        run(&mut orchestrator, 300);

        assert!(orchestrator.submit(hold("uav2", Some(1.0))).verdict.is_rejected());
        let result = orchestrator.submit(Command::new("uav2", Action::ReportStatus));
        assert!(result.verdict.is_approved());
        assert!(!result.report.unwrap()[0].link_up);
    }

    #[test]
    fn test_assign_roles_updates_pods_immediately() {
        let mut orchestrator = demo();
        let mut roles = BTreeMap::new();
        roles.insert("ugv1".to_string(), "scout".to_string());
        let result = orchestrator.submit(Command::new(
            "alpha",
            Action::AssignRoles {
                members: vec!["ugv2".into(), "ugv1".into()],
                leader: Some("ugv1".into()),
                roles,
            },
        ));
        assert!(result.verdict.is_approved());
        assert!(result.tasks.is_empty());

        let pod = orchestrator.pods().get("alpha").unwrap();
        assert_eq!(pod.members, vec!["ugv1".to_string(), "ugv2".to_string()]);
        assert_eq!(pod.leader.as_deref(), Some("ugv1"));

        let hold_pod = orchestrator.submit(hold("alpha", Some(1.0)));
        assert_eq!(hold_pod.tasks.len(), 2);
        let group = hold_pod.tasks[0].group_id.clone();
        assert!(group.is_some());
        assert_eq!(hold_pod.tasks[1].group_id, group);
    }

    #[test]
    fn test_cancel_group_cancels_every_member() {
        let mut orchestrator = demo();
        let result = orchestrator.submit(hold("uav_pod", None));
        assert_eq!(result.tasks.len(), 2);
        let group = result.tasks[0].group_id.clone().unwrap();
        orchestrator.tick();

        let cancelled = orchestrator.cancel_group(&group, "operator abort").unwrap();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled.iter().all(|t| t.status == TaskStatus::Cancelled));
        assert!(orchestrator.cancel_group("grp_999999", "x").is_err());
    }

    #[test]
    fn test_cancel_terminal_task_is_an_error() {
        let mut orchestrator = demo();
        let task_id = orchestrator.submit(hold("ugv1", Some(0.1))).tasks[0].id.clone();
        run(&mut orchestrator, 10);
        assert_eq!(orchestrator.task(&task_id).unwrap().status, TaskStatus::Succeeded);
        assert!(matches!(
            orchestrator.cancel_task(&task_id, "late"),
            Err(OrchestratorError::Transition(_))
        ));
        assert!(matches!(
            orchestrator.cancel_task("task_999999", "x"),
            Err(OrchestratorError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_health_fault_fails_running_task() {
        let mut orchestrator = demo();
        let task_id = orchestrator.submit(go_to("ugv3", 20.0, 20.0)).tasks[0].id.clone();
        run(&mut orchestrator, 5);
        orchestrator.set_health("ugv3", false).unwrap();
        orchestrator.tick();

        let task = orchestrator.task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("platform health fault"));
        assert_eq!(orchestrator.registry().get("ugv3").unwrap().status, PlatformStatus::Error);
    }

    #[test]
    fn test_comms_loss_fails_task_and_goes_offline() {
        let mut orchestrator = demo();
        let task_id = orchestrator.submit(hold("uav1", None)).tasks[0].id.clone();
        orchestrator.tick();
        orchestrator.set_link("uav1", false).unwrap();
        // 5 s timeout at 50 Hz
        run(&mut orchestrator, 252);

        let task = orchestrator.task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().starts_with("comms timeout"));
        assert_eq!(orchestrator.registry().get("uav1").unwrap().status, PlatformStatus::Offline);

        orchestrator.set_link("uav1", true).unwrap();
        assert_eq!(orchestrator.registry().get("uav1").unwrap().status, PlatformStatus::Idle);
    }

    #[test]
    fn test_battery_depletion_fails_task() {
        let mut config = CommanderConfig::demo();
        config.simulation.battery_drain_per_m = 10.0;
        let mut orchestrator = Orchestrator::new(config).unwrap();
        let task_id = orchestrator.submit(go_to("ugv3", 40.0, 0.0)).tasks[0].id.clone();
        run(&mut orchestrator, 200);

        let task = orchestrator.task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("battery depleted"));
        assert_eq!(orchestrator.registry().get("ugv3").unwrap().battery_pct, 0.0);
    }

    #[test]
    fn test_destination_occupied_fails_go_to() {
        let mut orchestrator = demo();
        // ugv1 heads for (20, 0); ugv3 then parks next to that spot.
        let task_id = orchestrator.submit(go_to("ugv1", 20.0, 0.0)).tasks[0].id.clone();
        assert!(orchestrator.submit(go_to("ugv3", 21.0, 0.0)).verdict.is_approved());
        run(&mut orchestrator, 400);

        let task = orchestrator.task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("destination occupied by 'ugv3'"));
    }

    #[test]
    fn test_follow_leader_sets_link_and_clears_on_end() {
        let mut orchestrator = demo();
        let result = orchestrator.submit(Command::new(
            "ugv2",
            Action::FollowLeader {
                leader: "ugv1".into(),
                gap_m: 3.0,
            },
        ));
        assert!(result.verdict.is_approved());
        assert_eq!(orchestrator.pods().follow_link("ugv2").unwrap().leader, "ugv1");

        // ugv1 following ugv2 would close a loop.
        let cyclic = orchestrator.submit(Command::new(
            "ugv1",
            Action::FollowLeader {
                leader: "ugv2".into(),
                gap_m: 3.0,
            },
        ));
        assert!(cyclic.verdict.is_rejected());

        orchestrator.submit(Command::new("ugv2", Action::Stop));
        assert!(orchestrator.pods().follow_link("ugv2").is_none());
    }

    #[test]
    fn test_formation_forms_pod_and_tracks_leader() {
        let mut orchestrator = demo();
        let result = orchestrator.submit(Command::new(
            "ugv_pod",
            Action::FormFormation {
                formation: FormationType::Column,
                spacing_m: 3.0,
                leader: Some("ugv1".into()),
            },
        ));
        assert!(result.verdict.is_approved(), "{:?}", result.verdict);
        assert_eq!(result.tasks.len(), 3);
        assert_eq!(orchestrator.pods().get("ugv_pod").unwrap().leader.as_deref(), Some("ugv1"));

        run(&mut orchestrator, 1_500);
        let ugv2 = orchestrator.registry().get("ugv2").unwrap().position;
        let ugv3 = orchestrator.registry().get("ugv3").unwrap().position;
        assert!(ugv2.distance_to(&Vec3::new(-3.0, 0.0, 0.0)) <= 0.5, "{ugv2:?}");
        assert!(ugv3.distance_to(&Vec3::new(-6.0, 0.0, 0.0)) <= 0.5, "{ugv3:?}");
        assert!(result.tasks.iter().all(|t| orchestrator.task(&t.id).unwrap().status == TaskStatus::Running));
    }

    #[test]
    fn test_pose_deltas_follow_cadence() {
        let mut orchestrator = demo();
        let (tx, mut rx) = tokio::sync::broadcast::channel(64);
        orchestrator.add_sink(Box::new(crate::emitter::BroadcastSink::new(tx)));

        run(&mut orchestrator, 5);
        let mut poses = 0;
        while let Ok(msg) = rx.try_recv() {
            if let crate::emitter::FeedMessage::Poses { tick, poses: p, .. } = msg {
                assert_eq!(tick, 5);
                assert_eq!(p.len(), 5);
                poses += 1;
            }
        }
        assert_eq!(poses, 1);

        // Nothing moved: no second delta.
        run(&mut orchestrator, 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sim_time_is_fixed_step() {
        let mut orchestrator = demo();
        run(&mut orchestrator, 75);
        assert_eq!(orchestrator.tick_count(), 75);
        assert_eq!(orchestrator.now_ms(), 1_500);
        assert_eq!(orchestrator.snapshot().sim_time_ms, 1_500);
    }
}
