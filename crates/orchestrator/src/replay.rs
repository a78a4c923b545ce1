//! Command log and deterministic replay.
//!
//! Every input that changes engine state is recorded with the tick at which
//! it was applied. Replaying the log against a fresh engine with the same Δt
//! reproduces the same verdicts and terminal task states.

use commander_constraints::VerdictKind;
use commander_domain::{Command, RawCommand, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CommanderConfig;
use crate::error::Result;
use crate::orchestrator::Orchestrator;

/// Operator input that mutates engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum CommandInput {
    Command { command: Command },
    Raw { raw: RawCommand },
    CancelTask { task_id: String, reason: String },
    CancelGroup { group_id: String, reason: String },
    SetLink { platform_id: String, up: bool },
    SetHealth { platform_id: String, ok: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCommand {
    /// Ticks completed when the input was applied
    pub tick: u64,
    pub input: CommandInput,
    /// Verdict for command inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandLog {
    pub entries: Vec<RecordedCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: u64, input: CommandInput, verdict: Option<VerdictKind>) {
        self.entries.push(RecordedCommand { tick, input, verdict });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verdicts(&self) -> Vec<VerdictKind> {
        self.entries.iter().filter_map(|e| e.verdict).collect()
    }

    pub fn last_tick(&self) -> u64 {
        self.entries.iter().map(|e| e.tick).max().unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Verdicts in submission order and final task states in task-id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub ticks: u64,
    pub verdicts: Vec<VerdictKind>,
    pub task_states: Vec<(String, TaskStatus)>,
    /// BLAKE3 over the verdicts and task states (hex)
    pub digest: String,
}

impl ReplayOutcome {
    pub fn new(ticks: u64, verdicts: Vec<VerdictKind>, task_states: Vec<(String, TaskStatus)>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for verdict in &verdicts {
            hasher.update(verdict.as_str().as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(&[0xff]);
        for (task_id, status) in &task_states {
            hasher.update(task_id.as_bytes());
            hasher.update(&[0]);
            hasher.update(status.as_str().as_bytes());
            hasher.update(&[0]);
        }
        Self {
            ticks,
            verdicts,
            task_states,
            digest: hex::encode(hasher.finalize().as_bytes()),
        }
    }
}

/// Run `log` against a fresh engine for `max_ticks` ticks (or until the last
/// recorded input, if later).
pub fn replay(config: &CommanderConfig, log: &CommandLog, max_ticks: u64) -> Result<ReplayOutcome> {
    let mut orchestrator = Orchestrator::new(config.clone())?;
    let ticks = max_ticks.max(log.last_tick());

    let mut entries: Vec<&RecordedCommand> = log.entries.iter().collect();
    entries.sort_by_key(|e| e.tick);
    let mut pending = entries.into_iter().peekable();

    for tick in 0..=ticks {
        while let Some(entry) = pending.next_if(|e| e.tick == tick) {
            orchestrator.apply_input(entry.input.clone());
        }
        if tick < ticks {
            orchestrator.tick();
        }
    }

    let outcome = orchestrator.outcome();
    info!(ticks, inputs = log.len(), digest = %outcome.digest, "Replay finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commander_domain::{Action, Command, Destination, PointSpec, RawCommand};
    use proptest::prelude::*;
    use serde_json::json;

    const PLATFORMS: [&str; 5] = ["ugv1", "ugv2", "ugv3", "uav1", "uav2"];

    fn command_for(choice: u8, target: &str, x: f64, y: f64) -> Command {
        let action = match choice % 4 {
            0 => Action::GoTo {
                destination: Destination::Coordinates(PointSpec::new(x, y)),
                speed: None,
            },
            1 => Action::HoldPosition { duration_s: Some(0.5) },
            2 => Action::ReturnHome,
            _ => Action::Stop,
        };
        Command::new(target, action)
    }

    /// Drive a live engine through `schedule` and return its log and outcome.
    fn live_run(schedule: &[(u64, usize, u8, f64, f64)], ticks: u64) -> (CommandLog, ReplayOutcome) {
        let mut orchestrator = Orchestrator::new(CommanderConfig::demo()).unwrap();
        let mut schedule = schedule.to_vec();
        schedule.sort_by_key(|s| s.0);
        let mut pending = schedule.into_iter().peekable();
        for tick in 0..=ticks {
            while let Some((_, idx, choice, x, y)) = pending.next_if(|s| s.0 == tick) {
                orchestrator.submit(command_for(choice, PLATFORMS[idx], x, y));
            }
            if tick < ticks {
                orchestrator.tick();
            }
        }
        (orchestrator.command_log().clone(), orchestrator.outcome())
    }

    #[test]
    fn test_replay_reproduces_live_run() {
        let mut orchestrator = Orchestrator::new(CommanderConfig::demo()).unwrap();
        orchestrator.submit(command_for(0, "ugv2", -25.0, -5.0));
        orchestrator.submit(command_for(0, "ugv1", -15.0, -15.0));
        for _ in 0..30 {
            orchestrator.tick();
        }
        orchestrator.submit_raw(&RawCommand::new("hold_position", "uav_pod", json!({"duration_s": 1.0})));
        orchestrator.set_link("ugv3", false).unwrap();
        for _ in 0..100 {
            orchestrator.tick();
        }

        let live = orchestrator.outcome();
        let log = CommandLog::from_json(&orchestrator.command_log().to_json().unwrap()).unwrap();
        let replayed = replay(&CommanderConfig::demo(), &log, 130).unwrap();
        assert_eq!(replayed, live);
        assert_eq!(
            replayed.verdicts,
            vec![VerdictKind::Approved, VerdictKind::Rejected, VerdictKind::Approved]
        );
    }

    #[test]
    fn test_digest_depends_on_task_states() {
        let a = ReplayOutcome::new(1, vec![VerdictKind::Approved], vec![("task_000001".into(), TaskStatus::Running)]);
        let b = ReplayOutcome::new(1, vec![VerdictKind::Approved], vec![("task_000001".into(), TaskStatus::Failed)]);
        assert_ne!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn replay_is_deterministic(
            schedule in prop::collection::vec(
                (0u64..60, 0usize..PLATFORMS.len(), any::<u8>(), -40.0f64..40.0, -40.0f64..40.0),
                1..8,
            )
        ) {
            let (log, live) = live_run(&schedule, 80);
            let replayed = replay(&CommanderConfig::demo(), &log, 80).unwrap();
            prop_assert_eq!(replayed, live);
        }
    }
}
