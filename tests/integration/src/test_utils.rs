//! Fixtures shared by the integration scenarios

use commander_core::{logging, EventKind};
use commander_domain::{Action, Command, Destination, PointSpec, TaskStatus};
use commander_orchestrator::{CommanderConfig, Orchestrator};

/// Demo fleet: ugv1 (0,0,0), ugv2 (5,0,0), ugv3 (10,0,0), uav1 (0,0,15),
/// uav2 (5,0,20), restricted zone R1, 50 Hz.
pub fn demo_engine() -> Orchestrator {
    engine_with(|_| {})
}

pub fn engine_with(adjust: impl FnOnce(&mut CommanderConfig)) -> Orchestrator {
    logging::init();
    let mut config = CommanderConfig::demo();
    config.simulation.realtime = false;
    adjust(&mut config);
    Orchestrator::new(config).expect("demo config is valid")
}

pub fn go_to(target: &str, x: f64, y: f64) -> Command {
    go_to_at(target, x, y, None)
}

pub fn go_to_at(target: &str, x: f64, y: f64, speed: Option<f64>) -> Command {
    Command::new(
        target,
        Action::GoTo {
            destination: Destination::Coordinates(PointSpec::new(x, y)),
            speed,
        },
    )
}

pub fn hold(target: &str, duration_s: Option<f64>) -> Command {
    Command::new(target, Action::HoldPosition { duration_s })
}

/// Tick until `task_id` reaches a terminal state or `max_ticks` elapse.
/// Returns the terminal status, if reached.
pub fn run_to_completion(orchestrator: &mut Orchestrator, task_id: &str, max_ticks: u64) -> Option<TaskStatus> {
    for _ in 0..max_ticks {
        orchestrator.tick();
        if let Some(task) = orchestrator.task(task_id) {
            if task.status.is_terminal() {
                return Some(task.status);
            }
        }
    }
    None
}

/// Timeline events of `kind` for `task_id`, with their timestamps.
pub fn task_events(orchestrator: &Orchestrator, task_id: &str, kind: EventKind) -> Vec<u64> {
    orchestrator
        .events()
        .filter(|e| e.kind == kind && e.task_id.as_deref() == Some(task_id))
        .map(|e| e.timestamp_ms)
        .collect()
}
