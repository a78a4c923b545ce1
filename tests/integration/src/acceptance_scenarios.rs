//! Acceptance scenarios against the demo fleet
//!
//! # Scenarios
//!
//! 1. **Speed limit**: over-limit speed is rejected with the limit as a
//!    suggestion, or clamped when rewriting is enabled
//! 2. **Restricted zone**: a destination inside R1 is rejected; a clear
//!    alternative is approved and completes
//! 3. **Path crossing**: a leg through R1 is rejected even when both ends
//!    are clear
//! 4. **Separation**: a destination 1.0m from ugv2 is rejected (or warned)
//!    citing ugv2 and the deficit
//! 5. **Idempotent hold**: two identical holds produce one success
//! 6. **Exclusive tasks**: never more than one running task per platform
//! 7. **World box**: approved motion never leaves the configured bounds

use std::collections::BTreeMap;

use commander_constraints::{SeparationPolicy, VerdictKind, ViolationKind};
use commander_core::EventKind;
use commander_domain::{Action, Command, Point2, TaskStatus};
use commander_orchestrator::Orchestrator;
use proptest::prelude::*;

use crate::test_utils::{demo_engine, engine_with, go_to, go_to_at, hold, run_to_completion, task_events};

#[test]
fn over_limit_speed_is_rejected_with_suggestion() {
    let mut engine = demo_engine();
    let result = engine.submit(go_to_at("ugv2", 10.0, 0.0, Some(10.0)));

    assert_eq!(result.verdict.verdict, VerdictKind::Rejected);
    assert!(result
        .verdict
        .violations
        .iter()
        .any(|v| v.message == "Requested speed 10 m/s exceeds maximum 5 m/s for ugv"));
    assert!(result.verdict.suggestions.contains(&"speed ≤ 5.0".to_string()));
    assert!(result.tasks.is_empty());
    assert!(engine.active_task_for("ugv2").is_none());
}

#[test]
fn over_limit_speed_is_clamped_when_rewriting() {
    let mut engine = engine_with(|c| c.constraints.allow_rewrite = true);
    let result = engine.submit(go_to_at("ugv2", 0.0, 10.0, Some(10.0)));

    assert_eq!(result.verdict.verdict, VerdictKind::Rewritten);
    assert_eq!(result.tasks.len(), 1);
    assert_eq!(result.tasks[0].command.action.speed(), Some(5.0));

    let task_id = result.tasks[0].id.clone();
    assert_eq!(run_to_completion(&mut engine, &task_id, 1_000), Some(TaskStatus::Succeeded));
}

#[test]
fn restricted_zone_then_clear_alternative() {
    let mut engine = demo_engine();

    let rejected = engine.submit(go_to("ugv2", -15.0, -15.0));
    assert_eq!(rejected.verdict.verdict, VerdictKind::Rejected);
    assert!(rejected
        .verdict
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::NoGo && v.message.contains("R1")));
    assert!(!rejected.verdict.suggestions.is_empty());

    let approved = engine.submit(go_to("ugv2", -25.0, -5.0));
    assert_eq!(approved.verdict.verdict, VerdictKind::Approved);
    assert_eq!(approved.tasks.len(), 1);
    let task_id = approved.tasks[0].id.clone();

    assert_eq!(run_to_completion(&mut engine, &task_id, 2_000), Some(TaskStatus::Succeeded));
    let ugv2 = engine.registry().get("ugv2").unwrap();
    assert!((ugv2.position.x + 25.0).abs() <= 0.5);
    assert!((ugv2.position.y + 5.0).abs() <= 0.5);
    assert_eq!(task_events(&engine, &task_id, EventKind::TaskSucceeded).len(), 1);
}

#[test]
fn path_crossing_restricted_zone_is_rejected() {
    let mut engine = demo_engine();
    // Both ends are clear of R1; the diagonal passes through it.
    let result = engine.submit(go_to("ugv1", -30.0, -30.0));

    assert_eq!(result.verdict.verdict, VerdictKind::Rejected);
    assert!(result
        .verdict
        .violations
        .iter()
        .any(|v| v.message.contains("crosses restricted zone 'R1'")));
    assert!(result
        .verdict
        .suggestions
        .iter()
        .any(|s| s.starts_with("Route around 'R1'")));
}

#[test]
fn separation_deficit_cites_platform() {
    let mut engine = demo_engine();
    let result = engine.submit(go_to("ugv1", 6.0, 0.0));

    assert_eq!(result.verdict.verdict, VerdictKind::Rejected);
    let violation = result
        .verdict
        .violations
        .iter()
        .find(|v| v.kind == ViolationKind::Separation)
        .unwrap();
    assert_eq!(violation.platform_id.as_deref(), Some("ugv2"));
    assert!(violation.message.contains("platform 'ugv2'"));
    assert!(violation.message.contains("deficit 1.0m"));
}

#[test]
fn separation_warns_under_warn_policy() {
    let mut engine = engine_with(|c| c.constraints.separation_policy = SeparationPolicy::Warn);
    let result = engine.submit(go_to("ugv1", 6.0, 0.0));

    assert_eq!(result.verdict.verdict, VerdictKind::Approved);
    assert_eq!(result.tasks.len(), 1);
    assert!(result.verdict.warnings.iter().any(|w| w.contains("deficit 1.0m")));
    assert!(engine
        .events()
        .any(|e| e.kind == EventKind::ConstraintViolation && e.payload.get_str("severity") == Some("warning")));
}

#[test]
fn repeated_hold_yields_one_success() {
    let mut engine = demo_engine();
    let first = engine.submit(hold("ugv1", Some(1.0))).tasks[0].id.clone();
    let second = engine.submit(hold("ugv1", Some(1.0))).tasks[0].id.clone();

    let first_task = engine.task(&first).unwrap();
    assert_eq!(first_task.status, TaskStatus::Cancelled);
    assert_eq!(first_task.cancel_reason.as_deref(), Some("superseded"));

    engine.tick();
    let running: Vec<_> = engine.tasks().filter(|t| t.status == TaskStatus::Running).collect();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, second);

    assert_eq!(run_to_completion(&mut engine, &second, 200), Some(TaskStatus::Succeeded));
    let successes: Vec<u64> = engine
        .events()
        .filter(|e| e.kind == EventKind::TaskSucceeded)
        .map(|e| e.timestamp_ms)
        .collect();
    assert_eq!(successes.len(), 1);
    assert!(successes[0] >= 1_000);
    assert!(task_events(&engine, &first, EventKind::TaskStarted).is_empty());
}

fn running_per_platform(engine: &Orchestrator) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for task in engine.tasks().filter(|t| t.status == TaskStatus::Running) {
        *counts.entry(task.platform_id.clone()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn busy_platform_never_runs_two_tasks() {
    let mut engine = demo_engine();
    let commands = [
        (0, go_to("ugv3", 20.0, 10.0)),
        (3, hold("ugv3", None)),
        (3, hold("ugv_pod", Some(2.0))),
        (10, go_to("ugv3", 15.0, -5.0)),
        (
            12,
            Command::new(
                "uav_pod",
                Action::Orbit {
                    center: Point2::new(0.0, 25.0),
                    radius_m: 6.0,
                    altitude_m: 18.0,
                    speed: None,
                },
            ),
        ),
        (20, go_to("uav1", 10.0, 10.0)),
        (25, Command::new("all", Action::Stop)),
    ];

    let mut pending = commands.into_iter().peekable();
    for tick in 0..60u64 {
        while let Some((_, command)) = pending.next_if(|(at, _)| *at == tick) {
            let result = engine.submit(command);
            assert!(!result.verdict.is_rejected(), "{}", result.verdict.summary());
        }
        engine.tick();
        for (platform, count) in running_per_platform(&engine) {
            assert!(count <= 1, "{platform} has {count} running tasks at tick {tick}");
        }
    }

    // Every task from before the stop ended; nothing is left running.
    assert!(engine.tasks().all(|t| t.status.is_terminal()));
    assert!(engine
        .tasks()
        .filter(|t| t.status == TaskStatus::Cancelled)
        .any(|t| t.cancel_reason.as_deref() == Some("superseded")));
}

#[derive(Debug, Clone)]
enum Motion {
    GoTo(f64, f64),
    Hold(f64),
    Orbit(f64, f64, f64, f64),
}

fn motion() -> impl Strategy<Value = Motion> {
    prop_oneof![
        (-70.0f64..70.0, -70.0f64..70.0).prop_map(|(x, y)| Motion::GoTo(x, y)),
        (0.1f64..3.0).prop_map(Motion::Hold),
        (-60.0f64..60.0, -60.0f64..60.0, 2.0f64..20.0, 1.0f64..35.0)
            .prop_map(|(x, y, r, z)| Motion::Orbit(x, y, r, z)),
    ]
}

fn command_for(target: &str, motion: &Motion) -> Command {
    match *motion {
        Motion::GoTo(x, y) => go_to(target, x, y),
        Motion::Hold(d) => hold(target, Some(d)),
        Motion::Orbit(x, y, radius_m, altitude_m) => Command::new(
            target,
            Action::Orbit {
                center: Point2::new(x, y),
                radius_m,
                altitude_m,
                speed: None,
            },
        ),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn approved_motion_stays_in_world_box(
        plan in prop::collection::vec((0usize..5, motion(), 0u64..40), 1..6)
    ) {
        const PLATFORMS: [&str; 5] = ["ugv1", "ugv2", "ugv3", "uav1", "uav2"];
        let mut engine = demo_engine();
        let bounds = engine.constraints_config().world_bounds;

        let mut plan = plan;
        plan.sort_by_key(|(_, _, at)| *at);
        let mut pending = plan.into_iter().peekable();
        for tick in 0..300u64 {
            while let Some((idx, motion, _)) = pending.next_if(|(_, _, at)| *at == tick) {
                engine.submit(command_for(PLATFORMS[idx], &motion));
            }
            engine.tick();
            for platform in engine.registry().iter() {
                prop_assert!(
                    bounds.contains(platform.position),
                    "{} left the world box at {:?}",
                    platform.id,
                    platform.position
                );
            }
        }
    }
}
