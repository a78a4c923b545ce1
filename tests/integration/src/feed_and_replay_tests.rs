//! Feed, snapshot and replay behaviour through the async handle

use commander_core::{verify_chain, EventKind};
use commander_domain::{PlatformStatus, RawCommand, TaskStatus};
use commander_orchestrator::{replay, CommanderConfig, FeedMessage, OrchestratorHandle};
use serde_json::json;

use crate::test_utils::{demo_engine, go_to, hold};

fn handle() -> OrchestratorHandle {
    OrchestratorHandle::new(demo_engine())
}

#[tokio::test]
async fn feed_orders_lifecycle_events_and_paces_poses() {
    let handle = handle();
    let mut feed = handle.subscribe();

    let result = handle.submit(go_to("ugv3", 20.0, 5.0)).await;
    let task_id = result.tasks[0].id.clone();
    for _ in 0..12 {
        handle.tick().await;
    }

    let mut events = Vec::new();
    let mut pose_ticks = Vec::new();
    while let Ok(message) = feed.try_recv() {
        match message {
            FeedMessage::Event(event) => events.push(event),
            FeedMessage::Poses { tick, poses, .. } => {
                assert!(!poses.is_empty());
                pose_ticks.push(tick);
            }
        }
    }

    assert_eq!(pose_ticks, vec![5, 10]);
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    let lifecycle: Vec<EventKind> = events
        .iter()
        .filter(|e| e.task_id.as_deref() == Some(task_id.as_str()))
        .map(|e| e.kind)
        .collect();
    assert_eq!(lifecycle, vec![EventKind::TaskCreated, EventKind::TaskStarted]);
}

#[tokio::test]
async fn snapshot_reflects_completed_tick() {
    let handle = handle();
    handle.submit(go_to("ugv1", 0.0, 10.0)).await;
    for _ in 0..25 {
        handle.tick().await;
    }

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.tick, 25);
    assert_eq!(snapshot.sim_time_ms, 500);
    let ugv1 = snapshot.platform("ugv1").unwrap();
    assert_eq!(ugv1.status, PlatformStatus::Moving);
    assert!(ugv1.position.y > 0.0);
    assert_eq!(snapshot.active_tasks().count(), 1);
    assert!(verify_chain(snapshot.recent_events.iter()).is_ok());
}

#[tokio::test]
async fn cancellation_detaches_controller_immediately() {
    let handle = handle();
    let task_id = handle.submit(go_to("ugv2", 5.0, 30.0)).await.tasks[0].id.clone();
    for _ in 0..20 {
        handle.tick().await;
    }

    let cancelled = handle.cancel_task(&task_id, "operator abort").await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("operator abort"));

    let parked = handle.snapshot().await.platform("ugv2").unwrap().position;
    for _ in 0..20 {
        handle.tick().await;
    }
    let snapshot = handle.snapshot().await;
    let ugv2 = snapshot.platform("ugv2").unwrap();
    assert_eq!(ugv2.position, parked);
    assert_eq!(ugv2.status, PlatformStatus::Idle);
}

#[tokio::test]
async fn constraints_config_is_readable_for_map_rendering() {
    let handle = handle();
    let config = handle.constraints_config();
    assert_eq!(config.no_go_zones.len(), 1);
    assert_eq!(config.no_go_zones[0].name, "R1");
    assert_eq!(config.world_bounds.x_min, -50.0);
    assert_eq!(config.min_separation_m, 2.0);
}

#[tokio::test]
async fn recorded_session_replays_identically() {
    let handle = handle();
    handle.submit(go_to("ugv2", -15.0, -15.0)).await;
    handle.submit(go_to("ugv2", -25.0, -5.0)).await;
    for _ in 0..40 {
        handle.tick().await;
    }
    handle.submit(hold("uav_pod", Some(2.0))).await;
    handle
        .submit_raw(RawCommand::new("point_laser", "uav1", json!({"target_x": 10.0, "target_y": 10.0})))
        .await;
    handle.submit_raw(RawCommand::new("barrel_roll", "uav2", json!({}))).await;
    for _ in 0..30 {
        handle.tick().await;
    }
    handle.set_health("ugv2", false).await.unwrap();
    for _ in 0..130 {
        handle.tick().await;
    }

    let (live, log) = handle.with(|o| (o.outcome(), o.command_log().clone())).await;
    assert_eq!(live.ticks, 200);
    assert!(live
        .task_states
        .iter()
        .any(|(_, status)| *status == TaskStatus::Failed));

    let replayed = replay(&CommanderConfig::demo(), &log, 200).unwrap();
    assert_eq!(replayed.verdicts, live.verdicts);
    assert_eq!(replayed.task_states, live.task_states);
    assert_eq!(replayed.digest, live.digest);
}
