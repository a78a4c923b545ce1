//! Shared async access to one orchestrator.
//!
//! Command submission and ticking serialize on a single mutex, so a command
//! observes the fleet either before or after a tick, never halfway through.

use std::sync::Arc;

use commander_constraints::ConstraintsConfig;
use commander_domain::{Command, Interpretation, RawCommand, Task};
use tokio::sync::{broadcast, Mutex};

use crate::emitter::{BroadcastSink, FeedMessage};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, SubmitResult};
use crate::snapshot::Snapshot;

#[derive(Clone)]
pub struct OrchestratorHandle {
    inner: Arc<Mutex<Orchestrator>>,
    feed: broadcast::Sender<FeedMessage>,
    constraints: Arc<ConstraintsConfig>,
}

impl OrchestratorHandle {
    /// Wrap `orchestrator`, wiring its events and pose deltas to a
    /// broadcast feed.
    pub fn new(mut orchestrator: Orchestrator) -> Self {
        let (feed, _) = broadcast::channel(orchestrator.config().simulation.feed_capacity);
        orchestrator.add_sink(Box::new(BroadcastSink::new(feed.clone())));
        let constraints = orchestrator.constraints_config();
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
            feed,
            constraints,
        }
    }

    /// Live event and pose feed. Slow subscribers lag and skip messages.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedMessage> {
        self.feed.subscribe()
    }

    pub fn constraints_config(&self) -> Arc<ConstraintsConfig> {
        Arc::clone(&self.constraints)
    }

    pub async fn submit(&self, command: Command) -> SubmitResult {
        self.inner.lock().await.submit(command)
    }

    pub async fn submit_raw(&self, raw: RawCommand) -> SubmitResult {
        self.inner.lock().await.submit_raw(&raw)
    }

    pub async fn apply_interpretation(&self, interpretation: &Interpretation) -> Vec<SubmitResult> {
        self.inner.lock().await.apply_interpretation(interpretation)
    }

    pub async fn cancel_task(&self, task_id: &str, reason: &str) -> Result<Task> {
        self.inner.lock().await.cancel_task(task_id, reason)
    }

    pub async fn cancel_group(&self, group_id: &str, reason: &str) -> Result<Vec<Task>> {
        self.inner.lock().await.cancel_group(group_id, reason)
    }

    pub async fn set_link(&self, platform_id: &str, up: bool) -> Result<()> {
        self.inner.lock().await.set_link(platform_id, up)
    }

    pub async fn set_health(&self, platform_id: &str, ok: bool) -> Result<()> {
        self.inner.lock().await.set_health(platform_id, ok)
    }

    /// Advance one tick. Returns the tick count afterwards.
    pub async fn tick(&self) -> u64 {
        let mut orchestrator = self.inner.lock().await;
        orchestrator.tick();
        orchestrator.tick_count()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.lock().await.snapshot()
    }

    /// Run `f` with exclusive access.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Orchestrator) -> R) -> R {
        let mut orchestrator = self.inner.lock().await;
        f(&mut orchestrator)
    }
}

impl std::fmt::Debug for OrchestratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorHandle")
            .field("subscribers", &self.feed.receiver_count())
            .finish_non_exhaustive()
    }
}
