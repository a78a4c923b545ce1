//! Simulation Clock
//!
//! Drives the orchestrator at a fixed Δt. In realtime mode ticks are paced by
//! a wall-clock interval; otherwise they run back to back. Either way the
//! simulated time only depends on the tick count.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::handle::OrchestratorHandle;

#[derive(Debug, Clone)]
pub struct SimulationClock {
    handle: OrchestratorHandle,
    period: Duration,
    realtime: bool,
}

impl SimulationClock {
    pub fn new(handle: OrchestratorHandle, config: &SimulationConfig) -> Self {
        Self {
            handle,
            period: Duration::from_secs_f64(config.dt()),
            realtime: config.realtime,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    /// Advance exactly `n` ticks without pacing. Returns the tick count.
    pub async fn step(&self, n: u64) -> u64 {
        let mut tick = self.handle.with(|o| o.tick_count()).await;
        for _ in 0..n {
            tick = self.handle.tick().await;
        }
        tick
    }

    /// Tick until shutdown is signalled or `max_ticks` more ticks have run.
    /// Returns the tick count at exit.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>, max_ticks: Option<u64>) -> u64 {
        info!(
            period_ms = self.period.as_secs_f64() * 1000.0,
            realtime = self.realtime,
            "Simulation clock started"
        );
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ran = 0u64;
        let mut tick = self.handle.with(|o| o.tick_count()).await;
        loop {
            if max_ticks.map_or(false, |max| ran >= max) {
                break;
            }
            if self.realtime {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.recv() => {
                        debug!("Simulation clock received shutdown");
                        break;
                    }
                }
            } else {
                match shutdown_rx.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => break,
                }
                tokio::task::yield_now().await;
            }
            tick = self.handle.tick().await;
            ran += 1;
        }

        info!(tick, "Simulation clock stopped");
        tick
    }
}
