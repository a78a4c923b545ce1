use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use commander_core::logging;
use commander_domain::RawCommand;
use commander_orchestrator::{CommanderConfig, FeedMessage, Orchestrator, OrchestratorHandle, SimulationClock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

/// Seconds of simulated time to keep running after the last scripted command
const SCRIPT_TAIL_S: f64 = 30.0;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

/// One scripted command, issued once `tick` ticks have completed.
#[derive(Debug, Clone, Deserialize)]
struct ScriptEntry {
    #[serde(default)]
    tick: u64,
    #[serde(alias = "command")]
    action: String,
    target: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

impl ScriptEntry {
    fn raw(&self) -> RawCommand {
        RawCommand {
            action: self.action.clone(),
            target: self.target.clone(),
            params: self.params.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct NodeOptions {
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    record: Option<PathBuf>,
    ticks: Option<u64>,
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let options = parse_options(&args)?;
    let config = match &options.config {
        Some(path) => CommanderConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CommanderConfig::demo(),
    };
    if options.json_logs {
        logging::init_json();
    } else {
        logging::init_from_config(&config.logging);
    }

    let script = match &options.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };

    let simulation = config.simulation.clone();
    let handle = OrchestratorHandle::new(Orchestrator::new(config)?);
    let feed = spawn_feed_logger(handle.subscribe());
    let clock = SimulationClock::new(handle.clone(), &simulation);
    info!(
        tick_hz = simulation.tick_hz,
        realtime = simulation.realtime,
        scripted = script.len(),
        "commander-node started"
    );

    if script.is_empty() {
        run_until_shutdown(&clock, options.ticks).await?;
    } else {
        let last = script.iter().map(|e| e.tick).max().unwrap_or(0);
        let total = options
            .ticks
            .unwrap_or(last + (SCRIPT_TAIL_S * simulation.tick_hz).round() as u64);
        play_script(&handle, &clock, script, total).await;
    }

    if let Some(path) = &options.record {
        let log = handle.with(|o| o.command_log().to_json()).await?;
        std::fs::write(path, log).with_context(|| format!("writing command log to {}", path.display()))?;
        info!(path = %path.display(), "Command log written");
    }

    let snapshot = handle.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    feed.abort();
    Ok(())
}

fn parse_options(args: &[String]) -> anyhow::Result<NodeOptions> {
    let mut options = NodeOptions::default();
    let mut args_iter = args.iter().skip(1);
    while let Some(arg) = args_iter.next() {
        let mut value = |flag: &str| {
            args_iter
                .next()
                .cloned()
                .with_context(|| format!("{flag} was provided without a value"))
        };
        match arg.as_str() {
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--script" => options.script = Some(PathBuf::from(value("--script")?)),
            "--record" => options.record = Some(PathBuf::from(value("--record")?)),
            "--ticks" => {
                let raw = value("--ticks")?;
                options.ticks = Some(raw.parse().with_context(|| format!("--ticks expects a count, got '{raw}'"))?);
            }
            "--json-logs" => options.json_logs = true,
            other => bail!("unrecognised argument '{other}'"),
        }
    }
    Ok(options)
}

fn load_script(path: &Path) -> anyhow::Result<Vec<ScriptEntry>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
    let mut entries: Vec<ScriptEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))?;
    entries.sort_by_key(|e| e.tick);
    Ok(entries)
}

async fn play_script(handle: &OrchestratorHandle, clock: &SimulationClock, script: Vec<ScriptEntry>, total: u64) {
    let mut tick = handle.with(|o| o.tick_count()).await;
    for entry in script {
        if entry.tick > tick {
            tick = clock.step(entry.tick - tick).await;
        }
        let result = handle.submit_raw(entry.raw()).await;
        info!(
            tick,
            action = %entry.action,
            target = %entry.target,
            verdict = %result.verdict.verdict,
            tasks = result.tasks.len(),
            detail = %result.verdict.summary(),
            "Scripted command"
        );
        if let Some(report) = result.report {
            info!(report = %serde_json::to_string(&report).unwrap_or_default(), "Status report");
        }
    }
    if total > tick {
        clock.step(total - tick).await;
    }
}

async fn run_until_shutdown(clock: &SimulationClock, ticks: Option<u64>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut runner = {
        let clock = clock.clone();
        tokio::spawn(async move { clock.run(shutdown_rx, ticks).await })
    };

    let ticks = tokio::select! {
        joined = &mut runner => joined?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(());
            runner.await?
        }
    };
    info!(ticks, "Simulation finished");
    Ok(())
}

fn spawn_feed_logger(mut feed: broadcast::Receiver<FeedMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(FeedMessage::Event(event)) => info!(
                    seq = event.seq,
                    kind = event.kind.as_str(),
                    task_id = event.task_id.as_deref().unwrap_or("-"),
                    platform_id = event.platform_id.as_deref().unwrap_or("-"),
                    sim_time_ms = event.timestamp_ms,
                    "Timeline event"
                ),
                Ok(FeedMessage::Poses { tick, poses, .. }) => {
                    debug!(tick, changed = poses.len(), "Pose delta")
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Feed logger lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
