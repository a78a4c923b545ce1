//! Commander Orchestrator
//!
//! Turns approved commands into tasks, drives their controllers on a fixed
//! simulation clock and publishes lifecycle events and pose deltas.
//!
//! ```no_run
//! use commander_orchestrator::{CommanderConfig, Orchestrator};
//! use commander_domain::{Action, Command};
//!
//! let mut orchestrator = Orchestrator::new(CommanderConfig::demo()).unwrap();
//! let result = orchestrator.submit(Command::new("uav_pod", Action::HoldPosition { duration_s: Some(5.0) }));
//! assert!(result.verdict.is_approved());
//! orchestrator.tick();
//! ```

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod handle;
pub mod orchestrator;
pub mod replay;
pub mod snapshot;

pub use clock::SimulationClock;
pub use config::{CommanderConfig, SimulationConfig};
pub use emitter::{BroadcastSink, EventEmitter, EventSink, FeedMessage, PoseDelta, TracingSink};
pub use error::{OrchestratorError, Result};
pub use handle::OrchestratorHandle;
pub use orchestrator::{Orchestrator, SubmitResult};
pub use replay::{replay, CommandInput, CommandLog, RecordedCommand, ReplayOutcome};
pub use snapshot::{PlatformReport, Snapshot};
