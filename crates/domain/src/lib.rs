//! Commander Domain Layer
//!
//! Pure domain types shared by the constraints engine, the fleet registry, the
//! controllers and the orchestrator: geometry, platforms, pods, the typed
//! action catalog and the task state machine. No I/O, no async.

pub mod command;
pub mod error;
pub mod formation;
pub mod geometry;
pub mod platform;
pub mod pod;
pub mod snapshot;
pub mod task;

pub use command::{
    generate_trace_id, Action, Command, Destination, Interpretation, PointSpec, RawCommand,
    ACTION_NAMES, DEFAULT_GAP_M, DEFAULT_SPACING_M,
};
pub use error::{CommandError, TransitionError};
pub use formation::FormationType;
pub use geometry::{Point2, Vec3};
pub use platform::{Platform, PlatformKind, PlatformSpec, PlatformStatus};
pub use pod::{PodMembership, ALL_TARGET, AIR_POD, GROUND_POD};
pub use snapshot::FleetSnapshot;
pub use task::{ControllerKind, Task, TaskStatus};
