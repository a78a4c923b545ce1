//! Platform Registry
//!
//! Authoritative mutable state for every platform in the fixed roster, plus
//! pod membership, follow links, position trails and simulated comms.
//! Mutated only by the orchestrator, either during a tick or while
//! processing a command.

pub mod error;
pub mod heartbeat;
pub mod pods;
pub mod registry;
pub mod trail;

pub use error::FleetError;
pub use heartbeat::{HeartbeatMonitor, HeartbeatStatus};
pub use pods::{FollowLink, PodRegistry};
pub use registry::{Kinematics, PlatformRegistry};
pub use trail::Trail;
