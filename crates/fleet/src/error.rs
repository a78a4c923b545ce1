//! Fleet errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("Unknown pod '{0}'")]
    UnknownPod(String),

    #[error("Duplicate platform id '{0}'")]
    DuplicatePlatform(String),

    #[error("Platform '{0}' cannot follow itself")]
    SelfFollow(String),

    #[error("Cyclic leadership: {}", chain.join(" -> "))]
    LeadershipCycle { chain: Vec<String> },
}
