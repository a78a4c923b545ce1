//! Pod (named group) membership.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every platform in the registry.
pub const ALL_TARGET: &str = "all";
/// Every ground platform, unless a pod with this id has been formed.
pub const GROUND_POD: &str = "ugv_pod";
/// Every aerial platform, unless a pod with this id has been formed.
pub const AIR_POD: &str = "uav_pod";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMembership {
    pub id: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub leader: Option<String>,
    /// Free-form role labels, keyed by platform id
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
}

impl PodMembership {
    pub fn new(id: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            id: id.into(),
            members,
            leader: None,
            roles: BTreeMap::new(),
        }
    }

    pub fn contains(&self, platform_id: &str) -> bool {
        self.members.iter().any(|m| m == platform_id)
    }

    pub fn is_builtin_id(id: &str) -> bool {
        matches!(id, ALL_TARGET | "*" | GROUND_POD | AIR_POD)
    }
}
