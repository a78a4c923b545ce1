//! Read-only view of the fleet used for constraint evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::platform::{Platform, PlatformKind};
use crate::pod::{PodMembership, AIR_POD, ALL_TARGET, GROUND_POD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    /// Simulation time the snapshot was taken at
    pub now_ms: u64,
    pub platforms: BTreeMap<String, Platform>,
    pub pods: BTreeMap<String, PodMembership>,
    /// Active follow links, follower id to leader id
    #[serde(default)]
    pub follow_links: BTreeMap<String, String>,
}

impl FleetSnapshot {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.insert(platform.id.clone(), platform);
        self
    }

    pub fn with_pod(mut self, pod: PodMembership) -> Self {
        self.pods.insert(pod.id.clone(), pod);
        self
    }

    pub fn platform(&self, id: &str) -> Option<&Platform> {
        self.platforms.get(id)
    }

    /// True when `target` names a group rather than a single platform.
    pub fn is_group_target(&self, target: &str) -> bool {
        !self.platforms.contains_key(target)
            && (self.pods.contains_key(target) || PodMembership::is_builtin_id(target))
    }

    /// Platform ids addressed by `target`, sorted; `None` if unknown.
    ///
    /// A platform id wins over a pod id, and a formed pod wins over the
    /// built-in `ugv_pod`/`uav_pod` groups.
    pub fn resolve_target(&self, target: &str) -> Option<Vec<String>> {
        if self.platforms.contains_key(target) {
            return Some(vec![target.to_string()]);
        }
        if let Some(pod) = self.pods.get(target) {
            let mut members: Vec<String> = pod
                .members
                .iter()
                .filter(|m| self.platforms.contains_key(m.as_str()))
                .cloned()
                .collect();
            members.sort();
            members.dedup();
            return Some(members);
        }
        let kind = match target {
            ALL_TARGET | "*" => None,
            GROUND_POD => Some(PlatformKind::Ground),
            AIR_POD => Some(PlatformKind::Aerial),
            _ => return None,
        };
        Some(
            self.platforms
                .values()
                .filter(|p| kind.map_or(true, |k| p.kind == k))
                .map(|p| p.id.clone())
                .collect(),
        )
    }

    /// Every id usable as a target, for operator suggestions.
    pub fn known_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.platforms.keys().cloned().collect();
        targets.extend(self.pods.keys().cloned());
        for builtin in [ALL_TARGET, GROUND_POD, AIR_POD] {
            if !targets.iter().any(|t| t == builtin) {
                targets.push(builtin.to_string());
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::platform::PlatformSpec;

    fn fleet() -> FleetSnapshot {
        let mut snap = FleetSnapshot::new(0);
        for (id, kind, x) in [
            ("ugv1", PlatformKind::Ground, 0.0),
            ("ugv2", PlatformKind::Ground, 5.0),
            ("uav1", PlatformKind::Aerial, 0.0),
        ] {
            snap = snap.with_platform(Platform::from_spec(
                &PlatformSpec::new(id, kind, Vec3::new(x, 0.0, 10.0)),
                0,
            ));
        }
        snap
    }

    #[test]
    fn resolves_platforms_and_builtins() {
        let snap = fleet();
        assert_eq!(snap.resolve_target("ugv2"), Some(vec!["ugv2".to_string()]));
        assert_eq!(
            snap.resolve_target("ugv_pod"),
            Some(vec!["ugv1".to_string(), "ugv2".to_string()])
        );
        assert_eq!(snap.resolve_target("uav_pod"), Some(vec!["uav1".to_string()]));
        assert_eq!(snap.resolve_target("all").map(|v| v.len()), Some(3));
        assert_eq!(snap.resolve_target("ghost"), None);
        assert!(snap.is_group_target("all"));
        assert!(!snap.is_group_target("ugv1"));
    }

    #[test]
    fn formed_pod_overrides_builtin() {
        let snap = fleet().with_pod(PodMembership::new(
            "ugv_pod",
            vec!["ugv2".into(), "ghost".into()],
        ));
        assert_eq!(snap.resolve_target("ugv_pod"), Some(vec!["ugv2".to_string()]));
    }
}
