//! Pod membership and follow-leader links.

use commander_domain::PodMembership;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::FleetError;

/// A follower tracking a leader at a fixed gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowLink {
    pub leader: String,
    pub gap_m: f64,
}

/// Formed pods and active follow links.
///
/// A platform belongs to at most one formed pod. Follow links never form
/// a cycle.
#[derive(Debug, Clone, Default)]
pub struct PodRegistry {
    pods: BTreeMap<String, PodMembership>,
    member_of: BTreeMap<String, String>,
    follow: BTreeMap<String, FollowLink>,
}

impl PodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form (or re-form) pod `pod_id`.
    ///
    /// Members are removed from any other pod they belonged to; pods left
    /// empty are dissolved. Roles for non-members are dropped, as is a
    /// leader that is not a member.
    pub fn assign(
        &mut self,
        pod_id: &str,
        members: &[String],
        leader: Option<String>,
        roles: BTreeMap<String, String>,
    ) -> &PodMembership {
        let mut members: Vec<String> = members.to_vec();
        members.sort();
        members.dedup();

        for member in &members {
            if let Some(previous) = self.member_of.get(member).cloned() {
                if previous != pod_id {
                    self.remove_member(&previous, member);
                }
            }
        }

        if let Some(old) = self.pods.get(pod_id) {
            for dropped in old.members.iter().filter(|m| !members.contains(m)) {
                self.member_of.remove(dropped);
            }
        }

        for member in &members {
            self.member_of.insert(member.clone(), pod_id.to_string());
        }

        let leader = leader.filter(|l| members.contains(l));
        let roles = roles
            .into_iter()
            .filter(|(id, _)| members.contains(id))
            .collect();

        info!(pod_id, members = ?members, leader = ?leader, "Pod formed");

        let pod = PodMembership {
            id: pod_id.to_string(),
            members,
            leader,
            roles,
        };
        match self.pods.entry(pod_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(pod);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(pod),
        }
    }

    fn remove_member(&mut self, pod_id: &str, member: &str) {
        let Some(pod) = self.pods.get_mut(pod_id) else {
            return;
        };
        pod.members.retain(|m| m != member);
        pod.roles.remove(member);
        if pod.leader.as_deref() == Some(member) {
            pod.leader = None;
        }
        self.member_of.remove(member);
        if pod.members.is_empty() {
            debug!(pod_id, "Pod dissolved, no members left");
            self.pods.remove(pod_id);
        }
    }

    /// Dissolve a pod entirely
    pub fn dissolve(&mut self, pod_id: &str) -> Result<PodMembership, FleetError> {
        let pod = self
            .pods
            .remove(pod_id)
            .ok_or_else(|| FleetError::UnknownPod(pod_id.to_string()))?;
        for member in &pod.members {
            self.member_of.remove(member);
        }
        Ok(pod)
    }

    pub fn get(&self, pod_id: &str) -> Option<&PodMembership> {
        self.pods.get(pod_id)
    }

    /// The formed pod a platform belongs to, if any
    pub fn pod_of(&self, platform_id: &str) -> Option<&PodMembership> {
        self.member_of
            .get(platform_id)
            .and_then(|pod_id| self.pods.get(pod_id))
    }

    pub fn pods(&self) -> impl Iterator<Item = &PodMembership> {
        self.pods.values()
    }

    pub fn pod_map(&self) -> BTreeMap<String, PodMembership> {
        self.pods.clone()
    }

    /// Make `follower` track `leader` at `gap_m`, replacing any existing link.
    pub fn set_follow(&mut self, follower: &str, leader: &str, gap_m: f64) -> Result<(), FleetError> {
        if follower == leader {
            return Err(FleetError::SelfFollow(follower.to_string()));
        }

        // Walk up from the new leader; reaching the follower closes a loop.
        let mut chain = vec![follower.to_string(), leader.to_string()];
        let mut visited: BTreeSet<String> = chain.iter().cloned().collect();
        let mut current = leader.to_string();
        while let Some(link) = self.follow.get(&current) {
            chain.push(link.leader.clone());
            if link.leader == follower {
                return Err(FleetError::LeadershipCycle { chain });
            }
            if !visited.insert(link.leader.clone()) {
                break;
            }
            current = link.leader.clone();
        }

        self.follow.insert(
            follower.to_string(),
            FollowLink {
                leader: leader.to_string(),
                gap_m,
            },
        );
        debug!(follower, leader, gap_m, "Follow link set");
        Ok(())
    }

    pub fn clear_follow(&mut self, follower: &str) -> Option<FollowLink> {
        self.follow.remove(follower)
    }

    pub fn follow_link(&self, follower: &str) -> Option<&FollowLink> {
        self.follow.get(follower)
    }

    /// Follower id to leader id for every active link
    pub fn follow_links(&self) -> BTreeMap<String, String> {
        self.follow
            .iter()
            .map(|(follower, link)| (follower.clone(), link.leader.clone()))
            .collect()
    }

    /// Root of the chain `follower` belongs to and the summed gap to it.
    pub fn resolve_chain(&self, follower: &str) -> Result<(String, f64), FleetError> {
        let mut visited = BTreeSet::new();
        let mut chain = vec![follower.to_string()];
        let mut current = follower.to_string();
        let mut total_gap = 0.0;
        visited.insert(current.clone());

        while let Some(link) = self.follow.get(&current) {
            total_gap += link.gap_m;
            chain.push(link.leader.clone());
            if !visited.insert(link.leader.clone()) {
                return Err(FleetError::LeadershipCycle { chain });
            }
            current = link.leader.clone();
        }

        Ok((current, total_gap))
    }
}
