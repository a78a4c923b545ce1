//! Command admission and safety checks.

use commander_domain::{Action, Command, Destination, FleetSnapshot, Platform, PodMembership, Vec3};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::{ConstraintsConfig, SeparationPolicy};
use crate::geometry::{segment_intersects_polygon, Rect};
use crate::plan::{self, PlatformPlan};
use crate::rewrite;
use crate::verdict::{ConstraintVerdict, Violation, ViolationKind};

/// Distance added past the minimum when nudging a destination.
pub(crate) const NUDGE_EPS_M: f64 = 1e-6;

/// Pick the formation leader: explicit parameter, then the pod's recorded
/// leader, then the first member by id.
pub fn resolve_formation_leader(
    explicit: Option<&str>,
    target: &str,
    members: &[String],
    snapshot: &FleetSnapshot,
) -> Option<String> {
    if let Some(leader) = explicit {
        return Some(leader.to_string());
    }
    if let Some(leader) = snapshot.pods.get(target).and_then(|pod| pod.leader.as_ref()) {
        if members.contains(leader) {
            return Some(leader.clone());
        }
    }
    members.first().cloned()
}

#[derive(Debug, Default)]
struct Findings {
    violations: Vec<Violation>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
}

impl Findings {
    /// Keep only the first violation of each kind.
    fn record(&mut self, violation: Violation, suggestion: Option<String>) {
        if self.violations.iter().any(|v| v.kind == violation.kind) {
            return;
        }
        self.violations.push(violation);
        if let Some(s) = suggestion {
            self.suggest(s);
        }
    }

    fn suggest(&mut self, suggestion: String) {
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }
}

fn fmt_point(p: Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", p.x, p.y, p.z)
}

/// Stateless safety checker over an immutable config.
#[derive(Debug, Clone)]
pub struct ConstraintsEngine {
    config: Arc<ConstraintsConfig>,
}

impl ConstraintsEngine {
    pub fn new(config: ConstraintsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn with_shared_config(config: Arc<ConstraintsConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConstraintsConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<ConstraintsConfig> {
        Arc::clone(&self.config)
    }

    /// Validate `command` against the fleet as seen in `snapshot`.
    pub fn check(&self, command: &Command, snapshot: &FleetSnapshot) -> ConstraintVerdict {
        let verdict = self.evaluate(command, snapshot, self.config.allow_rewrite);
        debug!(
            trace_id = %command.trace_id,
            action = command.action.name(),
            target = %command.target,
            verdict = %verdict.verdict,
            violations = verdict.violations.len(),
            "constraint check"
        );
        verdict
    }

    /// Resolve a go_to destination for a platform.
    pub fn resolve_destination(
        &self,
        destination: &Destination,
        platform: &Platform,
    ) -> Result<Vec3, Violation> {
        plan::resolve_destination(&self.config, destination, platform)
    }

    /// Point check: inside the world box, outside every zone, clear of every
    /// platform other than `exclude`.
    pub fn check_position_safe(
        &self,
        position: Vec3,
        exclude: &str,
        snapshot: &FleetSnapshot,
    ) -> Result<(), Violation> {
        if let Some(desc) = self.config.world_bounds.describe_violation(position) {
            return Err(Violation::new(
                ViolationKind::Bounds,
                format!("Position {} is outside the world bounds: {desc}", fmt_point(position)),
            ));
        }
        if let Some(zone) = self.config.no_go_zones.iter().find(|z| z.contains(position.xy())) {
            return Err(Violation::new(
                ViolationKind::NoGo,
                format!("Position {} is inside restricted zone '{}'", fmt_point(position), zone.name),
            )
            .zone(&zone.name));
        }
        let excluded = BTreeSet::from([exclude]);
        if let Some((other, distance)) = self.closest_conflict(position, &excluded, snapshot) {
            return Err(Violation::new(
                ViolationKind::Separation,
                format!(
                    "Position {} is {distance:.1}m from platform '{}' (minimum separation {:.1}m)",
                    fmt_point(position),
                    other.id,
                    self.config.min_separation_m
                ),
            )
            .platform(&other.id));
        }
        Ok(())
    }

    /// Closest platform not in `excluded` that is nearer than the minimum
    /// separation to `point`.
    pub(crate) fn closest_conflict<'a>(
        &self,
        point: Vec3,
        excluded: &BTreeSet<&str>,
        snapshot: &'a FleetSnapshot,
    ) -> Option<(&'a Platform, f64)> {
        let min = self.config.min_separation_m;
        let mut best: Option<(&Platform, f64)> = None;
        for other in snapshot.platforms.values() {
            if excluded.contains(other.id.as_str()) {
                continue;
            }
            let distance = point.distance_to(&other.position);
            if distance < min && best.map_or(true, |(_, d)| distance < d) {
                best = Some((other, distance));
            }
        }
        best
    }

    /// Destination pushed directly away from `other` to the minimum separation.
    pub(crate) fn nudge_away(&self, destination: Vec3, other: Vec3, platform: &Platform) -> Vec3 {
        let mut direction = destination - other;
        if direction.norm() < 1e-9 {
            direction = platform.position - other;
        }
        if direction.norm() < 1e-9 {
            direction = Vec3::new(1.0, 0.0, 0.0);
        }
        let reach = self.config.min_separation_m + NUDGE_EPS_M;
        platform.constrain(other + direction * (reach / direction.norm()))
    }

    pub(crate) fn evaluate(
        &self,
        command: &Command,
        snapshot: &FleetSnapshot,
        allow_rewrite: bool,
    ) -> ConstraintVerdict {
        if let Err(err) = command.action.validate() {
            return ConstraintVerdict::invalid_command(&err);
        }
        let members = match self.admit(command, snapshot) {
            Ok(members) => members,
            Err(verdict) => return verdict,
        };
        let plans = match plan::build_plans(&self.config, command, &members, snapshot) {
            Ok(plans) => plans,
            Err(violation) => {
                let suggestion = (violation.kind == ViolationKind::InvalidParameter
                    && !self.config.waypoints.is_empty())
                .then(|| {
                    let names: Vec<&str> = self.config.waypoints.keys().map(String::as_str).collect();
                    format!("Known waypoints: {}", names.join(", "))
                });
                return ConstraintVerdict::reject(violation, suggestion);
            }
        };

        let mut findings = Findings::default();
        self.check_speed(command, &plans, &mut findings);
        self.check_bounds(&plans, &mut findings);
        self.check_no_go(&plans, &mut findings);
        self.check_separation(command, &members, &plans, snapshot, &mut findings);
        self.check_comms(command, &members, snapshot, &mut findings);
        self.decide(command, &members, snapshot, findings, allow_rewrite)
    }

    /// Target resolution and command-shape validation. Failures reject
    /// immediately.
    fn admit(&self, command: &Command, snapshot: &FleetSnapshot) -> Result<Vec<String>, ConstraintVerdict> {
        let target = command.target.as_str();
        let action = &command.action;
        let invalid = |message: String| {
            Err(ConstraintVerdict::reject(
                Violation::new(ViolationKind::InvalidCommand, message),
                None,
            ))
        };

        if let Action::AssignRoles {
            members, leader, ..
        } = action
        {
            if snapshot.platforms.contains_key(target) || matches!(target, "all" | "*") {
                return invalid(format!("'{target}' cannot be used as a pod id"));
            }
            if let Some(unknown) = members.iter().find(|m| !snapshot.platforms.contains_key(m.as_str())) {
                return Err(unknown_target(unknown, snapshot));
            }
            if let Some(leader) = leader {
                if !members.contains(leader) {
                    return invalid(format!("Leader '{leader}' is not a member of pod '{target}'"));
                }
            }
            let mut members = members.clone();
            members.sort();
            members.dedup();
            return Ok(members);
        }

        let Some(members) = snapshot.resolve_target(target) else {
            return Err(unknown_target(target, snapshot));
        };
        if members.is_empty() {
            return invalid(format!("Target '{target}' has no platforms"));
        }
        let group = snapshot.is_group_target(target);
        if action.single_platform_only() && group {
            return invalid(format!(
                "'{}' requires a single platform target, got group '{target}'",
                action.name()
            ));
        }
        if action.pod_only() && !group {
            return invalid(format!("'{}' requires a pod target, got platform '{target}'", action.name()));
        }
        if action.requires_aerial() {
            if let Some(ground) = members
                .iter()
                .filter_map(|id| snapshot.platform(id))
                .find(|p| p.is_ground())
            {
                return invalid(format!(
                    "'{}' requires an aerial platform; '{}' is {}",
                    action.name(),
                    ground.id,
                    ground.kind
                ));
            }
        }

        match action {
            Action::FollowLeader { leader, .. } => {
                if snapshot.platform(leader).is_none() {
                    return Err(unknown_target(leader, snapshot));
                }
                if !group && target == leader.as_str() {
                    return invalid(format!("Platform '{leader}' cannot follow itself"));
                }
                let followers: BTreeSet<&str> = members
                    .iter()
                    .map(String::as_str)
                    .filter(|m| *m != leader.as_str())
                    .collect();
                if followers.is_empty() {
                    return invalid(format!("'{target}' has no followers besides leader '{leader}'"));
                }
                // Walk up from the leader; reaching a new follower closes a loop.
                let mut current = leader.as_str();
                let mut hops = 0;
                while let Some(next) = snapshot.follow_links.get(current) {
                    if followers.contains(next.as_str()) {
                        return invalid(format!(
                            "Cyclic leadership: leader '{leader}' already follows '{next}' within '{target}'"
                        ));
                    }
                    current = next.as_str();
                    hops += 1;
                    if hops > snapshot.follow_links.len() {
                        break;
                    }
                }
            }
            Action::FormFormation { leader, .. } => {
                if let Some(leader) = leader {
                    if snapshot.platform(leader).is_none() {
                        return Err(unknown_target(leader, snapshot));
                    }
                }
                let leader = resolve_formation_leader(leader.as_deref(), target, &members, snapshot);
                if members.iter().all(|m| Some(m) == leader.as_ref()) {
                    return invalid(format!("Formation on '{target}' has no followers"));
                }
            }
            _ => {}
        }
        Ok(members)
    }

    fn check_speed(&self, command: &Command, plans: &[PlatformPlan<'_>], findings: &mut Findings) {
        let Some(speed) = command.action.speed() else {
            return;
        };
        for plan in plans {
            let kind = plan.platform.kind;
            let limit = self.config.speed_limits.for_kind(kind);
            if speed > limit {
                findings.record(
                    Violation::new(
                        ViolationKind::Speed,
                        format!("Requested speed {speed} m/s exceeds maximum {limit} m/s for {kind}"),
                    )
                    .platform(&plan.platform.id),
                    Some(format!("speed ≤ {limit:.1}")),
                );
                return;
            }
        }
    }

    fn check_bounds(&self, plans: &[PlatformPlan<'_>], findings: &mut Findings) {
        let bounds = &self.config.world_bounds;
        for plan in plans {
            for &point in &plan.checkpoints {
                if let Some(desc) = bounds.describe_violation(point) {
                    findings.record(
                        Violation::new(
                            ViolationKind::Bounds,
                            format!(
                                "Position {} for '{}' is outside the world bounds: {desc}",
                                fmt_point(point),
                                plan.platform.id
                            ),
                        )
                        .platform(&plan.platform.id),
                        Some(format!("Clamp to {}", fmt_point(bounds.clamp(point)))),
                    );
                    return;
                }
            }
        }
    }

    fn check_no_go(&self, plans: &[PlatformPlan<'_>], findings: &mut Findings) {
        let margin = self.config.no_go_margin_m;
        for plan in plans {
            for &(from, to) in &plan.legs {
                for zone in &self.config.no_go_zones {
                    let Some(rect) = zone.bounding_box().map(|r| r.expanded(margin)) else {
                        continue;
                    };
                    if zone.contains(to.xy()) {
                        let exit = rect.nearest_boundary_point(to.xy());
                        findings.record(
                            Violation::new(
                                ViolationKind::NoGo,
                                format!(
                                    "Destination ({:.1}, {:.1}) for '{}' is inside restricted zone '{}'",
                                    to.x, to.y, plan.platform.id, zone.name
                                ),
                            )
                            .platform(&plan.platform.id)
                            .zone(&zone.name),
                            Some(format!(
                                "Use a destination outside '{}', e.g. ({:.1}, {:.1})",
                                zone.name, exit.x, exit.y
                            )),
                        );
                        return;
                    }
                    if zone.intersects_segment(from.xy(), to.xy()) {
                        findings.record(
                            Violation::new(
                                ViolationKind::NoGo,
                                format!(
                                    "Path from ({:.1}, {:.1}) to ({:.1}, {:.1}) for '{}' crosses restricted zone '{}'",
                                    from.x, from.y, to.x, to.y, plan.platform.id, zone.name
                                ),
                            )
                            .platform(&plan.platform.id)
                            .zone(&zone.name),
                            Some(detour_suggestion(&zone.name, &zone.vertices, rect, from, to, margin)),
                        );
                        return;
                    }
                }
            }
        }
    }

    fn check_separation(
        &self,
        command: &Command,
        members: &[String],
        plans: &[PlatformPlan<'_>],
        snapshot: &FleetSnapshot,
        findings: &mut Findings,
    ) {
        let min = self.config.min_separation_m;
        let mut excluded: BTreeSet<&str> = members.iter().map(String::as_str).collect();

        let spacing = match &command.action {
            Action::FormFormation {
                spacing_m, leader, ..
            } => {
                if let Some(leader) = resolve_formation_leader(leader.as_deref(), &command.target, members, snapshot) {
                    if let Some(p) = snapshot.platform(&leader) {
                        excluded.insert(p.id.as_str());
                    }
                }
                Some(("Formation spacing", "spacing_m", *spacing_m))
            }
            Action::FollowLeader { gap_m, leader } => {
                excluded.insert(leader.as_str());
                Some(("Follow gap", "gap_m", *gap_m))
            }
            _ => None,
        };

        let mut found: Option<(Violation, String)> = None;
        if let Some((label, field, value)) = spacing {
            if value < min {
                found = Some((
                    Violation::new(
                        ViolationKind::Separation,
                        format!(
                            "{label} {value:.1}m is below minimum separation {min:.1}m (deficit {:.1}m)",
                            min - value
                        ),
                    ),
                    format!("{field} ≥ {min:.1}"),
                ));
            }
        }

        if found.is_none() {
            for plan in plans {
                let Some(destination) = plan.destination else {
                    continue;
                };
                if let Some((other, distance)) = self.closest_conflict(destination, &excluded, snapshot) {
                    let nudged = self.nudge_away(destination, other.position, plan.platform);
                    found = Some((
                        Violation::new(
                            ViolationKind::Separation,
                            format!(
                                "Destination {} for '{}' is {distance:.1}m from platform '{}' (minimum separation {min:.1}m, deficit {:.1}m)",
                                fmt_point(destination),
                                plan.platform.id,
                                other.id,
                                min - distance
                            ),
                        )
                        .platform(&other.id),
                        format!("Keep at least {min:.1}m from '{}', e.g. {}", other.id, fmt_point(nudged)),
                    ));
                    break;
                }
            }
        }

        if let Some((violation, suggestion)) = found {
            match self.config.separation_policy {
                SeparationPolicy::Reject => findings.record(violation, Some(suggestion)),
                SeparationPolicy::Warn => {
                    findings.warnings.push(violation.message);
                    findings.suggest(suggestion);
                }
            }
        }
    }

    fn check_comms(&self, command: &Command, members: &[String], snapshot: &FleetSnapshot, findings: &mut Findings) {
        if matches!(command.action, Action::ReportStatus) {
            return;
        }
        let timeout = self.config.comms_timeout_s;
        for platform in members.iter().filter_map(|id| snapshot.platform(id)) {
            let elapsed = platform.seconds_since_heartbeat(snapshot.now_ms);
            if elapsed > timeout {
                findings.record(
                    Violation::new(
                        ViolationKind::CommsTimeout,
                        format!(
                            "Platform '{}' has not responded for {elapsed:.1}s (timeout: {timeout}s)",
                            platform.id
                        ),
                    )
                    .platform(&platform.id),
                    Some(format!("Restore the link to '{}' before commanding it", platform.id)),
                );
                return;
            }
        }
    }

    fn decide(
        &self,
        command: &Command,
        members: &[String],
        snapshot: &FleetSnapshot,
        findings: Findings,
        allow_rewrite: bool,
    ) -> ConstraintVerdict {
        let Findings {
            mut violations,
            mut warnings,
            mut suggestions,
        } = findings;

        if violations.is_empty() {
            return ConstraintVerdict::approved(warnings, suggestions);
        }
        let hard = violations.iter().any(|v| !v.kind.is_clampable());
        if hard || !allow_rewrite {
            return ConstraintVerdict::rejected(violations, suggestions);
        }

        let Some(candidate) = rewrite::rewrite(self, command, &violations, members, snapshot) else {
            return ConstraintVerdict::rejected(violations, suggestions);
        };
        let recheck = self.evaluate(&candidate.command, snapshot, false);
        if recheck.is_approved() {
            // Resolved violations stay visible next to the diff.
            warnings.extend(violations.into_iter().map(|v| v.message));
            warnings.extend(recheck.warnings);
            return ConstraintVerdict::rewritten(candidate, warnings, suggestions);
        }
        for violation in recheck.violations {
            if !violations.iter().any(|v| v.message == violation.message) {
                violations.push(violation);
            }
        }
        for suggestion in recheck.suggestions {
            if !suggestions.contains(&suggestion) {
                suggestions.push(suggestion);
            }
        }
        ConstraintVerdict::rejected(violations, suggestions)
    }
}

fn unknown_target(target: &str, snapshot: &FleetSnapshot) -> ConstraintVerdict {
    let kind = if PodMembership::is_builtin_id(target) {
        "pod"
    } else {
        "platform or pod"
    };
    ConstraintVerdict::reject(
        Violation::new(ViolationKind::UnknownTarget, format!("Unknown {kind} '{target}'")),
        Some(format!("Known targets: {}", snapshot.known_targets().join(", "))),
    )
}

/// Shortest route around a zone through one or two adjacent corners of its
/// expanded bounding box.
fn detour_suggestion(
    name: &str,
    polygon: &[commander_domain::Point2],
    rect: Rect,
    from: Vec3,
    to: Vec3,
    margin: f64,
) -> String {
    let (a, b) = (from.xy(), to.xy());
    let corners = rect.corners();
    let clear = |p: commander_domain::Point2, q: commander_domain::Point2| {
        !segment_intersects_polygon(p, q, polygon)
    };

    let mut best: Option<(f64, Vec<commander_domain::Point2>)> = None;
    let mut consider = |route: Vec<commander_domain::Point2>| {
        let mut length = 0.0;
        let mut prev = a;
        for &p in route.iter().chain(std::iter::once(&b)) {
            if !clear(prev, p) {
                return;
            }
            length += prev.distance_to(&p);
            prev = p;
        }
        if best.as_ref().map_or(true, |(l, _)| length < *l) {
            best = Some((length, route));
        }
    };
    for (i, &corner) in corners.iter().enumerate() {
        consider(vec![corner]);
        let next = corners[(i + 1) % 4];
        consider(vec![corner, next]);
        consider(vec![next, corner]);
    }

    match best {
        Some((_, route)) => {
            let hops: Vec<String> = route
                .iter()
                .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
                .collect();
            format!("Route around '{name}' via {}", hops.join(" then "))
        }
        None => format!("Route around '{name}' keeping {margin:.1}m clear of its bounding box"),
    }
}
