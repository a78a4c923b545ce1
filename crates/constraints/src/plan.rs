//! Motion implied by a command, per platform.

use commander_domain::{Action, Command, Destination, FleetSnapshot, Platform, Point2, Vec3};
use std::f64::consts::TAU;

use crate::config::ConstraintsConfig;
use crate::engine::resolve_formation_leader;
use crate::verdict::{Violation, ViolationKind};

/// What one platform will do if the command runs.
pub(crate) struct PlatformPlan<'a> {
    pub platform: &'a Platform,
    /// Straight legs travelled, in order
    pub legs: Vec<(Vec3, Vec3)>,
    /// Points that must lie inside the world box
    pub checkpoints: Vec<Vec3>,
    /// Resting point, checked for separation
    pub destination: Option<Vec3>,
}

impl<'a> PlatformPlan<'a> {
    fn stationary(platform: &'a Platform) -> Self {
        Self {
            platform,
            legs: Vec::new(),
            checkpoints: Vec::new(),
            destination: None,
        }
    }

    fn straight(platform: &'a Platform, destination: Vec3) -> Self {
        Self {
            platform,
            legs: vec![(platform.position, destination)],
            checkpoints: vec![destination],
            destination: Some(destination),
        }
    }
}

/// Resolve a `go_to` destination for `platform`. Missing z keeps the current
/// altitude; ground platforms are pinned to z = 0.
pub(crate) fn resolve_destination(
    config: &ConstraintsConfig,
    destination: &Destination,
    platform: &Platform,
) -> Result<Vec3, Violation> {
    let point = match destination {
        Destination::Coordinates(spec) => spec.resolve(platform.position.z),
        Destination::Waypoint(name) => config
            .waypoint(name)
            .map(|p| p.with_z(platform.position.z))
            .ok_or_else(|| {
                Violation::new(
                    ViolationKind::InvalidParameter,
                    format!("Unknown waypoint '{name}'"),
                )
            })?,
    };
    Ok(platform.constrain(point))
}

/// Vertices of the orbit circle approximation.
pub(crate) fn orbit_ring(center: Point2, radius: f64, altitude: f64, chords: usize) -> Vec<Vec3> {
    (0..chords)
        .map(|k| {
            let angle = TAU * k as f64 / chords as f64;
            Vec3::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
                altitude,
            )
        })
        .collect()
}

/// Point where a platform joins the orbit: on the circle, at the platform's
/// current bearing from the center.
pub(crate) fn orbit_entry(center: Point2, radius: f64, altitude: f64, from: Vec3) -> Vec3 {
    let angle = (from.y - center.y).atan2(from.x - center.x);
    Vec3::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
        altitude,
    )
}

pub(crate) fn build_plans<'a>(
    config: &ConstraintsConfig,
    command: &Command,
    members: &[String],
    snapshot: &'a FleetSnapshot,
) -> Result<Vec<PlatformPlan<'a>>, Violation> {
    let platforms: Vec<&'a Platform> = members
        .iter()
        .filter_map(|id| snapshot.platform(id))
        .collect();

    let plans = match &command.action {
        Action::GoTo { destination, .. } => platforms
            .into_iter()
            .map(|p| resolve_destination(config, destination, p).map(|d| PlatformPlan::straight(p, d)))
            .collect::<Result<Vec<_>, _>>()?,
        Action::ReturnHome => platforms
            .into_iter()
            .map(|p| PlatformPlan::straight(p, p.home))
            .collect(),
        Action::Patrol {
            waypoints, looped, ..
        } => platforms
            .into_iter()
            .map(|p| {
                let points: Vec<Vec3> = waypoints
                    .iter()
                    .map(|w| p.constrain(w.resolve(p.position.z)))
                    .collect();
                let mut legs = Vec::with_capacity(points.len() + 1);
                let mut from = p.position;
                for &to in &points {
                    legs.push((from, to));
                    from = to;
                }
                if *looped && points.len() > 1 {
                    legs.push((from, points[0]));
                }
                PlatformPlan {
                    platform: p,
                    legs,
                    destination: if *looped { None } else { points.last().copied() },
                    checkpoints: points,
                }
            })
            .collect(),
        Action::Orbit {
            center,
            radius_m,
            altitude_m,
            ..
        } => platforms
            .into_iter()
            .map(|p| {
                let ring = orbit_ring(*center, *radius_m, *altitude_m, config.orbit_chords);
                let entry = orbit_entry(*center, *radius_m, *altitude_m, p.position);
                let mut legs = vec![(p.position, entry)];
                for (i, &a) in ring.iter().enumerate() {
                    legs.push((a, ring[(i + 1) % ring.len()]));
                }
                let mut checkpoints = ring;
                checkpoints.push(entry);
                PlatformPlan {
                    platform: p,
                    legs,
                    checkpoints,
                    destination: None,
                }
            })
            .collect(),
        Action::FormFormation {
            formation,
            spacing_m,
            leader,
        } => {
            let leader_id = resolve_formation_leader(leader.as_deref(), &command.target, members, snapshot);
            let Some(leader) = leader_id.as_deref().and_then(|id| snapshot.platform(id)) else {
                return Err(Violation::new(
                    ViolationKind::UnknownTarget,
                    format!("Formation on '{}' has no resolvable leader", command.target),
                ));
            };
            platforms
                .into_iter()
                .filter(|p| p.id != leader.id)
                .enumerate()
                .map(|(i, p)| {
                    let slot = formation
                        .slot_position(leader.position, leader.heading_rad, i, *spacing_m)
                        .with_z(p.position.z);
                    PlatformPlan::straight(p, p.constrain(slot))
                })
                .collect()
        }
        _ => platforms.into_iter().map(PlatformPlan::stationary).collect(),
    };
    Ok(plans)
}
