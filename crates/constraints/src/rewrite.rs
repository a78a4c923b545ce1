//! Clamp-style rewrites. Pure: the input command is never modified.

use commander_domain::{Action, Command, Destination, FleetSnapshot, Platform, Point2, PointSpec, Vec3};
use std::collections::BTreeSet;

use crate::engine::ConstraintsEngine;
use crate::verdict::{FieldChange, Rewrite, Violation, ViolationKind};

fn fmt_num(v: f64) -> String {
    format!("{v}")
}

fn fmt_point(p: Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", p.x, p.y, p.z)
}

fn change(field: impl Into<String>, before: String, after: String, reason: impl Into<String>) -> FieldChange {
    FieldChange {
        field: field.into(),
        before,
        after,
        reason: reason.into(),
    }
}

/// Command point for a resolved position; ground platforms leave z unset.
fn to_spec(platform: &Platform, p: Vec3) -> PointSpec {
    let spec = PointSpec::new(p.x, p.y);
    if platform.is_ground() {
        spec
    } else {
        spec.with_z(p.z)
    }
}

/// Build a candidate rewrite resolving every clampable violation, or `None`
/// when one of them has no mechanical fix.
pub(crate) fn rewrite(
    engine: &ConstraintsEngine,
    command: &Command,
    violations: &[Violation],
    members: &[String],
    snapshot: &FleetSnapshot,
) -> Option<Rewrite> {
    let has = |kind: ViolationKind| violations.iter().any(|v| v.kind == kind);
    let platforms: Vec<&Platform> = members.iter().filter_map(|id| snapshot.platform(id)).collect();
    let mut action = command.action.clone();
    let mut changes = Vec::new();

    if has(ViolationKind::Speed) {
        let (limit, kind) = platforms
            .iter()
            .map(|p| (engine.config().speed_limits.for_kind(p.kind), p.kind))
            .min_by(|a, b| a.0.total_cmp(&b.0))?;
        let before = action.speed()?;
        action = action.with_speed(limit);
        changes.push(change(
            "speed",
            fmt_num(before),
            fmt_num(limit),
            match violations.iter().find(|v| v.kind == ViolationKind::Speed) {
                Some(v) => format!("{}; clamped to {kind} maximum", v.message),
                None => format!("clamped to {kind} maximum"),
            },
        ));
    }
    if has(ViolationKind::Bounds) {
        action = clamp_into_bounds(engine, action, &platforms, &mut changes)?;
    }
    if has(ViolationKind::Separation) {
        action = restore_separation(engine, action, &platforms, members, snapshot, &mut changes)?;
    }

    Some(Rewrite {
        command: command.with_action(action),
        changes,
    })
}

fn clamp_into_bounds(
    engine: &ConstraintsEngine,
    action: Action,
    platforms: &[&Platform],
    changes: &mut Vec<FieldChange>,
) -> Option<Action> {
    let bounds = engine.config().world_bounds;
    match action {
        Action::GoTo { destination, speed } => {
            let platform = platforms.first()?;
            let resolved = engine.resolve_destination(&destination, platform).ok()?;
            let clamped = platform.constrain(bounds.clamp(resolved));
            changes.push(change(
                "destination",
                fmt_point(resolved),
                fmt_point(clamped),
                "clamped into world bounds",
            ));
            Some(Action::GoTo {
                destination: Destination::Coordinates(to_spec(platform, clamped)),
                speed,
            })
        }
        Action::Patrol {
            waypoints,
            looped,
            speed,
        } => {
            let platform = platforms.first()?;
            let mut clamped_points = Vec::with_capacity(waypoints.len());
            for (i, waypoint) in waypoints.iter().enumerate() {
                let resolved = platform.constrain(waypoint.resolve(platform.position.z));
                let clamped = platform.constrain(bounds.clamp(resolved));
                if clamped == resolved {
                    clamped_points.push(*waypoint);
                    continue;
                }
                changes.push(change(
                    format!("waypoints[{i}]"),
                    fmt_point(resolved),
                    fmt_point(clamped),
                    "clamped into world bounds",
                ));
                clamped_points.push(to_spec(platform, clamped));
            }
            Some(Action::Patrol {
                waypoints: clamped_points,
                looped,
                speed,
            })
        }
        Action::Orbit {
            center,
            radius_m,
            altitude_m,
            speed,
        } => {
            if 2.0 * radius_m > bounds.x_max - bounds.x_min || 2.0 * radius_m > bounds.y_max - bounds.y_min {
                return None;
            }
            let new_center = Point2::new(
                center.x.clamp(bounds.x_min + radius_m, bounds.x_max - radius_m),
                center.y.clamp(bounds.y_min + radius_m, bounds.y_max - radius_m),
            );
            let new_altitude = altitude_m.clamp(bounds.z_min, bounds.z_max);
            if new_center != center {
                changes.push(change(
                    "center",
                    format!("({:.1}, {:.1})", center.x, center.y),
                    format!("({:.1}, {:.1})", new_center.x, new_center.y),
                    "orbit circle moved inside world bounds",
                ));
            }
            if new_altitude != altitude_m {
                changes.push(change(
                    "altitude_m",
                    fmt_num(altitude_m),
                    fmt_num(new_altitude),
                    "clamped into world bounds",
                ));
            }
            Some(Action::Orbit {
                center: new_center,
                radius_m,
                altitude_m: new_altitude,
                speed,
            })
        }
        _ => None,
    }
}

fn restore_separation(
    engine: &ConstraintsEngine,
    action: Action,
    platforms: &[&Platform],
    members: &[String],
    snapshot: &FleetSnapshot,
    changes: &mut Vec<FieldChange>,
) -> Option<Action> {
    let min = engine.config().min_separation_m;
    match action {
        Action::GoTo { destination, speed } => {
            let platform = platforms.first()?;
            let resolved = engine.resolve_destination(&destination, platform).ok()?;
            let excluded: BTreeSet<&str> = members.iter().map(String::as_str).collect();
            let Some((other, _)) = engine.closest_conflict(resolved, &excluded, snapshot) else {
                return Some(Action::GoTo { destination, speed });
            };
            let nudged = engine.nudge_away(resolved, other.position, platform);
            changes.push(change(
                "destination",
                fmt_point(resolved),
                fmt_point(nudged),
                format!("moved to {min:.1}m from '{}'", other.id),
            ));
            Some(Action::GoTo {
                destination: Destination::Coordinates(to_spec(platform, nudged)),
                speed,
            })
        }
        Action::FormFormation {
            formation,
            spacing_m,
            leader,
        } if spacing_m < min => {
            changes.push(change(
                "spacing_m",
                fmt_num(spacing_m),
                fmt_num(min),
                "raised to minimum separation",
            ));
            Some(Action::FormFormation {
                formation,
                spacing_m: min,
                leader,
            })
        }
        Action::FollowLeader { leader, gap_m } if gap_m < min => {
            changes.push(change(
                "gap_m",
                fmt_num(gap_m),
                fmt_num(min),
                "raised to minimum separation",
            ));
            Some(Action::FollowLeader { leader, gap_m: min })
        }
        _ => None,
    }
}
