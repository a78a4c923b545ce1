//! Typed action catalog and command envelope.
//!
//! Upstream interpreters hand over loosely structured [`RawCommand`]s
//! (`{action, target, params}`); [`Command::from_raw`] turns them into the
//! typed [`Action`] union, rejecting unknown actions and malformed parameters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::CommandError;
use crate::formation::FormationType;
use crate::geometry::{Point2, Vec3};

pub const DEFAULT_GAP_M: f64 = 3.0;
pub const DEFAULT_SPACING_M: f64 = 3.0;

/// Every action name [`Action::from_raw`] accepts.
pub const ACTION_NAMES: [&str; 12] = [
    "go_to",
    "return_home",
    "hold_position",
    "patrol",
    "orbit",
    "spotlight",
    "point_laser",
    "follow_leader",
    "form_formation",
    "assign_roles",
    "report_status",
    "stop",
];

/// Generate a short opaque trace id carried by a command and its tasks.
pub fn generate_trace_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("tr_{}", &id[..12])
}

/// Loosely structured command as produced by an interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    #[serde(alias = "command")]
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl RawCommand {
    pub fn new(action: impl Into<String>, target: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            action: action.into(),
            target: target.into(),
            params,
        }
    }
}

/// Output of an interpreter: commands to run, or a question for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interpretation {
    Commands {
        commands: Vec<RawCommand>,
        #[serde(default)]
        explanation: Option<String>,
    },
    Clarification {
        question: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Response {
        message: String,
    },
}

/// Position in a command; `z` is optional and defaulted per platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSpec {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: Option<f64>,
}

impl PointSpec {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn resolve(&self, default_z: f64) -> Vec3 {
        Vec3::new(self.x, self.y, self.z.unwrap_or(default_z))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Coordinates(PointSpec),
    /// Named waypoint resolved against the configured waypoint table
    Waypoint(String),
}

/// The closed catalog of executable actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    GoTo {
        destination: Destination,
        #[serde(default)]
        speed: Option<f64>,
    },
    ReturnHome,
    HoldPosition {
        #[serde(default)]
        duration_s: Option<f64>,
    },
    Patrol {
        waypoints: Vec<PointSpec>,
        #[serde(default)]
        looped: bool,
        #[serde(default)]
        speed: Option<f64>,
    },
    Orbit {
        center: Point2,
        radius_m: f64,
        altitude_m: f64,
        #[serde(default)]
        speed: Option<f64>,
    },
    Spotlight {
        target: Point2,
        #[serde(default)]
        duration_s: Option<f64>,
    },
    PointLaser {
        target: Point2,
        #[serde(default)]
        duration_s: Option<f64>,
    },
    FollowLeader {
        leader: String,
        gap_m: f64,
    },
    FormFormation {
        formation: FormationType,
        spacing_m: f64,
        #[serde(default)]
        leader: Option<String>,
    },
    AssignRoles {
        members: Vec<String>,
        #[serde(default)]
        leader: Option<String>,
        #[serde(default)]
        roles: BTreeMap<String, String>,
    },
    ReportStatus,
    Stop,
}

#[derive(Deserialize)]
struct GoToParams {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    waypoint: Option<String>,
    speed: Option<f64>,
}

#[derive(Deserialize)]
struct HoldParams {
    duration_s: Option<f64>,
}

#[derive(Deserialize)]
struct PatrolParams {
    waypoints: Vec<PointSpec>,
    #[serde(default, rename = "loop")]
    looped: bool,
    speed: Option<f64>,
}

#[derive(Deserialize)]
struct OrbitParams {
    center_x: f64,
    center_y: f64,
    radius_m: f64,
    altitude_m: f64,
    speed: Option<f64>,
}

#[derive(Deserialize)]
struct ObserveParams {
    target_x: f64,
    target_y: f64,
    duration_s: Option<f64>,
}

fn default_gap() -> f64 {
    DEFAULT_GAP_M
}

fn default_spacing() -> f64 {
    DEFAULT_SPACING_M
}

#[derive(Deserialize)]
struct FollowParams {
    leader: String,
    #[serde(default = "default_gap")]
    gap_m: f64,
}

#[derive(Deserialize)]
struct FormationParams {
    #[serde(default)]
    formation: FormationType,
    #[serde(default = "default_spacing")]
    spacing_m: f64,
    leader: Option<String>,
}

#[derive(Deserialize)]
struct AssignRolesParams {
    members: Vec<String>,
    leader: Option<String>,
    #[serde(default)]
    roles: BTreeMap<String, String>,
}

fn parse_params<T: DeserializeOwned>(action: &str, params: &Map<String, Value>) -> Result<T, CommandError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| {
        CommandError::InvalidParameter {
            action: action.to_string(),
            reason: e.to_string(),
        }
    })
}

fn invalid(action: &str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidParameter {
        action: action.to_string(),
        reason: reason.into(),
    }
}

fn check_finite(action: &str, name: &str, value: f64) -> Result<(), CommandError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(action, format!("{name} must be a finite number")))
    }
}

fn check_positive(action: &str, name: &str, value: f64) -> Result<(), CommandError> {
    check_finite(action, name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(action, format!("{name} must be positive, got {value}")))
    }
}

fn check_duration(action: &str, duration_s: Option<f64>) -> Result<(), CommandError> {
    match duration_s {
        Some(d) if !d.is_finite() || d < 0.0 => Err(invalid(
            action,
            format!("duration_s must be a non-negative number, got {d}"),
        )),
        _ => Ok(()),
    }
}

fn check_point(action: &str, point: &PointSpec) -> Result<(), CommandError> {
    check_finite(action, "x", point.x)?;
    check_finite(action, "y", point.y)?;
    if let Some(z) = point.z {
        check_finite(action, "z", z)?;
    }
    Ok(())
}

impl Action {
    /// Parse an action name plus parameter object into a typed action.
    pub fn from_raw(action: &str, params: &Map<String, Value>) -> Result<Action, CommandError> {
        let name = action.trim().to_ascii_lowercase();
        let parsed = match name.as_str() {
            "go_to" => {
                let p: GoToParams = parse_params(&name, params)?;
                let destination = match (p.waypoint, p.x, p.y) {
                    (Some(waypoint), _, _) => Destination::Waypoint(waypoint),
                    (None, Some(x), Some(y)) => Destination::Coordinates(PointSpec { x, y, z: p.z }),
                    _ => {
                        return Err(CommandError::MissingParameter {
                            action: name.clone(),
                            param: "x/y or waypoint".to_string(),
                        })
                    }
                };
                Action::GoTo {
                    destination,
                    speed: p.speed,
                }
            }
            "return_home" => Action::ReturnHome,
            "hold_position" => {
                let p: HoldParams = parse_params(&name, params)?;
                Action::HoldPosition {
                    duration_s: p.duration_s,
                }
            }
            "patrol" => {
                let p: PatrolParams = parse_params(&name, params)?;
                Action::Patrol {
                    waypoints: p.waypoints,
                    looped: p.looped,
                    speed: p.speed,
                }
            }
            "orbit" => {
                let p: OrbitParams = parse_params(&name, params)?;
                Action::Orbit {
                    center: Point2::new(p.center_x, p.center_y),
                    radius_m: p.radius_m,
                    altitude_m: p.altitude_m,
                    speed: p.speed,
                }
            }
            "spotlight" | "point_laser" => {
                let p: ObserveParams = parse_params(&name, params)?;
                let target = Point2::new(p.target_x, p.target_y);
                if name == "spotlight" {
                    Action::Spotlight {
                        target,
                        duration_s: p.duration_s,
                    }
                } else {
                    Action::PointLaser {
                        target,
                        duration_s: p.duration_s,
                    }
                }
            }
            "follow_leader" => {
                let p: FollowParams = parse_params(&name, params)?;
                Action::FollowLeader {
                    leader: p.leader,
                    gap_m: p.gap_m,
                }
            }
            "form_formation" => {
                let p: FormationParams = parse_params(&name, params)?;
                Action::FormFormation {
                    formation: p.formation,
                    spacing_m: p.spacing_m,
                    leader: p.leader,
                }
            }
            "assign_roles" => {
                let p: AssignRolesParams = parse_params(&name, params)?;
                Action::AssignRoles {
                    members: p.members,
                    leader: p.leader,
                    roles: p.roles,
                }
            }
            "report_status" => Action::ReportStatus,
            "stop" => Action::Stop,
            _ => return Err(CommandError::UnknownAction(action.to_string())),
        };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parameter sanity checks that do not need fleet state.
    pub fn validate(&self) -> Result<(), CommandError> {
        let name = self.name();
        if let Some(speed) = self.speed() {
            check_positive(name, "speed", speed)?;
        }
        match self {
            Action::GoTo {
                destination: Destination::Coordinates(point),
                ..
            } => check_point(name, point),
            Action::GoTo {
                destination: Destination::Waypoint(waypoint),
                ..
            } if waypoint.trim().is_empty() => Err(invalid(name, "waypoint name is empty")),
            Action::HoldPosition { duration_s }
            | Action::Spotlight { duration_s, .. }
            | Action::PointLaser { duration_s, .. } => check_duration(name, *duration_s),
            Action::Patrol { waypoints, .. } => {
                if waypoints.is_empty() {
                    return Err(CommandError::MissingParameter {
                        action: name.to_string(),
                        param: "waypoints".to_string(),
                    });
                }
                waypoints.iter().try_for_each(|p| check_point(name, p))
            }
            Action::Orbit {
                center,
                radius_m,
                altitude_m,
                ..
            } => {
                check_finite(name, "center_x", center.x)?;
                check_finite(name, "center_y", center.y)?;
                check_positive(name, "radius_m", *radius_m)?;
                check_finite(name, "altitude_m", *altitude_m)
            }
            Action::FollowLeader { leader, gap_m } => {
                if leader.trim().is_empty() {
                    return Err(invalid(name, "leader is empty"));
                }
                check_positive(name, "gap_m", *gap_m)
            }
            Action::FormFormation { spacing_m, .. } => check_positive(name, "spacing_m", *spacing_m),
            Action::AssignRoles { members, .. } if members.is_empty() => {
                Err(CommandError::MissingParameter {
                    action: name.to_string(),
                    param: "members".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::GoTo { .. } => "go_to",
            Action::ReturnHome => "return_home",
            Action::HoldPosition { .. } => "hold_position",
            Action::Patrol { .. } => "patrol",
            Action::Orbit { .. } => "orbit",
            Action::Spotlight { .. } => "spotlight",
            Action::PointLaser { .. } => "point_laser",
            Action::FollowLeader { .. } => "follow_leader",
            Action::FormFormation { .. } => "form_formation",
            Action::AssignRoles { .. } => "assign_roles",
            Action::ReportStatus => "report_status",
            Action::Stop => "stop",
        }
    }

    /// Explicitly requested speed, if the action carries one.
    pub fn speed(&self) -> Option<f64> {
        match self {
            Action::GoTo { speed, .. } | Action::Patrol { speed, .. } | Action::Orbit { speed, .. } => {
                *speed
            }
            _ => None,
        }
    }

    /// Copy of the action with its speed replaced; unchanged if it has none.
    pub fn with_speed(&self, new_speed: f64) -> Action {
        let mut action = self.clone();
        match &mut action {
            Action::GoTo { speed, .. } | Action::Patrol { speed, .. } | Action::Orbit { speed, .. } => {
                *speed = Some(new_speed);
            }
            _ => {}
        }
        action
    }

    /// Actions only aerial platforms can perform.
    pub fn requires_aerial(&self) -> bool {
        matches!(
            self,
            Action::Orbit { .. } | Action::Spotlight { .. } | Action::PointLaser { .. }
        )
    }

    /// Actions that take exactly one platform as target.
    pub fn single_platform_only(&self) -> bool {
        matches!(
            self,
            Action::GoTo { .. }
                | Action::Patrol { .. }
                | Action::Orbit { .. }
                | Action::Spotlight { .. }
                | Action::PointLaser { .. }
        )
    }

    /// Actions that take a pod as target.
    pub fn pod_only(&self) -> bool {
        matches!(self, Action::FormFormation { .. } | Action::AssignRoles { .. })
    }

    /// Actions whose tasks never complete on their own.
    pub fn is_indefinite(&self) -> bool {
        match self {
            Action::HoldPosition { duration_s }
            | Action::Spotlight { duration_s, .. }
            | Action::PointLaser { duration_s, .. } => duration_s.is_none(),
            Action::Patrol { looped, .. } => *looped,
            Action::Orbit { .. } | Action::FollowLeader { .. } | Action::FormFormation { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Actions that create tasks on target platforms.
    pub fn creates_tasks(&self) -> bool {
        !matches!(
            self,
            Action::AssignRoles { .. } | Action::ReportStatus | Action::Stop
        )
    }
}

/// A typed command addressed to a platform or pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub trace_id: String,
    pub target: String,
    pub action: Action,
}

impl Command {
    pub fn new(target: impl Into<String>, action: Action) -> Self {
        Self {
            trace_id: generate_trace_id(),
            target: target.into(),
            action,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn from_raw(raw: &RawCommand) -> Result<Self, CommandError> {
        let target = raw.target.trim();
        if target.is_empty() {
            return Err(CommandError::EmptyTarget);
        }
        let action = Action::from_raw(&raw.action, &raw.params)?;
        Ok(Self::new(target, action))
    }

    pub fn with_action(&self, action: Action) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            target: self.target.clone(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(action: &str, target: &str, params: Value) -> RawCommand {
        RawCommand::new(action, target, params)
    }

    #[test]
    fn parses_go_to_coordinates() {
        let cmd = Command::from_raw(&raw("go_to", "ugv1", json!({"x": 20, "y": 30, "speed": 3}))).unwrap();
        assert_eq!(cmd.target, "ugv1");
        assert!(cmd.trace_id.starts_with("tr_"));
        assert_eq!(
            cmd.action,
            Action::GoTo {
                destination: Destination::Coordinates(PointSpec::new(20.0, 30.0)),
                speed: Some(3.0),
            }
        );
    }

    #[test]
    fn parses_go_to_waypoint() {
        let cmd = Command::from_raw(&raw("go_to", "uav1", json!({"waypoint": "checkpoint_alpha"}))).unwrap();
        assert_eq!(
            cmd.action,
            Action::GoTo {
                destination: Destination::Waypoint("checkpoint_alpha".into()),
                speed: None,
            }
        );
    }

    #[test]
    fn go_to_without_destination_is_missing_parameter() {
        let err = Command::from_raw(&raw("go_to", "ugv1", json!({"x": 1}))).unwrap_err();
        assert!(matches!(err, CommandError::MissingParameter { .. }));
    }

    #[test]
    fn unknown_action_rejected() {
        let err = Command::from_raw(&raw("fire_missile", "ugv1", json!({}))).unwrap_err();
        assert_eq!(err, CommandError::UnknownAction("fire_missile".into()));
    }

    #[test]
    fn empty_target_rejected() {
        let err = Command::from_raw(&raw("stop", "  ", json!({}))).unwrap_err();
        assert_eq!(err, CommandError::EmptyTarget);
    }

    #[test]
    fn parameter_ranges_checked() {
        assert!(Command::from_raw(&raw("go_to", "ugv1", json!({"x": 1, "y": 1, "speed": 0}))).is_err());
        assert!(Command::from_raw(&raw("hold_position", "ugv1", json!({"duration_s": -1}))).is_err());
        assert!(Command::from_raw(&raw("orbit", "uav1", json!({
            "center_x": 0, "center_y": 0, "radius_m": 0, "altitude_m": 20
        })))
        .is_err());
        assert!(Command::from_raw(&raw("patrol", "ugv1", json!({"waypoints": []}))).is_err());
        assert!(Command::from_raw(&raw("follow_leader", "ugv_pod", json!({"leader": "ugv1", "gap_m": -2}))).is_err());
        assert!(Command::from_raw(&raw("orbit", "uav1", json!({"center_x": 0}))).is_err());
    }

    #[test]
    fn defaults_applied() {
        let cmd = Command::from_raw(&raw("follow_leader", "ugv_pod", json!({"leader": "ugv1"}))).unwrap();
        assert_eq!(
            cmd.action,
            Action::FollowLeader {
                leader: "ugv1".into(),
                gap_m: DEFAULT_GAP_M
            }
        );
        let cmd = Command::from_raw(&raw("form_formation", "uav_pod", json!({}))).unwrap();
        assert_eq!(
            cmd.action,
            Action::FormFormation {
                formation: FormationType::Line,
                spacing_m: DEFAULT_SPACING_M,
                leader: None
            }
        );
    }

    #[test]
    fn patrol_loop_flag() {
        let cmd = Command::from_raw(&raw(
            "patrol",
            "ugv1",
            json!({"waypoints": [{"x": 1, "y": 2}, {"x": 3, "y": 4}], "loop": true}),
        ))
        .unwrap();
        assert!(cmd.action.is_indefinite());
        assert_eq!(cmd.action.name(), "patrol");
    }

    #[test]
    fn with_speed_only_touches_speed_actions() {
        let go = Action::GoTo {
            destination: Destination::Coordinates(PointSpec::new(1.0, 1.0)),
            speed: Some(10.0),
        };
        assert_eq!(go.with_speed(5.0).speed(), Some(5.0));
        assert_eq!(Action::Stop.with_speed(5.0), Action::Stop);
    }

    #[test]
    fn interpretation_variants_deserialize() {
        let clarification: Interpretation = serde_json::from_value(json!({
            "type": "clarification",
            "question": "Which platform?",
            "options": ["ugv1", "ugv2"]
        }))
        .unwrap();
        assert!(matches!(clarification, Interpretation::Clarification { ref options, .. } if options.len() == 2));

        let commands: Interpretation = serde_json::from_value(json!({
            "type": "commands",
            "commands": [{"command": "stop", "target": "all"}]
        }))
        .unwrap();
        match commands {
            Interpretation::Commands { commands, .. } => assert_eq!(commands[0].action, "stop"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_serde_round_trip() {
        let cmd = Command::new(
            "uav1",
            Action::Orbit {
                center: Point2::new(10.0, 5.0),
                radius_m: 8.0,
                altitude_m: 20.0,
                speed: None,
            },
        );
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
