//! Verdict types returned by the engine.

use commander_domain::{Command, CommandError, ACTION_NAMES};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Approved,
    Rejected,
    Rewritten,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Approved => "approved",
            VerdictKind::Rejected => "rejected",
            VerdictKind::Rewritten => "rewritten",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnknownAction,
    InvalidParameter,
    UnknownTarget,
    InvalidCommand,
    Speed,
    Bounds,
    NoGo,
    Separation,
    CommsTimeout,
}

impl ViolationKind {
    /// Violations a clamp-style rewrite may resolve.
    pub fn is_clampable(&self) -> bool {
        matches!(
            self,
            ViolationKind::Speed | ViolationKind::Bounds | ViolationKind::Separation
        )
    }

    /// Validation-class violations: the command never reached the safety checks.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ViolationKind::UnknownAction
                | ViolationKind::InvalidParameter
                | ViolationKind::UnknownTarget
                | ViolationKind::InvalidCommand
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    /// Offending or affected platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            platform_id: None,
            zone: None,
        }
    }

    pub fn platform(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }
}

impl From<&CommandError> for Violation {
    fn from(err: &CommandError) -> Self {
        let kind = match err {
            CommandError::UnknownAction(_) => ViolationKind::UnknownAction,
            CommandError::EmptyTarget => ViolationKind::UnknownTarget,
            CommandError::MissingParameter { .. } | CommandError::InvalidParameter { .. } => {
                ViolationKind::InvalidParameter
            }
        };
        Violation::new(kind, err.to_string())
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One field changed by a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: String,
    pub after: String,
    pub reason: String,
}

/// A rewritten command plus the diff that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rewrite {
    pub command: Command,
    pub changes: Vec<FieldChange>,
}

/// Outcome of a constraint check.
///
/// `Rejected` always carries at least one violation; `Approved` and
/// `Rewritten` carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintVerdict {
    pub verdict: VerdictKind,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<Rewrite>,
}

impl ConstraintVerdict {
    pub fn approved(warnings: Vec<String>, suggestions: Vec<String>) -> Self {
        Self {
            verdict: VerdictKind::Approved,
            violations: Vec::new(),
            warnings,
            suggestions,
            rewrite: None,
        }
    }

    pub fn rejected(mut violations: Vec<Violation>, suggestions: Vec<String>) -> Self {
        if violations.is_empty() {
            violations.push(Violation::new(
                ViolationKind::InvalidCommand,
                "Command rejected without a recorded reason",
            ));
        }
        Self {
            verdict: VerdictKind::Rejected,
            violations,
            warnings: Vec::new(),
            suggestions,
            rewrite: None,
        }
    }

    /// Rejection with a single violation and optional suggestion.
    pub fn reject(violation: Violation, suggestion: Option<String>) -> Self {
        Self::rejected(vec![violation], suggestion.into_iter().collect())
    }

    /// Rejection for a raw command that failed to parse.
    pub fn invalid_command(err: &CommandError) -> Self {
        let suggestion = matches!(err, CommandError::UnknownAction(_))
            .then(|| format!("Known actions: {}", ACTION_NAMES.join(", ")));
        Self::reject(Violation::from(err), suggestion)
    }

    pub fn rewritten(rewrite: Rewrite, warnings: Vec<String>, suggestions: Vec<String>) -> Self {
        Self {
            verdict: VerdictKind::Rewritten,
            violations: Vec::new(),
            warnings,
            suggestions,
            rewrite: Some(rewrite),
        }
    }

    /// Approved or rewritten.
    pub fn is_approved(&self) -> bool {
        self.verdict != VerdictKind::Rejected
    }

    pub fn is_rejected(&self) -> bool {
        self.verdict == VerdictKind::Rejected
    }

    /// The command to execute: the rewrite when present, else `original`.
    pub fn effective_command<'a>(&'a self, original: &'a Command) -> &'a Command {
        self.rewrite.as_ref().map_or(original, |r| &r.command)
    }

    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Violation messages joined for display and logging.
    pub fn summary(&self) -> String {
        match self.verdict {
            VerdictKind::Rejected => self
                .violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            VerdictKind::Rewritten => {
                let changes = self
                    .rewrite
                    .as_ref()
                    .map(|r| {
                        r.changes
                            .iter()
                            .map(|c| format!("{}: {} -> {}", c.field, c.before, c.after))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                format!("rewritten ({changes})")
            }
            VerdictKind::Approved => "approved".to_string(),
        }
    }
}
