//! Issue model.
//!
//! Wire names follow the tracker's JSONL dialect: snake_case statuses and
//! types, kebab-case dependency kinds, priority as a bare integer. The engine
//! never mutates issues; everything downstream works off immutable snapshots
//! of this model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Issue lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Closed => "closed",
        }
    }

    /// Open or in-progress: the statuses eligible for recommendation.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::InvalidInput { reason: format!("invalid status: {other}") }),
        }
    }
}

/// Issue type category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Feature,
    #[default]
    Task,
    Epic,
    Chore,
}

impl IssueType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Chore => "chore",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Issue priority (0 = most urgent, 4 = backlog, default 2).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const CRITICAL: Self = Self(0);
    pub const HIGH: Self = Self(1);
    pub const MEDIUM: Self = Self(2);
    pub const LOW: Self = Self(3);
    pub const BACKLOG: Self = Self(4);

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0 && self.0 <= 4
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Dependency relationship kind. Only `Blocks` participates in reachability
/// and blocking analysis; the other kinds are retained for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Blocks,
    Related,
    ParentOf,
    DiscoveredFrom,
}

impl DependencyKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Related => "related",
            Self::ParentOf => "parent-of",
            Self::DiscoveredFrom => "discovered-from",
        }
    }

    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocks)
    }
}

/// An edge from the owning issue to another issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub depends_on_id: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

impl Dependency {
    #[must_use]
    pub fn blocks(target: impl Into<String>) -> Self {
        Self { depends_on_id: target.into(), kind: DependencyKind::Blocks }
    }
}

/// The primary issue entity as the engine receives it: fully decoded, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub issue_type: IssueType,

    #[serde(default)]
    pub priority: Priority,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Estimated effort in days, when the tracker has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_days: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl Issue {
    /// Minimal constructor used pervasively in tests.
    #[must_use]
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: String::new(),
            description: None,
            status,
            issue_type: IssueType::default(),
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
            labels: Vec::new(),
            estimate_days: None,
            dependencies: Vec::new(),
        }
    }

    /// Iterate the targets of blocking dependencies only.
    pub fn blocking_targets(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| d.kind.is_blocking())
            .map(|d| d.depends_on_id.as_str())
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [Status::Open, Status::InProgress, Status::Blocked, Status::Closed] {
            let json = serde_json::to_string(&status).unwrap();
            let back: Status = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
            assert_eq!(status, status.as_str().parse().unwrap());
        }
    }

    #[test]
    fn dependency_kind_wire_names() {
        let dep = Dependency { depends_on_id: "bd-1".into(), kind: DependencyKind::ParentOf };
        let json = serde_json::to_string(&dep).unwrap();
        assert!(json.contains(r#""type":"parent-of""#));
    }

    #[test]
    fn priority_bounds() {
        assert!(Priority(0).is_valid());
        assert!(Priority(4).is_valid());
        assert!(!Priority(5).is_valid());
        assert!(!Priority(-1).is_valid());
        assert_eq!(Priority::default(), Priority::MEDIUM);
    }

    #[test]
    fn blocking_targets_filters_kinds() {
        let mut issue = Issue::new("a", Status::Open);
        issue.dependencies = vec![
            Dependency::blocks("b"),
            Dependency { depends_on_id: "c".into(), kind: DependencyKind::Related },
        ];
        let targets: Vec<_> = issue.blocking_targets().collect();
        assert_eq!(targets, vec!["b"]);
    }

    #[test]
    fn issue_serde_round_trip() {
        let mut issue = Issue::new("bd-42", Status::InProgress);
        issue.title = "Wire up the frobnicator".into();
        issue.labels = vec!["urgent".into()];
        issue.estimate_days = Some(0.5);
        issue.dependencies = vec![Dependency::blocks("bd-41")];
        let json = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(issue, back);
    }
}
