//! Engine errors and non-fatal diagnostics.
//!
//! The engine is a reporter, not a validator: malformed references in the
//! issue data become `Diagnostic` entries on the result, never errors. Only
//! unusable input (`InvalidInput`) or an internal bug (`InvariantViolation`)
//! fail a call. Timeouts and cancellation are per-metric status states, not
//! errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors surfaced by engine entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The input cannot be analyzed: out-of-range priority, non-finite
    /// configuration numbers, empty issue IDs. No work is performed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Internal consistency failure. Indicates a bug in the engine.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

impl From<beadview_fast::GraphError> for EngineError {
    fn from(err: beadview_fast::GraphError) -> Self {
        // The builder guarantees kernel inputs are well formed, so a kernel
        // error can only mean the engine broke its own invariants.
        EngineError::InvariantViolation { detail: err.to_string() }
    }
}

/// Kind of a non-fatal data problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A dependency points at an ID not present in the issue set.
    DanglingReference,
    /// An issue declares a blocking dependency on itself.
    SelfLoop,
    /// Two issues share an ID; the first occurrence wins.
    DuplicateId,
}

/// A non-fatal problem observed while building the graph, reported on every
/// robot-facing result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The issue the problem was observed on.
    pub issue_id: String,
    /// The referenced target, when the problem involves one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn dangling(issue_id: &str, target: &str) -> Self {
        Self {
            kind: DiagnosticKind::DanglingReference,
            issue_id: issue_id.to_string(),
            target: Some(target.to_string()),
            message: format!("{issue_id} depends on unknown issue {target}"),
        }
    }

    pub(crate) fn self_loop(issue_id: &str) -> Self {
        Self {
            kind: DiagnosticKind::SelfLoop,
            issue_id: issue_id.to_string(),
            target: None,
            message: format!("{issue_id} declares a blocking dependency on itself"),
        }
    }

    pub(crate) fn duplicate(issue_id: &str) -> Self {
        Self {
            kind: DiagnosticKind::DuplicateId,
            issue_id: issue_id.to_string(),
            target: None,
            message: format!("duplicate issue id {issue_id}; first occurrence kept"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_serialize_snake_case() {
        let d = Diagnostic::dangling("a", "ghost");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains(r#""kind":"dangling_reference""#));
        assert!(json.contains(r#""target":"ghost""#));
    }

    #[test]
    fn graph_error_maps_to_invariant_violation() {
        let err: EngineError = beadview_fast::GraphError::NodeOutOfBounds(7, 3).into();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }
}
