//! Analyzer: input validation, snapshot construction, phase orchestration.

use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fingerprint::data_fingerprint;
use crate::graph::DepGraph;
use crate::model::Issue;
use crate::stats::Stats;
use crate::{phase1, phase2};

/// Owns one issue snapshot and produces `Stats` from it.
pub struct Analyzer {
    issues: Arc<Vec<Issue>>,
    graph: Arc<DepGraph>,
    config: EngineConfig,
}

impl Analyzer {
    /// Validate the input and build the dependency graph. Malformed
    /// references become diagnostics on the graph; only unusable field
    /// values are errors.
    pub fn new(issues: Vec<Issue>, config: EngineConfig) -> Result<Self, EngineError> {
        validate_issues(&issues)?;
        let graph = DepGraph::build(&issues);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            diagnostics = graph.diagnostics().len(),
            "built dependency graph"
        );
        Ok(Self { issues: Arc::new(issues), graph: Arc::new(graph), config })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run phase 1 and return the snapshot; phase-2 slots stay unpublished.
    pub fn analyze(&self) -> Result<Arc<Stats>, EngineError> {
        let node_issue = self.node_issue_map();
        let phase1 = phase1::compute(&self.graph, &self.issues, &node_issue)?;
        let fingerprint = data_fingerprint(&self.issues);
        Ok(Arc::new(Stats::new(
            Arc::clone(&self.issues),
            Arc::clone(&self.graph),
            node_issue,
            fingerprint,
            phase1,
        )))
    }

    /// Run phase 1 synchronously and kick phase 2 onto the worker pool.
    /// Readers may use the snapshot immediately; phase-2 values transition
    /// from zero to final exactly once.
    pub fn analyze_async(&self) -> Result<Arc<Stats>, EngineError> {
        let stats = self.analyze()?;
        phase2::spawn(&stats, &self.config);
        Ok(stats)
    }

    /// node index -> index into the issue vector. Differ only when the input
    /// carried duplicate IDs (first occurrence owns the node).
    fn node_issue_map(&self) -> Vec<u32> {
        let mut map = vec![u32::MAX; self.graph.node_count()];
        for (ix, issue) in self.issues.iter().enumerate() {
            if let Some(node) = self.graph.node_of(&issue.id) {
                if map[node as usize] == u32::MAX {
                    map[node as usize] = ix as u32;
                }
            }
        }
        map
    }
}

fn validate_issues(issues: &[Issue]) -> Result<(), EngineError> {
    for issue in issues {
        if issue.id.is_empty() {
            return Err(EngineError::InvalidInput { reason: "issue with empty id".into() });
        }
        if !issue.priority.is_valid() {
            return Err(EngineError::InvalidInput {
                reason: format!("issue {}: priority {} out of range 0..=4", issue.id, issue.priority.0),
            });
        }
        if let Some(estimate) = issue.estimate_days {
            if !estimate.is_finite() || estimate < 0.0 {
                return Err(EngineError::InvalidInput {
                    reason: format!("issue {}: estimate_days must be finite and non-negative", issue.id),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Status};
    use std::time::Duration;

    #[test]
    fn rejects_out_of_range_priority() {
        let mut bad = Issue::new("a", Status::Open);
        bad.priority = Priority(9);
        assert!(matches!(
            Analyzer::new(vec![bad], EngineConfig::default()),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn rejects_empty_id() {
        let bad = Issue::new("", Status::Open);
        assert!(Analyzer::new(vec![bad], EngineConfig::default()).is_err());
    }

    #[test]
    fn rejects_non_finite_estimate() {
        let mut bad = Issue::new("a", Status::Open);
        bad.estimate_days = Some(f64::INFINITY);
        assert!(Analyzer::new(vec![bad], EngineConfig::default()).is_err());
    }

    #[test]
    fn analyze_async_reaches_ready() {
        let analyzer =
            Analyzer::new(vec![Issue::new("a", Status::Open)], EngineConfig::default()).unwrap();
        let stats = analyzer.analyze_async().unwrap();
        assert!(stats.wait_for_phase2(Duration::from_secs(5)));
        assert!(stats.is_phase2_ready());
    }

    #[test]
    fn identical_inputs_share_fingerprint() {
        let issues = vec![Issue::new("a", Status::Open)];
        let a = Analyzer::new(issues.clone(), EngineConfig::default()).unwrap();
        let b = Analyzer::new(issues, EngineConfig::default()).unwrap();
        assert_eq!(
            a.analyze().unwrap().fingerprint(),
            b.analyze().unwrap().fingerprint()
        );
    }
}
