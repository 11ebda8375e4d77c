//! Parallel execution plan: layered antichain decomposition of the
//! actionable set.
//!
//! Each track is a set of issues with no blocking dependencies among its
//! members, extracted greedily (ready set first), so a team can claim a whole
//! track concurrently. The union of all tracks is exactly the actionable set.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::AsOf;
use crate::error::Diagnostic;
use crate::model::Priority;
use crate::stats::Stats;

/// One issue inside a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanIssue {
    pub issue_id: String,
    pub title: String,
    pub priority: Priority,
    /// Non-closed issues directly waiting on this one.
    pub unblocks: Vec<String>,
}

/// A group of issues that can be worked concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTrack {
    /// 1-indexed track number.
    pub track: usize,
    pub issues: Vec<PlanIssue>,
}

/// The full execution plan report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub data_hash: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<AsOf>,
    pub tracks: Vec<PlanTrack>,
    pub actionable_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn assemble(
    stats: &Stats,
    generated_at: DateTime<Utc>,
    as_of: Option<AsOf>,
) -> PlanResult {
    PlanResult {
        data_hash: stats.fingerprint().to_string(),
        generated_at,
        as_of,
        tracks: execution_tracks(stats),
        actionable_count: stats.phase1().actionable.len(),
        diagnostics: stats.graph().diagnostics().to_vec(),
    }
}

/// Decompose the actionable set into tracks.
pub fn execution_tracks(stats: &Stats) -> Vec<PlanTrack> {
    let graph = stats.graph();
    let actionable: Vec<u32> = stats.phase1().actionable.clone();
    let actionable_set: FxHashSet<u32> = actionable.iter().copied().collect();

    let mut remaining: Vec<u32> = actionable;
    let mut remaining_set = actionable_set;
    let mut tracks = Vec::new();

    while !remaining.is_empty() {
        // Ready layer: no blocking target still in the remaining set. This is
        // a maximal antichain of what is left.
        let layer: Vec<u32> = remaining
            .iter()
            .copied()
            .filter(|&v| graph.blockers_of(v).iter().all(|t| !remaining_set.contains(t)))
            .collect();

        // Actionable issues cannot block each other through open work, but a
        // stale layer guard keeps this loop finite on any input.
        let layer = if layer.is_empty() { std::mem::take(&mut remaining) } else { layer };

        for &v in &layer {
            remaining_set.remove(&v);
        }
        remaining.retain(|v| remaining_set.contains(v));

        let issues: Vec<PlanIssue> = layer
            .iter()
            .map(|&v| {
                let issue = stats.issue_of(v);
                PlanIssue {
                    issue_id: issue.id.clone(),
                    title: issue.title.clone(),
                    priority: issue.priority,
                    unblocks: graph
                        .dependents_of(v)
                        .iter()
                        .filter(|&&d| !stats.issue_of(d).status.is_closed())
                        .map(|&d| graph.id_of(d).to_string())
                        .collect(),
                }
            })
            .collect();

        tracks.push(PlanTrack { track: tracks.len() + 1, issues });
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::EngineConfig;
    use crate::model::{Dependency, Issue, Status};
    use std::sync::Arc;

    fn issue(id: &str, status: Status, deps: &[&str]) -> Issue {
        let mut i = Issue::new(id, status);
        i.dependencies = deps.iter().map(|d| Dependency::blocks(*d)).collect();
        i
    }

    fn analyze(issues: Vec<Issue>) -> Arc<Stats> {
        Analyzer::new(issues, EngineConfig::default()).unwrap().analyze().unwrap()
    }

    #[test]
    fn empty_input_has_no_tracks() {
        let stats = analyze(vec![]);
        assert!(execution_tracks(&stats).is_empty());
    }

    #[test]
    fn chain_head_forms_single_track() {
        // 500-node chain: only the tail end is actionable.
        let mut issues = Vec::new();
        for i in 0..500 {
            let deps: Vec<String> =
                if i + 1 < 500 { vec![format!("n{:03}", i + 1)] } else { Vec::new() };
            let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
            issues.push(issue(&format!("n{i:03}"), Status::Open, &dep_refs));
        }
        let stats = analyze(issues);
        let tracks = execution_tracks(&stats);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].issues.len(), 1);
        assert_eq!(tracks[0].issues[0].issue_id, "n499");
    }

    #[test]
    fn track_union_equals_actionable_set() {
        let stats = analyze(vec![
            issue("a", Status::Open, &[]),
            issue("b", Status::Open, &[]),
            issue("c", Status::Open, &["a"]),
            issue("d", Status::Closed, &[]),
        ]);
        let tracks = execution_tracks(&stats);
        let planned: Vec<&str> = tracks
            .iter()
            .flat_map(|t| t.issues.iter().map(|i| i.issue_id.as_str()))
            .collect();
        let actionable: Vec<&str> =
            stats.phase1().actionable.iter().map(|&v| stats.graph().id_of(v)).collect();
        assert_eq!(planned, actionable);
    }

    #[test]
    fn no_track_contains_blocking_pair() {
        let stats = analyze(vec![
            issue("a", Status::Open, &["b"]),
            issue("b", Status::Open, &[]),
            issue("c", Status::Open, &[]),
        ]);
        for track in execution_tracks(&stats) {
            let members: Vec<&str> =
                track.issues.iter().map(|i| i.issue_id.as_str()).collect();
            for member in &track.issues {
                let node = stats.graph().node_of(&member.issue_id).unwrap();
                for &blocker in stats.graph().blockers_of(node) {
                    assert!(
                        !members.contains(&stats.graph().id_of(blocker)),
                        "track contains both {} and its blocker",
                        member.issue_id
                    );
                }
            }
        }
    }

    #[test]
    fn unblocks_lists_direct_dependents() {
        let stats = analyze(vec![
            issue("a", Status::Open, &["b"]),
            issue("b", Status::Open, &[]),
        ]);
        let tracks = execution_tracks(&stats);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].issues[0].issue_id, "b");
        assert_eq!(tracks[0].issues[0].unblocks, vec!["a"]);
    }
}
