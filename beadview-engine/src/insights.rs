//! Graph insights: every phase-2 metric with its derived top-10 list, the
//! cycle inventory, the critical path and articulation points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::AsOf;
use crate::error::Diagnostic;
use crate::stats::{MetricStatus, Stats};

/// Graph-level health summary shared by triage and insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHealth {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub has_cycles: bool,
    pub cycle_count: usize,
    pub phase2_ready: bool,
}

impl GraphHealth {
    pub(crate) fn from_stats(stats: &Stats) -> Self {
        Self {
            node_count: stats.graph().node_count(),
            edge_count: stats.graph().edge_count(),
            density: stats.phase1().density,
            has_cycles: stats.phase1().has_cycles,
            cycle_count: stats.cycle_count(),
            phase2_ready: stats.is_phase2_ready(),
        }
    }
}

/// One row in a per-metric top list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTop {
    pub issue_id: String,
    pub value: f64,
}

/// Cycle inventory, already capped at the engine's cycle cap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleList {
    /// Cycles as issue-ID sequences; sentinel rows (`...`,
    /// `CYCLE_DETECTION_TIMEOUT`) come last.
    pub cycles: Vec<Vec<String>>,
    /// Non-trivial SCC count.
    pub count: usize,
    pub capped: bool,
}

/// The heaviest dependency chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CriticalPathInfo {
    /// Execution order: deepest blocker first.
    pub issue_ids: Vec<String>,
    pub length: f64,
}

/// Full insight report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsResult {
    pub data_hash: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<AsOf>,
    pub graph: GraphHealth,
    /// Per-metric computation status, fixed key order.
    pub status: BTreeMap<String, MetricStatus>,
    pub top_pagerank: Vec<MetricTop>,
    pub top_betweenness: Vec<MetricTop>,
    pub top_hubs: Vec<MetricTop>,
    pub top_authorities: Vec<MetricTop>,
    pub top_eigenvector: Vec<MetricTop>,
    pub top_critical: Vec<MetricTop>,
    pub top_k_core: Vec<MetricTop>,
    pub articulation_points: Vec<String>,
    pub cycles: CycleList,
    pub critical_path: CriticalPathInfo,
    pub diagnostics: Vec<Diagnostic>,
}

/// Top-10 positive entries, value descending, ties by ID ascending.
fn top_list(stats: &Stats, values: Option<&[f64]>) -> Vec<MetricTop> {
    let Some(values) = values else { return Vec::new() };
    let graph = stats.graph();
    let mut rows: Vec<MetricTop> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > 0.0)
        .map(|(node, &v)| MetricTop { issue_id: graph.id_of(node as u32).to_string(), value: v })
        .collect();
    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.issue_id.cmp(&b.issue_id))
    });
    rows.truncate(10);
    rows
}

pub(crate) fn assemble(
    stats: &Stats,
    generated_at: DateTime<Utc>,
    as_of: Option<AsOf>,
) -> InsightsResult {
    let graph = stats.graph();

    let hits = stats.hits_scores();
    let core_f64: Option<Vec<f64>> =
        stats.kcore_vec().map(|cores| cores.iter().map(|&c| c as f64).collect());

    let cycles = match stats.cycle_report() {
        Some(report) => CycleList {
            cycles: stats.cycles_as_ids(),
            count: report.cycle_count,
            capped: !report.sentinels.is_empty(),
        },
        None => CycleList::default(),
    };

    let critical_path = match stats.critical_path() {
        Some(cp) => CriticalPathInfo {
            issue_ids: cp.path.iter().map(|&n| graph.id_of(n).to_string()).collect(),
            length: cp.length,
        },
        None => CriticalPathInfo::default(),
    };

    let articulation_points: Vec<String> = stats
        .articulation_vec()
        .map(|points| points.iter().map(|&n| graph.id_of(n).to_string()).collect())
        .unwrap_or_default();

    InsightsResult {
        data_hash: stats.fingerprint().to_string(),
        generated_at,
        as_of,
        graph: GraphHealth::from_stats(stats),
        status: stats.metric_statuses(),
        top_pagerank: top_list(stats, stats.pagerank_vec()),
        top_betweenness: top_list(stats, stats.betweenness_vec()),
        top_hubs: top_list(stats, hits.map(|h| h.hubs.as_slice())),
        top_authorities: top_list(stats, hits.map(|h| h.authorities.as_slice())),
        top_eigenvector: top_list(stats, stats.eigenvector_vec()),
        top_critical: top_list(stats, stats.critical_path().map(|c| c.score.as_slice())),
        top_k_core: top_list(stats, core_f64.as_deref()),
        articulation_points,
        cycles,
        critical_path,
        diagnostics: graph.diagnostics().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::EngineConfig;
    use crate::model::{Dependency, Issue, Status};

    fn issue(id: &str, deps: &[&str]) -> Issue {
        let mut i = Issue::new(id, Status::Open);
        i.dependencies = deps.iter().map(|d| Dependency::blocks(*d)).collect();
        i
    }

    fn insights(issues: Vec<Issue>) -> InsightsResult {
        let analyzer = Analyzer::new(issues, EngineConfig::default()).unwrap();
        let stats = analyzer.analyze_async().unwrap();
        assert!(stats.wait_for_phase2(std::time::Duration::from_secs(10)));
        assemble(&stats, Utc::now(), None)
    }

    #[test]
    fn empty_input_is_zero_filled() {
        let result = insights(vec![]);
        assert!(result.top_pagerank.is_empty());
        assert!(result.cycles.cycles.is_empty());
        assert!(!result.graph.has_cycles);
        assert_eq!(result.critical_path.length, 0.0);
        assert!(!result.data_hash.is_empty());
    }

    #[test]
    fn chain_critical_path_in_execution_order() {
        let result = insights(vec![issue("a", &["b"]), issue("b", &["c"]), issue("c", &[])]);
        assert_eq!(result.critical_path.issue_ids, vec!["c", "b", "a"]);
        assert_eq!(result.critical_path.length, 3.0);
        assert!(!result.top_pagerank.is_empty());
        assert_eq!(result.top_pagerank[0].issue_id, "c");
    }

    #[test]
    fn two_cycle_is_reported() {
        let result = insights(vec![issue("a", &["b"]), issue("b", &["a"])]);
        assert!(result.graph.has_cycles);
        assert_eq!(result.graph.cycle_count, 1);
        assert_eq!(result.cycles.cycles.len(), 1);
        assert_eq!(result.cycles.cycles[0], vec!["a", "b"]);
        assert!(!result.cycles.capped);
    }

    #[test]
    fn top_lists_capped_at_ten() {
        // Star of 15 nodes all blocking on a hub.
        let mut issues = vec![issue("hub", &[])];
        for i in 0..15 {
            issues.push(issue(&format!("s{i:02}"), &["hub"]));
        }
        let result = insights(issues);
        assert!(result.top_pagerank.len() <= 10);
        assert_eq!(result.top_pagerank[0].issue_id, "hub");
    }

    #[test]
    fn serde_round_trip() {
        let result = insights(vec![issue("a", &["b"]), issue("b", &[])]);
        let json = serde_json::to_string(&result).unwrap();
        let back: InsightsResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
