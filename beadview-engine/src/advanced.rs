//! Advanced insights: bounded, deterministic outputs for agents. The top-K
//! unlock set, critical-path coverage, k heaviest paths, parallelism
//! suggestions, and cycle-break suggestions.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use beadview_fast::critical_path::k_longest_paths;

use crate::config::{AdvancedCaps, AsOf};
use crate::error::Diagnostic;
use crate::scoring::ImpactScore;
use crate::stats::{MetricStatus, Stats};
use crate::whatif::{top_k_unlock_set, TopKSetItem};

/// Computation state for one advanced feature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureStatus {
    /// `available` or `skipped`.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub capped: bool,
    pub count: usize,
    /// Original count before capping; zero when not capped.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub limited: usize,
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

impl FeatureStatus {
    fn available(count: usize) -> Self {
        Self { state: "available".into(), reason: None, capped: false, count, limited: 0 }
    }

    fn available_capped(count: usize, original: usize) -> Self {
        Self {
            state: "available".into(),
            reason: None,
            capped: original > count,
            count,
            limited: if original > count { original } else { 0 },
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            state: "skipped".into(),
            reason: Some(reason.to_string()),
            capped: false,
            count: 0,
            limited: 0,
        }
    }
}

/// Greedy unlock set wrapped with status and usage hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKSetResult {
    pub status: FeatureStatus,
    pub items: Vec<TopKSetItem>,
    pub total_gain: usize,
    pub marginal_gain: Vec<usize>,
    pub how_to_use: String,
}

/// One member of the critical-path coverage set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageItem {
    pub id: String,
    pub title: String,
    /// Indices into the k-paths list this pick covers.
    pub covers_paths: Vec<usize>,
}

/// Minimal set of issues covering all k critical paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSetResult {
    pub status: FeatureStatus,
    pub items: Vec<CoverageItem>,
    pub paths_covered: usize,
    pub total_paths: usize,
    pub how_to_use: String,
}

/// One of the k heaviest dependency chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPathEntry {
    /// 1-indexed rank by weighted length.
    pub rank: usize,
    /// Node count after truncation.
    pub length: usize,
    /// Weighted length of the full path.
    pub weight: f64,
    /// Execution order: deepest blocker first.
    pub issue_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// The k heaviest paths through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KPathsResult {
    pub status: FeatureStatus,
    pub paths: Vec<CriticalPathEntry>,
    pub how_to_use: String,
}

/// An issue whose completion widens the actionable frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelCutItem {
    pub id: String,
    pub title: String,
    /// Issues that become actionable when this one closes.
    pub parallel_gain: usize,
    pub enabled_ids: Vec<String>,
}

/// Suggestions for maximizing parallel work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelCutResult {
    pub status: FeatureStatus,
    pub suggestions: Vec<ParallelCutItem>,
    /// Widest frontier reachable by completing one suggestion.
    pub max_parallel: usize,
    pub how_to_use: String,
}

/// Parallelism delta for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGainItem {
    pub id: String,
    pub title: String,
    pub current_parallel: usize,
    pub potential_parallel: usize,
    pub gain_percent: f64,
}

/// Parallelization gain metrics for the best cut suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGainResult {
    pub status: FeatureStatus,
    pub metrics: Vec<ParallelGainItem>,
    pub how_to_use: String,
}

/// One edge-removal suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBreakItem {
    pub edge_from: String,
    pub edge_to: String,
    /// Number of detected cycles this edge appears in.
    pub impact: usize,
    /// Dependents of the target that removing the edge would affect.
    pub collateral: usize,
    /// Indices into the cycle list; the edge appears in every one.
    pub in_cycles: Vec<usize>,
    pub rationale: String,
}

/// Cycle-break suggestions, ranked most-shared edge first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBreakResult {
    pub status: FeatureStatus,
    pub suggestions: Vec<CycleBreakItem>,
    pub cycle_count: usize,
    pub how_to_use: String,
    pub advisory: String,
}

/// The full advanced-insights report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedInsights {
    pub data_hash: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<AsOf>,
    pub topk_set: TopKSetResult,
    pub coverage_set: CoverageSetResult,
    pub k_paths: KPathsResult,
    pub parallel_cut: ParallelCutResult,
    pub parallel_gain: ParallelGainResult,
    pub cycle_break: CycleBreakResult,
    pub config: AdvancedCaps,
    /// Phase-2 metric statuses backing these features, fixed key order.
    pub status: BTreeMap<String, MetricStatus>,
    pub usage_hints: BTreeMap<String, String>,
    pub diagnostics: Vec<Diagnostic>,
}

fn usage_hints() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "topk_set".to_string(),
            "Best k issues to complete for maximum downstream unlock. Work them in order.".to_string(),
        ),
        (
            "coverage_set".to_string(),
            "Minimal set covering all critical paths. Ensures no path is neglected.".to_string(),
        ),
        (
            "k_paths".to_string(),
            "Heaviest dependency chains. Focus on issues appearing in several paths.".to_string(),
        ),
        (
            "parallel_cut".to_string(),
            "Issues that widen the actionable frontier. Complete to raise team throughput.".to_string(),
        ),
        (
            "parallel_gain".to_string(),
            "Parallelism improvement from completing each suggestion.".to_string(),
        ),
        (
            "cycle_break".to_string(),
            "Structural fix suggestions. Apply before working on cycle members.".to_string(),
        ),
    ])
}

pub(crate) fn assemble(
    stats: &Stats,
    downstream: &[FxHashSet<u32>],
    scores: &[ImpactScore],
    caps: &AdvancedCaps,
    generated_at: DateTime<Utc>,
    as_of: Option<AsOf>,
) -> AdvancedInsights {
    let hints = usage_hints();
    let paths = compute_k_paths(stats, caps, &hints);

    AdvancedInsights {
        data_hash: stats.fingerprint().to_string(),
        generated_at,
        as_of,
        topk_set: compute_topk(stats, downstream, scores, caps, &hints),
        coverage_set: compute_coverage(stats, &paths, caps, &hints),
        k_paths: paths,
        parallel_cut: compute_parallel_cut(stats, caps, &hints),
        parallel_gain: compute_parallel_gain(stats, caps, &hints),
        cycle_break: cycle_break_suggestions(stats, caps.cycle_break_limit, &hints),
        config: *caps,
        status: stats.metric_statuses(),
        usage_hints: hints,
        diagnostics: stats.graph().diagnostics().to_vec(),
    }
}

fn compute_topk(
    stats: &Stats,
    downstream: &[FxHashSet<u32>],
    scores: &[ImpactScore],
    caps: &AdvancedCaps,
    hints: &BTreeMap<String, String>,
) -> TopKSetResult {
    let set = top_k_unlock_set(stats, downstream, scores, caps.topk_set_limit);
    TopKSetResult {
        status: FeatureStatus::available(set.items.len()),
        total_gain: set.total_gain,
        marginal_gain: set.marginal_gains,
        items: set.items,
        how_to_use: hints["topk_set"].clone(),
    }
}

fn compute_k_paths(
    stats: &Stats,
    caps: &AdvancedCaps,
    hints: &BTreeMap<String, String>,
) -> KPathsResult {
    let graph = stats.graph();
    let n = graph.node_count();
    let weights: Vec<f64> =
        (0..n as u32).map(|v| stats.issue_of(v).estimate_days.unwrap_or(1.0)).collect();

    let paths = match k_longest_paths(
        graph.edges(),
        n,
        &weights,
        caps.k_paths_limit,
        caps.path_length_cap,
    ) {
        Ok(paths) => paths,
        Err(_) => {
            return KPathsResult {
                status: FeatureStatus::skipped("internal error"),
                paths: Vec::new(),
                how_to_use: hints["k_paths"].clone(),
            }
        }
    };

    let entries: Vec<CriticalPathEntry> = paths
        .iter()
        .enumerate()
        .map(|(ix, p)| CriticalPathEntry {
            rank: ix + 1,
            length: p.nodes.len(),
            weight: p.length,
            issue_ids: p.nodes.iter().map(|&v| graph.id_of(v).to_string()).collect(),
            truncated: p.truncated,
        })
        .collect();

    KPathsResult {
        status: FeatureStatus::available(entries.len()),
        paths: entries,
        how_to_use: hints["k_paths"].clone(),
    }
}

fn compute_coverage(
    stats: &Stats,
    k_paths: &KPathsResult,
    caps: &AdvancedCaps,
    hints: &BTreeMap<String, String>,
) -> CoverageSetResult {
    let total_paths = k_paths.paths.len();
    if total_paths == 0 {
        return CoverageSetResult {
            status: FeatureStatus::available(0),
            items: Vec::new(),
            paths_covered: 0,
            total_paths: 0,
            how_to_use: hints["coverage_set"].clone(),
        };
    }

    // Greedy set cover: pick the issue on the most uncovered paths.
    let mut membership: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (path_ix, path) in k_paths.paths.iter().enumerate() {
        for id in &path.issue_ids {
            membership.entry(id.as_str()).or_default().push(path_ix);
        }
    }

    let mut uncovered: FxHashSet<usize> = (0..total_paths).collect();
    let mut items: Vec<CoverageItem> = Vec::new();
    while !uncovered.is_empty() && items.len() < caps.coverage_set_limit {
        let mut best: Option<(&str, usize)> = None;
        for (&id, paths) in &membership {
            let gain = paths.iter().filter(|p| uncovered.contains(p)).count();
            if gain == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_id, best_gain)) => {
                    gain > best_gain || (gain == best_gain && id < best_id)
                }
            };
            if better {
                best = Some((id, gain));
            }
        }
        let Some((id, _)) = best else { break };

        let covers: Vec<usize> = membership[id].clone();
        for p in &covers {
            uncovered.remove(p);
        }
        let title = stats
            .graph()
            .node_of(id)
            .map(|n| stats.issue_of(n).title.clone())
            .unwrap_or_default();
        items.push(CoverageItem { id: id.to_string(), title, covers_paths: covers });
    }

    CoverageSetResult {
        status: FeatureStatus::available_capped(
            items.len(),
            if uncovered.is_empty() { items.len() } else { items.len() + 1 },
        ),
        paths_covered: total_paths - uncovered.len(),
        total_paths,
        items,
        how_to_use: hints["coverage_set"].clone(),
    }
}

/// Issues that become actionable once `node` closes.
fn enabled_by(stats: &Stats, node: u32) -> Vec<u32> {
    let graph = stats.graph();
    graph
        .dependents_of(node)
        .iter()
        .copied()
        .filter(|&d| {
            let issue = stats.issue_of(d);
            issue.status.is_active()
                && graph.blockers_of(d).iter().all(|&t| {
                    t == node || stats.issue_of(t).status.is_closed()
                })
        })
        .collect()
}

fn compute_parallel_cut(
    stats: &Stats,
    caps: &AdvancedCaps,
    hints: &BTreeMap<String, String>,
) -> ParallelCutResult {
    let graph = stats.graph();
    let actionable_count = stats.phase1().actionable.len();

    let mut suggestions: Vec<ParallelCutItem> = (0..graph.node_count() as u32)
        .filter(|&v| !stats.issue_of(v).status.is_closed())
        .filter_map(|v| {
            let enabled = enabled_by(stats, v);
            if enabled.is_empty() {
                return None;
            }
            let issue = stats.issue_of(v);
            Some(ParallelCutItem {
                id: issue.id.clone(),
                title: issue.title.clone(),
                parallel_gain: enabled.len(),
                enabled_ids: enabled.iter().map(|&d| graph.id_of(d).to_string()).collect(),
            })
        })
        .collect();

    suggestions
        .sort_by(|a, b| b.parallel_gain.cmp(&a.parallel_gain).then_with(|| a.id.cmp(&b.id)));
    let original = suggestions.len();
    suggestions.truncate(caps.parallel_cut_limit);

    let best_gain = suggestions.first().map_or(0, |s| s.parallel_gain);
    ParallelCutResult {
        status: FeatureStatus::available_capped(suggestions.len(), original),
        max_parallel: actionable_count + best_gain,
        suggestions,
        how_to_use: hints["parallel_cut"].clone(),
    }
}

fn compute_parallel_gain(
    stats: &Stats,
    caps: &AdvancedCaps,
    hints: &BTreeMap<String, String>,
) -> ParallelGainResult {
    let graph = stats.graph();
    let current = stats.phase1().actionable.len();
    let actionable: FxHashSet<u32> = stats.phase1().actionable.iter().copied().collect();

    let cut = compute_parallel_cut(stats, caps, hints);
    let metrics: Vec<ParallelGainItem> = cut
        .suggestions
        .iter()
        .map(|s| {
            let node = graph.node_of(&s.id);
            let was_actionable = node.is_some_and(|n| actionable.contains(&n));
            let potential = current + s.parallel_gain - usize::from(was_actionable);
            ParallelGainItem {
                id: s.id.clone(),
                title: s.title.clone(),
                current_parallel: current,
                potential_parallel: potential,
                gain_percent: if current > 0 {
                    (potential as f64 - current as f64) / current as f64 * 100.0
                } else {
                    100.0
                },
            }
        })
        .collect();

    ParallelGainResult {
        status: FeatureStatus::available(metrics.len()),
        metrics,
        how_to_use: hints["parallel_gain"].clone(),
    }
}

fn cycle_break_suggestions(
    stats: &Stats,
    limit: usize,
    hints: &BTreeMap<String, String>,
) -> CycleBreakResult {
    let how_to_use = hints["cycle_break"].clone();
    let Some(report) = stats.cycle_report() else {
        return CycleBreakResult {
            status: FeatureStatus::skipped("cycle analysis not ready"),
            suggestions: Vec::new(),
            cycle_count: 0,
            how_to_use,
            advisory: "Cycle analysis did not complete within budget.".to_string(),
        };
    };

    if report.cycles.is_empty() {
        return CycleBreakResult {
            status: FeatureStatus::available(0),
            suggestions: Vec::new(),
            cycle_count: report.cycle_count,
            how_to_use,
            advisory: "No cycles detected: the dependency graph is a proper DAG.".to_string(),
        };
    }

    // Count per-edge appearances across the detected cycles.
    let graph = stats.graph();
    let mut edge_cycles: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (cycle_ix, cycle) in report.cycles.iter().enumerate() {
        if cycle.len() < 2 {
            continue;
        }
        for i in 0..cycle.len() {
            let from = cycle[i];
            let to = cycle[(i + 1) % cycle.len()];
            edge_cycles.entry((from, to)).or_default().push(cycle_ix);
        }
    }

    let mut ranked: Vec<((u32, u32), Vec<usize>)> = edge_cycles.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.len()
            .cmp(&a.1.len())
            .then_with(|| graph.id_of(a.0 .0).cmp(graph.id_of(b.0 .0)))
            .then_with(|| graph.id_of(a.0 .1).cmp(graph.id_of(b.0 .1)))
    });

    let original = ranked.len();
    let suggestions: Vec<CycleBreakItem> = ranked
        .into_iter()
        .take(limit)
        .map(|((from, to), in_cycles)| CycleBreakItem {
            edge_from: graph.id_of(from).to_string(),
            edge_to: graph.id_of(to).to_string(),
            impact: in_cycles.len(),
            collateral: graph.dependents_of(to).len(),
            rationale: format!(
                "appears in {} of {} detected cycles; removing it breaks the most at once",
                in_cycles.len(),
                report.cycles.len()
            ),
            in_cycles,
        })
        .collect();

    CycleBreakResult {
        status: FeatureStatus::available_capped(suggestions.len(), original),
        suggestions,
        cycle_count: report.cycle_count,
        how_to_use,
        advisory: "Structural fix: remove one edge at a time and re-run the analysis."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::{EngineConfig, SignalWeights};
    use crate::model::{Dependency, Issue, Status};
    use crate::scoring::compute_impact_scores;
    use crate::whatif::reverse_closure;
    use std::sync::Arc;

    fn issue(id: &str, deps: &[&str]) -> Issue {
        let mut i = Issue::new(id, Status::Open);
        i.dependencies = deps.iter().map(|d| Dependency::blocks(*d)).collect();
        i
    }

    fn advanced(issues: Vec<Issue>) -> AdvancedInsights {
        let analyzer = Analyzer::new(issues, EngineConfig::default()).unwrap();
        let stats: Arc<Stats> = analyzer.analyze_async().unwrap();
        assert!(stats.wait_for_phase2(std::time::Duration::from_secs(10)));
        let downstream = reverse_closure(&stats);
        let scores = compute_impact_scores(
            &stats,
            &SignalWeights::default(),
            Utc::now(),
            &downstream,
        );
        assemble(&stats, &downstream, &scores, &AdvancedCaps::default(), Utc::now(), None)
    }

    #[test]
    fn empty_input_all_features_available_and_empty() {
        let result = advanced(vec![]);
        assert_eq!(result.topk_set.status.state, "available");
        assert!(result.topk_set.items.is_empty());
        assert!(result.k_paths.paths.is_empty());
        assert_eq!(result.cycle_break.cycle_count, 0);
        assert!(result.cycle_break.suggestions.is_empty());
    }

    #[test]
    fn two_cycle_yields_one_suggestion_edge_a_first() {
        let result = advanced(vec![issue("a", &["b"]), issue("b", &["a"])]);
        let cb = &result.cycle_break;
        assert_eq!(cb.cycle_count, 1);
        assert!(!cb.suggestions.is_empty());
        // Both edges tie on impact; the a->b edge wins on source ID.
        let top = &cb.suggestions[0];
        assert_eq!(top.edge_from, "a");
        assert_eq!(top.edge_to, "b");
        assert_eq!(top.impact, 1);
        assert_eq!(top.in_cycles, vec![0]);
    }

    #[test]
    fn shared_edge_ranks_first() {
        // Two cycles sharing the d->a edge.
        let result = advanced(vec![
            issue("a", &["b", "c"]),
            issue("b", &["d"]),
            issue("c", &["d"]),
            issue("d", &["a"]),
        ]);
        let top = &result.cycle_break.suggestions[0];
        assert_eq!((top.edge_from.as_str(), top.edge_to.as_str()), ("d", "a"));
        assert_eq!(top.impact, 2);
        assert_eq!(top.in_cycles.len(), 2);
    }

    #[test]
    fn suggested_edge_is_in_every_annotated_cycle() {
        let result = advanced(vec![
            issue("a", &["b", "c"]),
            issue("b", &["d"]),
            issue("c", &["d"]),
            issue("d", &["a"]),
        ]);
        // Rebuild the cycle list exactly as the engine reported it.
        let analyzer = Analyzer::new(
            vec![
                issue("a", &["b", "c"]),
                issue("b", &["d"]),
                issue("c", &["d"]),
                issue("d", &["a"]),
            ],
            EngineConfig::default(),
        )
        .unwrap();
        let stats = analyzer.analyze_async().unwrap();
        assert!(stats.wait_for_phase2(std::time::Duration::from_secs(10)));
        let cycles = stats.cycles_as_ids();
        for suggestion in &result.cycle_break.suggestions {
            for &cycle_ix in &suggestion.in_cycles {
                let cycle = &cycles[cycle_ix];
                let pos = cycle
                    .iter()
                    .position(|id| id == &suggestion.edge_from)
                    .expect("edge source in cycle");
                let next = &cycle[(pos + 1) % cycle.len()];
                assert_eq!(next, &suggestion.edge_to);
            }
        }
    }

    #[test]
    fn k_paths_ranked_by_weight() {
        let result = advanced(vec![
            issue("a", &["b"]),
            issue("b", &["c"]),
            issue("c", &[]),
            issue("x", &["y"]),
            issue("y", &[]),
        ]);
        let paths = &result.k_paths.paths;
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].rank, 1);
        assert!(paths[0].weight >= paths[1].weight);
        assert_eq!(paths[0].issue_ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn coverage_set_covers_all_paths() {
        let result = advanced(vec![
            issue("a", &["b"]),
            issue("b", &[]),
            issue("x", &["y"]),
            issue("y", &[]),
        ]);
        let coverage = &result.coverage_set;
        assert_eq!(coverage.total_paths, 2);
        assert_eq!(coverage.paths_covered, 2);
        let covered: FxHashSet<usize> =
            coverage.items.iter().flat_map(|i| i.covers_paths.iter().copied()).collect();
        assert_eq!(covered.len(), 2);
    }

    #[test]
    fn parallel_cut_finds_frontier_wideners() {
        // Closing "hub" makes a and b actionable.
        let result = advanced(vec![
            issue("a", &["hub"]),
            issue("b", &["hub"]),
            issue("hub", &[]),
        ]);
        let cut = &result.parallel_cut;
        assert_eq!(cut.suggestions[0].id, "hub");
        assert_eq!(cut.suggestions[0].parallel_gain, 2);
        assert_eq!(cut.max_parallel, 3); // hub actionable now, plus a and b after
        let gain = &result.parallel_gain.metrics[0];
        assert_eq!(gain.current_parallel, 1);
        assert_eq!(gain.potential_parallel, 2);
    }

    #[test]
    fn serde_round_trip() {
        let result = advanced(vec![issue("a", &["b"]), issue("b", &["a"])]);
        let json = serde_json::to_string(&result).unwrap();
        let back: AdvancedInsights = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
