//! What-if deltas: the effect of treating one issue as closed, with no
//! mutation of state, plus the greedy top-K unlock selection built on top.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use beadview_fast::{critical_path, reachability};

use crate::scoring::ImpactScore;
use crate::stats::Stats;

/// Default cap on the `unblocked_issue_ids` list.
pub const UNBLOCKED_IDS_CAP: usize = 20;

/// Reverse-reachable node set per node: everything the node transitively
/// blocks. Computed once per snapshot and shared by scoring, what-if and the
/// advanced insights.
pub(crate) fn reverse_closure(stats: &Stats) -> Vec<FxHashSet<u32>> {
    reachability::reachable_sets(stats.graph().reverse_adjacency())
}

/// Effect of completing one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfDelta {
    pub issue_id: String,
    /// Non-closed issues directly blocked on this one.
    pub direct_unblocks: usize,
    /// Non-closed issues transitively blocked on this one.
    pub transitive_unblocks: usize,
    /// First N transitively unblocked IDs, reverse-BFS layer order.
    pub unblocked_issue_ids: Vec<String>,
    pub capped: bool,
    /// Original count when capped, equal to `transitive_unblocks`.
    pub limited: usize,
    /// Critical-path length reduction if this issue is removed.
    pub depth_reduction: f64,
    /// Sum of estimates over the transitively unblocked issues.
    pub days_saved: f64,
}

/// One entry in the ranked top-deltas list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfEntry {
    pub issue_id: String,
    pub title: String,
    pub delta: WhatIfDelta,
}

/// Compute the full what-if delta for one issue. `None` for unknown IDs.
pub fn what_if(stats: &Stats, issue_id: &str) -> Option<WhatIfDelta> {
    let node = stats.graph().node_of(issue_id)?;
    let mut delta = delta_for(stats, node, UNBLOCKED_IDS_CAP);
    delta.depth_reduction = depth_reduction(stats, node);
    Some(delta)
}

/// Everything except `depth_reduction`, which needs a critical-path rerun
/// and is filled only where it will be surfaced.
fn delta_for(stats: &Stats, node: u32, cap: usize) -> WhatIfDelta {
    let graph = stats.graph();

    let direct_unblocks = graph
        .dependents_of(node)
        .iter()
        .filter(|&&d| !stats.issue_of(d).status.is_closed())
        .count();

    // Reverse-blocking BFS from the node, as if it were closed.
    let reachable = reachability::bfs_reachable(graph.reverse_adjacency(), node);
    let unblocked: Vec<u32> =
        reachable.into_iter().filter(|&d| !stats.issue_of(d).status.is_closed()).collect();

    let transitive_unblocks = unblocked.len();
    let days_saved: f64 =
        unblocked.iter().filter_map(|&d| stats.issue_of(d).estimate_days).sum();

    let unblocked_issue_ids: Vec<String> =
        unblocked.iter().take(cap).map(|&d| graph.id_of(d).to_string()).collect();
    let capped = transitive_unblocks > unblocked_issue_ids.len();

    WhatIfDelta {
        issue_id: graph.id_of(node).to_string(),
        direct_unblocks,
        transitive_unblocks,
        unblocked_issue_ids,
        capped,
        limited: if capped { transitive_unblocks } else { 0 },
        depth_reduction: 0.0,
        days_saved,
    }
}

/// Critical-path length reduction if `node` disappears from the DAG.
fn depth_reduction(stats: &Stats, node: u32) -> f64 {
    let graph = stats.graph();
    let n = graph.node_count();
    let mut weights: Vec<f64> =
        (0..n as u32).map(|v| stats.issue_of(v).estimate_days.unwrap_or(1.0)).collect();

    let full = match critical_path::critical_path(graph.edges(), n, &weights) {
        Ok(r) => r.length,
        Err(_) => return 0.0,
    };

    let without: Vec<(u32, u32)> = graph
        .edges()
        .iter()
        .copied()
        .filter(|&(src, dst)| src != node && dst != node)
        .collect();
    weights[node as usize] = 0.0;
    let reduced = match critical_path::critical_path(&without, n, &weights) {
        Ok(r) => r.length,
        Err(_) => return 0.0,
    };

    (full - reduced).max(0.0)
}

/// The non-closed issues with the highest downstream impact, ranked by
/// (transitive desc, direct desc, id asc). Capped at `n`.
pub fn top_what_if_deltas(stats: &Stats, n: usize) -> Vec<WhatIfEntry> {
    let graph = stats.graph();
    let mut entries: Vec<WhatIfEntry> = (0..graph.node_count() as u32)
        .filter(|&v| !stats.issue_of(v).status.is_closed())
        .filter_map(|v| {
            let delta = delta_for(stats, v, UNBLOCKED_IDS_CAP);
            if delta.direct_unblocks == 0 && delta.transitive_unblocks == 0 {
                return None;
            }
            let issue = stats.issue_of(v);
            Some(WhatIfEntry { issue_id: issue.id.clone(), title: issue.title.clone(), delta })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.delta
            .transitive_unblocks
            .cmp(&a.delta.transitive_unblocks)
            .then_with(|| b.delta.direct_unblocks.cmp(&a.delta.direct_unblocks))
            .then_with(|| a.issue_id.cmp(&b.issue_id))
    });
    entries.truncate(n);

    // The critical-path rerun is the expensive part; only the survivors get it.
    for entry in &mut entries {
        if let Some(node) = graph.node_of(&entry.issue_id) {
            entry.delta.depth_reduction = depth_reduction(stats, node);
        }
    }
    entries
}

/// One pick in the greedy unlock set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKSetItem {
    pub id: String,
    pub title: String,
    /// Additional open issues unlocked by this pick.
    pub marginal_gain: usize,
    /// Directly unblocked issue IDs.
    pub unblocks: Vec<String>,
}

/// Greedy submodular selection maximizing total transitive unblocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopKSet {
    /// Picks in selection order.
    pub items: Vec<TopKSetItem>,
    /// Gain contributed by each pick; non-increasing by construction.
    pub marginal_gains: Vec<usize>,
    pub total_gain: usize,
}

/// Select up to `k` non-closed issues maximizing the union of their
/// transitive unblock sets. Ties break by (impact score desc, id asc).
pub fn top_k_unlock_set(
    stats: &Stats,
    downstream: &[FxHashSet<u32>],
    scores: &[ImpactScore],
    k: usize,
) -> TopKSet {
    let graph = stats.graph();
    let score_of: FxHashMap<&str, f64> =
        scores.iter().map(|s| (s.issue_id.as_str(), s.score)).collect();

    // Open-only unblock set per candidate.
    let open_downstream: Vec<FxHashSet<u32>> = downstream
        .iter()
        .map(|set| {
            set.iter().copied().filter(|&d| !stats.issue_of(d).status.is_closed()).collect()
        })
        .collect();

    let mut candidates: Vec<u32> = (0..graph.node_count() as u32)
        .filter(|&v| !stats.issue_of(v).status.is_closed())
        .collect();

    let mut covered: FxHashSet<u32> = FxHashSet::default();
    let mut result = TopKSet::default();

    while result.items.len() < k && !candidates.is_empty() {
        let mut best: Option<(u32, usize)> = None;
        for &candidate in &candidates {
            let gain =
                open_downstream[candidate as usize].difference(&covered).count();
            let better = match best {
                None => true,
                Some((current, current_gain)) => {
                    let cand_id = graph.id_of(candidate);
                    let cur_id = graph.id_of(current);
                    gain > current_gain
                        || (gain == current_gain
                            && (score_of.get(cand_id).copied().unwrap_or(0.0),
                                std::cmp::Reverse(cand_id))
                                > (score_of.get(cur_id).copied().unwrap_or(0.0),
                                    std::cmp::Reverse(cur_id)))
                }
            };
            if better {
                best = Some((candidate, gain));
            }
        }

        let Some((pick, gain)) = best else { break };
        if gain == 0 {
            break;
        }

        covered.extend(open_downstream[pick as usize].iter().copied());
        candidates.retain(|&c| c != pick);

        let issue = stats.issue_of(pick);
        let unblocks: Vec<String> = graph
            .dependents_of(pick)
            .iter()
            .filter(|&&d| !stats.issue_of(d).status.is_closed())
            .map(|&d| graph.id_of(d).to_string())
            .collect();
        result.items.push(TopKSetItem {
            id: issue.id.clone(),
            title: issue.title.clone(),
            marginal_gain: gain,
            unblocks,
        });
        result.marginal_gains.push(gain);
        result.total_gain += gain;
    }

    result
}
