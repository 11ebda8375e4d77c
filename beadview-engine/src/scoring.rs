//! Impact scoring: per-issue weighted signal vector and the lists derived
//! from it (recommendations, priority drift, quick wins, blockers to clear).
//!
//! Each signal is normalized to [0, 1] over the current issue set before
//! weighting, and the full breakdown rides along on every score so consumers
//! can explain a ranking without re-deriving it.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::config::{SignalWeights, Thresholds};
use crate::model::{Priority, Status};
use crate::stats::Stats;

/// Labels that mark an issue as externally urgent.
const URGENCY_LABELS: [&str; 3] = ["urgent", "sla", "hotfix"];

/// Staleness saturates at this many days since the last update.
const STALENESS_WINDOW_DAYS: f64 = 30.0;

/// In-progress issues staler than this fraction of the window get a
/// `review` action instead of `work`.
const REVIEW_STALENESS: f64 = 0.3;

/// Weighted contribution and normalized value per signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub pagerank: f64,
    pub pagerank_norm: f64,
    pub betweenness: f64,
    pub betweenness_norm: f64,
    pub blocker_ratio: f64,
    pub blocker_ratio_norm: f64,
    pub staleness: f64,
    pub staleness_norm: f64,
    pub priority_boost: f64,
    pub priority_boost_norm: f64,
    pub time_to_impact: f64,
    pub time_to_impact_norm: f64,
    pub urgency: f64,
    pub urgency_norm: f64,
    pub risk: f64,
    pub risk_norm: f64,
}

/// One issue's impact score with its full breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub issue_id: String,
    pub title: String,
    pub priority: Priority,
    pub status: Status,
    pub score: f64,
    pub breakdown: SignalBreakdown,
}

/// A ranked next-action recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub issue_id: String,
    pub title: String,
    /// `work` for fresh items, `review` for stale in-progress ones.
    pub action: String,
    pub score: f64,
    pub confidence: f64,
    pub priority: Priority,
    /// Top contributing factors, strongest first.
    pub reasons: Vec<String>,
    pub breakdown: SignalBreakdown,
}

/// An issue whose computed impact disagrees with its assigned priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityDrift {
    pub issue_id: String,
    pub title: String,
    pub current_priority: Priority,
    pub suggested_priority: Priority,
    pub score: f64,
    pub confidence: f64,
    /// `raise` when the suggestion is more urgent than assigned.
    pub direction: String,
}

/// Actionable issue with a small (or unknown-but-leaf) estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWin {
    pub issue_id: String,
    pub title: String,
    pub score: f64,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_days: Option<f64>,
}

/// Non-closed issue ranked by how much open work it transitively holds up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerToClear {
    pub issue_id: String,
    pub title: String,
    pub priority: Priority,
    pub unblocks_count: usize,
}

/// Compute impact scores for every non-closed issue, ranked by
/// (score desc, priority asc, updated_at desc, id asc).
///
/// `downstream` holds the reverse-reachable node set per node (who this node
/// transitively blocks); the caller computes it once and shares it with the
/// what-if machinery.
pub fn compute_impact_scores(
    stats: &Stats,
    weights: &SignalWeights,
    now: DateTime<Utc>,
    downstream: &[FxHashSet<u32>],
) -> Vec<ImpactScore> {
    let graph = stats.graph();
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let max_pagerank = stats.pagerank_vec().map_or(0.0, |v| v.iter().cloned().fold(0.0, f64::max));
    let max_betweenness =
        stats.betweenness_vec().map_or(0.0, |v| v.iter().cloned().fold(0.0, f64::max));
    let phase1 = stats.phase1();

    let mut scores: Vec<ImpactScore> = (0..n as u32)
        .filter(|&v| !stats.issue_of(v).status.is_closed())
        .map(|v| {
            let issue = stats.issue_of(v);

            let pagerank_norm = if max_pagerank > 0.0 {
                stats.pagerank_vec().map_or(0.0, |s| s[v as usize]) / max_pagerank
            } else {
                0.0
            };
            let betweenness_norm = if max_betweenness > 0.0 {
                stats.betweenness_vec().map_or(0.0, |s| s[v as usize]) / max_betweenness
            } else {
                0.0
            };

            let downstream_open = downstream[v as usize]
                .iter()
                .filter(|&&d| !stats.issue_of(d).status.is_closed())
                .count();
            let blocker_ratio_norm = if n > 1 {
                downstream_open as f64 / (n as f64 - 1.0)
            } else {
                0.0
            };

            let age_days = (now - issue.updated_at).num_seconds().max(0) as f64 / 86_400.0;
            let staleness_norm = (age_days / STALENESS_WINDOW_DAYS).clamp(0.0, 1.0);

            let priority_boost_norm = (4.0 - issue.priority.0 as f64) / 4.0;

            let depth = phase1.depths[v as usize].max(1);
            let time_to_impact_norm = 1.0 / depth as f64;

            let urgency_norm = if URGENCY_LABELS.iter().any(|l| issue.has_label(l)) {
                1.0
            } else {
                0.0
            };

            let risk_norm = if issue.status == Status::Blocked || stats.in_cycle(&issue.id) {
                1.0
            } else {
                0.0
            };

            let breakdown = SignalBreakdown {
                pagerank: weights.pagerank * pagerank_norm,
                pagerank_norm,
                betweenness: weights.betweenness * betweenness_norm,
                betweenness_norm,
                blocker_ratio: weights.blocker_ratio * blocker_ratio_norm,
                blocker_ratio_norm,
                staleness: weights.staleness * staleness_norm,
                staleness_norm,
                priority_boost: weights.priority_boost * priority_boost_norm,
                priority_boost_norm,
                time_to_impact: weights.time_to_impact * time_to_impact_norm,
                time_to_impact_norm,
                urgency: weights.urgency * urgency_norm,
                urgency_norm,
                risk: weights.risk * risk_norm,
                risk_norm,
            };

            let score = breakdown.pagerank
                + breakdown.betweenness
                + breakdown.blocker_ratio
                + breakdown.staleness
                + breakdown.priority_boost
                + breakdown.time_to_impact
                + breakdown.urgency
                + breakdown.risk;

            ImpactScore {
                issue_id: issue.id.clone(),
                title: issue.title.clone(),
                priority: issue.priority,
                status: issue.status,
                score,
                breakdown,
            }
        })
        .collect();

    let updated_at: FxHashMap<&str, DateTime<Utc>> =
        stats.issues().iter().map(|i| (i.id.as_str(), i.updated_at)).collect();
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| updated_at[b.issue_id.as_str()].cmp(&updated_at[a.issue_id.as_str()]))
            .then_with(|| a.issue_id.cmp(&b.issue_id))
    });
    scores
}

/// All recommendations clearing the thresholds, best first. The caller
/// applies the output cap so capped lists can report their original size.
pub fn top_recommendations(
    scores: &[ImpactScore],
    thresholds: &Thresholds,
) -> Vec<Recommendation> {
    scores
        .iter()
        .filter(|s| s.status.is_active())
        .filter(|s| s.score >= thresholds.min_score)
        .filter_map(|s| {
            let confidence = (0.5 + s.score * 0.5).min(1.0);
            if confidence < thresholds.min_confidence {
                return None;
            }
            let action = if s.status == Status::InProgress
                && s.breakdown.staleness_norm > REVIEW_STALENESS
            {
                "review"
            } else {
                "work"
            };
            Some(Recommendation {
                issue_id: s.issue_id.clone(),
                title: s.title.clone(),
                action: action.to_string(),
                score: s.score,
                confidence,
                priority: s.priority,
                reasons: top_reasons(&s.breakdown),
                breakdown: s.breakdown,
            })
        })
        .collect()
}

/// Top 3 contributing factors as reason strings, strongest first.
fn top_reasons(breakdown: &SignalBreakdown) -> Vec<String> {
    let factors: [(f64, f64, &str); 8] = [
        (breakdown.pagerank, breakdown.pagerank_norm, "central in dependency graph"),
        (breakdown.betweenness, breakdown.betweenness_norm, "critical path bottleneck"),
        (breakdown.blocker_ratio, breakdown.blocker_ratio_norm, "unblocks downstream work"),
        (breakdown.staleness, breakdown.staleness_norm, "needs attention (aging)"),
        (breakdown.priority_boost, breakdown.priority_boost_norm, "explicit priority set"),
        (breakdown.time_to_impact, breakdown.time_to_impact_norm, "fast impact potential"),
        (breakdown.urgency, breakdown.urgency_norm, "urgent label"),
        (breakdown.risk, breakdown.risk_norm, "risk factors"),
    ];

    let mut ranked: Vec<(usize, &(f64, f64, &str))> = factors.iter().enumerate().collect();
    // Ties keep the fixed factor order above, so output is deterministic.
    ranked.sort_by(|a, b| {
        b.1 .0.partial_cmp(&a.1 .0).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
    });

    ranked
        .into_iter()
        .filter(|(_, (contribution, _, _))| *contribution >= 0.01)
        .take(3)
        .map(|(_, (_, norm, label))| {
            if *norm > 0.7 {
                format!("very high: {label}")
            } else if *norm > 0.4 {
                format!("high: {label}")
            } else if *norm > 0.2 {
                format!("moderate: {label}")
            } else {
                (*label).to_string()
            }
        })
        .collect()
}

/// Map a score percentile to a priority band.
fn percentile_band(percentile: f64) -> i32 {
    if percentile >= 0.9 {
        0
    } else if percentile >= 0.7 {
        1
    } else if percentile >= 0.4 {
        2
    } else if percentile >= 0.2 {
        3
    } else {
        4
    }
}

/// Issues whose score percentile sits two or more bands away from their
/// assigned priority. `scores` must already be ranked.
pub fn priority_drift(scores: &[ImpactScore]) -> Vec<PriorityDrift> {
    let len = scores.len();
    scores
        .iter()
        .enumerate()
        .filter_map(|(ix, s)| {
            let percentile = 1.0 - ix as f64 / len as f64;
            let band = percentile_band(percentile);
            let distance = (band - s.priority.0).abs();
            if distance < 2 {
                return None;
            }
            Some(PriorityDrift {
                issue_id: s.issue_id.clone(),
                title: s.title.clone(),
                current_priority: s.priority,
                suggested_priority: Priority(band),
                score: s.score,
                confidence: (distance as f64 / 4.0).min(1.0),
                direction: if band < s.priority.0 { "raise" } else { "lower" }.to_string(),
            })
        })
        .collect()
}

/// Score-ranked actionable issues with a small or unknown-but-leaf estimate.
pub fn quick_wins(scores: &[ImpactScore], stats: &Stats) -> Vec<QuickWin> {
    let graph = stats.graph();
    let actionable: FxHashSet<&str> =
        stats.phase1().actionable.iter().map(|&v| graph.id_of(v)).collect();

    scores
        .iter()
        .filter(|s| actionable.contains(s.issue_id.as_str()))
        .filter_map(|s| {
            let node = graph.node_of(&s.issue_id)?;
            let issue = stats.issue_of(node);
            let small = match issue.estimate_days {
                Some(days) => days <= 1.0,
                None => graph.out_degree(node) == 0,
            };
            small.then(|| QuickWin {
                issue_id: s.issue_id.clone(),
                title: s.title.clone(),
                score: s.score,
                priority: s.priority,
                estimate_days: issue.estimate_days,
            })
        })
        .collect()
}

/// Non-closed issues ranked by the count of open issues they transitively
/// block, descending; ties by ID.
pub fn blockers_to_clear(stats: &Stats, downstream: &[FxHashSet<u32>]) -> Vec<BlockerToClear> {
    let graph = stats.graph();
    let mut blockers: Vec<BlockerToClear> = (0..graph.node_count() as u32)
        .filter(|&v| !stats.issue_of(v).status.is_closed())
        .filter_map(|v| {
            let count = downstream[v as usize]
                .iter()
                .filter(|&&d| !stats.issue_of(d).status.is_closed())
                .count();
            if count == 0 {
                return None;
            }
            let issue = stats.issue_of(v);
            Some(BlockerToClear {
                issue_id: issue.id.clone(),
                title: issue.title.clone(),
                priority: issue.priority,
                unblocks_count: count,
            })
        })
        .collect();
    blockers.sort_by(|a, b| {
        b.unblocks_count.cmp(&a.unblocks_count).then_with(|| a.issue_id.cmp(&b.issue_id))
    });
    blockers
}
