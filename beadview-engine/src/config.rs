//! Engine configuration: signal weights, thresholds, caps, budgets, scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::EngineError;

/// Weights for the eight impact-score signals. Must be finite and sum to 1.0;
/// vectors that fail the sum check fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub pagerank: f64,
    pub betweenness: f64,
    pub blocker_ratio: f64,
    pub staleness: f64,
    pub priority_boost: f64,
    pub time_to_impact: f64,
    pub urgency: f64,
    pub risk: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            pagerank: 0.25,
            betweenness: 0.15,
            blocker_ratio: 0.15,
            staleness: 0.10,
            priority_boost: 0.15,
            time_to_impact: 0.05,
            urgency: 0.10,
            risk: 0.05,
        }
    }
}

impl SignalWeights {
    fn components(&self) -> [f64; 8] {
        [
            self.pagerank,
            self.betweenness,
            self.blocker_ratio,
            self.staleness,
            self.priority_boost,
            self.time_to_impact,
            self.urgency,
            self.risk,
        ]
    }

    /// Non-finite weights are unusable input; a finite vector that does not
    /// sum to 1.0 falls back to the defaults.
    pub fn resolve(self) -> Result<SignalWeights, EngineError> {
        let components = self.components();
        if components.iter().any(|w| !w.is_finite()) {
            return Err(EngineError::InvalidInput {
                reason: "signal weights must be finite numbers".into(),
            });
        }
        let sum: f64 = components.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            warn!(sum, "signal weights do not sum to 1.0, using defaults");
            return Ok(SignalWeights::default());
        }
        Ok(self)
    }
}

/// Recommendation cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_score: f64,
    pub min_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { min_score: 0.2, min_confidence: 0.4 }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.min_score.is_finite() || !self.min_confidence.is_finite() {
            return Err(EngineError::InvalidInput {
                reason: "thresholds must be finite numbers".into(),
            });
        }
        Ok(())
    }
}

/// Caps for advanced insight features. Every output list stays bounded so
/// agents can consume results without pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedCaps {
    pub topk_set_limit: usize,
    pub coverage_set_limit: usize,
    pub k_paths_limit: usize,
    pub path_length_cap: usize,
    pub cycle_break_limit: usize,
    pub parallel_cut_limit: usize,
}

impl Default for AdvancedCaps {
    fn default() -> Self {
        Self {
            topk_set_limit: 5,
            coverage_set_limit: 5,
            k_paths_limit: 5,
            path_length_cap: 50,
            cycle_break_limit: 5,
            parallel_cut_limit: 5,
        }
    }
}

/// Historical reference attached to results computed from a past snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsOf {
    #[serde(rename = "ref")]
    pub reference: String,
    pub commit_sha: String,
}

/// Scope selector: label filter first, then root + BFS depth limit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub labels: Vec<String>,
    pub root: Option<String>,
    pub depth: Option<usize>,
}

impl Scope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.root.is_none()
    }

    /// Stable key fragment for cache lookups.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        format!(
            "labels={};root={};depth={}",
            labels.join(","),
            self.root.as_deref().unwrap_or(""),
            self.depth.map_or(String::new(), |d| d.to_string()),
        )
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: SignalWeights,
    pub thresholds: Thresholds,
    pub caps: AdvancedCaps,

    /// Soft budget per phase-2 metric, milliseconds.
    pub metric_budget_ms: u64,
    /// Overall phase-2 budget, milliseconds.
    pub overall_budget_ms: u64,
    /// Hard wall-clock cap for cycle enumeration, milliseconds.
    pub cycle_wall_ms: u64,
    /// Cap on enumerated cycles before the `...` sentinel.
    pub max_cycles: usize,

    /// Betweenness switches to fixed-seed source sampling above this size.
    pub betweenness_sample_threshold: usize,
    pub betweenness_sample_size: usize,

    /// Worker threads for phase 2; 0 means `min(num_cpus, 8)`.
    pub workers: usize,

    /// Run eigenvector centrality on the largest weakly connected component
    /// when the graph is disconnected (otherwise the metric is skipped).
    pub eigenvector_on_largest: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            thresholds: Thresholds::default(),
            caps: AdvancedCaps::default(),
            metric_budget_ms: 500,
            overall_budget_ms: 2_000,
            cycle_wall_ms: 2_000,
            max_cycles: 50,
            betweenness_sample_threshold: 500,
            betweenness_sample_size: 256,
            workers: 0,
            eigenvector_on_largest: true,
        }
    }
}

impl EngineConfig {
    /// Resolve the worker pool size: `min(num_cpus, 8)` unless pinned.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4).min(8)
    }
}

/// Per-call options for the triage orchestrator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriageOptions {
    /// Cap on recommendations (0 = default 10).
    pub top_n: usize,
    /// Cap on quick wins (0 = default 5).
    pub quick_win_n: usize,
    /// Cap on blockers to clear (0 = default 5).
    pub blocker_n: usize,
    /// Scope filter applied before analysis.
    pub scope: Scope,
    /// Historical reference recorded on the result.
    pub as_of: Option<AsOf>,
    /// Injected clock; the only source of non-determinism when unset.
    pub now: Option<DateTime<Utc>>,
    /// Skip waiting for phase-2 metrics (their statuses report `timeout`).
    pub no_wait: bool,
}

impl TriageOptions {
    pub(crate) fn top_n(&self) -> usize {
        if self.top_n == 0 {
            10
        } else {
            self.top_n.min(10)
        }
    }

    pub(crate) fn quick_win_n(&self) -> usize {
        if self.quick_win_n == 0 {
            5
        } else {
            self.quick_win_n
        }
    }

    pub(crate) fn blocker_n(&self) -> usize {
        if self.blocker_n == 0 {
            5
        } else {
            self.blocker_n
        }
    }

    pub(crate) fn resolved_now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let sum: f64 = SignalWeights::default().components().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bad_sum_falls_back_to_defaults() {
        let w = SignalWeights { pagerank: 0.9, ..SignalWeights::default() };
        let resolved = w.resolve().unwrap();
        assert_eq!(resolved, SignalWeights::default());
    }

    #[test]
    fn non_finite_weight_is_invalid_input() {
        let w = SignalWeights { pagerank: f64::NAN, ..SignalWeights::default() };
        assert!(matches!(w.resolve(), Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn exact_sum_passes_through() {
        let w = SignalWeights::default();
        assert_eq!(w.resolve().unwrap(), w);
    }

    #[test]
    fn scope_cache_key_is_label_order_independent() {
        let a = Scope { labels: vec!["x".into(), "y".into()], ..Default::default() };
        let b = Scope { labels: vec!["y".into(), "x".into()], ..Default::default() };
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn worker_count_capped_at_eight() {
        assert!(EngineConfig::default().worker_count() <= 8);
        let pinned = EngineConfig { workers: 2, ..Default::default() };
        assert_eq!(pinned.worker_count(), 2);
    }
}
