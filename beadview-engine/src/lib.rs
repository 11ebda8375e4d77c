//! beadview-engine: graph-aware triage for bead issue logs.
//!
//! The engine is a pure function of an issue snapshot: build the dependency
//! graph, compute instant (phase-1) and deferred (phase-2) metrics, score
//! impact, and assemble deterministic, JSON-serializable result shapes.
//! Consumers (CLI, TUI, exporters) live elsewhere and only call the `Engine`
//! entry points.

pub mod advanced;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod insights;
pub mod model;
mod phase1;
mod phase2;
pub mod plan;
pub mod scoring;
pub mod stats;
pub mod triage;
pub mod whatif;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use crate::advanced::AdvancedInsights;
pub use crate::analyzer::Analyzer;
pub use crate::cache::{CacheStats, DiskCache, ResultCache};
pub use crate::config::{
    AdvancedCaps, AsOf, EngineConfig, Scope, SignalWeights, Thresholds, TriageOptions,
};
pub use crate::error::{Diagnostic, DiagnosticKind, EngineError};
pub use crate::fingerprint::data_fingerprint;
pub use crate::graph::DepGraph;
pub use crate::insights::InsightsResult;
pub use crate::model::{Dependency, DependencyKind, Issue, IssueType, Priority, Status};
pub use crate::plan::PlanResult;
pub use crate::scoring::{ImpactScore, PriorityDrift, Recommendation};
pub use crate::stats::{MetricState, MetricStatus, SnapshotState, Stats};
pub use crate::triage::TriageResult;
pub use crate::whatif::{TopKSet, WhatIfDelta, WhatIfEntry};

/// The public entry point: owns the configuration and the result caches.
///
/// A single `Engine` may serve concurrent callers; every computation is
/// isolated in its own `Stats` snapshot.
pub struct Engine {
    config: EngineConfig,
    cache: ResultCache,
    disk: Option<DiskCache>,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config, cache: ResultCache::default(), disk: None }
    }

    /// Attach a content-addressed disk cache directory.
    #[must_use]
    pub fn with_disk_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk = Some(DiskCache::new(dir));
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Full triage: recommendations, quick wins, blockers, project health,
    /// command helpers. Cached by `(fingerprint, scope key)`.
    pub fn compute_triage(
        &self,
        issues: &[Issue],
        opts: &TriageOptions,
    ) -> Result<TriageResult, EngineError> {
        let scoped = graph::filter_scope(issues, &opts.scope);
        let fingerprint = data_fingerprint(&scoped);
        let scope_key = format!(
            "triage;{};top={};qw={};bl={};now={}",
            opts.scope.cache_key(),
            opts.top_n(),
            opts.quick_win_n(),
            opts.blocker_n(),
            opts.now.map_or(String::new(), |t| t.to_rfc3339()),
        );
        if let Some(cached) = self.cached(&fingerprint, &scope_key) {
            return Ok(cached);
        }

        let mut run_opts = opts.clone();
        run_opts.scope = Scope::default();
        let result = triage::compute(&scoped, &self.config, &run_opts)?;
        self.store(&fingerprint, &scope_key, &result);
        Ok(result)
    }

    /// Parallel execution tracks over the actionable set. Phase-1 only.
    pub fn compute_plan(&self, issues: &[Issue]) -> Result<PlanResult, EngineError> {
        let analyzer = Analyzer::new(issues.to_vec(), self.config.clone())?;
        let stats = analyzer.analyze()?;
        Ok(plan::assemble(&stats, chrono::Utc::now(), None))
    }

    /// All phase-2 metrics with derived top lists, cycles, critical path and
    /// articulation points.
    pub fn compute_insights(
        &self,
        issues: &[Issue],
        opts: &TriageOptions,
    ) -> Result<InsightsResult, EngineError> {
        let scoped = graph::filter_scope(issues, &opts.scope);
        let fingerprint = data_fingerprint(&scoped);
        let scope_key = format!(
            "insights;{};now={}",
            opts.scope.cache_key(),
            opts.now.map_or(String::new(), |t| t.to_rfc3339()),
        );
        if let Some(cached) = self.cached(&fingerprint, &scope_key) {
            return Ok(cached);
        }

        let stats = self.analyze_ready(scoped)?;
        let result = insights::assemble(&stats, opts.resolved_now(), opts.as_of.clone());
        self.store(&fingerprint, &scope_key, &result);
        Ok(result)
    }

    /// Top-K unlock set, coverage set, k paths, parallel cut/gain and
    /// cycle-break suggestions, all capped per the configuration.
    pub fn compute_advanced_insights(
        &self,
        issues: &[Issue],
        opts: &TriageOptions,
    ) -> Result<AdvancedInsights, EngineError> {
        let scoped = graph::filter_scope(issues, &opts.scope);
        let fingerprint = data_fingerprint(&scoped);
        let scope_key = format!(
            "advanced;{};caps={:?};now={}",
            opts.scope.cache_key(),
            self.config.caps,
            opts.now.map_or(String::new(), |t| t.to_rfc3339()),
        );
        if let Some(cached) = self.cached(&fingerprint, &scope_key) {
            return Ok(cached);
        }

        let weights = self.config.weights.resolve()?;
        let stats = self.analyze_ready(scoped)?;
        let downstream = whatif::reverse_closure(&stats);
        let scores =
            scoring::compute_impact_scores(&stats, &weights, opts.resolved_now(), &downstream);
        let result = advanced::assemble(
            &stats,
            &downstream,
            &scores,
            &self.config.caps,
            opts.resolved_now(),
            opts.as_of.clone(),
        );
        self.store(&fingerprint, &scope_key, &result);
        Ok(result)
    }

    /// What-if delta for one issue: `Ok(None)` for unknown IDs.
    pub fn what_if(
        &self,
        issues: &[Issue],
        issue_id: &str,
    ) -> Result<Option<WhatIfDelta>, EngineError> {
        let analyzer = Analyzer::new(issues.to_vec(), self.config.clone())?;
        let stats = analyzer.analyze()?;
        Ok(whatif::what_if(&stats, issue_id))
    }

    /// The non-closed issues with the highest downstream impact.
    pub fn top_what_if_deltas(
        &self,
        issues: &[Issue],
        n: usize,
    ) -> Result<Vec<WhatIfEntry>, EngineError> {
        let analyzer = Analyzer::new(issues.to_vec(), self.config.clone())?;
        let stats = analyzer.analyze()?;
        Ok(whatif::top_what_if_deltas(&stats, if n == 0 { 10 } else { n }))
    }

    /// Issues whose computed impact disagrees with their assigned priority.
    pub fn priority_drift(
        &self,
        issues: &[Issue],
        opts: &TriageOptions,
    ) -> Result<Vec<PriorityDrift>, EngineError> {
        let weights = self.config.weights.resolve()?;
        let stats = self.analyze_ready(issues.to_vec())?;
        let downstream = whatif::reverse_closure(&stats);
        let scores =
            scoring::compute_impact_scores(&stats, &weights, opts.resolved_now(), &downstream);
        Ok(scoring::priority_drift(&scores))
    }

    fn analyze_ready(&self, issues: Vec<Issue>) -> Result<Arc<Stats>, EngineError> {
        let analyzer = Analyzer::new(issues, self.config.clone())?;
        let stats = analyzer.analyze_async()?;
        stats.wait_for_phase2(Duration::from_millis(self.config.overall_budget_ms + 250));
        Ok(stats)
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, fingerprint: &str, scope: &str) -> Option<T> {
        if let Some(value) = self.cache.get(fingerprint, scope) {
            return serde_json::from_value(value.as_ref().clone()).ok();
        }
        if let Some(disk) = &self.disk {
            if let Some(value) = disk.load(fingerprint, scope) {
                self.cache.put(fingerprint, scope, value.clone());
                return serde_json::from_value(value).ok();
            }
        }
        None
    }

    fn store<T: serde::Serialize>(&self, fingerprint: &str, scope: &str, result: &T) {
        match serde_json::to_value(result) {
            Ok(value) => {
                if let Some(disk) = &self.disk {
                    if let Err(err) = disk.store(fingerprint, scope, &value) {
                        warn!(%err, "disk cache write failed");
                    }
                }
                self.cache.put(fingerprint, scope, value);
            }
            Err(err) => warn!(%err, "result not cacheable"),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
