//! The `Stats` snapshot: phase-1 values plus write-once phase-2 slots.
//!
//! Lifecycle is strictly one-way: `Building -> Phase1Done -> Phase2Running
//! -> Phase2Ready`. Phase-1 values are filled before the snapshot is shared;
//! each phase-2 metric publishes exactly once into its own slot, so readers
//! either see the final value or the zero default, never a partial one.
//! After `Phase2Ready` the snapshot is immutable and safe to share without
//! synchronization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

use beadview_fast::critical_path::CriticalPathResult;

use crate::graph::DepGraph;
use crate::model::Issue;

/// Sentinel cycle marker: enumeration hit the hard wall-clock cap.
pub const CYCLE_TIMEOUT_SENTINEL: &str = "CYCLE_DETECTION_TIMEOUT";
/// Sentinel cycle marker: more cycles exist than the configured cap.
pub const CYCLE_OVERFLOW_SENTINEL: &str = "...";

/// Number of phase-2 metrics a snapshot publishes.
pub(crate) const METRIC_COUNT: usize = 8;

/// Computation state of one phase-2 metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricState {
    Computed,
    Approx,
    Timeout,
    Skipped,
}

/// Per-metric status embedded in every result that surfaces the metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricStatus {
    pub state: MetricState,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_reason: Option<String>,
}

impl MetricStatus {
    pub(crate) fn computed(elapsed: Duration) -> Self {
        Self { state: MetricState::Computed, elapsed_ms: elapsed.as_millis() as u64, sub_reason: None }
    }

    pub(crate) fn approx(elapsed: Duration, reason: &str) -> Self {
        Self {
            state: MetricState::Approx,
            elapsed_ms: elapsed.as_millis() as u64,
            sub_reason: Some(reason.to_string()),
        }
    }

    pub(crate) fn timeout(elapsed: Duration, cancelled: bool) -> Self {
        Self {
            state: MetricState::Timeout,
            elapsed_ms: elapsed.as_millis() as u64,
            sub_reason: cancelled.then(|| "cancelled".to_string()),
        }
    }

    pub(crate) fn skipped(reason: &str) -> Self {
        Self { state: MetricState::Skipped, elapsed_ms: 0, sub_reason: Some(reason.to_string()) }
    }

    fn pending() -> Self {
        Self { state: MetricState::Timeout, elapsed_ms: 0, sub_reason: Some("pending".to_string()) }
    }
}

/// Snapshot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SnapshotState {
    Building = 0,
    Phase1Done = 1,
    Phase2Running = 2,
    Phase2Ready = 3,
}

/// Instant metrics, computed synchronously for every call.
#[derive(Debug, Clone)]
pub struct Phase1 {
    pub in_degree: Vec<u32>,
    pub out_degree: Vec<u32>,
    /// Best-effort topological order: blockers first, cycle members last.
    pub topo_order: Vec<u32>,
    pub has_cycles: bool,
    pub density: f64,
    /// In-degree-0 nodes (nothing blocks on them), input order.
    pub roots: Vec<u32>,
    /// Out-degree-0 nodes (blocked on nothing), input order.
    pub leaves: Vec<u32>,
    /// Open/in-progress nodes whose every blocking target is closed.
    pub actionable: Vec<u32>,
    /// Longest blocker-chain depth per node (leaves have depth 1).
    pub depths: Vec<u32>,
}

/// Hub/authority score pair.
#[derive(Debug, Clone, Default)]
pub struct HitsScores {
    pub hubs: Vec<f64>,
    pub authorities: Vec<f64>,
}

/// Cycle analysis output.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Elementary cycles as node-index sequences, capped.
    pub cycles: Vec<Vec<u32>>,
    /// `...` when capped, `CYCLE_DETECTION_TIMEOUT` when the wall cap fired.
    pub sentinels: Vec<String>,
    /// Non-trivial SCC count.
    pub cycle_count: usize,
    /// Per-node membership in any non-trivial SCC.
    pub in_cycle: Vec<bool>,
}

type Slot<T> = OnceLock<(T, MetricStatus)>;

/// Analysis snapshot bound to one input fingerprint.
pub struct Stats {
    issues: Arc<Vec<Issue>>,
    graph: Arc<DepGraph>,
    /// node index -> index into `issues`.
    node_issue: Vec<u32>,
    fingerprint: String,
    phase1: Phase1,

    state: AtomicU8,
    cancelled: AtomicBool,
    published: Mutex<usize>,
    ready_cv: Condvar,

    pagerank: Slot<Vec<f64>>,
    betweenness: Slot<Vec<f64>>,
    hits: Slot<HitsScores>,
    eigenvector: Slot<Vec<f64>>,
    cycles: Slot<CycleReport>,
    critical: Slot<CriticalPathResult>,
    kcore: Slot<Vec<u32>>,
    articulation: Slot<Vec<u32>>,
}

impl Stats {
    pub(crate) fn new(
        issues: Arc<Vec<Issue>>,
        graph: Arc<DepGraph>,
        node_issue: Vec<u32>,
        fingerprint: String,
        phase1: Phase1,
    ) -> Self {
        Self {
            issues,
            graph,
            node_issue,
            fingerprint,
            phase1,
            state: AtomicU8::new(SnapshotState::Phase1Done as u8),
            cancelled: AtomicBool::new(false),
            published: Mutex::new(0),
            ready_cv: Condvar::new(),
            pagerank: OnceLock::new(),
            betweenness: OnceLock::new(),
            hits: OnceLock::new(),
            eigenvector: OnceLock::new(),
            cycles: OnceLock::new(),
            critical: OnceLock::new(),
            kcore: OnceLock::new(),
            articulation: OnceLock::new(),
        }
    }

    // === Snapshot identity ===

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// The issue backing a graph node.
    #[must_use]
    pub fn issue_of(&self, node: u32) -> &Issue {
        &self.issues[self.node_issue[node as usize] as usize]
    }

    #[must_use]
    pub fn phase1(&self) -> &Phase1 {
        &self.phase1
    }

    // === Lifecycle ===

    #[must_use]
    pub fn state(&self) -> SnapshotState {
        match self.state.load(Ordering::Acquire) {
            0 => SnapshotState::Building,
            1 => SnapshotState::Phase1Done,
            2 => SnapshotState::Phase2Running,
            _ => SnapshotState::Phase2Ready,
        }
    }

    #[must_use]
    pub fn is_phase2_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == SnapshotState::Phase2Ready as u8
    }

    /// Transition `Phase1Done -> Phase2Running`; false if already past it.
    pub(crate) fn try_begin_phase2(&self) -> bool {
        self.state
            .compare_exchange(
                SnapshotState::Phase1Done as u8,
                SnapshotState::Phase2Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Signal running metrics to abandon their work. Already-published
    /// metrics remain valid.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Block until phase 2 is ready or the timeout elapses. Returns readiness.
    pub fn wait_for_phase2(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        while *published < METRIC_COUNT {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .ready_cv
                .wait_timeout(published, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            published = guard;
        }
        true
    }

    fn note_published(&self) {
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        *published += 1;
        if *published >= METRIC_COUNT {
            self.state.store(SnapshotState::Phase2Ready as u8, Ordering::Release);
        }
        self.ready_cv.notify_all();
    }

    // === Publication (one writer per slot) ===

    pub(crate) fn publish_pagerank(&self, scores: Vec<f64>, status: MetricStatus) {
        if self.pagerank.set((scores, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_betweenness(&self, scores: Vec<f64>, status: MetricStatus) {
        if self.betweenness.set((scores, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_hits(&self, scores: HitsScores, status: MetricStatus) {
        if self.hits.set((scores, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_eigenvector(&self, scores: Vec<f64>, status: MetricStatus) {
        if self.eigenvector.set((scores, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_cycles(&self, report: CycleReport, status: MetricStatus) {
        if self.cycles.set((report, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_critical(&self, result: CriticalPathResult, status: MetricStatus) {
        if self.critical.set((result, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_kcore(&self, cores: Vec<u32>, status: MetricStatus) {
        if self.kcore.set((cores, status)).is_ok() {
            self.note_published();
        }
    }

    pub(crate) fn publish_articulation(&self, points: Vec<u32>, status: MetricStatus) {
        if self.articulation.set((points, status)).is_ok() {
            self.note_published();
        }
    }

    // === Readers (zero defaults until published) ===

    fn score_at(slot: &Slot<Vec<f64>>, node: u32) -> f64 {
        slot.get().and_then(|(v, _)| v.get(node as usize)).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn pagerank_score(&self, id: &str) -> f64 {
        self.graph.node_of(id).map_or(0.0, |n| Self::score_at(&self.pagerank, n))
    }

    #[must_use]
    pub fn betweenness_score(&self, id: &str) -> f64 {
        self.graph.node_of(id).map_or(0.0, |n| Self::score_at(&self.betweenness, n))
    }

    #[must_use]
    pub fn hub_score(&self, id: &str) -> f64 {
        let Some(node) = self.graph.node_of(id) else { return 0.0 };
        self.hits.get().and_then(|(h, _)| h.hubs.get(node as usize)).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn authority_score(&self, id: &str) -> f64 {
        let Some(node) = self.graph.node_of(id) else { return 0.0 };
        self.hits
            .get()
            .and_then(|(h, _)| h.authorities.get(node as usize))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn eigenvector_score(&self, id: &str) -> f64 {
        self.graph.node_of(id).map_or(0.0, |n| Self::score_at(&self.eigenvector, n))
    }

    #[must_use]
    pub fn critical_path_score(&self, id: &str) -> f64 {
        let Some(node) = self.graph.node_of(id) else { return 0.0 };
        self.critical
            .get()
            .and_then(|(c, _)| c.score.get(node as usize))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn slack(&self, id: &str) -> f64 {
        let Some(node) = self.graph.node_of(id) else { return 0.0 };
        self.critical
            .get()
            .and_then(|(c, _)| c.slack.get(node as usize))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn core_number(&self, id: &str) -> u32 {
        let Some(node) = self.graph.node_of(id) else { return 0 };
        self.kcore.get().and_then(|(c, _)| c.get(node as usize)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_articulation(&self, id: &str) -> bool {
        let Some(node) = self.graph.node_of(id) else { return false };
        self.articulation.get().is_some_and(|(pts, _)| pts.binary_search(&node).is_ok())
    }

    #[must_use]
    pub fn in_cycle(&self, id: &str) -> bool {
        let Some(node) = self.graph.node_of(id) else { return false };
        self.cycles
            .get()
            .and_then(|(r, _)| r.in_cycle.get(node as usize))
            .copied()
            .unwrap_or(false)
    }

    // === Whole-vector readers for the scorers ===

    pub(crate) fn pagerank_vec(&self) -> Option<&[f64]> {
        self.pagerank.get().map(|(v, _)| v.as_slice())
    }

    pub(crate) fn betweenness_vec(&self) -> Option<&[f64]> {
        self.betweenness.get().map(|(v, _)| v.as_slice())
    }

    pub(crate) fn hits_scores(&self) -> Option<&HitsScores> {
        self.hits.get().map(|(v, _)| v)
    }

    pub(crate) fn eigenvector_vec(&self) -> Option<&[f64]> {
        self.eigenvector.get().map(|(v, _)| v.as_slice())
    }

    #[must_use]
    pub fn cycle_report(&self) -> Option<&CycleReport> {
        self.cycles.get().map(|(v, _)| v)
    }

    #[must_use]
    pub fn critical_path(&self) -> Option<&CriticalPathResult> {
        self.critical.get().map(|(v, _)| v)
    }

    pub(crate) fn kcore_vec(&self) -> Option<&[u32]> {
        self.kcore.get().map(|(v, _)| v.as_slice())
    }

    pub(crate) fn articulation_vec(&self) -> Option<&[u32]> {
        self.articulation.get().map(|(v, _)| v.as_slice())
    }

    /// Cycles rendered as issue-ID sequences, sentinels appended last.
    #[must_use]
    pub fn cycles_as_ids(&self) -> Vec<Vec<String>> {
        let Some(report) = self.cycle_report() else { return Vec::new() };
        let mut out: Vec<Vec<String>> = report
            .cycles
            .iter()
            .map(|cycle| cycle.iter().map(|&n| self.graph.id_of(n).to_string()).collect())
            .collect();
        for sentinel in &report.sentinels {
            out.push(vec![sentinel.clone()]);
        }
        out
    }

    /// Per-metric statuses in fixed (alphabetical) key order. Metrics not
    /// yet published report `timeout` with sub-reason `pending`.
    #[must_use]
    pub fn metric_statuses(&self) -> BTreeMap<String, MetricStatus> {
        let status = |slot: Option<&MetricStatus>| {
            slot.cloned().unwrap_or_else(MetricStatus::pending)
        };
        let mut map = BTreeMap::new();
        map.insert("articulation".into(), status(self.articulation.get().map(|(_, s)| s)));
        map.insert("betweenness".into(), status(self.betweenness.get().map(|(_, s)| s)));
        map.insert("critical_path".into(), status(self.critical.get().map(|(_, s)| s)));
        map.insert("cycles".into(), status(self.cycles.get().map(|(_, s)| s)));
        map.insert("eigenvector".into(), status(self.eigenvector.get().map(|(_, s)| s)));
        map.insert("hits".into(), status(self.hits.get().map(|(_, s)| s)));
        map.insert("k_core".into(), status(self.kcore.get().map(|(_, s)| s)));
        map.insert("pagerank".into(), status(self.pagerank.get().map(|(_, s)| s)));
        map
    }

    /// Non-trivial SCC count, zero until cycle analysis publishes.
    #[must_use]
    pub fn cycle_count(&self) -> usize {
        self.cycle_report().map_or(0, |r| r.cycle_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::EngineConfig;
    use crate::model::Status;

    fn snapshot() -> Arc<Stats> {
        let analyzer =
            Analyzer::new(vec![Issue::new("a", Status::Open)], EngineConfig::default()).unwrap();
        analyzer.analyze().unwrap()
    }

    #[test]
    fn unpublished_metrics_read_zero() {
        let stats = snapshot();
        assert_eq!(stats.pagerank_score("a"), 0.0);
        assert_eq!(stats.betweenness_score("a"), 0.0);
        assert!(!stats.in_cycle("a"));
        assert!(!stats.is_phase2_ready());
    }

    #[test]
    fn statuses_report_pending_before_publication() {
        let stats = snapshot();
        let statuses = stats.metric_statuses();
        assert_eq!(statuses.len(), METRIC_COUNT);
        for status in statuses.values() {
            assert_eq!(status.state, MetricState::Timeout);
            assert_eq!(status.sub_reason.as_deref(), Some("pending"));
        }
    }

    #[test]
    fn publication_is_write_once() {
        let stats = snapshot();
        stats.publish_pagerank(vec![0.5], MetricStatus::computed(Duration::ZERO));
        stats.publish_pagerank(vec![0.9], MetricStatus::computed(Duration::ZERO));
        assert_eq!(stats.pagerank_score("a"), 0.5);
    }

    #[test]
    fn ready_after_all_metrics_publish() {
        let stats = snapshot();
        let status = || MetricStatus::computed(Duration::ZERO);
        stats.publish_pagerank(vec![0.0], status());
        stats.publish_betweenness(vec![0.0], status());
        stats.publish_hits(HitsScores::default(), status());
        stats.publish_eigenvector(vec![0.0], status());
        stats.publish_cycles(CycleReport::default(), status());
        stats.publish_critical(
            beadview_fast::critical_path::critical_path(&[], 1, &[1.0]).unwrap(),
            status(),
        );
        stats.publish_kcore(vec![0], status());
        assert!(!stats.is_phase2_ready());
        stats.publish_articulation(vec![], status());
        assert!(stats.is_phase2_ready());
        assert!(stats.wait_for_phase2(Duration::from_millis(1)));
    }

    #[test]
    fn cancel_flag_is_visible() {
        let stats = snapshot();
        assert!(!stats.is_cancelled());
        stats.cancel();
        assert!(stats.is_cancelled());
    }

    #[test]
    fn state_transition_is_one_way() {
        let stats = snapshot();
        assert_eq!(stats.state(), SnapshotState::Phase1Done);
        assert!(stats.try_begin_phase2());
        assert!(!stats.try_begin_phase2());
        assert_eq!(stats.state(), SnapshotState::Phase2Running);
    }
}
