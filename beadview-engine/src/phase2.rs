//! Phase-2 orchestration: deferred metrics on a bounded worker pool.
//!
//! Every metric runs as an independent task, checks the cancellation flag
//! and its deadline at suspension points, and publishes exactly once into
//! the snapshot: a real value on success, the zero default with a `timeout`
//! status when it ran out of time. The pool handle is dropped right after
//! spawning; queued tasks keep the pool alive, which is what lets a call
//! return while its phase-2 extension finishes in the background.

use rayon::ThreadPoolBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use beadview_fast::hits::HitsConfig;
use beadview_fast::{articulation, betweenness, critical_path, eigenvector, hits, kcore, pagerank, scc};

use crate::config::EngineConfig;
use crate::stats::{
    CycleReport, HitsScores, MetricStatus, Stats, CYCLE_OVERFLOW_SENTINEL, CYCLE_TIMEOUT_SENTINEL,
};

/// Kick all phase-2 metrics onto the worker pool. No-op if phase 2 already
/// started on this snapshot.
pub(crate) fn spawn(stats: &Arc<Stats>, config: &EngineConfig) {
    if !stats.try_begin_phase2() {
        return;
    }
    let overall_deadline = Instant::now() + Duration::from_millis(config.overall_budget_ms);

    type Runner = fn(&Stats, &EngineConfig, Instant);
    const RUNNERS: [Runner; 8] = [
        run_pagerank,
        run_betweenness,
        run_hits,
        run_eigenvector,
        run_cycles,
        run_critical_path,
        run_kcore,
        run_articulation,
    ];

    match ThreadPoolBuilder::new().num_threads(config.worker_count()).build() {
        Ok(pool) => {
            debug!(workers = config.worker_count(), "phase 2 started");
            for runner in RUNNERS {
                let stats = Arc::clone(stats);
                let config = config.clone();
                pool.spawn(move || runner(&stats, &config, overall_deadline));
            }
            // Dropping the handle detaches the pool; queued tasks finish in
            // the background and publish into the snapshot.
        }
        Err(err) => {
            warn!(%err, "worker pool unavailable, running phase 2 inline");
            for runner in RUNNERS {
                runner(stats, config, overall_deadline);
            }
        }
    }
}

/// True when this metric must not start (cancelled or out of overall budget).
fn expired(stats: &Stats, overall_deadline: Instant) -> bool {
    stats.is_cancelled() || Instant::now() >= overall_deadline
}

/// Per-metric soft deadline, clipped to the overall budget.
fn metric_deadline(start: Instant, config: &EngineConfig, overall_deadline: Instant) -> Instant {
    (start + Duration::from_millis(config.metric_budget_ms)).min(overall_deadline)
}

fn run_pagerank(stats: &Stats, config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_pagerank(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let deadline = metric_deadline(start, config, overall_deadline);
    let probe = move || stats.is_cancelled() || Instant::now() >= deadline;
    let graph = stats.graph();
    match pagerank::pagerank(graph.edges(), graph.node_count(), 0.85, 100, 1e-6, Some(&probe)) {
        Ok(result) if result.timed_out => {
            stats.publish_pagerank(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        }
        Ok(result) => {
            let status = if result.converged {
                MetricStatus::computed(start.elapsed())
            } else {
                MetricStatus::approx(start.elapsed(), "iteration cap reached before tolerance")
            };
            stats.publish_pagerank(result.scores, status);
        }
        Err(err) => {
            warn!(%err, "pagerank kernel rejected input");
            stats.publish_pagerank(Vec::new(), MetricStatus::skipped("internal error"));
        }
    }
}

fn run_betweenness(stats: &Stats, config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_betweenness(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let graph = stats.graph();
    let n = graph.node_count();
    let result = if n > config.betweenness_sample_threshold {
        betweenness::betweenness_sampled(graph.edges(), n, config.betweenness_sample_size)
    } else {
        betweenness::betweenness(graph.edges(), n)
    };
    match result {
        Ok(result) => {
            let status = if result.sampled {
                MetricStatus::approx(start.elapsed(), "sampled sources")
            } else {
                MetricStatus::computed(start.elapsed())
            };
            stats.publish_betweenness(result.scores, status);
        }
        Err(err) => {
            warn!(%err, "betweenness kernel rejected input");
            stats.publish_betweenness(Vec::new(), MetricStatus::skipped("internal error"));
        }
    }
}

fn run_hits(stats: &Stats, config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_hits(HitsScores::default(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let deadline = metric_deadline(start, config, overall_deadline);
    let probe = move || stats.is_cancelled() || Instant::now() >= deadline;
    let graph = stats.graph();
    let hits_config = HitsConfig { tolerance: 1e-6, max_iterations: 50 };
    match hits::hits(graph.edges(), graph.node_count(), &hits_config, Some(&probe)) {
        Ok(result) if result.timed_out => {
            stats.publish_hits(HitsScores::default(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        }
        Ok(result) => {
            let status = if result.converged {
                MetricStatus::computed(start.elapsed())
            } else {
                MetricStatus::approx(start.elapsed(), "unstable after iteration cap")
            };
            stats.publish_hits(
                HitsScores { hubs: result.hubs, authorities: result.authorities },
                status,
            );
        }
        Err(err) => {
            warn!(%err, "hits kernel rejected input");
            stats.publish_hits(HitsScores::default(), MetricStatus::skipped("internal error"));
        }
    }
}

fn run_eigenvector(stats: &Stats, config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_eigenvector(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let graph = stats.graph();
    let n = graph.node_count();
    let (mask, component_count) = graph.largest_component_mask();

    let mask = if component_count > 1 {
        if !config.eigenvector_on_largest {
            stats.publish_eigenvector(Vec::new(), MetricStatus::skipped("disconnected graph"));
            return;
        }
        Some(mask)
    } else {
        None
    };

    let deadline = metric_deadline(start, config, overall_deadline);
    let probe = move || stats.is_cancelled() || Instant::now() >= deadline;
    match eigenvector::eigenvector_centrality(
        graph.edges(),
        n,
        mask.as_deref(),
        100,
        1e-8,
        Some(&probe),
    ) {
        Ok(result) if result.timed_out => {
            stats.publish_eigenvector(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        }
        Ok(result) => {
            let status = if mask.is_some() {
                MetricStatus::approx(start.elapsed(), "largest component only")
            } else if result.converged {
                MetricStatus::computed(start.elapsed())
            } else {
                MetricStatus::approx(start.elapsed(), "iteration cap reached before tolerance")
            };
            stats.publish_eigenvector(result.scores, status);
        }
        Err(err) => {
            warn!(%err, "eigenvector kernel rejected input");
            stats.publish_eigenvector(Vec::new(), MetricStatus::skipped("internal error"));
        }
    }
}

fn run_cycles(stats: &Stats, config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_cycles(CycleReport::default(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let graph = stats.graph();
    let n = graph.node_count();

    let scc_result = match scc::tarjan_scc(graph.edges(), n) {
        Ok(r) => r,
        Err(err) => {
            warn!(%err, "scc kernel rejected input");
            stats.publish_cycles(CycleReport::default(), MetricStatus::skipped("internal error"));
            return;
        }
    };

    let mut in_cycle = vec![false; n];
    for component in scc_result.components.iter().filter(|c| c.len() > 1) {
        for &node in component {
            in_cycle[node as usize] = true;
        }
    }

    // Enumeration only needs the edges inside non-trivial SCCs; everything
    // else cannot be part of an elementary cycle.
    let cycle_edges: Vec<(u32, u32)> = graph
        .edges()
        .iter()
        .copied()
        .filter(|&(src, dst)| {
            in_cycle[src as usize]
                && in_cycle[dst as usize]
                && scc_result.component_of[src as usize] == scc_result.component_of[dst as usize]
        })
        .collect();

    let hard_deadline = (start + Duration::from_millis(config.cycle_wall_ms)).min(overall_deadline);
    let probe = move || stats.is_cancelled() || Instant::now() >= hard_deadline;
    let enumeration = match scc::enumerate_cycles(&cycle_edges, n, config.max_cycles, Some(&probe)) {
        Ok(e) => e,
        Err(err) => {
            warn!(%err, "cycle enumeration rejected input");
            stats.publish_cycles(CycleReport::default(), MetricStatus::skipped("internal error"));
            return;
        }
    };

    let mut sentinels = Vec::new();
    let status = if enumeration.timed_out {
        sentinels.push(CYCLE_TIMEOUT_SENTINEL.to_string());
        MetricStatus::timeout(start.elapsed(), stats.is_cancelled())
    } else {
        if enumeration.truncated {
            sentinels.push(CYCLE_OVERFLOW_SENTINEL.to_string());
        }
        MetricStatus::computed(start.elapsed())
    };

    stats.publish_cycles(
        CycleReport {
            cycles: enumeration.cycles,
            sentinels,
            cycle_count: scc_result.cycle_count,
            in_cycle,
        },
        status,
    );
}

fn run_critical_path(stats: &Stats, _config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        if let Ok(empty) = critical_path::critical_path(&[], 0, &[]) {
            stats.publish_critical(empty, MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        }
        return;
    }
    let graph = stats.graph();
    let n = graph.node_count();
    let weights: Vec<f64> =
        (0..n as u32).map(|v| stats.issue_of(v).estimate_days.unwrap_or(1.0)).collect();
    match critical_path::critical_path(graph.edges(), n, &weights) {
        Ok(result) => {
            stats.publish_critical(result, MetricStatus::computed(start.elapsed()));
        }
        Err(err) => {
            warn!(%err, "critical path kernel rejected input");
            if let Ok(empty) = critical_path::critical_path(&[], 0, &[]) {
                stats.publish_critical(empty, MetricStatus::skipped("internal error"));
            }
        }
    }
}

fn run_kcore(stats: &Stats, _config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_kcore(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let graph = stats.graph();
    match kcore::core_numbers(graph.edges(), graph.node_count()) {
        Ok(cores) => stats.publish_kcore(cores, MetricStatus::computed(start.elapsed())),
        Err(err) => {
            warn!(%err, "k-core kernel rejected input");
            stats.publish_kcore(Vec::new(), MetricStatus::skipped("internal error"));
        }
    }
}

fn run_articulation(stats: &Stats, _config: &EngineConfig, overall_deadline: Instant) {
    let start = Instant::now();
    if expired(stats, overall_deadline) {
        stats.publish_articulation(Vec::new(), MetricStatus::timeout(start.elapsed(), stats.is_cancelled()));
        return;
    }
    let graph = stats.graph();
    match articulation::articulation_points(graph.edges(), graph.node_count()) {
        Ok(points) => stats.publish_articulation(points, MetricStatus::computed(start.elapsed())),
        Err(err) => {
            warn!(%err, "articulation kernel rejected input");
            stats.publish_articulation(Vec::new(), MetricStatus::skipped("internal error"));
        }
    }
}
