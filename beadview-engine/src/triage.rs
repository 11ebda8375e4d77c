//! The triage orchestrator: builder -> phase 1 -> phase 2 -> scorers,
//! assembled into the deterministic `TriageResult` shape agents consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crate::analyzer::Analyzer;
use crate::config::{AsOf, EngineConfig, TriageOptions};
use crate::error::{Diagnostic, EngineError};
use crate::graph::filter_scope;
use crate::insights::GraphHealth;
use crate::model::{Issue, Status};
use crate::scoring::{
    blockers_to_clear, compute_impact_scores, quick_wins, top_recommendations, BlockerToClear,
    QuickWin, Recommendation,
};
use crate::stats::MetricStatus;
use crate::whatif::reverse_closure;

/// Schema version stamped on every triage result.
const TRIAGE_VERSION: &str = "1.0.0";

/// Extra wait beyond the phase-2 budget before reporting metrics as pending.
const PHASE2_WAIT_SLACK_MS: u64 = 250;

/// A list with its capping state, per the result-shape stability rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CappedList<T> {
    pub items: Vec<T>,
    pub capped: bool,
    /// Count before capping; zero when the list was not capped.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub limited: usize,
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

impl<T> CappedList<T> {
    pub(crate) fn new(mut items: Vec<T>, cap: usize) -> Self {
        let original = items.len();
        let capped = original > cap;
        items.truncate(cap);
        Self { items, capped, limited: if capped { original } else { 0 } }
    }
}

/// Result metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageMeta {
    pub version: String,
    pub data_hash: String,
    /// The only non-deterministic field; injectable through `TriageOptions`.
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<AsOf>,
    pub phase2_ready: bool,
    pub issue_count: usize,
}

/// One of the top-3 picks in the quick reference block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPick {
    pub issue_id: String,
    pub title: String,
    pub score: f64,
}

/// At-a-glance counts and picks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickRef {
    pub open_count: usize,
    pub in_progress_count: usize,
    pub blocked_count: usize,
    pub actionable_count: usize,
    pub top_picks: Vec<TopPick>,
}

/// Status/type/priority histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCounts {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub closed: usize,
    pub actionable: usize,
    pub by_type: BTreeMap<String, usize>,
    /// Indexed by priority value 0..=4.
    pub by_priority: [usize; 5],
}

/// Project-level health block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHealth {
    pub counts: HealthCounts,
    pub graph: GraphHealth,
}

/// Copy-paste shell commands for the likely next actions. Always populated;
/// fallback text replaces interpolated IDs on empty projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHelpers {
    pub list_ready: String,
    pub claim_top: String,
    pub show_top: String,
    pub plan: String,
    pub refresh: String,
}

/// The full triage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub meta: TriageMeta,
    pub quick_ref: QuickRef,
    pub recommendations: CappedList<Recommendation>,
    pub quick_wins: CappedList<QuickWin>,
    pub blockers_to_clear: CappedList<BlockerToClear>,
    pub project_health: ProjectHealth,
    pub commands: CommandHelpers,
    /// Per-metric computation status, fixed key order.
    pub status: BTreeMap<String, MetricStatus>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the full triage pipeline on one issue snapshot.
pub(crate) fn compute(
    issues: &[Issue],
    config: &EngineConfig,
    opts: &TriageOptions,
) -> Result<TriageResult, EngineError> {
    let weights = config.weights.resolve()?;
    config.thresholds.validate()?;

    let scoped = filter_scope(issues, &opts.scope);
    let analyzer = Analyzer::new(scoped, config.clone())?;
    let stats = analyzer.analyze_async()?;

    if !opts.no_wait {
        stats.wait_for_phase2(Duration::from_millis(
            config.overall_budget_ms + PHASE2_WAIT_SLACK_MS,
        ));
    }

    let now = opts.resolved_now();
    let downstream = reverse_closure(&stats);
    let scores = compute_impact_scores(&stats, &weights, now, &downstream);

    let recommendations =
        CappedList::new(top_recommendations(&scores, &config.thresholds), opts.top_n());
    let wins = CappedList::new(quick_wins(&scores, &stats), opts.quick_win_n());
    let blockers =
        CappedList::new(blockers_to_clear(&stats, &downstream), opts.blocker_n());

    let top_picks: Vec<TopPick> = recommendations
        .items
        .iter()
        .take(3)
        .map(|r| TopPick { issue_id: r.issue_id.clone(), title: r.title.clone(), score: r.score })
        .collect();

    let counts = health_counts(&stats);
    let commands = command_helpers(recommendations.items.first());

    let result = TriageResult {
        meta: TriageMeta {
            version: TRIAGE_VERSION.to_string(),
            data_hash: stats.fingerprint().to_string(),
            generated_at: now,
            as_of: opts.as_of.clone(),
            phase2_ready: stats.is_phase2_ready(),
            issue_count: stats.issues().len(),
        },
        quick_ref: QuickRef {
            open_count: counts.open,
            in_progress_count: counts.in_progress,
            blocked_count: blocked_count(&stats),
            actionable_count: counts.actionable,
            top_picks,
        },
        recommendations,
        quick_wins: wins,
        blockers_to_clear: blockers,
        project_health: ProjectHealth { counts, graph: GraphHealth::from_stats(&stats) },
        commands,
        status: stats.metric_statuses(),
        diagnostics: stats.graph().diagnostics().to_vec(),
    };

    info!(
        issues = result.meta.issue_count,
        recommendations = result.recommendations.items.len(),
        actionable = result.quick_ref.actionable_count,
        has_cycles = result.project_health.graph.has_cycles,
        "triage computed"
    );
    Ok(result)
}

/// Non-closed issues with at least one non-closed blocking target, plus
/// issues explicitly marked blocked.
fn blocked_count(stats: &crate::stats::Stats) -> usize {
    let graph = stats.graph();
    (0..graph.node_count() as u32)
        .filter(|&v| {
            let issue = stats.issue_of(v);
            if issue.status.is_closed() {
                return false;
            }
            issue.status == Status::Blocked
                || graph
                    .blockers_of(v)
                    .iter()
                    .any(|&t| !stats.issue_of(t).status.is_closed())
        })
        .count()
}

fn health_counts(stats: &crate::stats::Stats) -> HealthCounts {
    let mut counts = HealthCounts {
        total: 0,
        open: 0,
        in_progress: 0,
        blocked: 0,
        closed: 0,
        actionable: stats.phase1().actionable.len(),
        by_type: BTreeMap::new(),
        by_priority: [0; 5],
    };
    for issue in stats.issues() {
        counts.total += 1;
        match issue.status {
            Status::Open => counts.open += 1,
            Status::InProgress => counts.in_progress += 1,
            Status::Blocked => counts.blocked += 1,
            Status::Closed => counts.closed += 1,
        }
        *counts.by_type.entry(issue.issue_type.as_str().to_string()).or_insert(0) += 1;
        if issue.priority.is_valid() {
            counts.by_priority[issue.priority.0 as usize] += 1;
        }
    }
    counts
}

fn command_helpers(top: Option<&Recommendation>) -> CommandHelpers {
    let (claim_top, show_top) = match top {
        Some(rec) => (
            format!("bd update {} --status=in_progress", rec.issue_id),
            format!("bd show {}", rec.issue_id),
        ),
        None => (
            "no actionable work: bd create, or bd list --status=blocked".to_string(),
            "bd list".to_string(),
        ),
    };
    CommandHelpers {
        list_ready: "bd ready".to_string(),
        claim_top,
        show_top,
        plan: "bv --robot-plan".to_string(),
        refresh: "bv --robot-triage".to_string(),
    }
}
