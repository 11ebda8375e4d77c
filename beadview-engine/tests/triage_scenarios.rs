//! End-to-end scenarios against the public `Engine` API: literal cases from
//! the triage playbook plus the boundary shapes (empty project, single
//! issue, two-cycle, long chain).

use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use beadview_engine::{
    Dependency, Engine, EngineConfig, Issue, Priority, Status, TriageOptions,
};

fn issue(id: &str, status: Status, prio: i32, deps: &[&str]) -> Issue {
    let mut i = Issue::new(id, status);
    i.title = format!("Issue {id}");
    i.priority = Priority(prio);
    i.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    i.updated_at = i.created_at;
    i.dependencies = deps.iter().map(|d| Dependency::blocks(*d)).collect();
    i
}

fn opts_now() -> TriageOptions {
    TriageOptions {
        now: Some(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()),
        ..Default::default()
    }
}

#[test]
fn scenario_minimal_chain() {
    let engine = Engine::default();
    let issues =
        vec![issue("A", Status::Open, 1, &["B"]), issue("B", Status::Open, 1, &[])];

    let triage = engine.compute_triage(&issues, &opts_now()).unwrap();
    assert_eq!(triage.quick_ref.actionable_count, 1);
    assert_eq!(triage.recommendations.items[0].issue_id, "B");

    let plan = engine.compute_plan(&issues).unwrap();
    let planned: Vec<&str> = plan
        .tracks
        .iter()
        .flat_map(|t| t.issues.iter().map(|i| i.issue_id.as_str()))
        .collect();
    assert_eq!(planned, vec!["B"]);

    let delta = engine.what_if(&issues, "B").unwrap().unwrap();
    assert_eq!(delta.direct_unblocks, 1);
    assert_eq!(delta.transitive_unblocks, 1);
}

#[test]
fn scenario_two_cycle() {
    let engine = Engine::default();
    let issues =
        vec![issue("A", Status::Open, 2, &["B"]), issue("B", Status::Open, 2, &["A"])];

    let triage = engine.compute_triage(&issues, &opts_now()).unwrap();
    assert!(triage.project_health.graph.has_cycles);
    assert_eq!(triage.project_health.graph.cycle_count, 1);
    assert_eq!(triage.quick_ref.actionable_count, 0);

    let advanced = engine.compute_advanced_insights(&issues, &opts_now()).unwrap();
    assert_eq!(advanced.cycle_break.cycle_count, 1);
    assert!(!advanced.cycle_break.suggestions.is_empty());
    // Deterministic tie-break: the A -> B edge ranks first.
    let top = &advanced.cycle_break.suggestions[0];
    assert_eq!((top.edge_from.as_str(), top.edge_to.as_str()), ("A", "B"));
}

#[test]
fn scenario_blocker_cleared() {
    let engine = Engine::default();
    let issues = vec![
        issue("root", Status::Closed, 2, &[]),
        issue("x", Status::Open, 2, &["root"]),
        issue("y", Status::Open, 2, &["x"]),
    ];

    let triage = engine.compute_triage(&issues, &opts_now()).unwrap();
    assert_eq!(triage.quick_ref.actionable_count, 1);

    let plan = engine.compute_plan(&issues).unwrap();
    let planned: Vec<&str> = plan
        .tracks
        .iter()
        .flat_map(|t| t.issues.iter().map(|i| i.issue_id.as_str()))
        .collect();
    assert_eq!(planned, vec!["x"]);

    let delta = engine.what_if(&issues, "x").unwrap().unwrap();
    assert_eq!(delta.direct_unblocks, 1);
}

#[test]
fn scenario_stale_in_progress() {
    let engine = Engine::default();
    let now = Utc.with_ymd_and_hms(2025, 6, 21, 0, 0, 0).unwrap();
    let mut w = issue("w", Status::InProgress, 1, &[]);
    w.updated_at = now - ChronoDuration::days(20);

    let opts = TriageOptions { now: Some(now), ..Default::default() };
    let triage = engine.compute_triage(&[w], &opts).unwrap();

    assert_eq!(triage.recommendations.items.len(), 1);
    let rec = &triage.recommendations.items[0];
    assert_eq!(rec.action, "review");
    assert!(rec.breakdown.staleness_norm >= 0.5, "staleness {}", rec.breakdown.staleness_norm);
}

#[test]
fn scenario_empty_project() {
    let engine = Engine::default();
    let triage = engine.compute_triage(&[], &opts_now()).unwrap();

    assert_eq!(triage.project_health.counts.total, 0);
    assert!(triage.recommendations.items.is_empty());
    assert!(triage.quick_wins.items.is_empty());
    assert!(triage.blockers_to_clear.items.is_empty());
    assert!(!triage.project_health.graph.has_cycles);
    assert!(!triage.meta.data_hash.is_empty());

    // No empty issue ID interpolated into commands.
    assert_ne!(triage.commands.claim_top, "bd update  --status=in_progress");
    assert!(!triage.commands.claim_top.is_empty());
}

#[test]
fn scenario_priority_drift() {
    let engine = Engine::default();
    // "hot" tops the ranking (urgent label, blocks everything) but carries
    // priority 3.
    let mut hot = issue("hot", Status::Open, 3, &[]);
    hot.labels = vec!["urgent".into()];
    let mut issues = vec![hot];
    for i in 0..4 {
        issues.push(issue(&format!("filler{i}"), Status::Open, 2, &["hot"]));
    }

    let drifts = engine.priority_drift(&issues, &opts_now()).unwrap();
    let drift = drifts.iter().find(|d| d.issue_id == "hot").expect("hot should drift");
    assert!(drift.suggested_priority.0 <= 1);
    assert!(drift.confidence >= 0.4);
}

#[test]
fn single_isolated_issue_boundary() {
    let engine = Engine::default();
    for (status, actionable) in [
        (Status::Open, 1),
        (Status::InProgress, 1),
        (Status::Blocked, 0),
        (Status::Closed, 0),
    ] {
        let triage =
            engine.compute_triage(&[issue("solo", status, 2, &[])], &opts_now()).unwrap();
        assert_eq!(triage.quick_ref.actionable_count, actionable, "status {status:?}");
        assert_eq!(triage.project_health.graph.node_count, 1);
        assert_eq!(triage.project_health.graph.edge_count, 0);
    }
}

#[test]
fn five_hundred_node_chain() {
    let engine = Engine::default();
    let mut issues = Vec::new();
    for i in 0..500 {
        let mut it = issue(&format!("n{i:03}"), Status::Open, 2, &[]);
        if i + 1 < 500 {
            it.dependencies = vec![Dependency::blocks(format!("n{:03}", i + 1))];
        }
        issues.push(it);
    }

    let plan = engine.compute_plan(&issues).unwrap();
    assert_eq!(plan.actionable_count, 1);
    assert_eq!(plan.tracks.len(), 1);
    assert_eq!(plan.tracks[0].issues.len(), 1);
    assert_eq!(plan.tracks[0].issues[0].issue_id, "n499");

    // PageRank grows monotonically toward the deepest blocker.
    let insights = engine.compute_insights(&issues, &opts_now()).unwrap();
    assert_eq!(insights.top_pagerank[0].issue_id, "n499");
    assert!(insights.graph.node_count == 500 && insights.graph.edge_count == 499);
    assert!(!insights.graph.has_cycles);
}

#[test]
fn dangling_reference_is_diagnostic_not_error() {
    let engine = Engine::default();
    let triage = engine
        .compute_triage(&[issue("a", Status::Open, 2, &["ghost"])], &opts_now())
        .unwrap();
    assert_eq!(triage.diagnostics.len(), 1);
    assert_eq!(triage.diagnostics[0].target.as_deref(), Some("ghost"));
    assert_eq!(triage.quick_ref.actionable_count, 1);
}

#[test]
fn invalid_priority_is_rejected_before_any_work() {
    let engine = Engine::default();
    let mut bad = issue("bad", Status::Open, 2, &[]);
    bad.priority = Priority(7);
    let err = engine.compute_triage(&[bad], &opts_now()).unwrap_err();
    assert!(err.to_string().contains("priority"));
}

#[test]
fn invalid_weights_fall_back_to_defaults() {
    let mut config = EngineConfig::default();
    config.weights.pagerank = 0.99; // sum now far from 1.0
    let engine = Engine::new(config);
    let issues = vec![issue("a", Status::Open, 0, &[])];
    // Falls back rather than failing; the recommendation still appears.
    let triage = engine.compute_triage(&issues, &opts_now()).unwrap();
    assert_eq!(triage.recommendations.items.len(), 1);
}

#[test]
fn recommendation_fields_stay_in_range() {
    let engine = Engine::default();
    let mut issues = Vec::new();
    for i in 0..12 {
        let mut it = issue(&format!("i{i:02}"), Status::Open, (i % 5) as i32, &[]);
        if i % 3 == 0 {
            it.labels = vec!["urgent".into()];
        }
        if i > 0 && i % 4 == 0 {
            it.dependencies = vec![Dependency::blocks("i00")];
        }
        issues.push(it);
    }
    let triage = engine.compute_triage(&issues, &opts_now()).unwrap();
    assert!(!triage.recommendations.items.is_empty());
    assert!(triage.recommendations.items.len() <= 10);
    for rec in &triage.recommendations.items {
        assert!((0.0..=1.0).contains(&rec.score), "{}: score {}", rec.issue_id, rec.score);
        assert!(
            (0.0..=1.0).contains(&rec.confidence),
            "{}: confidence {}",
            rec.issue_id,
            rec.confidence
        );
        assert!(rec.priority.is_valid());
    }
}
