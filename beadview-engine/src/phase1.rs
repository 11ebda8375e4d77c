//! Phase-1 analysis: instant metrics computed synchronously on every call.

use beadview_fast::topo;

use crate::error::EngineError;
use crate::graph::DepGraph;
use crate::model::Issue;
use crate::stats::Phase1;

/// Compute all instant metrics. `node_issue` maps graph nodes to indices in
/// `issues` (the builder may have dropped duplicate IDs).
pub(crate) fn compute(
    graph: &DepGraph,
    issues: &[Issue],
    node_issue: &[u32],
) -> Result<Phase1, EngineError> {
    let n = graph.node_count();
    let edges = graph.edges();

    let in_degree: Vec<u32> = (0..n as u32).map(|v| graph.in_degree(v) as u32).collect();
    let out_degree: Vec<u32> = (0..n as u32).map(|v| graph.out_degree(v) as u32).collect();

    let topo = topo::topo_order(edges, n)?;
    let depths = topo::dependency_depths(edges, n)?;

    let roots: Vec<u32> = (0..n as u32).filter(|&v| graph.in_degree(v) == 0).collect();
    let leaves: Vec<u32> = (0..n as u32).filter(|&v| graph.out_degree(v) == 0).collect();

    // Actionable: open or in-progress, every blocking target closed. Edges
    // to dangling targets were never created, so they cannot block; edges to
    // closed targets count as satisfied. `blocked` status is informational
    // and does not exclude an issue here.
    let actionable: Vec<u32> = (0..n as u32)
        .filter(|&v| {
            let issue = &issues[node_issue[v as usize] as usize];
            issue.status.is_active()
                && graph.blockers_of(v).iter().all(|&target| {
                    issues[node_issue[target as usize] as usize].status.is_closed()
                })
        })
        .collect();

    Ok(Phase1 {
        in_degree,
        out_degree,
        topo_order: topo.order,
        has_cycles: topo.has_cycles,
        density: graph.density(),
        roots,
        leaves,
        actionable,
        depths,
    })
}
