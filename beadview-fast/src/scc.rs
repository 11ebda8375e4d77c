//! Strongly connected components and cycle enumeration.
//!
//! Tarjan's algorithm (via petgraph) answers "are there cycles" in O(V + E).
//! Johnson's algorithm enumerates the actual elementary cycles; because their
//! count can be exponential, enumeration takes both a hard cap and an
//! optional deadline probe.

use petgraph::algo::tarjan_scc as petgraph_tarjan;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashSet;

use crate::{validate_edges, GraphError};

/// Result of SCC analysis.
#[derive(Debug, Clone)]
pub struct SccResult {
    /// Components in reverse topological order (successors before
    /// predecessors), each a list of node indices.
    pub components: Vec<Vec<u32>>,
    /// Component index per node.
    pub component_of: Vec<u32>,
    /// True when any component has size >= 2 or a node carries a self-loop.
    pub has_cycles: bool,
    /// Number of components of size >= 2.
    pub cycle_count: usize,
}

/// Find all strongly connected components.
pub fn tarjan_scc(edges: &[(u32, u32)], num_nodes: usize) -> Result<SccResult, GraphError> {
    if num_nodes == 0 {
        return Ok(SccResult {
            components: Vec::new(),
            component_of: Vec::new(),
            has_cycles: false,
            cycle_count: 0,
        });
    }
    validate_edges(edges, num_nodes as u32)?;

    let mut graph: DiGraph<(), ()> = DiGraph::new();
    let indices: Vec<_> = (0..num_nodes).map(|_| graph.add_node(())).collect();
    let mut self_loop = false;
    for &(src, dst) in edges {
        if src == dst {
            self_loop = true;
        }
        graph.add_edge(indices[src as usize], indices[dst as usize], ());
    }

    let components: Vec<Vec<u32>> = petgraph_tarjan(&graph)
        .into_iter()
        .map(|scc| {
            let mut members: Vec<u32> = scc.into_iter().map(|ix| ix.index() as u32).collect();
            members.sort_unstable();
            members
        })
        .collect();

    let mut component_of = vec![0u32; num_nodes];
    for (comp_ix, members) in components.iter().enumerate() {
        for &node in members {
            component_of[node as usize] = comp_ix as u32;
        }
    }

    let cycle_count = components.iter().filter(|c| c.len() > 1).count();
    Ok(SccResult {
        components,
        component_of,
        has_cycles: cycle_count > 0 || self_loop,
        cycle_count,
    })
}

/// Result of elementary-cycle enumeration.
#[derive(Debug, Clone)]
pub struct CycleEnumeration {
    /// Cycles as node-index sequences; each cycle starts at its smallest
    /// member, so output is canonical for a given graph.
    pub cycles: Vec<Vec<u32>>,
    /// True when the cap stopped enumeration early.
    pub truncated: bool,
    /// True when the deadline probe fired before enumeration finished.
    pub timed_out: bool,
}

/// Enumerate elementary cycles with Johnson's algorithm.
///
/// `out_of_time` is probed between circuit searches; when it returns true the
/// enumeration stops and reports `timed_out`. Cycles found so far are kept.
pub fn enumerate_cycles(
    edges: &[(u32, u32)],
    num_nodes: usize,
    max_cycles: usize,
    out_of_time: Option<&(dyn Fn() -> bool + Sync)>,
) -> Result<CycleEnumeration, GraphError> {
    if num_nodes == 0 || max_cycles == 0 {
        return Ok(CycleEnumeration { cycles: Vec::new(), truncated: false, timed_out: false });
    }
    validate_edges(edges, num_nodes as u32)?;

    let mut adj: Vec<Vec<u32>> = vec![Vec::new(); num_nodes];
    for &(src, dst) in edges {
        adj[src as usize].push(dst);
    }
    for list in &mut adj {
        list.sort_unstable();
        list.dedup();
    }

    let mut cycles: Vec<Vec<u32>> = Vec::new();
    let mut blocked = vec![false; num_nodes];
    let mut blocked_map: Vec<FxHashSet<u32>> = vec![FxHashSet::default(); num_nodes];
    let mut stack: Vec<u32> = Vec::new();
    let mut timed_out = false;

    for start in 0..num_nodes {
        if cycles.len() >= max_cycles {
            break;
        }
        if let Some(probe) = out_of_time {
            if probe() {
                timed_out = true;
                break;
            }
        }

        for b in &mut blocked {
            *b = false;
        }
        for s in &mut blocked_map {
            s.clear();
        }
        stack.clear();

        circuit(
            start,
            start,
            &adj,
            &mut blocked,
            &mut blocked_map,
            &mut stack,
            &mut cycles,
            max_cycles,
        );
    }

    let truncated = cycles.len() >= max_cycles;
    Ok(CycleEnumeration { cycles, truncated, timed_out })
}

fn unblock(u: usize, blocked: &mut [bool], blocked_map: &mut [FxHashSet<u32>]) {
    blocked[u] = false;
    let dependents: Vec<u32> = blocked_map[u].drain().collect();
    for w in dependents {
        if blocked[w as usize] {
            unblock(w as usize, blocked, blocked_map);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn circuit(
    v: usize,
    start: usize,
    adj: &[Vec<u32>],
    blocked: &mut [bool],
    blocked_map: &mut [FxHashSet<u32>],
    stack: &mut Vec<u32>,
    cycles: &mut Vec<Vec<u32>>,
    max_cycles: usize,
) -> bool {
    if cycles.len() >= max_cycles {
        return false;
    }

    let mut found = false;
    stack.push(v as u32);
    blocked[v] = true;

    for &w in &adj[v] {
        let w = w as usize;
        // Only explore nodes >= start so each cycle is discovered exactly
        // once, rooted at its smallest member.
        if w < start {
            continue;
        }
        if w == start {
            cycles.push(stack.clone());
            found = true;
            if cycles.len() >= max_cycles {
                stack.pop();
                return found;
            }
        } else if !blocked[w]
            && circuit(w, start, adj, blocked, blocked_map, stack, cycles, max_cycles)
        {
            found = true;
        }
    }

    if found {
        unblock(v, blocked, blocked_map);
    } else {
        for &w in &adj[v] {
            if (w as usize) >= start {
                blocked_map[w as usize].insert(v as u32);
            }
        }
    }

    stack.pop();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scc_empty() {
        let r = tarjan_scc(&[], 0).unwrap();
        assert!(r.components.is_empty());
        assert!(!r.has_cycles);
    }

    #[test]
    fn scc_dag_is_all_singletons() {
        let r = tarjan_scc(&[(0, 1), (1, 2)], 3).unwrap();
        assert_eq!(r.components.len(), 3);
        assert!(!r.has_cycles);
        assert_eq!(r.cycle_count, 0);
    }

    #[test]
    fn scc_reverse_topological_order() {
        // 0 -> 1 -> 2: component holding 2 must come before the one with 0.
        let r = tarjan_scc(&[(0, 1), (1, 2)], 3).unwrap();
        let pos = |n: u32| r.components.iter().position(|c| c.contains(&n)).unwrap();
        assert!(pos(2) < pos(1));
        assert!(pos(1) < pos(0));
    }

    #[test]
    fn scc_triangle() {
        let r = tarjan_scc(&[(0, 1), (1, 2), (2, 0)], 3).unwrap();
        assert!(r.has_cycles);
        assert_eq!(r.cycle_count, 1);
        let big = r.components.iter().find(|c| c.len() > 1).unwrap();
        assert_eq!(big, &vec![0, 1, 2]);
    }

    #[test]
    fn scc_two_disjoint_cycles() {
        let r = tarjan_scc(&[(0, 1), (1, 0), (2, 3), (3, 2)], 4).unwrap();
        assert_eq!(r.cycle_count, 2);
    }

    #[test]
    fn enumerate_two_node_cycle() {
        let r = enumerate_cycles(&[(0, 1), (1, 0)], 2, 50, None).unwrap();
        assert_eq!(r.cycles, vec![vec![0, 1]]);
        assert!(!r.truncated);
        assert!(!r.timed_out);
    }

    #[test]
    fn enumerate_diamond_with_back_edge() {
        // 0 -> {1, 2} -> 3 -> 0: two elementary cycles through the back edge.
        let r = enumerate_cycles(&[(0, 1), (0, 2), (1, 3), (2, 3), (3, 0)], 4, 50, None).unwrap();
        assert_eq!(r.cycles.len(), 2);
        for cycle in &r.cycles {
            assert_eq!(cycle[0], 0, "cycle should start at its smallest member");
        }
    }

    #[test]
    fn enumerate_respects_cap() {
        let edges = [(0, 1), (1, 0), (1, 2), (2, 1), (2, 3), (3, 2), (3, 0), (0, 3)];
        let r = enumerate_cycles(&edges, 4, 2, None).unwrap();
        assert_eq!(r.cycles.len(), 2);
        assert!(r.truncated);
    }

    #[test]
    fn enumerate_deadline_probe_stops_early() {
        let edges = [(0, 1), (1, 0), (2, 3), (3, 2)];
        let probe: &(dyn Fn() -> bool + Sync) = &|| true;
        let r = enumerate_cycles(&edges, 4, 50, Some(probe)).unwrap();
        assert!(r.timed_out);
        assert!(r.cycles.is_empty());
    }

    #[test]
    fn enumerate_dag_has_no_cycles() {
        let r = enumerate_cycles(&[(0, 1), (1, 2)], 3, 50, None).unwrap();
        assert!(r.cycles.is_empty());
    }
}
