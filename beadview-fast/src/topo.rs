//! Topological ordering and dependency depths.
//!
//! The blocking graph is not guaranteed acyclic, so the order here is
//! best-effort: acyclic nodes come first in a valid dependency order
//! (targets before the nodes that block on them) and members of non-trivial
//! SCCs are clustered at the end.

use crate::scc::tarjan_scc;
use crate::GraphError;

/// Result of a best-effort topological sort.
#[derive(Debug, Clone)]
pub struct TopoResult {
    /// All nodes; acyclic nodes first in dependency order, cycle members
    /// clustered last.
    pub order: Vec<u32>,
    /// True when any non-trivial SCC exists.
    pub has_cycles: bool,
    /// Nodes belonging to a non-trivial SCC, in order of appearance.
    pub cyclic_nodes: Vec<u32>,
}

/// Compute the best-effort topological order.
///
/// Within the acyclic part, every edge target (blocker) appears before its
/// source, so reading the order front to back is a workable execution order.
pub fn topo_order(edges: &[(u32, u32)], num_nodes: usize) -> Result<TopoResult, GraphError> {
    let scc = tarjan_scc(edges, num_nodes)?;

    let mut order = Vec::with_capacity(num_nodes);
    let mut cyclic_nodes = Vec::new();
    // Components arrive in reverse topological order: successors (blockers)
    // first, which is exactly the execution order we want.
    for comp in &scc.components {
        if comp.len() == 1 {
            order.push(comp[0]);
        } else {
            cyclic_nodes.extend_from_slice(comp);
        }
    }
    order.extend_from_slice(&cyclic_nodes);

    Ok(TopoResult { order, has_cycles: scc.cycle_count > 0, cyclic_nodes })
}

/// Longest blocker-chain depth per node, cycle-safe.
///
/// A node with no blocking dependencies has depth 1; otherwise depth is
/// 1 + the deepest chain among its targets. Members of an SCC all share the
/// component's depth, with the component counting as its member count.
pub fn dependency_depths(edges: &[(u32, u32)], num_nodes: usize) -> Result<Vec<u32>, GraphError> {
    let scc = tarjan_scc(edges, num_nodes)?;
    let comp_count = scc.components.len();

    // Condensation successor lists, deduped.
    let mut comp_succ: Vec<Vec<u32>> = vec![Vec::new(); comp_count];
    for &(src, dst) in edges {
        let cs = scc.component_of[src as usize];
        let cd = scc.component_of[dst as usize];
        if cs != cd {
            comp_succ[cs as usize].push(cd);
        }
    }
    for list in &mut comp_succ {
        list.sort_unstable();
        list.dedup();
    }

    // Components are in reverse topological order, so each component's
    // successors are resolved before the component itself.
    let mut comp_depth = vec![0u32; comp_count];
    for (comp_ix, members) in scc.components.iter().enumerate() {
        let deepest_succ =
            comp_succ[comp_ix].iter().map(|&s| comp_depth[s as usize]).max().unwrap_or(0);
        comp_depth[comp_ix] = members.len() as u32 + deepest_succ;
    }

    Ok((0..num_nodes).map(|v| comp_depth[scc.component_of[v] as usize]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph() {
        let r = topo_order(&[], 0).unwrap();
        assert!(r.order.is_empty());
        assert!(!r.has_cycles);
    }

    #[test]
    fn chain_emits_blockers_first() {
        // 0 blocks on 1, 1 blocks on 2: workable order is 2, 1, 0.
        let r = topo_order(&[(0, 1), (1, 2)], 3).unwrap();
        assert_eq!(r.order, vec![2, 1, 0]);
        assert!(!r.has_cycles);
    }

    #[test]
    fn cycle_members_cluster_last() {
        // 0 -> 1 -> 0 cycle plus isolated 2.
        let r = topo_order(&[(0, 1), (1, 0)], 3).unwrap();
        assert!(r.has_cycles);
        assert_eq!(r.cyclic_nodes, vec![0, 1]);
        assert_eq!(r.order.len(), 3);
        assert_eq!(&r.order[1..], &[0, 1]);
    }

    #[test]
    fn depths_on_chain() {
        let d = dependency_depths(&[(0, 1), (1, 2)], 3).unwrap();
        assert_eq!(d, vec![3, 2, 1]);
    }

    #[test]
    fn depths_isolated_nodes_are_one() {
        let d = dependency_depths(&[], 3).unwrap();
        assert_eq!(d, vec![1, 1, 1]);
    }

    #[test]
    fn depths_cycle_counts_component_size() {
        // 2 blocks on the 0<->1 cycle.
        let d = dependency_depths(&[(0, 1), (1, 0), (2, 0)], 3).unwrap();
        assert_eq!(d[0], 2);
        assert_eq!(d[1], 2);
        assert_eq!(d[2], 3);
    }
}
