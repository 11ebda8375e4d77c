//! Dependency graph builder.
//!
//! One node per issue, dense `u32` indices in input order. For an issue A
//! with a `blocks` dependency on B the edge is A -> B: "A is blocked by B".
//! Every metric downstream assumes this direction. Malformed references are
//! diagnostics, never errors, and the builder cannot fail.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::error::Diagnostic;
use crate::model::Issue;

/// Immutable dependency graph over one issue snapshot.
#[derive(Debug, Clone)]
pub struct DepGraph {
    /// Node index -> issue ID, in input order.
    node_ids: Vec<String>,
    /// Issue ID -> node index.
    id_to_node: FxHashMap<String, u32>,
    /// Collapsed edge list, sorted by (source, target).
    edges: Vec<(u32, u32)>,
    /// Blocking targets per node, sorted ascending.
    forward: Vec<Vec<u32>>,
    /// Dependents per node, sorted ascending.
    reverse: Vec<Vec<u32>>,
    diagnostics: Vec<Diagnostic>,
    self_loop_count: usize,
}

impl DepGraph {
    /// Build the graph in one pass over the issues.
    pub fn build(issues: &[Issue]) -> DepGraph {
        let mut node_ids = Vec::with_capacity(issues.len());
        let mut id_to_node: FxHashMap<String, u32> = FxHashMap::default();
        let mut diagnostics = Vec::new();

        for issue in issues {
            if id_to_node.contains_key(&issue.id) {
                diagnostics.push(Diagnostic::duplicate(&issue.id));
                continue;
            }
            id_to_node.insert(issue.id.clone(), node_ids.len() as u32);
            node_ids.push(issue.id.clone());
        }

        let mut edge_set: FxHashSet<(u32, u32)> = FxHashSet::default();
        let mut self_loop_count = 0;
        let mut edges_done: FxHashSet<u32> = FxHashSet::default();
        for issue in issues {
            let Some(&src) = id_to_node.get(&issue.id) else { continue };
            if !edges_done.insert(src) {
                continue; // duplicate entry, first occurrence owns the node
            }
            for target in issue.blocking_targets() {
                match id_to_node.get(target) {
                    None => diagnostics.push(Diagnostic::dangling(&issue.id, target)),
                    Some(&dst) if dst == src => {
                        self_loop_count += 1;
                        diagnostics.push(Diagnostic::self_loop(&issue.id));
                    }
                    Some(&dst) => {
                        edge_set.insert((src, dst));
                    }
                }
            }
        }

        let mut edges: Vec<(u32, u32)> = edge_set.into_iter().collect();
        edges.sort_unstable();

        let mut forward: Vec<Vec<u32>> = vec![Vec::new(); node_ids.len()];
        let mut reverse: Vec<Vec<u32>> = vec![Vec::new(); node_ids.len()];
        for &(src, dst) in &edges {
            forward[src as usize].push(dst);
            reverse[dst as usize].push(src);
        }
        for list in forward.iter_mut().chain(reverse.iter_mut()) {
            list.sort_unstable();
        }

        DepGraph { node_ids, id_to_node, edges, forward, reverse, diagnostics, self_loop_count }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// |E| / (|N| * (|N| - 1)); zero for graphs with fewer than two nodes.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n as f64 * (n as f64 - 1.0))
    }

    #[must_use]
    pub fn node_of(&self, id: &str) -> Option<u32> {
        self.id_to_node.get(id).copied()
    }

    #[must_use]
    pub fn id_of(&self, node: u32) -> &str {
        &self.node_ids[node as usize]
    }

    #[must_use]
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Blocking targets of `node`, ascending.
    #[must_use]
    pub fn blockers_of(&self, node: u32) -> &[u32] {
        &self.forward[node as usize]
    }

    /// Nodes blocked by `node` (its dependents), ascending.
    #[must_use]
    pub fn dependents_of(&self, node: u32) -> &[u32] {
        &self.reverse[node as usize]
    }

    #[must_use]
    pub fn forward_adjacency(&self) -> &[Vec<u32>] {
        &self.forward
    }

    #[must_use]
    pub fn reverse_adjacency(&self) -> &[Vec<u32>] {
        &self.reverse
    }

    #[must_use]
    pub fn out_degree(&self, node: u32) -> usize {
        self.forward[node as usize].len()
    }

    #[must_use]
    pub fn in_degree(&self, node: u32) -> usize {
        self.reverse[node as usize].len()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn self_loop_count(&self) -> usize {
        self.self_loop_count
    }

    /// Mask of the largest weakly connected component (used to scope
    /// eigenvector centrality). Ties resolve to the component containing the
    /// smallest node index.
    #[must_use]
    pub fn largest_component_mask(&self) -> (Vec<bool>, usize) {
        let n = self.node_count();
        let mut component = vec![usize::MAX; n];
        let mut sizes = Vec::new();
        for start in 0..n {
            if component[start] != usize::MAX {
                continue;
            }
            let comp_ix = sizes.len();
            let mut size = 0usize;
            let mut queue = VecDeque::from([start]);
            component[start] = comp_ix;
            while let Some(v) = queue.pop_front() {
                size += 1;
                for &w in self.forward[v].iter().chain(self.reverse[v].iter()) {
                    let w = w as usize;
                    if component[w] == usize::MAX {
                        component[w] = comp_ix;
                        queue.push_back(w);
                    }
                }
            }
            sizes.push(size);
        }

        let best = sizes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(ix, _)| ix)
            .unwrap_or(0);
        let mask: Vec<bool> = component.iter().map(|&c| c == best).collect();
        (mask, sizes.len())
    }
}

/// Apply a scope filter: label scope first, then root + BFS depth limit over
/// blocking edges in both directions. Returns issues in input order.
pub fn filter_scope(issues: &[Issue], scope: &crate::config::Scope) -> Vec<Issue> {
    let mut kept: Vec<Issue> = if scope.labels.is_empty() {
        issues.to_vec()
    } else {
        issues
            .iter()
            .filter(|i| scope.labels.iter().any(|l| i.has_label(l)))
            .cloned()
            .collect()
    };

    if let Some(root) = &scope.root {
        let graph = DepGraph::build(&kept);
        let Some(start) = graph.node_of(root) else {
            return Vec::new();
        };
        let max_depth = scope.depth.unwrap_or(usize::MAX);
        let mut depth = vec![usize::MAX; graph.node_count()];
        depth[start as usize] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            if depth[v as usize] >= max_depth {
                continue;
            }
            for &w in graph.blockers_of(v).iter().chain(graph.dependents_of(v).iter()) {
                if depth[w as usize] == usize::MAX {
                    depth[w as usize] = depth[v as usize] + 1;
                    queue.push_back(w);
                }
            }
        }
        let keep_ids: FxHashSet<&str> = depth
            .iter()
            .enumerate()
            .filter(|(_, &d)| d != usize::MAX)
            .map(|(v, _)| graph.id_of(v as u32))
            .collect();
        kept.retain(|i| keep_ids.contains(i.id.as_str()));
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scope;
    use crate::error::DiagnosticKind;
    use crate::model::{Dependency, Status};

    fn issue(id: &str, deps: &[&str]) -> Issue {
        let mut i = Issue::new(id, Status::Open);
        i.dependencies = deps.iter().map(|d| Dependency::blocks(*d)).collect();
        i
    }

    #[test]
    fn build_chain() {
        let g = DepGraph::build(&[issue("a", &["b"]), issue("b", &["c"]), issue("c", &[])]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(g.out_degree(0), 1);
        assert_eq!(g.in_degree(1), 1);
        assert!(g.diagnostics().is_empty());
    }

    #[test]
    fn dangling_reference_reported_not_fatal() {
        let g = DepGraph::build(&[issue("a", &["ghost"])]);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.diagnostics().len(), 1);
        assert_eq!(g.diagnostics()[0].kind, DiagnosticKind::DanglingReference);
    }

    #[test]
    fn self_loop_rejected_and_counted() {
        let g = DepGraph::build(&[issue("a", &["a"])]);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.self_loop_count(), 1);
    }

    #[test]
    fn parallel_edges_collapse() {
        let g = DepGraph::build(&[issue("a", &["b", "b"]), issue("b", &[])]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn duplicate_id_keeps_first() {
        let first = issue("a", &[]);
        let mut second = issue("a", &["b"]);
        second.title = "imposter".into();
        let g = DepGraph::build(&[first, second, issue("b", &[])]);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 0);
        assert!(g.diagnostics().iter().any(|d| d.kind == DiagnosticKind::DuplicateId));
    }

    #[test]
    fn density_of_two_node_graph() {
        let g = DepGraph::build(&[issue("a", &["b"]), issue("b", &[])]);
        assert!((g.density() - 0.5).abs() < 1e-9);
        let single = DepGraph::build(&[issue("a", &[])]);
        assert_eq!(single.density(), 0.0);
    }

    #[test]
    fn largest_component_mask_selects_biggest() {
        let g = DepGraph::build(&[
            issue("a", &["b"]),
            issue("b", &["c"]),
            issue("c", &[]),
            issue("d", &["e"]),
            issue("e", &[]),
        ]);
        let (mask, components) = g.largest_component_mask();
        assert_eq!(components, 2);
        assert_eq!(mask, vec![true, true, true, false, false]);
    }

    #[test]
    fn scope_label_filter_first() {
        let mut a = issue("a", &[]);
        a.labels = vec!["backend".into()];
        let b = issue("b", &[]);
        let scope = Scope { labels: vec!["backend".into()], ..Default::default() };
        let kept = filter_scope(&[a, b], &scope);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
    }

    #[test]
    fn scope_root_depth_limit() {
        let issues = [issue("a", &["b"]), issue("b", &["c"]), issue("c", &[])];
        let scope = Scope { root: Some("a".into()), depth: Some(1), ..Default::default() };
        let kept = filter_scope(&issues, &scope);
        let ids: Vec<_> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn scope_unknown_root_yields_empty() {
        let issues = [issue("a", &[])];
        let scope = Scope { root: Some("zzz".into()), ..Default::default() };
        assert!(filter_scope(&issues, &scope).is_empty());
    }
}
