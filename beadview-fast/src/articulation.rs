//! Articulation points on the undirected projection.
//!
//! An articulation point is a node whose removal disconnects its component:
//! in a dependency graph these are the single points of failure between
//! otherwise independent clusters of work. Uses the iterative low-link DFS
//! so deep graphs cannot overflow the stack.

use crate::{validate_edges, GraphError};

/// Find all articulation points; the result is sorted ascending.
pub fn articulation_points(edges: &[(u32, u32)], num_nodes: usize) -> Result<Vec<u32>, GraphError> {
    if num_nodes == 0 {
        return Ok(Vec::new());
    }
    validate_edges(edges, num_nodes as u32)?;

    let mut adj: Vec<Vec<u32>> = vec![Vec::new(); num_nodes];
    for &(src, dst) in edges {
        if src == dst {
            continue;
        }
        adj[src as usize].push(dst);
        adj[dst as usize].push(src);
    }
    for list in &mut adj {
        list.sort_unstable();
        list.dedup();
    }

    const UNVISITED: u32 = u32::MAX;
    let mut disc = vec![UNVISITED; num_nodes];
    let mut low = vec![0u32; num_nodes];
    let mut parent = vec![UNVISITED; num_nodes];
    let mut is_cut = vec![false; num_nodes];
    let mut timer = 0u32;

    for root in 0..num_nodes {
        if disc[root] != UNVISITED {
            continue;
        }
        let mut root_children = 0usize;
        // (node, index into its adjacency list)
        let mut stack: Vec<(u32, usize)> = vec![(root as u32, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        while let Some(&(v, next_ix)) = stack.last() {
            let v = v as usize;
            if next_ix < adj[v].len() {
                stack.last_mut().unwrap().1 += 1;
                let w = adj[v][next_ix] as usize;
                if disc[w] == UNVISITED {
                    parent[w] = v as u32;
                    disc[w] = timer;
                    low[w] = timer;
                    timer += 1;
                    if v == root {
                        root_children += 1;
                    }
                    stack.push((w as u32, 0));
                } else if parent[v] != w as u32 {
                    low[v] = low[v].min(disc[w]);
                }
            } else {
                stack.pop();
                if let Some(&(p, _)) = stack.last() {
                    let p = p as usize;
                    low[p] = low[p].min(low[v]);
                    if p != root && low[v] >= disc[p] {
                        is_cut[p] = true;
                    }
                }
            }
        }

        if root_children > 1 {
            is_cut[root] = true;
        }
    }

    Ok((0..num_nodes as u32).filter(|&v| is_cut[v as usize]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph() {
        assert!(articulation_points(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn chain_interior_nodes_are_cuts() {
        let cuts = articulation_points(&[(0, 1), (1, 2), (2, 3)], 4).unwrap();
        assert_eq!(cuts, vec![1, 2]);
    }

    #[test]
    fn cycle_has_no_cuts() {
        let cuts = articulation_points(&[(0, 1), (1, 2), (2, 0)], 3).unwrap();
        assert!(cuts.is_empty());
    }

    #[test]
    fn bridge_between_two_triangles() {
        // Triangles 0-1-2 and 3-4-5 joined by the edge 2-3.
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)];
        let cuts = articulation_points(&edges, 6).unwrap();
        assert_eq!(cuts, vec![2, 3]);
    }

    #[test]
    fn star_center_is_cut() {
        let cuts = articulation_points(&[(0, 1), (0, 2), (0, 3)], 4).unwrap();
        assert_eq!(cuts, vec![0]);
    }
}
