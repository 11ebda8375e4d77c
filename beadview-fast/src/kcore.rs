//! K-core decomposition.
//!
//! Core numbers are computed on the undirected projection of the blocking
//! graph by the standard min-degree peeling: repeatedly remove the node with
//! the lowest remaining degree, recording the highest threshold it survived.

use crate::{validate_edges, GraphError};

/// Compute the core number of every node.
pub fn core_numbers(edges: &[(u32, u32)], num_nodes: usize) -> Result<Vec<u32>, GraphError> {
    if num_nodes == 0 {
        return Ok(Vec::new());
    }
    validate_edges(edges, num_nodes as u32)?;

    // Undirected projection, deduped, self-loops ignored.
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

    let mut degree: Vec<usize> = adj.iter().map(Vec::len).collect();
    let max_degree = degree.iter().copied().max().unwrap_or(0);

    // Bucket sort nodes by degree for O(V + E) peeling.
    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); max_degree + 1];
    for v in 0..num_nodes {
        buckets[degree[v]].push(v as u32);
    }

    let mut core = vec![0u32; num_nodes];
    let mut removed = vec![false; num_nodes];
    let mut current_core = 0usize;

    for _ in 0..num_nodes {
        // Find the non-empty bucket with the lowest degree.
        let mut d = 0;
        loop {
            while d < buckets.len() && buckets[d].is_empty() {
                d += 1;
            }
            // Stale entries are skipped below; a bucket may appear non-empty
            // while holding only nodes whose degree has since dropped.
            let Some(&candidate) = buckets[d].last() else {
                d += 1;
                continue;
            };
            if removed[candidate as usize] || degree[candidate as usize] != d {
                buckets[d].pop();
                continue;
            }
            break;
        }

        let v = buckets[d].pop().unwrap() as usize;
        current_core = current_core.max(d);
        core[v] = current_core as u32;
        removed[v] = true;

        for &w in &adj[v] {
            let w = w as usize;
            if !removed[w] && degree[w] > 0 {
                degree[w] -= 1;
                buckets[degree[w]].push(w as u32);
            }
        }
    }

    Ok(core)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph() {
        assert!(core_numbers(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn isolated_nodes_are_core_zero() {
        assert_eq!(core_numbers(&[], 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn chain_is_one_core() {
        let core = core_numbers(&[(0, 1), (1, 2)], 3).unwrap();
        assert_eq!(core, vec![1, 1, 1]);
    }

    #[test]
    fn triangle_is_two_core() {
        let core = core_numbers(&[(0, 1), (1, 2), (2, 0)], 3).unwrap();
        assert_eq!(core, vec![2, 2, 2]);
    }

    #[test]
    fn pendant_node_stays_in_lower_core() {
        // Triangle 0-1-2 with a pendant 3 hanging off 0.
        let core = core_numbers(&[(0, 1), (1, 2), (2, 0), (3, 0)], 4).unwrap();
        assert_eq!(core[3], 1);
        assert_eq!(core[0], 2);
    }
}
