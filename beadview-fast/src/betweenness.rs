//! Betweenness centrality via Brandes' algorithm.
//!
//! Each source's single-source shortest-path pass is independent, so sources
//! run in parallel and their partial contributions are summed at the end.
//! Large graphs can use a deterministic sampled variant: sources are drawn by
//! a fixed-seed generator, so repeated runs over the same input agree exactly.

use rayon::prelude::*;
use std::collections::VecDeque;

use crate::{validate_edges, GraphError};

/// Result of a betweenness computation.
#[derive(Debug, Clone)]
pub struct BetweennessResult {
    /// One score per node, index = node id.
    pub scores: Vec<f64>,
    /// Number of source nodes actually used.
    pub sources_used: usize,
    /// True when only a sample of sources was processed.
    pub sampled: bool,
}

/// Compute exact betweenness centrality from every source.
pub fn betweenness(edges: &[(u32, u32)], num_nodes: usize) -> Result<BetweennessResult, GraphError> {
    let sources: Vec<u32> = (0..num_nodes as u32).collect();
    brandes(edges, num_nodes, &sources, false)
}

/// Compute betweenness from a deterministic sample of `sample_size` sources.
///
/// Contributions are scaled by `num_nodes / sample_size` so sampled scores
/// stay comparable to exact ones. The sample is drawn with a fixed-seed
/// generator: same graph size, same sources, every run.
pub fn betweenness_sampled(
    edges: &[(u32, u32)],
    num_nodes: usize,
    sample_size: usize,
) -> Result<BetweennessResult, GraphError> {
    if sample_size >= num_nodes {
        return betweenness(edges, num_nodes);
    }
    let sources = sample_sources(num_nodes, sample_size);
    brandes(edges, num_nodes, &sources, true)
}

/// Draw `sample_size` distinct node indices with a fixed-seed LCG.
fn sample_sources(num_nodes: usize, sample_size: usize) -> Vec<u32> {
    // Constants from the classic 48-bit LCG; the seed is fixed so sampling
    // is a pure function of the graph size.
    const MULTIPLIER: u64 = 0x5DEECE66D;
    const INCREMENT: u64 = 0xB;
    const SEED: u64 = 0x1BD5_19AD;

    let mut picked = vec![false; num_nodes];
    let mut sources = Vec::with_capacity(sample_size);
    let mut state = SEED;
    while sources.len() < sample_size {
        state = state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        let candidate = ((state >> 16) % num_nodes as u64) as usize;
        if !picked[candidate] {
            picked[candidate] = true;
            sources.push(candidate as u32);
        }
    }
    sources.sort_unstable();
    sources
}

fn brandes(
    edges: &[(u32, u32)],
    num_nodes: usize,
    sources: &[u32],
    sampled: bool,
) -> Result<BetweennessResult, GraphError> {
    if num_nodes == 0 {
        return Ok(BetweennessResult { scores: Vec::new(), sources_used: 0, sampled });
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

    let scale = if sampled && !sources.is_empty() {
        num_nodes as f64 / sources.len() as f64
    } else {
        1.0
    };

    let partial_scores: Vec<Vec<f64>> = sources
        .par_iter()
        .map(|&source| {
            let source = source as usize;
            let mut partial = vec![0.0; num_nodes];

            let mut stack: Vec<usize> = Vec::new();
            let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
            let mut num_paths = vec![0.0; num_nodes];
            num_paths[source] = 1.0;
            let mut distance = vec![-1i32; num_nodes];
            distance[source] = 0;

            let mut queue = VecDeque::new();
            queue.push_back(source);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in &adj[v] {
                    let w = w as usize;
                    if distance[w] < 0 {
                        distance[w] = distance[v] + 1;
                        queue.push_back(w);
                    }
                    if distance[w] == distance[v] + 1 {
                        num_paths[w] += num_paths[v];
                        predecessors[w].push(v);
                    }
                }
            }

            let mut dependency = vec![0.0; num_nodes];
            while let Some(w) = stack.pop() {
                for &v in &predecessors[w] {
                    dependency[v] += (num_paths[v] / num_paths[w]) * (1.0 + dependency[w]);
                }
                if w != source {
                    partial[w] += dependency[w];
                }
            }

            partial
        })
        .collect();

    let mut scores = vec![0.0; num_nodes];
    for partial in partial_scores {
        for (i, score) in partial.into_iter().enumerate() {
            scores[i] += score * scale;
        }
    }

    Ok(BetweennessResult { scores, sources_used: sources.len(), sampled })
}
