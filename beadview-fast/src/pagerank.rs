//! PageRank over the blocking-edge graph.
//!
//! Score updates within an iteration are parallelized with rayon; the
//! iteration loop itself is sequential so convergence checks stay exact.

use rayon::prelude::*;

use crate::{validate_edges, GraphError};

/// Result of a PageRank computation.
#[derive(Debug, Clone)]
pub struct PageRankResult {
    /// One score per node, index = node id.
    pub scores: Vec<f64>,
    /// Iterations actually run.
    pub iterations: usize,
    /// False when the iteration cap was hit before reaching tolerance.
    pub converged: bool,
    /// True when the deadline probe stopped iteration early.
    pub timed_out: bool,
}

/// Compute PageRank scores for all nodes.
///
/// # Arguments
/// * `edges` - directed `(source, target)` pairs
/// * `num_nodes` - total node count
/// * `damping` - damping factor in `[0, 1]`, typically 0.85
/// * `max_iterations` - iteration cap
/// * `tolerance` - stop once the L1 delta between iterations drops below this
/// * `out_of_time` - probed once per iteration; returning true stops early
///   with the best scores so far
///
/// # Errors
/// `InvalidParameter` for damping outside `[0, 1]` or non-positive tolerance,
/// `NodeOutOfBounds` for edges referencing unknown nodes.
pub fn pagerank(
    edges: &[(u32, u32)],
    num_nodes: usize,
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
    out_of_time: Option<&(dyn Fn() -> bool + Sync)>,
) -> Result<PageRankResult, GraphError> {
    if num_nodes == 0 {
        return Ok(PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
            timed_out: false,
        });
    }
    if !(0.0..=1.0).contains(&damping) {
        return Err(GraphError::InvalidParameter(format!(
            "damping must be in [0, 1], got {damping}"
        )));
    }
    if tolerance <= 0.0 {
        return Err(GraphError::InvalidParameter(format!(
            "tolerance must be positive, got {tolerance}"
        )));
    }
    validate_edges(edges, num_nodes as u32)?;

    let mut incoming: Vec<Vec<u32>> = vec![Vec::new(); num_nodes];
    let mut out_degree: Vec<usize> = vec![0; num_nodes];
    for &(src, dst) in edges {
        incoming[dst as usize].push(src);
        out_degree[src as usize] += 1;
    }

    let mut scores = vec![1.0 / num_nodes as f64; num_nodes];
    let base_score = (1.0 - damping) / num_nodes as f64;

    let mut iterations = 0;
    let mut converged = false;
    let mut timed_out = false;
    while iterations < max_iterations {
        if out_of_time.is_some_and(|probe| probe()) {
            timed_out = true;
            break;
        }
        iterations += 1;

        let new_scores: Vec<f64> = (0..num_nodes)
            .into_par_iter()
            .map(|node| {
                let mut score = base_score;
                for &pred in &incoming[node] {
                    let pred = pred as usize;
                    if out_degree[pred] > 0 {
                        score += damping * scores[pred] / out_degree[pred] as f64;
                    }
                }
                score
            })
            .collect();

        // Sequential reduction: parallel float summation is not
        // bit-reproducible, and the convergence check must be.
        let diff: f64 =
            scores.iter().zip(new_scores.iter()).map(|(old, new)| (old - new).abs()).sum();

        scores = new_scores;
        if diff < tolerance {
            converged = true;
            break;
        }
    }

    Ok(PageRankResult { scores, iterations, converged, timed_out })
}
