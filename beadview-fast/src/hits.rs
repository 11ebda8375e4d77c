//! HITS hub and authority scores.
//!
//! In a blocking graph, authorities are issues many others wait on and hubs
//! are issues waiting on many important targets.

use crate::{build_adjacency, validate_edges, GraphError};

/// Configuration for HITS computation.
#[derive(Debug, Clone)]
pub struct HitsConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for HitsConfig {
    fn default() -> Self {
        HitsConfig { tolerance: 1e-6, max_iterations: 50 }
    }
}

/// Result of a HITS computation.
#[derive(Debug, Clone)]
pub struct HitsResult {
    pub hubs: Vec<f64>,
    pub authorities: Vec<f64>,
    pub iterations: usize,
    /// False when the iteration cap was hit before the scores stabilized.
    pub converged: bool,
    /// True when the deadline probe stopped iteration early.
    pub timed_out: bool,
}

/// Compute HITS hub/authority scores, L2-normalized each iteration.
///
/// `out_of_time` is probed once per iteration; returning true stops early
/// with the best scores so far.
pub fn hits(
    edges: &[(u32, u32)],
    num_nodes: usize,
    config: &HitsConfig,
    out_of_time: Option<&(dyn Fn() -> bool + Sync)>,
) -> Result<HitsResult, GraphError> {
    if num_nodes == 0 {
        return Ok(HitsResult {
            hubs: Vec::new(),
            authorities: Vec::new(),
            iterations: 0,
            converged: true,
            timed_out: false,
        });
    }
    validate_edges(edges, num_nodes as u32)?;

    let (forward, reverse) = build_adjacency(edges, num_nodes);

    let mut hubs = vec![1.0 / num_nodes as f64; num_nodes];
    let mut auth = vec![1.0 / num_nodes as f64; num_nodes];

    let mut iterations = 0;
    let mut converged = false;
    let mut timed_out = false;
    while iterations < config.max_iterations {
        if out_of_time.is_some_and(|probe| probe()) {
            timed_out = true;
            break;
        }
        iterations += 1;

        let mut new_auth = vec![0.0; num_nodes];
        for v in 0..num_nodes {
            for &u in &reverse[v] {
                new_auth[v] += hubs[u as usize];
            }
        }
        let mut new_hubs = vec![0.0; num_nodes];
        for u in 0..num_nodes {
            for &v in &forward[u] {
                new_hubs[u] += new_auth[v as usize];
            }
        }

        normalize_l2(&mut new_auth);
        normalize_l2(&mut new_hubs);

        let delta: f64 = auth
            .iter()
            .zip(&new_auth)
            .chain(hubs.iter().zip(&new_hubs))
            .map(|(a, b)| (a - b).abs())
            .sum();

        auth = new_auth;
        hubs = new_hubs;

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    Ok(HitsResult { hubs, authorities: auth, iterations, converged, timed_out })
}

fn normalize_l2(values: &mut [f64]) {
    let norm: f64 = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(edges: &[(u32, u32)], n: usize) -> HitsResult {
        hits(edges, n, &HitsConfig::default(), None).unwrap()
    }

    #[test]
    fn empty_graph() {
        let r = run(&[], 0);
        assert!(r.hubs.is_empty());
        assert!(r.converged);
    }

    #[test]
    fn chain_ends_split_roles() {
        // 0 -> 1 -> 2: 0 is the strongest hub, 2 the strongest authority.
        let r = run(&[(0, 1), (1, 2)], 3);
        assert!(r.authorities[2] > r.authorities[0]);
        assert!(r.hubs[0] > r.hubs[2]);
    }

    #[test]
    fn star_targets_share_authority() {
        let r = run(&[(0, 1), (0, 2), (0, 3)], 4);
        assert!(r.hubs[0] > r.hubs[1]);
        assert!((r.authorities[1] - r.authorities[2]).abs() < 1e-9);
        assert!((r.authorities[2] - r.authorities[3]).abs() < 1e-9);
    }

    #[test]
    fn scores_are_unit_l2() {
        let r = run(&[(0, 1), (1, 2), (2, 0)], 3);
        let hub_norm: f64 = r.hubs.iter().map(|v| v * v).sum::<f64>().sqrt();
        let auth_norm: f64 = r.authorities.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((hub_norm - 1.0).abs() < 1e-6);
        assert!((auth_norm - 1.0).abs() < 1e-6);
    }
}
