//! Weighted critical path over the SCC condensation.
//!
//! The blocking graph may contain cycles, so the longest-path computation
//! runs on the condensation: each SCC collapses to one super-node whose
//! weight is the sum of its members. Per-node output covers the longest path
//! *through* the node, its slack against the overall critical path, and a
//! normalized criticality score.

use crate::scc::tarjan_scc;
use crate::GraphError;

/// Result of critical path analysis.
#[derive(Debug, Clone)]
pub struct CriticalPathResult {
    /// Longest weighted path through each node.
    pub node_path_length: Vec<f64>,
    /// `node_path_length / length`, in [0, 1]; zero when the graph is empty.
    pub score: Vec<f64>,
    /// `length - node_path_length` per node (critical nodes have slack 0).
    pub slack: Vec<f64>,
    /// One maximal path in execution order (deepest blocker first).
    pub path: Vec<u32>,
    /// Total weight of the critical path.
    pub length: f64,
}

/// Compute the weighted critical path.
///
/// `weights` holds one non-negative weight per node (an effort estimate;
/// callers default missing estimates to 1.0 before calling).
pub fn critical_path(
    edges: &[(u32, u32)],
    num_nodes: usize,
    weights: &[f64],
) -> Result<CriticalPathResult, GraphError> {
    if weights.len() != num_nodes {
        return Err(GraphError::InvalidParameter(format!(
            "weights length {} does not match node count {num_nodes}",
            weights.len()
        )));
    }
    if num_nodes == 0 {
        return Ok(CriticalPathResult {
            node_path_length: Vec::new(),
            score: Vec::new(),
            slack: Vec::new(),
            path: Vec::new(),
            length: 0.0,
        });
    }

    let scc = tarjan_scc(edges, num_nodes)?;
    let comp_count = scc.components.len();

    let comp_weight: Vec<f64> = scc
        .components
        .iter()
        .map(|members| members.iter().map(|&m| weights[m as usize]).sum())
        .collect();

    let mut comp_succ: Vec<Vec<u32>> = vec![Vec::new(); comp_count];
    let mut comp_pred: Vec<Vec<u32>> = vec![Vec::new(); comp_count];
    for &(src, dst) in edges {
        let cs = scc.component_of[src as usize];
        let cd = scc.component_of[dst as usize];
        if cs != cd {
            comp_succ[cs as usize].push(cd);
            comp_pred[cd as usize].push(cs);
        }
    }
    for list in comp_succ.iter_mut().chain(comp_pred.iter_mut()) {
        list.sort_unstable();
        list.dedup();
    }

    // Components arrive in reverse topological order (successors first), so
    // a single forward pass resolves "longest path starting here" and a
    // backward pass resolves "longest path ending here".
    let mut down = vec![0.0f64; comp_count];
    for c in 0..comp_count {
        let best_succ = comp_succ[c].iter().map(|&s| down[s as usize]).fold(0.0, f64::max);
        down[c] = comp_weight[c] + best_succ;
    }
    let mut up = vec![0.0f64; comp_count];
    for c in (0..comp_count).rev() {
        let best_pred = comp_pred[c].iter().map(|&p| up[p as usize]).fold(0.0, f64::max);
        up[c] = comp_weight[c] + best_pred;
    }

    let length = down.iter().cloned().fold(0.0, f64::max);

    let mut node_path_length = vec![0.0; num_nodes];
    let mut score = vec![0.0; num_nodes];
    let mut slack = vec![0.0; num_nodes];
    for v in 0..num_nodes {
        let c = scc.component_of[v] as usize;
        let through = down[c] + up[c] - comp_weight[c];
        node_path_length[v] = through;
        score[v] = if length > 0.0 { through / length } else { 0.0 };
        slack[v] = length - through;
    }

    // Reconstruct one maximal path: start at the highest `down` component
    // (ties to the earliest in reverse-topo order), then follow the best
    // successor. Members of a component are emitted in index order.
    let mut path_comps = Vec::new();
    if comp_count > 0 {
        let mut current = (0..comp_count)
            .max_by(|&a, &b| down[a].partial_cmp(&down[b]).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0);
        loop {
            path_comps.push(current);
            let next = comp_succ[current]
                .iter()
                .map(|&s| s as usize)
                .max_by(|&a, &b| {
                    down[a].partial_cmp(&down[b]).unwrap_or(std::cmp::Ordering::Equal)
                });
            match next {
                Some(n) if down[n] > 0.0 => current = n,
                _ => break,
            }
        }
    }
    let mut path: Vec<u32> = path_comps
        .into_iter()
        .flat_map(|c| scc.components[c].iter().copied())
        .collect();
    // Execution order reads deepest blocker first.
    path.reverse();

    Ok(CriticalPathResult { node_path_length, score, slack, path, length })
}

/// One path from the k-paths enumeration.
#[derive(Debug, Clone)]
pub struct PathEntry {
    /// Node indices in execution order (deepest blocker first).
    pub nodes: Vec<u32>,
    /// Total weight of the path.
    pub length: f64,
    /// True when the path was cut at `max_len` nodes.
    pub truncated: bool,
}

/// Enumerate the k heaviest maximal dependency chains.
///
/// One path is reconstructed per condensation source (a component nothing
/// blocks on), ranked by weighted length descending with ties broken by the
/// smallest member node index. Paths longer than `max_len` nodes are cut and
/// flagged.
pub fn k_longest_paths(
    edges: &[(u32, u32)],
    num_nodes: usize,
    weights: &[f64],
    k: usize,
    max_len: usize,
) -> Result<Vec<PathEntry>, GraphError> {
    if weights.len() != num_nodes {
        return Err(GraphError::InvalidParameter(format!(
            "weights length {} does not match node count {num_nodes}",
            weights.len()
        )));
    }
    if num_nodes == 0 || k == 0 {
        return Ok(Vec::new());
    }

    let scc = tarjan_scc(edges, num_nodes)?;
    let comp_count = scc.components.len();
    let comp_weight: Vec<f64> = scc
        .components
        .iter()
        .map(|members| members.iter().map(|&m| weights[m as usize]).sum())
        .collect();

    let mut comp_succ: Vec<Vec<u32>> = vec![Vec::new(); comp_count];
    let mut comp_in_degree = vec![0usize; comp_count];
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
    for list in &comp_succ {
        for &s in list {
            comp_in_degree[s as usize] += 1;
        }
    }

    let mut down = vec![0.0f64; comp_count];
    for c in 0..comp_count {
        let best_succ = comp_succ[c].iter().map(|&s| down[s as usize]).fold(0.0, f64::max);
        down[c] = comp_weight[c] + best_succ;
    }

    // Path sources: components nothing blocks on. Ranked by the weight of
    // the chain hanging below them.
    let mut sources: Vec<usize> = (0..comp_count).filter(|&c| comp_in_degree[c] == 0).collect();
    sources.sort_by(|&a, &b| {
        down[b]
            .partial_cmp(&down[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| scc.components[a][0].cmp(&scc.components[b][0]))
    });
    sources.truncate(k);

    let mut paths = Vec::with_capacity(sources.len());
    for start in sources {
        let mut comps = Vec::new();
        let mut current = start;
        loop {
            comps.push(current);
            let mut next: Option<usize> = None;
            for &s in &comp_succ[current] {
                let s = s as usize;
                if next.map_or(true, |n| down[s] > down[n]) {
                    next = Some(s);
                }
            }
            match next {
                Some(n) => current = n,
                None => break,
            }
        }

        let mut nodes: Vec<u32> =
            comps.iter().flat_map(|&c| scc.components[c].iter().copied()).collect();
        nodes.reverse();
        let truncated = nodes.len() > max_len;
        if truncated {
            nodes.truncate(max_len);
        }
        paths.push(PathEntry { nodes, length: down[start], truncated });
    }

    Ok(paths)
}
