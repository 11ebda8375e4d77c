//! Error type for kernel misuse.
//!
//! The engine's graph builder guarantees well-formed inputs, so seeing one of
//! these at runtime indicates a bug in the caller, not bad user data.

use thiserror::Error;

/// Errors returned by graph algorithm kernels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// An edge references a node index outside `0..num_nodes`.
    #[error("node {0} out of bounds (graph has {1} nodes)")]
    NodeOutOfBounds(u32, u32),

    /// An algorithm parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
