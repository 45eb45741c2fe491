//! Storage-layer types for graph identity and metadata.
//!
//! [`GraphId`] is defined here (not in semflow-core) because graph identity
//! is a storage concern: graphs only gain an ID when persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored graph.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub i64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphId({})", self.0)
    }
}

/// Summary of a stored graph (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: GraphId,
    pub name: String,
    pub functions: usize,
    pub compositions: usize,
}
