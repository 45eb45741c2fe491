//! The [`GraphStore`] trait defining the storage contract for knowledge graphs.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait, so they
//! are swappable without changing the engine or the CLI.

use semflow_core::{CompositionDef, CompositionId, FunctionDef, FunctionId, KnowledgeGraph};

use crate::error::StorageError;
use crate::types::{GraphId, GraphSummary};

/// The storage contract for knowledge graphs.
///
/// The trait is synchronous: the engine treats a loaded graph as a read-only
/// snapshot, so there is no concurrent writer to coordinate with.
pub trait GraphStore {
    // -------------------------------------------------------------------
    // Graph-level operations
    // -------------------------------------------------------------------

    /// Creates a new empty graph with the given name.
    fn create_graph(&mut self, name: &str) -> Result<GraphId, StorageError>;

    /// Bulk save/overwrite of an entire graph.
    fn save_graph(&mut self, id: GraphId, graph: &KnowledgeGraph) -> Result<(), StorageError>;

    /// Loads and re-validates a complete graph.
    fn load_graph(&self, id: GraphId) -> Result<KnowledgeGraph, StorageError>;

    /// Deletes a graph and all its rows.
    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError>;

    /// Lists all stored graphs, ordered by id.
    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError>;

    // -------------------------------------------------------------------
    // Description lookups
    // -------------------------------------------------------------------

    fn get_function(&self, graph: GraphId, id: FunctionId) -> Result<FunctionDef, StorageError>;

    fn get_composition(&self, graph: GraphId, id: CompositionId) -> Result<CompositionDef, StorageError>;

    /// Lists all Function Descriptions of a graph, ordered by id.
    fn list_functions(&self, graph: GraphId) -> Result<Vec<FunctionDef>, StorageError>;

    // -------------------------------------------------------------------
    // High-level convenience methods
    // -------------------------------------------------------------------

    /// Creates a graph named after `graph.name` and saves it in one step.
    fn import_graph(&mut self, graph: &KnowledgeGraph) -> Result<GraphId, StorageError> {
        let id = self.create_graph(&graph.name)?;
        self.save_graph(id, graph)?;
        Ok(id)
    }

    /// The most recently created graph with the given name.
    fn find_graph(&self, name: &str) -> Result<GraphId, StorageError> {
        self.list_graphs()?
            .into_iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .ok_or_else(|| StorageError::GraphNameNotFound(name.to_string()))
    }
}
