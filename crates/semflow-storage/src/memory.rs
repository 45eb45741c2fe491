//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and one-shot runs
//! where persistence isn't needed. It keeps the decomposed rows in maps with
//! the same semantics as the SQLite backend.

use std::collections::BTreeMap;

use tracing::debug;

use semflow_core::{CompositionDef, CompositionId, FunctionDef, FunctionId, KnowledgeGraph};

use crate::convert::{decompose, recompose, DecomposedGraph};
use crate::error::StorageError;
use crate::traits::GraphStore;
use crate::types::{GraphId, GraphSummary};

#[derive(Debug, Clone)]
struct StoredGraph {
    name: String,
    functions: BTreeMap<FunctionId, FunctionDef>,
    compositions: BTreeMap<CompositionId, CompositionDef>,
}

impl StoredGraph {
    fn new(name: &str) -> Self {
        StoredGraph {
            name: name.to_string(),
            functions: BTreeMap::new(),
            compositions: BTreeMap::new(),
        }
    }
}

/// Map-backed [`GraphStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    graphs: BTreeMap<i64, StoredGraph>,
    next_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            graphs: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn stored(&self, id: GraphId) -> Result<&StoredGraph, StorageError> {
        self.graphs.get(&id.0).ok_or(StorageError::GraphNotFound(id.0))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new()
    }
}

impl GraphStore for InMemoryStore {
    fn create_graph(&mut self, name: &str) -> Result<GraphId, StorageError> {
        let id = GraphId(self.next_id);
        self.next_id += 1;
        self.graphs.insert(id.0, StoredGraph::new(name));
        debug!(%id, name, "created graph");
        Ok(id)
    }

    fn save_graph(&mut self, id: GraphId, graph: &KnowledgeGraph) -> Result<(), StorageError> {
        let stored = self.graphs.get_mut(&id.0).ok_or(StorageError::GraphNotFound(id.0))?;
        let decomposed = decompose(graph);
        stored.name = decomposed.name;
        stored.functions = decomposed.functions.into_iter().map(|f| (f.id, f)).collect();
        stored.compositions = decomposed.compositions.into_iter().map(|c| (c.id, c)).collect();
        debug!(%id, functions = stored.functions.len(), compositions = stored.compositions.len(), "saved graph");
        Ok(())
    }

    fn load_graph(&self, id: GraphId) -> Result<KnowledgeGraph, StorageError> {
        let stored = self.stored(id)?;
        recompose(DecomposedGraph {
            name: stored.name.clone(),
            functions: stored.functions.values().cloned().collect(),
            compositions: stored.compositions.values().cloned().collect(),
        })
    }

    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError> {
        self.graphs
            .remove(&id.0)
            .map(|_| ())
            .ok_or(StorageError::GraphNotFound(id.0))
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        Ok(self
            .graphs
            .iter()
            .map(|(id, g)| GraphSummary {
                id: GraphId(*id),
                name: g.name.clone(),
                functions: g.functions.len(),
                compositions: g.compositions.len(),
            })
            .collect())
    }

    fn get_function(&self, graph: GraphId, id: FunctionId) -> Result<FunctionDef, StorageError> {
        self.stored(graph)?
            .functions
            .get(&id)
            .cloned()
            .ok_or(StorageError::FunctionNotFound {
                graph: graph.0,
                function: id,
            })
    }

    fn get_composition(&self, graph: GraphId, id: CompositionId) -> Result<CompositionDef, StorageError> {
        self.stored(graph)?
            .compositions
            .get(&id)
            .cloned()
            .ok_or(StorageError::CompositionNotFound {
                graph: graph.0,
                composition: id,
            })
    }

    fn list_functions(&self, graph: GraphId) -> Result<Vec<FunctionDef>, StorageError> {
        Ok(self.stored(graph)?.functions.values().cloned().collect())
    }
}
