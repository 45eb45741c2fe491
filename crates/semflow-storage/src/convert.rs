//! Decompose/recompose conversions between a KnowledgeGraph and flat rows.

use semflow_core::{CompositionDef, FunctionDef, KnowledgeGraph};

use crate::error::StorageError;

/// All components of a KnowledgeGraph broken into flat vectors for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedGraph {
    pub name: String,
    pub functions: Vec<FunctionDef>,
    pub compositions: Vec<CompositionDef>,
}

/// Decomposes a graph into rows, ordered by id.
pub fn decompose(graph: &KnowledgeGraph) -> DecomposedGraph {
    DecomposedGraph {
        name: graph.name.clone(),
        functions: graph.functions().cloned().collect(),
        compositions: graph.compositions().cloned().collect(),
    }
}

/// Rebuilds a graph from rows and re-validates every description and
/// mapping. A composition representing a function must be that function's
/// body.
pub fn recompose(decomposed: DecomposedGraph) -> Result<KnowledgeGraph, StorageError> {
    for comp in &decomposed.compositions {
        if let Some(function) = comp.represents {
            let body = decomposed
                .functions
                .iter()
                .find(|f| f.id == function)
                .and_then(|f| f.body);
            if body != Some(comp.id) {
                return Err(StorageError::ReconstructionError {
                    reason: format!(
                        "composition {} represents function {function}, whose body does not point back",
                        comp.id
                    ),
                });
            }
        }
    }

    let graph = KnowledgeGraph::from_parts(&decomposed.name, decomposed.functions, decomposed.compositions);
    graph.check()?;
    Ok(graph)
}
