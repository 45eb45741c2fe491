//! SQLite implementation of [`GraphStore`].
//!
//! [`SqliteStore`] persists knowledge graphs in a SQLite database with WAL
//! mode, atomic transactions on every write, and automatic schema
//! migrations. Descriptions are stored as JSON TEXT columns via serde_json,
//! with the columns the listings need (name, body, implementation path)
//! duplicated next to them.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use semflow_core::{CompositionDef, CompositionId, FunctionDef, FunctionId, KnowledgeGraph};

use crate::convert::{decompose, recompose, DecomposedGraph};
use crate::error::StorageError;
use crate::traits::GraphStore;
use crate::types::{GraphId, GraphSummary};

/// SQLite-backed implementation of [`GraphStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn assert_graph_exists(&self, id: GraphId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graphs WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::GraphNotFound(id.0));
        }
        Ok(())
    }

    fn graph_name(&self, id: GraphId) -> Result<String, StorageError> {
        self.conn
            .query_row("SELECT name FROM graphs WHERE id = ?1", params![id.0], |row| row.get(0))
            .optional()?
            .ok_or(StorageError::GraphNotFound(id.0))
    }

    fn save_decomposed(&mut self, graph_id: i64, decomposed: &DecomposedGraph) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM compositions WHERE graph_id = ?1", params![graph_id])?;
        tx.execute("DELETE FROM functions WHERE graph_id = ?1", params![graph_id])?;
        tx.execute(
            "UPDATE graphs SET name = ?2 WHERE id = ?1",
            params![graph_id, decomposed.name],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO functions (graph_id, function_id, name, body_id, implementation, def_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for func in &decomposed.functions {
                let def_json = serde_json::to_string(func)?;
                stmt.execute(params![
                    graph_id,
                    func.id.0,
                    func.name,
                    func.body.map(|b| b.0),
                    func.implementation.as_ref().map(|imp| imp.path.as_str()),
                    def_json,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO compositions (graph_id, composition_id, name, represents, def_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for comp in &decomposed.compositions {
                let def_json = serde_json::to_string(comp)?;
                stmt.execute(params![graph_id, comp.id.0, comp.name, comp.represents.map(|f| f.0), def_json])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn query_json<T: serde::de::DeserializeOwned>(&self, sql: &str, graph: GraphId) -> Result<Vec<T>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![graph.0], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for json in rows {
            out.push(serde_json::from_str(&json?)?);
        }
        Ok(out)
    }
}

impl GraphStore for SqliteStore {
    fn create_graph(&mut self, name: &str) -> Result<GraphId, StorageError> {
        self.conn.execute("INSERT INTO graphs (name) VALUES (?1)", params![name])?;
        let id = GraphId(self.conn.last_insert_rowid());
        debug!(%id, name, "created graph");
        Ok(id)
    }

    fn save_graph(&mut self, id: GraphId, graph: &KnowledgeGraph) -> Result<(), StorageError> {
        self.assert_graph_exists(id)?;
        let decomposed = decompose(graph);
        self.save_decomposed(id.0, &decomposed)?;
        debug!(
            %id,
            functions = decomposed.functions.len(),
            compositions = decomposed.compositions.len(),
            "saved graph"
        );
        Ok(())
    }

    fn load_graph(&self, id: GraphId) -> Result<KnowledgeGraph, StorageError> {
        let name = self.graph_name(id)?;
        let functions = self.list_functions(id)?;
        let compositions = self.query_json(
            "SELECT def_json FROM compositions WHERE graph_id = ?1 ORDER BY composition_id",
            id,
        )?;
        recompose(DecomposedGraph {
            name,
            functions,
            compositions,
        })
    }

    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError> {
        let deleted = self.conn.execute("DELETE FROM graphs WHERE id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(StorageError::GraphNotFound(id.0));
        }
        debug!(%id, "deleted graph");
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT g.id, g.name, \
                (SELECT COUNT(*) FROM functions f WHERE f.graph_id = g.id), \
                (SELECT COUNT(*) FROM compositions c WHERE c.graph_id = g.id) \
             FROM graphs g ORDER BY g.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GraphSummary {
                id: GraphId(row.get(0)?),
                name: row.get(1)?,
                functions: row.get::<_, i64>(2)? as usize,
                compositions: row.get::<_, i64>(3)? as usize,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_function(&self, graph: GraphId, id: FunctionId) -> Result<FunctionDef, StorageError> {
        self.assert_graph_exists(graph)?;
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT def_json FROM functions WHERE graph_id = ?1 AND function_id = ?2",
                params![graph.0, id.0],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or(StorageError::FunctionNotFound {
            graph: graph.0,
            function: id,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn get_composition(&self, graph: GraphId, id: CompositionId) -> Result<CompositionDef, StorageError> {
        self.assert_graph_exists(graph)?;
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT def_json FROM compositions WHERE graph_id = ?1 AND composition_id = ?2",
                params![graph.0, id.0],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or(StorageError::CompositionNotFound {
            graph: graph.0,
            composition: id,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn list_functions(&self, graph: GraphId) -> Result<Vec<FunctionDef>, StorageError> {
        self.assert_graph_exists(graph)?;
        self.query_json(
            "SELECT def_json FROM functions WHERE graph_id = ?1 ORDER BY function_id",
            graph,
        )
    }
}
