//! Storage abstraction for semflow knowledge graphs.
//!
//! Provides the [`GraphStore`] trait defining the storage contract that all
//! backends implement, plus the [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends.
//!
//! A stored graph is a named snapshot of a [`KnowledgeGraph`]: its Function
//! Descriptions and Compositions are kept as separate rows so single
//! descriptions can be fetched without reconstructing the whole graph.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: GraphId, GraphSummary storage-layer types
//! - [`traits`]: GraphStore trait definition
//! - [`convert`]: KnowledgeGraph decompose/recompose functions
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migration setup for the SQLite backend
//! - [`sqlite`]: SqliteStore implementation
//!
//! [`KnowledgeGraph`]: semflow_core::KnowledgeGraph

pub mod convert;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::GraphStore;
pub use types::{GraphId, GraphSummary};
