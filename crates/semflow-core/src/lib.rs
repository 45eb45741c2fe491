pub mod composition;
pub mod error;
pub mod function;
pub mod graph;
pub mod id;
pub mod types;

// Re-export commonly used types
pub use composition::{CallDef, CompositionDef, Endpoint, MappingDef, Port, Strategy, Successor};
pub use error::CoreError;
pub use function::{FunctionDef, ImplementationRef, OutputDef, ParamDef, ParamKind};
pub use graph::{GraphQuery, KnowledgeGraph};
pub use id::{CallId, CompositionId, FunctionId};
pub use types::{ConstValue, ValueType};
