pub mod error;
pub mod graph;
pub mod storage;
#[cfg(feature = "postgres")]
pub mod storage_postgres;
pub mod task;

// Re-export commonly used types
pub use error::{GraphError, Result};
pub use graph::{END, ExecutionResult, Graph, GraphBuilder};
pub use storage::{InMemorySessionStorage, Session, SessionStatus, SessionStorage};
#[cfg(feature = "postgres")]
pub use storage_postgres::PostgresSessionStorage;
pub use task::{NextAction, Task, TaskResult};
