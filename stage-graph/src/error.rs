use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Graph {0} has no start task")]
    NoStartTask(String),

    #[error("Invalid edge {from} -> {to}: unknown task")]
    InvalidEdge { from: String, to: String },

    #[error("Task {0} continued but has no outgoing edge")]
    NoOutgoingEdge(String),

    #[error("Execution exceeded {0} steps without reaching the end")]
    StepLimitExceeded(usize),

    #[error("Storage error: {0}")]
    StorageError(String),

    /// Typed failure raised by a task; callers may downcast the inner error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
