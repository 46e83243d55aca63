use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a task execution
#[derive(Debug, Clone)]
pub struct TaskResult<S> {
    /// State handed to the next task
    pub state: S,
    /// Text produced by the task, if any
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
}

impl<S> TaskResult<S> {
    pub fn new(state: S, response: Option<String>, next_action: NextAction) -> Self {
        Self {
            state,
            response,
            next_action,
        }
    }

    /// Follow the graph edges with the given state
    pub fn proceed(state: S, response: Option<String>) -> Self {
        Self::new(state, response, NextAction::Continue)
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Continue along the outgoing edges of the task
    Continue,
    /// Go to a specific task by ID
    GoTo(String),
    /// End the graph execution
    End,
}

/// Core trait that all tasks must implement.
///
/// A task takes ownership of the state value and returns the next one; the engine never
/// shares a state between two tasks.
#[async_trait]
pub trait Task<S>: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str;

    /// Execute the task with the given state
    async fn run(&self, state: S) -> Result<TaskResult<S>>;
}
