use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, debug, info_span};

use crate::{
    error::{GraphError, Result},
    task::{NextAction, Task, TaskResult},
};

/// Reserved target id marking the terminal state of a graph
pub const END: &str = "__end__";

/// Upper bound on executed tasks per run unless overridden
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Type alias for edge condition functions
pub type EdgeCondition<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Edge between tasks in the graph
pub struct Edge<S> {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition<S>>,
}

impl<S> Clone for Edge<S> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            condition: self.condition.clone(),
        }
    }
}

/// A graph of tasks over a state value of type `S`.
///
/// The graph is immutable once built and keeps nothing between runs, so one instance can
/// serve any number of concurrent executions.
pub struct Graph<S> {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task<S>>>,
    edges: Vec<Edge<S>>,
    start_task_id: String,
    max_steps: usize,
}

impl<S: Send + 'static> Graph<S> {
    /// Run the graph from its start task until it reaches [`END`] or a task returns
    /// [`NextAction::End`]. Each task receives the state produced by its predecessor.
    pub async fn execute(&self, state: S) -> Result<ExecutionResult<S>> {
        let mut current = self.start_task_id.clone();
        let mut state = state;
        let mut path = Vec::new();
        let mut response = None;

        loop {
            if path.len() >= self.max_steps {
                return Err(GraphError::StepLimitExceeded(self.max_steps));
            }

            let span = info_span!(
                "task",
                graph_id = %self.id,
                task_id = %current,
                step = path.len() + 1
            );
            let result = self.execute_single_task(&current, state).instrument(span).await?;
            path.push(current.clone());
            state = result.state;
            if result.response.is_some() {
                response = result.response;
            }

            let next = match result.next_action {
                NextAction::End => END.to_string(),
                NextAction::GoTo(target) => {
                    if target != END && !self.tasks.contains_key(&target) {
                        return Err(GraphError::TaskNotFound(target));
                    }
                    target
                }
                NextAction::Continue => self
                    .find_next_task(&current, &state)
                    .ok_or_else(|| GraphError::NoOutgoingEdge(current.clone()))?,
            };

            debug!(graph_id = %self.id, from = %current, to = %next, "transition");
            if next == END {
                break;
            }
            current = next;
        }

        Ok(ExecutionResult {
            state,
            path,
            response,
        })
    }

    async fn execute_single_task(&self, task_id: &str, state: S) -> Result<TaskResult<S>> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        task.run(state).await
    }
}

impl<S> Graph<S> {
    /// Find the next task based on edges and conditions.
    ///
    /// Conditional edges are checked first, in insertion order; the first unconditional
    /// edge is the fallback.
    pub fn find_next_task(&self, current_task_id: &str, state: &S) -> Option<String> {
        let mut fallback = None;
        for edge in self.edges.iter().filter(|e| e.from == current_task_id) {
            match &edge.condition {
                Some(condition) => {
                    if condition(state) {
                        return Some(edge.to.clone());
                    }
                }
                None => {
                    if fallback.is_none() {
                        fallback = Some(edge.to.clone());
                    }
                }
            }
        }
        fallback
    }

    /// Get the start task ID
    pub fn start_task_id(&self) -> &str {
        &self.start_task_id
    }

    /// Get a task by ID
    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task<S>>> {
        self.tasks.get(task_id).cloned()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder<S> {
    id: String,
    tasks: HashMap<String, Arc<dyn Task<S>>>,
    edges: Vec<Edge<S>>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl<S> GraphBuilder<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Add a task; the first task added becomes the start task
    pub fn add_task(mut self, task: Arc<dyn Task<S>>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Route to `yes` when `condition` holds for the state produced by `from`, else to `no`
    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        condition: F,
        yes: impl Into<String>,
        no: impl Into<String>,
    ) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        let from = from.into();
        self.edges.push(Edge {
            from: from.clone(),
            to: yes.into(),
            condition: Some(Arc::new(condition)),
        });
        self.edges.push(Edge {
            from,
            to: no.into(),
            condition: None,
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        self.start_task_id = Some(task_id.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Validate the wiring and freeze the graph
    pub fn build(self) -> Result<Graph<S>> {
        let start_task_id = self
            .start_task_id
            .ok_or_else(|| GraphError::NoStartTask(self.id.clone()))?;
        if !self.tasks.contains_key(&start_task_id) {
            return Err(GraphError::TaskNotFound(start_task_id));
        }

        for edge in &self.edges {
            let to_known = edge.to == END || self.tasks.contains_key(&edge.to);
            if !self.tasks.contains_key(&edge.from) || !to_known {
                return Err(GraphError::InvalidEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }

        Ok(Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id,
            max_steps: self.max_steps,
        })
    }
}

/// Outcome of a completed graph run
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    /// State produced by the last executed task
    pub state: S,
    /// Task ids in execution order
    pub path: Vec<String>,
    /// Last response produced along the path
    pub response: Option<String>,
}
