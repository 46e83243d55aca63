use stage_graph::GraphError;
use std::time::Duration;
use thiserror::Error;

use crate::state::{QuestionId, StageKind};

/// Malformed submission; rejected before any stage runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one question is required")]
    NoQuestions,
    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
    #[error("question {0} has no text")]
    EmptyQuestion(QuestionId),
    #[error("question {id} has invalid length bounds {min}..{max}")]
    InvalidLength { id: QuestionId, min: u32, max: u32 },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
}

/// The analyzer answered with something other than a known evaluation type.
/// Recovered by routing through both evaluators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationParseError {
    #[error("analyzer response is not a JSON object: {0}")]
    Malformed(String),
    #[error("unknown evaluation type {0:?}")]
    UnknownType(String),
}

/// Retrieval failure; always recovered as empty context
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("keyword extraction failed: {0}")]
    Keywords(#[source] anyhow::Error),
    #[error("web search failed: {0}")]
    Search(#[from] reqwest::Error),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("retrieval timed out after {0:?}")]
    TimedOut(Duration),
}

/// Generative model failure; fatal to the run
#[derive(Debug, Error)]
pub enum ModelInvocationError {
    #[error("{stage} model call failed: {source}")]
    Failed {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("{stage} model call timed out after {timeout:?}")]
    TimedOut { stage: StageKind, timeout: Duration },
}

/// Fatal outcome of a review request
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Model(#[from] ModelInvocationError),
    #[error("workflow failed: {0}")]
    Workflow(GraphError),
}

impl From<GraphError> for ReviewError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Other(inner) => match inner.downcast::<ModelInvocationError>() {
                Ok(model) => ReviewError::Model(model),
                Err(inner) => ReviewError::Workflow(GraphError::Other(inner)),
            },
            other => ReviewError::Workflow(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_failures_survive_the_graph_boundary() {
        let graph_err = GraphError::from(anyhow::Error::new(ModelInvocationError::TimedOut {
            stage: StageKind::FinalReviewer,
            timeout: Duration::from_secs(5),
        }));

        match ReviewError::from(graph_err) {
            ReviewError::Model(ModelInvocationError::TimedOut { stage, .. }) => {
                assert_eq!(stage, StageKind::FinalReviewer)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_graph_failures_stay_workflow_errors() {
        let err = ReviewError::from(GraphError::TaskNotFound("FINAL".into()));
        assert!(matches!(err, ReviewError::Workflow(GraphError::TaskNotFound(_))));
    }
}
