use serde::{Deserialize, Serialize};
use stage_graph::{END, Graph, GraphBuilder, GraphError, Task};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{
    error::ReviewError,
    routing::{needs_culture_review, needs_technical_review},
    stages::{
        AnalyzerStage, CultureEvaluatorStage, FinalReviewerStage, StageDeps, StageTask,
        TechnicalEvaluatorStage, WriterStage,
    },
    state::{EvaluationType, QuestionId, SessionState, StageMessage},
};

pub const GRAPH_ID: &str = "essay_review";

/// Wire the five stages into the review graph.
///
/// `WRITER -> ANALYZER -> {TECH_EVAL | CULTURE_EVAL}`, then `TECH_EVAL -> {CULTURE_EVAL | FINAL}`,
/// `CULTURE_EVAL -> FINAL` and `FINAL -> END`.
pub fn build_review_graph(deps: StageDeps) -> stage_graph::Result<Graph<SessionState>> {
    let writer = Arc::new(StageTask::new(WriterStage, deps.clone()));
    let analyzer = Arc::new(StageTask::new(AnalyzerStage, deps.clone()));
    let technical = Arc::new(StageTask::new(TechnicalEvaluatorStage, deps.clone()));
    let culture = Arc::new(StageTask::new(CultureEvaluatorStage, deps.clone()));
    let final_reviewer = Arc::new(StageTask::new(FinalReviewerStage, deps));

    let writer_id = writer.id().to_string();
    let analyzer_id = analyzer.id().to_string();
    let technical_id = technical.id().to_string();
    let culture_id = culture.id().to_string();
    let final_id = final_reviewer.id().to_string();

    GraphBuilder::new(GRAPH_ID)
        .add_task(writer)
        .add_task(analyzer)
        .add_task(technical)
        .add_task(culture)
        .add_task(final_reviewer)
        .set_start_task(writer_id.clone())
        .add_edge(writer_id, analyzer_id.clone())
        .add_conditional_edge(
            analyzer_id,
            needs_technical_review,
            technical_id.clone(),
            culture_id.clone(),
        )
        .add_conditional_edge(
            technical_id,
            needs_culture_review,
            culture_id.clone(),
            final_id.clone(),
        )
        .add_edge(culture_id, final_id.clone())
        .add_edge(final_id, END)
        .build()
}

/// Results of a review, keyed by question id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub drafts: BTreeMap<QuestionId, String>,
    pub evaluation_types: BTreeMap<QuestionId, EvaluationType>,
    pub technical_feedbacks: BTreeMap<QuestionId, String>,
    pub culture_feedbacks: BTreeMap<QuestionId, String>,
    pub final_drafts: BTreeMap<QuestionId, String>,
    pub messages: Vec<StageMessage>,
}

impl ReviewOutcome {
    /// Fold a finished run into this outcome; messages are appended after the existing ones
    pub fn merge(&mut self, state: &SessionState) {
        self.drafts.extend(state.drafts().clone());
        self.evaluation_types.extend(state.evaluation_types().clone());
        self.technical_feedbacks
            .extend(state.technical_feedbacks().clone());
        self.culture_feedbacks.extend(state.culture_feedbacks().clone());
        self.final_drafts.extend(state.final_drafts().clone());
        self.messages.extend_from_slice(state.messages());
    }
}

impl From<&SessionState> for ReviewOutcome {
    fn from(state: &SessionState) -> Self {
        let mut outcome = ReviewOutcome::default();
        outcome.merge(state);
        outcome
    }
}

/// Runs the review graph, one execution per question
#[derive(Clone)]
pub struct ReviewWorkflow {
    graph: Arc<Graph<SessionState>>,
}

impl ReviewWorkflow {
    pub fn new(deps: StageDeps) -> stage_graph::Result<Self> {
        Ok(Self {
            graph: Arc::new(build_review_graph(deps)?),
        })
    }

    /// Review the session's current question and return the state produced by the final stage
    pub async fn run_question(&self, state: SessionState) -> Result<SessionState, ReviewError> {
        let question_id = state.current_question_id();
        let result = self.graph.execute(state).await?;
        info!(question_id, path = ?result.path, "Question reviewed");

        let state = result.state;
        if let (Some(question), Some(answer)) = (
            state.current_question(),
            state.final_drafts().get(&question_id),
        ) {
            let chars = answer.chars().count();
            if chars > question.max_length as usize {
                warn!(
                    question_id,
                    chars,
                    max_length = question.max_length,
                    "Final answer exceeds the length limit"
                );
            }
        }
        Ok(state)
    }

    /// Review every question concurrently and merge the results in question order.
    /// The first failure aborts the remaining runs.
    pub async fn review_all(&self, state: &SessionState) -> Result<ReviewOutcome, ReviewError> {
        let mut runs = JoinSet::new();
        for (index, question) in state.questions().iter().enumerate() {
            let run_state = state.for_question(question.id)?;
            let workflow = self.clone();
            runs.spawn(async move { (index, workflow.run_question(run_state).await) });
        }

        let mut finished: Vec<Option<SessionState>> = vec![None; state.questions().len()];
        while let Some(joined) = runs.join_next().await {
            let (index, result) = joined.map_err(|e| {
                ReviewError::Workflow(GraphError::TaskExecutionFailed(format!(
                    "review run did not finish: {e}"
                )))
            })?;
            finished[index] = Some(result?);
        }

        let mut outcome = ReviewOutcome::default();
        for state in finished.iter().flatten() {
            outcome.merge(state);
        }
        Ok(outcome)
    }
}
