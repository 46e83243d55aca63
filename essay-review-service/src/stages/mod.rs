//! The five review stages and the task template that runs them.

mod analyzer;
mod evaluators;
mod final_reviewer;
pub mod stage;
mod writer;

use crate::state::StageKind;

pub use analyzer::{AnalyzerStage, parse_classification};
pub use evaluators::{CultureEvaluatorStage, TechnicalEvaluatorStage};
pub use final_reviewer::FinalReviewerStage;
pub use stage::{Stage, StageDeps, StageTask};
pub use writer::WriterStage;

/// Human-readable name of a stage, used when replaying earlier outputs to the model
pub fn display_label(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Writer => "Essay writer",
        StageKind::Analyzer => "Content analyzer",
        StageKind::TechnicalEvaluator => "Technical evaluator",
        StageKind::CultureEvaluator => "Culture evaluator",
        StageKind::FinalReviewer => "Final reviewer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ModelInvocationError,
        llm::{ChatModel, ChatRole},
        retrieval::Retriever,
        state::{EvaluationType, SessionState, StageOutput, fixtures::session},
        testing::{RecordingRetriever, ScriptedModel, canned_response},
    };
    use stage_graph::{GraphError, NextAction, Task};
    use std::sync::Arc;
    use std::time::Duration;

    fn deps(
        model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        retrieval_depth: usize,
    ) -> StageDeps {
        StageDeps {
            model,
            retriever,
            retrieval_depth,
            llm_timeout: Duration::from_secs(5),
            retrieval_timeout: Duration::from_secs(5),
        }
    }

    fn drafted() -> SessionState {
        session().record(
            StageKind::Writer,
            "my draft".to_string(),
            StageOutput::Draft("my draft".to_string()),
        )
    }

    #[test]
    fn labels_are_distinct() {
        assert_eq!(display_label(StageKind::Writer), "Essay writer");
        assert_eq!(display_label(StageKind::Analyzer), "Content analyzer");
        assert_eq!(display_label(StageKind::TechnicalEvaluator), "Technical evaluator");
        assert_eq!(display_label(StageKind::CultureEvaluator), "Culture evaluator");
        assert_eq!(display_label(StageKind::FinalReviewer), "Final reviewer");
    }

    #[tokio::test]
    async fn zero_depth_skips_retrieval() {
        let retriever = Arc::new(RecordingRetriever::with_snippets(3));
        let task = StageTask::new(
            WriterStage,
            deps(Arc::new(ScriptedModel::classifying("")), retriever.clone(), 0),
        );
        let state = session();
        let question = state.current_question().unwrap().clone();

        assert_eq!(task.retrieve_context(&state, &question).await, "");
        assert!(retriever.queries().is_empty());
    }

    #[tokio::test]
    async fn writer_searches_with_company_role_and_category() {
        let retriever = Arc::new(RecordingRetriever::with_snippets(3));
        let task = StageTask::new(
            WriterStage,
            deps(Arc::new(ScriptedModel::classifying("")), retriever.clone(), 2),
        );
        let state = session();
        let question = state.current_question().unwrap().clone();

        let context = task.retrieve_context(&state, &question).await;
        assert!(context.contains("[Reference 1]"));
        assert!(context.contains("[Reference 2]"));
        assert!(!context.contains("[Reference 3]"));

        let queries = retriever.queries();
        assert_eq!(queries.len(), 1);
        let (role, content, query, k) = &queries[0];
        assert_eq!(*role, StageKind::Writer);
        assert_eq!(content, "Why do you want to join our team?");
        assert_eq!(query, "Acme Robotics Backend Engineer motivation");
        assert_eq!(*k, 2);
    }

    #[tokio::test]
    async fn reviewers_skip_retrieval_without_a_draft() {
        let retriever = Arc::new(RecordingRetriever::with_snippets(3));
        let task = StageTask::new(
            TechnicalEvaluatorStage,
            deps(Arc::new(ScriptedModel::classifying("")), retriever.clone(), 2),
        );
        let state = session();
        let question = state.current_question().unwrap().clone();
        assert_eq!(task.retrieve_context(&state, &question).await, "");
        assert!(retriever.queries().is_empty());

        let state = drafted();
        task.retrieve_context(&state, &question).await;
        let queries = retriever.queries();
        assert_eq!(queries[0].1, "my draft");
        assert_eq!(queries[0].2, "Why do you want to join our team?");
    }

    #[tokio::test]
    async fn analyzer_and_final_reviewer_never_search() {
        let retriever = Arc::new(RecordingRetriever::with_snippets(3));
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::classifying(""));
        let state = drafted();
        let question = state.current_question().unwrap().clone();

        let analyzer = StageTask::new(AnalyzerStage, deps(model.clone(), retriever.clone(), 2));
        assert_eq!(analyzer.retrieve_context(&state, &question).await, "");
        let reviewer = StageTask::new(FinalReviewerStage, deps(model, retriever.clone(), 2));
        assert_eq!(reviewer.retrieve_context(&state, &question).await, "");

        assert!(retriever.queries().is_empty());
    }

    #[tokio::test]
    async fn slow_retrieval_yields_empty_context() {
        let retriever =
            Arc::new(RecordingRetriever::with_snippets(2).with_delay(Duration::from_millis(200)));
        let mut deps = deps(Arc::new(ScriptedModel::classifying("")), retriever, 2);
        deps.retrieval_timeout = Duration::from_millis(10);
        let task = StageTask::new(WriterStage, deps);
        let state = session();
        let question = state.current_question().unwrap().clone();

        assert_eq!(task.retrieve_context(&state, &question).await, "");
    }

    #[test]
    fn earlier_outputs_are_replayed_with_labels() {
        let task = StageTask::new(
            AnalyzerStage,
            deps(
                Arc::new(ScriptedModel::classifying("")),
                Arc::new(RecordingRetriever::empty()),
                0,
            ),
        );
        let state = drafted();
        let question = state.current_question().unwrap().clone();
        let messages = task.prepare_messages(&state, &question, "");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, AnalyzerStage.persona());
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "Essay writer: my draft");
        assert_eq!(messages[2].role, ChatRole::User);
        assert!(messages[2].content.contains("my draft"));
    }

    #[tokio::test]
    async fn run_records_the_stage_output() {
        let task = StageTask::new(
            AnalyzerStage,
            deps(
                Arc::new(ScriptedModel::classifying(r#"{"evaluation_type": "culture"}"#)),
                Arc::new(RecordingRetriever::empty()),
                2,
            ),
        );
        assert_eq!(task.id(), "ANALYZER");

        let result = task.run(drafted()).await.unwrap();
        assert!(matches!(result.next_action, NextAction::Continue));
        assert_eq!(
            result.response.as_deref(),
            Some(r#"{"evaluation_type": "culture"}"#)
        );
        assert_eq!(
            result.state.current_evaluation_type(),
            Some(EvaluationType::Culture)
        );
        assert_eq!(result.state.messages().len(), 2);
        assert_eq!(result.state.current_stage(), Some(StageKind::Analyzer));
        assert!(result.state.drafts().contains_key(&1));
    }

    #[tokio::test]
    async fn writer_run_stores_the_draft() {
        let task = StageTask::new(
            WriterStage,
            deps(
                Arc::new(ScriptedModel::classifying("")),
                Arc::new(RecordingRetriever::empty()),
                2,
            ),
        );
        let result = task.run(session()).await.unwrap();
        assert_eq!(
            result.state.current_draft(),
            Some(canned_response(StageKind::Writer))
        );
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_invocation_error() {
        let task = StageTask::new(
            WriterStage,
            deps(
                Arc::new(ScriptedModel::classifying("").failing_at(StageKind::Writer)),
                Arc::new(RecordingRetriever::empty()),
                0,
            ),
        );
        let err = task.run(session()).await.unwrap_err();
        let GraphError::Other(source) = err else {
            panic!("expected a wrapped model error, got {err:?}");
        };
        assert!(matches!(
            source.downcast_ref::<ModelInvocationError>(),
            Some(ModelInvocationError::Failed {
                stage: StageKind::Writer,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let mut deps = deps(
            Arc::new(ScriptedModel::classifying("").with_delay(Duration::from_millis(200))),
            Arc::new(RecordingRetriever::empty()),
            0,
        );
        deps.llm_timeout = Duration::from_millis(10);
        let task = StageTask::new(WriterStage, deps);

        let err = task.run(session()).await.unwrap_err();
        let GraphError::Other(source) = err else {
            panic!("expected a wrapped model error, got {err:?}");
        };
        assert!(matches!(
            source.downcast_ref::<ModelInvocationError>(),
            Some(ModelInvocationError::TimedOut { .. })
        ));
    }
}
