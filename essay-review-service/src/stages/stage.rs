use async_trait::async_trait;
use stage_graph::{GraphError, Task, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::display_label;
use crate::{
    error::{ModelInvocationError, RetrievalError},
    llm::{ChatMessage, ChatModel},
    retrieval::{Retriever, format_context},
    state::{Question, SessionState, StageKind, StageOutput},
};

/// What a concrete stage contributes: its identity, persona, prompt and owned output.
/// Everything else happens in [`StageTask`].
pub trait Stage: Send + Sync + 'static {
    fn kind(&self) -> StageKind;

    /// Fixed role instruction sent as the system message
    fn persona(&self) -> &'static str;

    /// Whether the prompt embeds retrieved context; stages that never read it skip retrieval
    fn uses_context(&self) -> bool {
        true
    }

    /// The stage-specific instruction, given the retrieved context block (possibly empty)
    fn build_prompt(&self, state: &SessionState, question: &Question, context: &str) -> String;

    /// Map the raw model response onto the session field this stage owns
    fn output(&self, response: &str) -> StageOutput;
}

/// Adapters and limits shared by every stage of a graph
#[derive(Clone)]
pub struct StageDeps {
    pub model: Arc<dyn ChatModel>,
    pub retriever: Arc<dyn Retriever>,
    /// Snippets to request per stage; 0 skips retrieval
    pub retrieval_depth: usize,
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
}

/// Runs a [`Stage`] as a graph task: retrieve context, prepare messages, generate, apply.
pub struct StageTask<T> {
    stage: T,
    deps: StageDeps,
}

impl<T: Stage> StageTask<T> {
    pub fn new(stage: T, deps: StageDeps) -> Self {
        Self { stage, deps }
    }

    pub(crate) async fn retrieve_context(&self, state: &SessionState, question: &Question) -> String {
        let k = self.deps.retrieval_depth;
        if k == 0 || !self.stage.uses_context() {
            return String::new();
        }

        let kind = self.stage.kind();
        let (content, query) = match kind {
            StageKind::Writer => {
                let posting = state.posting();
                let query = format!(
                    "{} {} {}",
                    posting.organization,
                    posting.target_role,
                    question.category_or_default()
                );
                (question.prompt_text.clone(), query)
            }
            _ => match state.current_draft() {
                Some(draft) if !draft.trim().is_empty() => {
                    (draft.to_string(), question.prompt_text.clone())
                }
                _ => {
                    debug!(stage = %kind, "No draft to verify, skipping retrieval");
                    return String::new();
                }
            },
        };

        let search = self.deps.retriever.search(&content, kind, &query, k);
        match timeout(self.deps.retrieval_timeout, search).await {
            Ok(mut snippets) => {
                snippets.truncate(k);
                format_context(&snippets)
            }
            Err(_) => {
                let err = RetrievalError::TimedOut(self.deps.retrieval_timeout);
                warn!(stage = %kind, error = %err, "Continuing without context");
                String::new()
            }
        }
    }

    pub(crate) fn prepare_messages(
        &self,
        state: &SessionState,
        question: &Question,
        context: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(state.messages().len() + 2);
        messages.push(ChatMessage::system(self.stage.persona()));
        messages.extend(state.messages().iter().map(|m| {
            ChatMessage::user(format!("{}: {}", display_label(m.role), m.content))
        }));
        messages.push(ChatMessage::user(
            self.stage.build_prompt(state, question, context),
        ));
        messages
    }

    async fn generate_response(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, ModelInvocationError> {
        let stage = self.stage.kind();
        match timeout(self.deps.llm_timeout, self.deps.model.invoke(messages)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(ModelInvocationError::Failed { stage, source }),
            Err(_) => Err(ModelInvocationError::TimedOut {
                stage,
                timeout: self.deps.llm_timeout,
            }),
        }
    }

    fn apply_update(&self, state: SessionState, response: String) -> SessionState {
        let output = self.stage.output(&response);
        state.record(self.stage.kind(), response, output)
    }
}

#[async_trait]
impl<T: Stage> Task<SessionState> for StageTask<T> {
    fn id(&self) -> &str {
        self.stage.kind().id()
    }

    async fn run(&self, state: SessionState) -> stage_graph::Result<TaskResult<SessionState>> {
        let kind = self.stage.kind();
        let question = state.current_question().cloned().ok_or_else(|| {
            GraphError::TaskExecutionFailed(format!(
                "question {} is not part of the session",
                state.current_question_id()
            ))
        })?;

        info!(
            stage = %kind,
            label = display_label(kind),
            question_id = question.id,
            "Stage started"
        );

        let context = self.retrieve_context(&state, &question).await;
        let messages = self.prepare_messages(&state, &question, &context);
        let response = self
            .generate_response(&messages)
            .await
            .map_err(anyhow::Error::from)?;

        info!(
            stage = %kind,
            question_id = question.id,
            context_len = context.len(),
            response_len = response.len(),
            "Stage completed"
        );

        let next = self.apply_update(state, response.clone());
        Ok(TaskResult::proceed(next, Some(response)))
    }
}
