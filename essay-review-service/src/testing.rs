//! In-process stand-ins for the model and retriever adapters.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    llm::{ChatMessage, ChatModel},
    retrieval::{Retriever, Snippet},
    stages::{
        AnalyzerStage, CultureEvaluatorStage, FinalReviewerStage, Stage, TechnicalEvaluatorStage,
        WriterStage,
    },
    state::StageKind,
};

/// Which stage sent a conversation, recognised by its system persona
pub fn stage_of(messages: &[ChatMessage]) -> Option<StageKind> {
    let system = messages.first()?.content.as_str();
    [
        (WriterStage.persona(), StageKind::Writer),
        (AnalyzerStage.persona(), StageKind::Analyzer),
        (TechnicalEvaluatorStage.persona(), StageKind::TechnicalEvaluator),
        (CultureEvaluatorStage.persona(), StageKind::CultureEvaluator),
        (FinalReviewerStage.persona(), StageKind::FinalReviewer),
    ]
    .into_iter()
    .find(|(persona, _)| *persona == system)
    .map(|(_, kind)| kind)
}

/// Answers each stage with a fixed text and keeps every conversation it was sent
pub struct ScriptedModel {
    classification: String,
    fail_at: Option<StageKind>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(Option<StageKind>, Vec<ChatMessage>)>>,
}

impl ScriptedModel {
    pub fn classifying(classification: &str) -> Self {
        Self {
            classification: classification.to_string(),
            fail_at: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, stage: StageKind) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stages in call order; keyword-extraction calls are left out
    pub fn stages_called(&self) -> Vec<StageKind> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(stage, _)| *stage)
            .collect()
    }

    pub fn conversation(&self, stage: StageKind) -> Option<Vec<ChatMessage>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == Some(stage))
            .map(|(_, messages)| messages.clone())
    }
}

pub fn canned_response(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Writer => "I rebuilt the telemetry pipeline in Rust.",
        StageKind::Analyzer => "",
        StageKind::TechnicalEvaluator => "Technical: 4/5, quantify the latency win.",
        StageKind::CultureEvaluator => "Culture: 5/5, ownership comes through.",
        StageKind::FinalReviewer => "I rebuilt the telemetry pipeline in Rust, cutting p99 by 40%.",
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let stage = stage_of(messages);
        self.calls
            .lock()
            .unwrap()
            .push((stage, messages.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match stage {
            Some(s) if Some(s) == self.fail_at => Err(anyhow!("provider unavailable")),
            Some(StageKind::Analyzer) => Ok(self.classification.clone()),
            Some(s) => Ok(canned_response(s).to_string()),
            None => Ok("telemetry, Rust".to_string()),
        }
    }
}

/// Returns the same snippets for every search and remembers what was asked
#[derive(Default)]
pub struct RecordingRetriever {
    snippets: Vec<Snippet>,
    delay: Option<Duration>,
    queries: Mutex<Vec<(StageKind, String, String, usize)>>,
}

impl RecordingRetriever {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_snippets(count: usize) -> Self {
        let snippets = (1..=count)
            .map(|i| Snippet {
                content: format!("fact {i}"),
                source: format!("https://example.org/{i}"),
                topic: "Acme Robotics".to_string(),
                query: "Acme".to_string(),
            })
            .collect();
        Self {
            snippets,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(role, content, query, k)` per search, in call order
    pub fn queries(&self) -> Vec<(StageKind, String, String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn search(&self, content: &str, role: StageKind, query: &str, k: usize) -> Vec<Snippet> {
        self.queries.lock().unwrap().push((
            role,
            content.to_string(),
            query.to_string(),
            k,
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.snippets.clone()
    }
}
