//! The session record threaded through every stage of the review graph.
//!
//! Stages never touch the result maps directly: they hand a [`StageOutput`] to
//! [`SessionState::record`], which consumes the previous value and returns the next one with
//! exactly that stage's map and the message log extended.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::ValidationError;

pub type QuestionId = i64;

/// One essay question as submitted by the applicant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt_text: String,
    pub max_length: u32,
    pub min_length: u32,
    #[serde(default)]
    pub category: String,
}

impl Question {
    pub fn category_or_default(&self) -> &str {
        if self.category.trim().is_empty() {
            "general"
        } else {
            &self.category
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub education: String,
    pub experience: String,
    pub skills: String,
    pub certificates: String,
    pub projects: String,
    pub achievements: String,
}

/// Organization and role the applicant is writing for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub organization: String,
    pub target_role: String,
    pub requirements: String,
    pub role_description: String,
    pub organizational_values: Option<String>,
}

impl JobPosting {
    pub fn values_or_default(&self) -> &str {
        self.organizational_values
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("Not provided")
    }
}

/// Which reviewers a draft needs, as decided by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationType {
    Technical,
    Culture,
    Both,
}

impl EvaluationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationType::Technical => "technical",
            EvaluationType::Culture => "culture",
            EvaluationType::Both => "both",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a stage in the review graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    #[serde(rename = "WRITER")]
    Writer,
    #[serde(rename = "ANALYZER")]
    Analyzer,
    #[serde(rename = "TECH_EVAL")]
    TechnicalEvaluator,
    #[serde(rename = "CULTURE_EVAL")]
    CultureEvaluator,
    #[serde(rename = "FINAL")]
    FinalReviewer,
}

impl StageKind {
    /// Task id used for this stage in the graph
    pub fn id(&self) -> &'static str {
        match self {
            StageKind::Writer => "WRITER",
            StageKind::Analyzer => "ANALYZER",
            StageKind::TechnicalEvaluator => "TECH_EVAL",
            StageKind::CultureEvaluator => "CULTURE_EVAL",
            StageKind::FinalReviewer => "FINAL",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Entry of the pipeline log, one per executed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMessage {
    pub role: StageKind,
    pub content: String,
}

/// The value a stage contributes to the session, tagged by the map it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    Draft(String),
    Classification(EvaluationType),
    TechnicalFeedback(String),
    CultureFeedback(String),
    FinalDraft(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    posting: JobPosting,
    profile: ApplicantProfile,
    questions: Vec<Question>,
    current_question_id: QuestionId,
    drafts: BTreeMap<QuestionId, String>,
    evaluation_types: BTreeMap<QuestionId, EvaluationType>,
    technical_feedbacks: BTreeMap<QuestionId, String>,
    culture_feedbacks: BTreeMap<QuestionId, String>,
    final_drafts: BTreeMap<QuestionId, String>,
    messages: Vec<StageMessage>,
    current_stage: Option<StageKind>,
}

impl SessionState {
    /// Validate the submission and build a fresh session pointing at the first question
    pub fn new(
        posting: JobPosting,
        profile: ApplicantProfile,
        questions: Vec<Question>,
    ) -> Result<Self, ValidationError> {
        if posting.organization.trim().is_empty() {
            return Err(ValidationError::MissingField("organization"));
        }
        if posting.target_role.trim().is_empty() {
            return Err(ValidationError::MissingField("position"));
        }

        let first = questions.first().ok_or(ValidationError::NoQuestions)?.id;
        let mut seen = HashSet::new();
        for question in &questions {
            if !seen.insert(question.id) {
                return Err(ValidationError::DuplicateQuestion(question.id));
            }
            if question.prompt_text.trim().is_empty() {
                return Err(ValidationError::EmptyQuestion(question.id));
            }
            if question.max_length == 0 || question.min_length > question.max_length {
                return Err(ValidationError::InvalidLength {
                    id: question.id,
                    min: question.min_length,
                    max: question.max_length,
                });
            }
        }

        Ok(Self {
            posting,
            profile,
            questions,
            current_question_id: first,
            drafts: BTreeMap::new(),
            evaluation_types: BTreeMap::new(),
            technical_feedbacks: BTreeMap::new(),
            culture_feedbacks: BTreeMap::new(),
            final_drafts: BTreeMap::new(),
            messages: Vec::new(),
            current_stage: None,
        })
    }

    /// A copy of this session aimed at another question
    pub fn for_question(&self, id: QuestionId) -> Result<Self, ValidationError> {
        if !self.questions.iter().any(|q| q.id == id) {
            return Err(ValidationError::UnknownQuestion(id));
        }
        Ok(Self {
            current_question_id: id,
            ..self.clone()
        })
    }

    /// Append the stage's log entry and write its output for the current question
    pub fn record(mut self, stage: StageKind, response: String, output: StageOutput) -> Self {
        let qid = self.current_question_id;
        match output {
            StageOutput::Draft(text) => {
                self.drafts.insert(qid, text);
            }
            StageOutput::Classification(kind) => {
                self.evaluation_types.insert(qid, kind);
            }
            StageOutput::TechnicalFeedback(text) => {
                self.technical_feedbacks.insert(qid, text);
            }
            StageOutput::CultureFeedback(text) => {
                self.culture_feedbacks.insert(qid, text);
            }
            StageOutput::FinalDraft(text) => {
                self.final_drafts.insert(qid, text);
            }
        }
        self.messages.push(StageMessage {
            role: stage,
            content: response,
        });
        self.current_stage = Some(stage);
        self
    }

    pub fn posting(&self) -> &JobPosting {
        &self.posting
    }

    pub fn profile(&self) -> &ApplicantProfile {
        &self.profile
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_id(&self) -> QuestionId {
        self.current_question_id
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| q.id == self.current_question_id)
    }

    pub fn current_draft(&self) -> Option<&str> {
        self.drafts
            .get(&self.current_question_id)
            .map(String::as_str)
    }

    pub fn current_evaluation_type(&self) -> Option<EvaluationType> {
        self.evaluation_types.get(&self.current_question_id).copied()
    }

    pub fn current_technical_feedback(&self) -> Option<&str> {
        self.technical_feedbacks
            .get(&self.current_question_id)
            .map(String::as_str)
    }

    pub fn current_culture_feedback(&self) -> Option<&str> {
        self.culture_feedbacks
            .get(&self.current_question_id)
            .map(String::as_str)
    }

    pub fn drafts(&self) -> &BTreeMap<QuestionId, String> {
        &self.drafts
    }

    pub fn evaluation_types(&self) -> &BTreeMap<QuestionId, EvaluationType> {
        &self.evaluation_types
    }

    pub fn technical_feedbacks(&self) -> &BTreeMap<QuestionId, String> {
        &self.technical_feedbacks
    }

    pub fn culture_feedbacks(&self) -> &BTreeMap<QuestionId, String> {
        &self.culture_feedbacks
    }

    pub fn final_drafts(&self) -> &BTreeMap<QuestionId, String> {
        &self.final_drafts
    }

    pub fn messages(&self) -> &[StageMessage] {
        &self.messages
    }

    pub fn current_stage(&self) -> Option<StageKind> {
        self.current_stage
    }
}
