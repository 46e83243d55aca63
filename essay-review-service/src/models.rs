use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    state::{ApplicantProfile, JobPosting, Question, QuestionId, SessionState},
    workflow::ReviewOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub certificates: String,
    #[serde(default)]
    pub projects: String,
    #[serde(default)]
    pub achievements: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question_id: QuestionId,
    pub content: String,
    pub max_length: u32,
    #[serde(default)]
    pub min_length: u32,
    #[serde(default)]
    pub category: String,
}

/// Body of `POST /resume/api/v1/resume/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub organization: String,
    pub position: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub company_values: Option<String>,
    pub user_profile: UserProfile,
    pub questions: Vec<QuestionRequest>,
}

impl ResumeRequest {
    /// Validate the request and build the session every question run starts from
    pub fn into_session(self) -> Result<SessionState, ValidationError> {
        let posting = JobPosting {
            organization: self.organization,
            target_role: self.position,
            requirements: self.requirements,
            role_description: self.description,
            organizational_values: self.company_values,
        };
        let profile = ApplicantProfile {
            education: self.user_profile.education,
            experience: self.user_profile.experience,
            skills: self.user_profile.skills,
            certificates: self.user_profile.certificates,
            projects: self.user_profile.projects,
            achievements: self.user_profile.achievements,
        };
        let questions = self
            .questions
            .into_iter()
            .map(|q| Question {
                id: q.question_id,
                prompt_text: q.content,
                max_length: q.max_length,
                min_length: q.min_length,
                category: q.category,
            })
            .collect();

        SessionState::new(posting, profile, questions)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub outcome: ReviewOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReviewOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
