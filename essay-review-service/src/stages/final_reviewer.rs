use super::Stage;
use crate::state::{Question, SessionState, StageKind, StageOutput};

const PERSONA: &str = "You are the final editor of application essays. Combine the reviewers' \
feedback into one polished answer that stays faithful to the applicant's experience.";

const NOT_REQUESTED: &str = "Not requested";

/// Folds the evaluators' feedback into the final answer
pub struct FinalReviewerStage;

impl Stage for FinalReviewerStage {
    fn kind(&self) -> StageKind {
        StageKind::FinalReviewer
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn uses_context(&self) -> bool {
        false
    }

    fn build_prompt(&self, state: &SessionState, question: &Question, _context: &str) -> String {
        format!(
            r#"Revise the essay answer below using the reviewers' feedback.

[Question]
{prompt}
Maximum length: {max} characters

[Current answer]
{draft}

[Technical feedback]
{technical}

[Culture feedback]
{culture}

Guidelines:
1. Apply every improvement that is consistent with the applicant's real experience
2. Remove or soften claims the reviewers could not verify
3. Keep the answer within {max} characters
4. Return only the final answer text, without commentary"#,
            prompt = question.prompt_text,
            max = question.max_length,
            draft = state.current_draft().unwrap_or_default(),
            technical = state.current_technical_feedback().unwrap_or(NOT_REQUESTED),
            culture = state.current_culture_feedback().unwrap_or(NOT_REQUESTED),
        )
    }

    fn output(&self, response: &str) -> StageOutput {
        StageOutput::FinalDraft(response.to_string())
    }
}
