use super::Stage;
use crate::state::{Question, SessionState, StageKind, StageOutput};

const TECHNICAL_PERSONA: &str = "You are a technical interviewer reviewing application essays. \
Judge the applicant's technical competence and job fit as described in the answer, and verify \
technical claims against the reference material when it is provided.";

const CULTURE_PERSONA: &str = "You are a hiring manager reviewing application essays for \
cultural fit. Judge how well the applicant's values and working style match the organisation, \
and check claims about the company against the reference material when it is provided.";

const NO_CONTEXT: &str = "No verification material available.";

const RESPONSE_FORMAT: &str = r#"Respond in the following format:
1. Summary: two or three sentences on the overall impression
2. Scores: each criterion above scored from 1 to 5 with a one-line justification
3. Verification: which claims the reference material supports, contradicts or cannot confirm
4. Improvements: concrete edits that would strengthen the answer"#;

fn context_or_placeholder(context: &str) -> &str {
    if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    }
}

/// Scores the draft for technical depth and role fit
pub struct TechnicalEvaluatorStage;

impl Stage for TechnicalEvaluatorStage {
    fn kind(&self) -> StageKind {
        StageKind::TechnicalEvaluator
    }

    fn persona(&self) -> &'static str {
        TECHNICAL_PERSONA
    }

    fn build_prompt(&self, state: &SessionState, question: &Question, context: &str) -> String {
        let posting = state.posting();
        format!(
            r#"Evaluate the technical content of the following essay answer.

[Question]
{prompt}

[Answer]
{draft}

[Position]
Position: {role}
Requirements: {requirements}

[Reference material]
{context}

Evaluation criteria:
1. Technical accuracy: are the technical statements correct and verifiable
2. Depth: does the answer show real understanding rather than buzzwords
3. Role fit: how well the described skills match the requirements
4. Evidence: are the experiences backed by concrete results and numbers
5. Problem solving: does the answer show how the applicant approaches hard problems

{format}"#,
            prompt = question.prompt_text,
            draft = state.current_draft().unwrap_or_default(),
            role = posting.target_role,
            requirements = posting.requirements,
            context = context_or_placeholder(context),
            format = RESPONSE_FORMAT,
        )
    }

    fn output(&self, response: &str) -> StageOutput {
        StageOutput::TechnicalFeedback(response.to_string())
    }
}

/// Scores the draft for fit with the organisation's values
pub struct CultureEvaluatorStage;

impl Stage for CultureEvaluatorStage {
    fn kind(&self) -> StageKind {
        StageKind::CultureEvaluator
    }

    fn persona(&self) -> &'static str {
        CULTURE_PERSONA
    }

    fn build_prompt(&self, state: &SessionState, question: &Question, context: &str) -> String {
        let posting = state.posting();
        format!(
            r#"Evaluate the cultural fit shown in the following essay answer.

[Question]
{prompt}

[Answer]
{draft}

[Organization]
Organization: {organization}
Company values: {values}

[Reference material]
{context}

Evaluation criteria:
1. Values alignment: does the answer reflect the company's stated values
2. Motivation: is the reason for applying specific to this organisation
3. Collaboration: how the applicant works with others
4. Growth: does the applicant show a willingness to learn and develop
5. Authenticity: does the answer read as sincere and consistent

{format}"#,
            prompt = question.prompt_text,
            draft = state.current_draft().unwrap_or_default(),
            organization = posting.organization,
            values = posting.values_or_default(),
            context = context_or_placeholder(context),
            format = RESPONSE_FORMAT,
        )
    }

    fn output(&self, response: &str) -> StageOutput {
        StageOutput::CultureFeedback(response.to_string())
    }
}
