use serde::Deserialize;
use tracing::{info, warn};

use super::Stage;
use crate::{
    error::ClassificationParseError,
    state::{EvaluationType, Question, SessionState, StageKind, StageOutput},
};

const PERSONA: &str = "You analyse application essays to decide which kind of review they need. \
Answer technical when technical content dominates, culture when cultural or personal content \
dominates, and both when both need serious evaluation.";

#[derive(Deserialize)]
struct ClassificationResponse {
    evaluation_type: String,
}

/// Decides which evaluators review the draft
pub struct AnalyzerStage;

impl Stage for AnalyzerStage {
    fn kind(&self) -> StageKind {
        StageKind::Analyzer
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn uses_context(&self) -> bool {
        false
    }

    fn build_prompt(&self, state: &SessionState, question: &Question, _context: &str) -> String {
        let posting = state.posting();
        format!(
            r#"Analyse the following essay answer and decide which type of evaluation it needs.

[Question]
{prompt}

[Answer]
{draft}

[Position]
Organization: {organization}
Position: {role}
Requirements: {requirements}

Choose exactly one evaluation type:
- technical: the answer mainly needs its technical competence evaluated
- culture: the answer mainly needs its cultural fit evaluated
- both: technical competence and cultural fit both matter

Respond only with JSON of the form:
{{"evaluation_type": "technical|culture|both", "reason": "why this type was chosen"}}"#,
            prompt = question.prompt_text,
            draft = state.current_draft().unwrap_or_default(),
            organization = posting.organization,
            role = posting.target_role,
            requirements = posting.requirements,
        )
    }

    fn output(&self, response: &str) -> StageOutput {
        let evaluation_type = match parse_classification(response) {
            Ok(kind) => {
                info!(evaluation_type = %kind, "Draft classified");
                kind
            }
            Err(e) => {
                warn!(error = %e, "Could not parse classification, routing to both evaluators");
                EvaluationType::Both
            }
        };
        StageOutput::Classification(evaluation_type)
    }
}

/// Read `{"evaluation_type": ...}` from a model response, tolerating code fences and
/// surrounding prose
pub fn parse_classification(response: &str) -> Result<EvaluationType, ClassificationParseError> {
    let trimmed = response.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let parsed = serde_json::from_str::<ClassificationResponse>(unfenced).or_else(|first_err| {
        match (unfenced.find('{'), unfenced.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<ClassificationResponse>(&unfenced[start..=end])
            }
            _ => Err(first_err),
        }
    });
    let parsed = parsed.map_err(|e| ClassificationParseError::Malformed(e.to_string()))?;

    match parsed.evaluation_type.trim().to_ascii_lowercase().as_str() {
        "technical" => Ok(EvaluationType::Technical),
        "culture" => Ok(EvaluationType::Culture),
        "both" => Ok(EvaluationType::Both),
        _ => Err(ClassificationParseError::UnknownType(parsed.evaluation_type)),
    }
}
