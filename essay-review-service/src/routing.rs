//! Branch decisions of the review graph. Both decisions depend only on the evaluation type
//! the analyzer recorded for the question being processed.

use crate::state::{EvaluationType, SessionState, StageKind};

/// Where the run goes once the analyzer has classified the draft
pub fn route_after_analysis(evaluation_type: EvaluationType) -> StageKind {
    match evaluation_type {
        EvaluationType::Technical | EvaluationType::Both => StageKind::TechnicalEvaluator,
        EvaluationType::Culture => StageKind::CultureEvaluator,
    }
}

/// Where the run goes once the technical evaluator is done
pub fn route_after_technical(evaluation_type: EvaluationType) -> StageKind {
    match evaluation_type {
        EvaluationType::Both => StageKind::CultureEvaluator,
        EvaluationType::Technical | EvaluationType::Culture => StageKind::FinalReviewer,
    }
}

// A missing classification is read as `both`, the same fallback the analyzer applies.
fn evaluation_type_of(state: &SessionState) -> EvaluationType {
    state
        .current_evaluation_type()
        .unwrap_or(EvaluationType::Both)
}

pub(crate) fn needs_technical_review(state: &SessionState) -> bool {
    route_after_analysis(evaluation_type_of(state)) == StageKind::TechnicalEvaluator
}

pub(crate) fn needs_culture_review(state: &SessionState) -> bool {
    route_after_technical(evaluation_type_of(state)) == StageKind::CultureEvaluator
}
