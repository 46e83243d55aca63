pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod routing;
pub mod service;
pub mod stages;
pub mod state;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::{LogFormat, Settings};
pub use error::{ReviewError, ValidationError};
pub use service::{AppState, build_router};
pub use state::{EvaluationType, SessionState, StageKind};
pub use workflow::{ReviewOutcome, ReviewWorkflow, build_review_graph};
