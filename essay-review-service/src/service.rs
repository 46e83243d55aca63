use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use stage_graph::{GraphError, Session, SessionStorage};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ReviewError, ValidationError},
    models::{ResumeRequest, ResumeResponse, StatusResponse},
    workflow::{GRAPH_ID, ReviewOutcome, ReviewWorkflow},
};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub workflow: ReviewWorkflow,
    pub session_storage: Arc<dyn SessionStorage<ReviewOutcome>>,
}

/// Error body returned by every endpoint: `{"error": ..., "details": ...}`
#[derive(Debug)]
pub enum ApiError {
    MalformedBody(JsonRejection),
    Validation(ValidationError),
    SessionNotFound(String),
    Review { session_id: String, source: ReviewError },
    Storage(GraphError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MalformedBody(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request", "details": rejection.body_text() }),
            ),
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request", "details": e.to_string() }),
            ),
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Session not found", "details": id }),
            ),
            ApiError::Review { session_id, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Essay review failed",
                    "details": source.to_string(),
                    "session_id": session_id
                }),
            ),
            ApiError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Session storage failed", "details": e.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(state: AppState) -> Router {
    let resume = Router::new()
        .route("/create", post(create_resume))
        .route("/status/{session_id}", get(get_status));

    Router::new()
        .route("/health", get(health_check))
        .nest("/resume/api/v1/resume", resume)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Tag every request with a correlation id, on the request span and the response headers
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_resume(
    State(state): State<AppState>,
    payload: Result<Json<ResumeRequest>, JsonRejection>,
) -> ApiResult<ResumeResponse> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Unreadable essay request");
        ApiError::MalformedBody(rejection)
    })?;
    let session_state = request.into_session().map_err(|e| {
        warn!(error = %e, "Rejected essay request");
        ApiError::Validation(e)
    })?;

    let session_id = Uuid::new_v4().to_string();
    info!(
        session_id = %session_id,
        organization = %session_state.posting().organization,
        questions = session_state.questions().len(),
        "Starting essay review"
    );

    let session = Session::started(session_id.clone(), GRAPH_ID);
    save_session(&state, session.clone()).await?;

    match state.workflow.review_all(&session_state).await {
        Ok(outcome) => {
            save_session(&state, session.complete(outcome.clone())).await?;
            info!(
                session_id = %session_id,
                final_drafts = outcome.final_drafts.len(),
                "Essay review completed"
            );
            Ok(Json(ResumeResponse {
                session_id,
                outcome,
            }))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Essay review failed");
            save_session(&state, session.fail(e.to_string())).await?;
            Err(ApiError::Review {
                session_id,
                source: e,
            })
        }
    }
}

async fn save_session(state: &AppState, session: Session<ReviewOutcome>) -> Result<(), ApiError> {
    let session_id = session.id.clone();
    state.session_storage.save(session).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to save session");
        ApiError::Storage(e)
    })
}

async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusResponse> {
    match state.session_storage.get(&session_id).await {
        Ok(Some(session)) => Ok(Json(StatusResponse {
            session_id: session.id,
            status: session.status.as_str().to_string(),
            result: session.result,
            error: session.error,
        })),
        Ok(None) => Err(ApiError::SessionNotFound(session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(ApiError::Storage(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        stages::StageDeps,
        state::StageKind,
        testing::{RecordingRetriever, ScriptedModel},
    };
    use axum::body::{Body, to_bytes};
    use stage_graph::InMemorySessionStorage;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(model: ScriptedModel) -> Router {
        let deps = StageDeps {
            model: Arc::new(model),
            retriever: Arc::new(RecordingRetriever::empty()),
            retrieval_depth: 2,
            llm_timeout: Duration::from_secs(5),
            retrieval_timeout: Duration::from_secs(5),
        };
        build_router(AppState {
            workflow: ReviewWorkflow::new(deps).unwrap(),
            session_storage: Arc::new(InMemorySessionStorage::<ReviewOutcome>::new()),
        })
    }

    fn request_body(questions: Value) -> Value {
        json!({
            "organization": "Acme Robotics",
            "position": "Backend Engineer",
            "requirements": "Rust, distributed systems",
            "description": "Own the fleet telemetry pipeline",
            "company_values": "Ownership, candor",
            "user_profile": {
                "education": "BSc Computer Science",
                "experience": "3 years at a logistics startup",
                "skills": "Rust, Kafka",
                "certificates": "AWS SAA",
                "projects": "Open-source tracing exporter",
                "achievements": "Cut p99 latency by 40%"
            },
            "questions": questions
        })
    }

    fn create(body: &Value) -> Request<Body> {
        Request::post("/resume/api/v1/resume/create")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = app(ScriptedModel::classifying("{}"));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(CORRELATION_HEADER));
    }

    #[tokio::test]
    async fn create_runs_every_question_and_records_the_session() {
        let app = app(ScriptedModel::classifying(r#"{"evaluation_type": "both"}"#));
        let body = request_body(json!([
            { "question_id": 1, "content": "Why us?", "max_length": 500, "min_length": 200, "category": "motivation" },
            { "question_id": 2, "content": "Hardest bug?", "max_length": 800, "min_length": 0, "category": "" }
        ]));

        let (status, value) = send(&app, create(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["evaluation_types"]["1"], "both");
        assert!(value["final_drafts"]["1"].is_string());
        assert!(value["final_drafts"]["2"].is_string());
        assert!(value["technical_feedbacks"]["2"].is_string());
        assert_eq!(value["messages"].as_array().unwrap().len(), 10);

        let session_id = value["session_id"].as_str().unwrap();
        let (status, value) = send(
            &app,
            Request::get(format!("/resume/api/v1/resume/status/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "completed");
        assert!(value["result"]["final_drafts"]["1"].is_string());
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_any_model_call() {
        let app = app(ScriptedModel::classifying("{}"));

        let (status, value) = send(&app, create(&request_body(json!([])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Invalid request");
        assert_eq!(value["details"], "at least one question is required");

        let duplicate = request_body(json!([
            { "question_id": 1, "content": "a", "max_length": 10 },
            { "question_id": 1, "content": "b", "max_length": 10 }
        ]));
        let (status, _) = send(&app, create(&duplicate)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreadable_bodies_get_the_same_error_shape() {
        let app = app(ScriptedModel::classifying("{}"));

        let mut missing_organization = request_body(json!([
            { "question_id": 1, "content": "Why us?", "max_length": 500 }
        ]));
        missing_organization
            .as_object_mut()
            .unwrap()
            .remove("organization");
        let (status, value) = send(&app, create(&missing_organization)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Invalid request");
        assert!(value["details"].as_str().unwrap().contains("organization"));

        let negative_length = request_body(json!([
            { "question_id": 1, "content": "Why us?", "max_length": -5 }
        ]));
        let (status, value) = send(&app, create(&negative_length)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Invalid request");

        let not_json = Request::post("/resume/api/v1/resume/create")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, value) = send(&app, not_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["details"].is_string());
    }

    #[tokio::test]
    async fn model_failure_is_a_server_error_and_marks_the_session_failed() {
        let app = app(
            ScriptedModel::classifying(r#"{"evaluation_type": "technical"}"#)
                .failing_at(StageKind::FinalReviewer),
        );
        let body = request_body(json!([
            { "question_id": 1, "content": "Why us?", "max_length": 500, "min_length": 200, "category": "motivation" }
        ]));

        let (status, value) = send(&app, create(&body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], "Essay review failed");
        assert!(value.get("final_drafts").is_none());
        assert!(
            value["details"]
                .as_str()
                .unwrap()
                .contains("FINAL model call failed")
        );

        let session_id = value["session_id"].as_str().unwrap();
        let (status, value) = send(
            &app,
            Request::get(format!("/resume/api/v1/resume/status/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "failed");
        assert!(value.get("result").is_none());
        assert!(value["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_sessions_are_not_found() {
        let app = app(ScriptedModel::classifying("{}"));
        let (status, value) = send(
            &app,
            Request::get("/resume/api/v1/resume/status/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["details"], "missing");
    }
}
