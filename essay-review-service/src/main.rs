use essay_review_service::{
    AppState, LogFormat, ReviewOutcome, ReviewWorkflow, Settings, build_router,
    llm::{ChatModel, OpenRouterChatModel},
    retrieval::{Embedder, WebRetriever},
    stages::StageDeps,
};
use stage_graph::{InMemorySessionStorage, PostgresSessionStorage, SessionStorage};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "essay_review_service=debug,stage_graph=debug,tower_http=debug".into()
    });

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

async fn session_storage(settings: &Settings) -> Arc<dyn SessionStorage<ReviewOutcome>> {
    let Some(database_url) = &settings.database_url else {
        info!("Using in-memory session storage (set DATABASE_URL to use PostgreSQL)");
        return Arc::new(InMemorySessionStorage::<ReviewOutcome>::new());
    };

    info!("Using PostgreSQL session storage");
    match PostgresSessionStorage::<ReviewOutcome>::connect(database_url).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!(
                error = %e,
                "Failed to connect to PostgreSQL, falling back to in-memory storage"
            );
            Arc::new(InMemorySessionStorage::<ReviewOutcome>::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    init_tracing(settings.log_format);
    info!(settings = ?settings, "Configuration loaded");

    let model: Arc<dyn ChatModel> = Arc::new(OpenRouterChatModel::new(&settings));
    let retriever = Arc::new(WebRetriever::new(model.clone(), Embedder::new())?);

    let workflow = ReviewWorkflow::new(StageDeps {
        model,
        retriever,
        retrieval_depth: settings.retrieval_depth,
        llm_timeout: settings.llm_timeout,
        retrieval_timeout: settings.retrieval_timeout,
    })?;

    let app = build_router(AppState {
        workflow,
        session_storage: session_storage(&settings).await,
    });

    let listener = TcpListener::bind(("0.0.0.0", settings.port)).await?;
    let addr = listener.local_addr()?;
    info!("Essay review service listening on http://{}", addr);
    info!("Create endpoint: POST http://{}/resume/api/v1/resume/create", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
