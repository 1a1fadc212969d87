use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use policy_rag_core::{
    AnswerPipeline, AnswerRecord, GeminiEmbedder, GeminiGenerator, PineconeStore,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub type Pipeline = AnswerPipeline<GeminiEmbedder, PineconeStore, GeminiGenerator>;

/// Handle to the pipeline, created once at startup and shared across all
/// concurrent requests.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    documents: String,
    questions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    answers: Vec<AnswerRecord>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

pub async fn serve(bind: &str, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router(pipeline))
        .await
        .context("server shutdown")?;
    Ok(())
}

fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/run", post(run_handler))
        .with_state(AppState { pipeline })
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// The index must be pre-populated via the `ingest` subcommand; the
/// document reference is logged only, so query latency never includes
/// ingestion cost. Generation failures surface as degraded answer
/// content, not as error statuses.
async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, Json<ErrorBody>)> {
    if request.questions.is_empty() {
        return Err(bad_request("questions must not be empty"));
    }

    info!(
        document = %request.documents,
        questions = request.questions.len(),
        "received submission"
    );

    let answers = state.pipeline.answer_all(&request.questions).await;
    Ok(Json(RunResponse { answers }))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}
