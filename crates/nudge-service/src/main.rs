use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::Parser;
use nudge::{
    session::{Session, SessionId, SortDecision, SqliteSessionStore},
    vision::{OpenAiVision, VisionError},
    Nudge, NudgeError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind the service to
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
    /// SQLite database path (use `:memory:` for an ephemeral store)
    #[arg(long, default_value = "nudge.db")]
    db: String,
    /// API key for the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Vision-capable model to use
    #[arg(long, default_value = "gpt-4o")]
    model: String,
    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = "https://api.openai.com/v1/")]
    base_url: Url,
    /// Per-request timeout for model calls, in seconds
    #[arg(long, default_value_t = 120)]
    timeout_seconds: u64,
}

#[derive(Clone)]
struct ServerState {
    app: Arc<Nudge>,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    name: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeSpaceRequest {
    session_id: String,
    image_base64: String,
}

#[derive(Deserialize)]
struct GenerateTasksRequest {
    session_id: String,
}

#[derive(Deserialize)]
struct IdentifyItemsRequest {
    session_id: String,
    image_base64: String,
}

#[derive(Deserialize)]
struct TaskUpdateRequest {
    completed: bool,
}

#[derive(Deserialize)]
struct ItemSortRequest {
    decision: String,
}

/// Maps the core error taxonomy onto HTTP status codes with a structured
/// JSON body.
#[derive(Debug)]
struct ApiError(NudgeError);

impl From<NudgeError> for ApiError {
    fn from(err: NudgeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NudgeError::SessionNotFound(_)
            | NudgeError::TaskNotFound(_)
            | NudgeError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            NudgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            NudgeError::Vision(VisionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            NudgeError::Vision(_) => StatusCode::BAD_GATEWAY,
            NudgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(NudgeError::InvalidRequest(message.into()))
}

fn decode_image(image_base64: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(image_base64.as_bytes())
        .map_err(|e| bad_request(format!("invalid base64 image payload: {e}")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nudge_service=info,nudge=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    info!(
        addr = %args.addr,
        db = %args.db,
        model = %args.model,
        base_url = %args.base_url,
        "starting service"
    );

    let store = SqliteSessionStore::connect(&args.db).await?;
    let vision = OpenAiVision::new(args.api_key, args.model)
        .with_base_url(args.base_url)
        .with_timeout(Duration::from_secs(args.timeout_seconds));

    let state = ServerState {
        app: Arc::new(Nudge::new(Arc::new(store), Arc::new(vision))),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/analyze-space", post(analyze_space))
        .route("/generate-tasks", post(generate_tasks))
        .route("/sessions/:id/tasks/:task_id", put(update_task))
        .route("/identify-items", post(identify_items))
        .route("/sessions/:id/items/:item_id", put(sort_item))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "nudge" }))
}

async fn create_session(
    State(state): State<ServerState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.app.create_session(req.name).await?;
    Ok(Json(session))
}

async fn get_session(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.app.get_session(&SessionId::from_str(&id)).await?;
    Ok(Json(session))
}

async fn analyze_space(
    State(state): State<ServerState>,
    Json(req): Json<AnalyzeSpaceRequest>,
) -> Result<Json<Session>, ApiError> {
    let image = decode_image(&req.image_base64)?;
    let session = state
        .app
        .analyze_space(&SessionId::from_str(&req.session_id), &image)
        .await?;
    Ok(Json(session))
}

async fn generate_tasks(
    State(state): State<ServerState>,
    Json(req): Json<GenerateTasksRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .app
        .generate_tasks(&SessionId::from_str(&req.session_id))
        .await?;
    Ok(Json(session))
}

async fn update_task(
    State(state): State<ServerState>,
    Path((id, task_id)): Path<(String, String)>,
    Json(req): Json<TaskUpdateRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .app
        .set_task_completion(&SessionId::from_str(&id), &task_id, req.completed)
        .await?;
    Ok(Json(session))
}

async fn identify_items(
    State(state): State<ServerState>,
    Json(req): Json<IdentifyItemsRequest>,
) -> Result<Json<Session>, ApiError> {
    let image = decode_image(&req.image_base64)?;
    let session = state
        .app
        .identify_items(&SessionId::from_str(&req.session_id), &image)
        .await?;
    Ok(Json(session))
}

async fn sort_item(
    State(state): State<ServerState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(req): Json<ItemSortRequest>,
) -> Result<Json<Session>, ApiError> {
    // Validated before the session lookup: an invalid value is a client
    // error regardless of whether the session exists.
    let decision: SortDecision = req
        .decision
        .parse()
        .map_err(|_| bad_request("decision must be keep, sell, or donate"))?;
    let session = state
        .app
        .set_item_decision(&SessionId::from_str(&id), &item_id, decision)
        .await?;
    Ok(Json(session))
}
