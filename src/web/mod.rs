// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! JSON and WebSocket control surface
//!
//! Exposes the analysis pipeline, the organizer and the auto-classifier over
//! HTTP. A WebSocket client on `/ws` becomes the observer of both the
//! pipeline and the classifier; connecting a new one replaces the old one.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisPipeline, AnalysisState, StartRequest};
use crate::catalog::{count_tree, extract_folders, flatten_entries, is_unclassified, Entry, Folder, TreeCounts};
use crate::classify::{AutoClassifier, ClassifyEvent};
use crate::config::ConfigSource;
use crate::oracle::{CategoryPlanItem, ConnectionStatus, OracleFactory};
use crate::organize::{self, CleanupReport, DedupeReport, OrganizeReport};
use crate::suggestion::{Suggestion, SuggestionStatus};
use crate::tree::{CreateDetails, TreeNode, TreeStore};
use crate::{MarksortError, Result};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn TreeStore>,
    pub config: Arc<dyn ConfigSource>,
    pub oracles: Arc<dyn OracleFactory>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub classifier: Arc<AutoClassifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn TreeStore>, config: Arc<dyn ConfigSource>, oracles: Arc<dyn OracleFactory>) -> Self {
        let pipeline = Arc::new(AnalysisPipeline::new(Arc::clone(&config), Arc::clone(&oracles)));
        let classifier = Arc::new(AutoClassifier::new(
            Arc::clone(&store),
            Arc::clone(&config),
            Arc::clone(&oracles),
        ));
        Self {
            store,
            config,
            oracles,
            pipeline,
            classifier,
        }
    }
}

/// Create the control router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tree
        .route("/api/tree", get(api_get_tree))
        .route("/api/tree/entries", post(api_create_entry))
        .route("/api/entries", get(api_get_entries))
        .route("/api/folders", get(api_get_folders))
        .route("/api/stats", get(api_get_stats))
        // Analysis
        .route("/api/analysis", get(api_get_analysis))
        .route("/api/analysis/start", post(api_start_analysis))
        .route("/api/analysis/stop", post(api_stop_analysis))
        .route("/api/analysis/reset", post(api_reset_analysis))
        .route("/api/analysis/suggestions/:entry_id", post(api_set_status))
        .route("/api/plan", post(api_plan_categories))
        // Reconciliation
        .route("/api/organize", post(api_organize))
        .route("/api/dedupe", post(api_dedupe))
        .route("/api/cleanup", post(api_cleanup))
        // Auto-classify
        .route("/api/classify/accept", post(api_accept_classification))
        .route("/api/connection/test", post(api_test_connection))
        .route("/ws", get(ws_observer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error body returned by every handler
pub struct ApiError(MarksortError);

impl From<MarksortError> for ApiError {
    fn from(e: MarksortError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MarksortError::ConfigMissing(_) | MarksortError::Config(_) => StatusCode::BAD_REQUEST,
            MarksortError::Oracle(_) | MarksortError::Api(_) => StatusCode::BAD_GATEWAY,
            MarksortError::EntityVanished(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.user_message() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// === Tree ===

async fn api_get_tree(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TreeNode>> {
    Ok(Json(state.store.get_tree().await?))
}

async fn api_create_entry(
    State(state): State<Arc<AppState>>,
    Json(details): Json<CreateDetails>,
) -> ApiResult<TreeNode> {
    Ok(Json(state.store.create(details).await?))
}

async fn api_get_entries(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Entry>> {
    Ok(Json(flatten_entries(&state.store.get_tree().await?)))
}

async fn api_get_folders(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Folder>> {
    Ok(Json(extract_folders(&state.store.get_tree().await?)))
}

async fn api_get_stats(State(state): State<Arc<AppState>>) -> ApiResult<TreeCounts> {
    Ok(Json(count_tree(&state.store.get_tree().await?)))
}

// === Analysis ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    /// Defaults to every entry in the tree
    #[serde(default)]
    entries: Option<Vec<Entry>>,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    confirmed_categories: Option<Vec<String>>,
    /// Only entries sitting directly in a root folder
    #[serde(default)]
    unclassified_only: bool,
}

async fn api_get_analysis(State(state): State<Arc<AppState>>) -> Json<AnalysisState> {
    Json(state.pipeline.snapshot())
}

async fn api_start_analysis(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartBody>>,
) -> std::result::Result<(StatusCode, Json<AnalysisState>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let tree = state.store.get_tree().await?;
    let mut entries = body.entries.unwrap_or_else(|| flatten_entries(&tree));
    if body.unclassified_only {
        entries.retain(is_unclassified);
    }
    let request = StartRequest {
        entries,
        folders: extract_folders(&tree),
        batch_size: body.batch_size,
        confirmed_categories: body.confirmed_categories,
    };

    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        let outcome = pipeline.start(request).await;
        debug!("Analysis run ended: {:?}", outcome);
    });
    Ok((StatusCode::ACCEPTED, Json(state.pipeline.snapshot())))
}

async fn api_stop_analysis(State(state): State<Arc<AppState>>) -> StatusCode {
    state.pipeline.stop();
    StatusCode::NO_CONTENT
}

async fn api_reset_analysis(State(state): State<Arc<AppState>>) -> Json<AnalysisState> {
    state.pipeline.reset();
    Json(state.pipeline.snapshot())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: SuggestionStatus,
    #[serde(default)]
    folder_path: Option<String>,
}

async fn api_set_status(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> std::result::Result<Json<AnalysisState>, StatusCode> {
    if state
        .pipeline
        .set_status(&entry_id, body.status, body.folder_path.as_deref())
    {
        Ok(Json(state.pipeline.snapshot()))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn api_plan_categories(State(state): State<Arc<AppState>>) -> ApiResult<Vec<CategoryPlanItem>> {
    let tree = state.store.get_tree().await?;
    let plan = state
        .pipeline
        .plan_categories(&flatten_entries(&tree), &extract_folders(&tree))
        .await?;
    Ok(Json(plan))
}

// === Reconciliation ===

#[derive(Debug, Default, Deserialize)]
struct OrganizeBody {
    /// Defaults to the suggestions held by the pipeline
    #[serde(default)]
    suggestions: Option<Vec<Suggestion>>,
}

async fn api_organize(
    State(state): State<Arc<AppState>>,
    body: Option<Json<OrganizeBody>>,
) -> ApiResult<OrganizeReport> {
    let suggestions = body
        .and_then(|Json(b)| b.suggestions)
        .unwrap_or_else(|| state.pipeline.snapshot().suggestions);
    Ok(Json(organize::execute_organize(state.store.as_ref(), &suggestions).await?))
}

async fn api_dedupe(State(state): State<Arc<AppState>>) -> ApiResult<DedupeReport> {
    Ok(Json(organize::deduplicate_folders(state.store.as_ref()).await?))
}

async fn api_cleanup(State(state): State<Arc<AppState>>) -> ApiResult<CleanupReport> {
    Ok(Json(organize::cleanup_empty_folders(state.store.as_ref()).await?))
}

// === Auto-classify ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptBody {
    entry_id: String,
    folder_path: String,
}

#[derive(Debug, Serialize)]
struct AcceptResponse {
    moved: bool,
}

async fn api_accept_classification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AcceptBody>,
) -> Json<AcceptResponse> {
    let moved = state.classifier.accept(&body.entry_id, &body.folder_path).await;
    Json(AcceptResponse { moved })
}

async fn api_test_connection(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    let config = state.config.snapshot().unwrap_or_default();
    let status = match state.oracles.build(&config) {
        Ok(oracle) => oracle.test_connection().await,
        Err(e) => ConnectionStatus {
            ok: false,
            message: e.user_message(),
        },
    };
    Json(status)
}

// === Observer socket ===

/// Messages pushed to the WebSocket observer
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
enum Outbound {
    AnalysisProgress(AnalysisState),
    Classify(ClassifyEvent),
}

async fn ws_observer(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observe(socket, state))
}

async fn observe(socket: WebSocket, state: Arc<AppState>) {
    info!("Observer connected");
    let mut progress = state.pipeline.attach();
    let mut classify = state.classifier.attach();
    let (mut sink, mut stream) = socket.split();

    // A late observer starts from the current snapshot
    let mut next = Some(Outbound::AnalysisProgress(state.pipeline.snapshot()));
    loop {
        if let Some(message) = next.take() {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Could not encode observer message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        next = tokio::select! {
            Some(s) = progress.recv() => Some(Outbound::AnalysisProgress(s)),
            Some(e) = classify.recv() => Some(Outbound::Classify(e)),
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => None,
            },
            else => break,
        };
    }
    info!("Observer disconnected");
}

/// Serve the control surface until the process is stopped
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Control API available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| MarksortError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
