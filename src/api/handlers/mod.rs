use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExploreError;
use crate::models::*;
use crate::render::render_tree;
use crate::session::{Explorer, SessionState};

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a status code, passing its message through.
fn explore_error(e: ExploreError) -> (StatusCode, String) {
    let status = match &e {
        ExploreError::Busy => StatusCode::CONFLICT,
        ExploreError::NotFound(_) => StatusCode::NOT_FOUND,
        ExploreError::OfflineBlocked => StatusCode::SERVICE_UNAVAILABLE,
        ExploreError::ImportMalformed(_) => StatusCode::BAD_REQUEST,
        ExploreError::IdentificationFailed(_)
        | ExploreError::AnalysisFailed(_)
        | ExploreError::SynthesisUnavailable
        | ExploreError::ScanUnavailable => StatusCode::BAD_GATEWAY,
        ExploreError::PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::warn!("Request rejected: {}", e);
    }
    (status, e.to_string())
}

// ============================================================
// Request / Response Types
// ============================================================

/// Body of `POST /explore`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExploreInput {
    pub query: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Photo to identify, as a `data:<mime>;base64,...` URL.
    #[serde(default)]
    pub reference_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(explorer): State<Explorer>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "offline": explorer.is_offline(),
    }))
}

// ============================================================
// Session
// ============================================================

pub async fn get_session(State(explorer): State<Explorer>) -> Json<SessionState> {
    Json(explorer.snapshot())
}

pub async fn get_status(State(explorer): State<Explorer>) -> Json<GenerationStatus> {
    Json(explorer.status())
}

pub async fn explore(
    State(explorer): State<Explorer>,
    Json(input): Json<ExploreInput>,
) -> Result<Json<Item>, (StatusCode, String)> {
    let reference_image = match input.reference_image {
        Some(url) => Some(Image::from_data_url(url).ok_or((
            StatusCode::BAD_REQUEST,
            "reference_image must be a base64 data URL".to_string(),
        ))?),
        None => None,
    };

    explorer
        .explore(&input.query, input.parent_id, reference_image)
        .await
        .map(Json)
        .map_err(explore_error)
}

pub async fn navigate(
    State(explorer): State<Explorer>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, (StatusCode, String)> {
    explorer.navigate_to(id).map(Json).map_err(explore_error)
}

pub async fn reset(State(explorer): State<Explorer>) -> StatusCode {
    explorer.reset();
    StatusCode::NO_CONTENT
}

// ============================================================
// Collection
// ============================================================

pub async fn list_explorations(State(explorer): State<Explorer>) -> Json<Vec<ExplorationSummary>> {
    Json(
        explorer
            .collection()
            .iter()
            .map(ExplorationSummary::from)
            .collect(),
    )
}

pub async fn load_exploration(
    State(explorer): State<Explorer>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, (StatusCode, String)> {
    explorer.open_exploration(id).map(Json).map_err(explore_error)
}

pub async fn delete_exploration(
    State(explorer): State<Explorer>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if explorer.remove_exploration(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Exploration not found".to_string()))
    }
}

pub async fn exploration_tree(
    State(explorer): State<Explorer>,
    Path(id): Path<Uuid>,
) -> Result<String, (StatusCode, String)> {
    let root = explorer
        .collection()
        .into_iter()
        .find(|root| root.id == id)
        .ok_or((StatusCode::NOT_FOUND, "Exploration not found".to_string()))?;
    let current = explorer.current_item().map(|item| item.id);
    Ok(render_tree(&[root], current))
}

pub async fn export_all(State(explorer): State<Explorer>) -> Json<Vec<Item>> {
    Json(explorer.export_all())
}

pub async fn import_all(
    State(explorer): State<Explorer>,
    body: String,
) -> Result<Json<ImportResult>, (StatusCode, String)> {
    explorer
        .import_json(&body)
        .await
        .map(|imported| Json(ImportResult { imported }))
        .map_err(explore_error)
}
