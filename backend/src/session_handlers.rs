// Handlers for live navigation sessions. Each session runs on its own task;
// these only forward inputs and read published snapshots.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{SessionInput, SessionSnapshot};
use uuid::Uuid;

use crate::error::ExportError;
use crate::gpx_export::encode_path_as_gpx;
use crate::handlers::{api_error, ApiResult};
use crate::models::{CreateSessionRequest, CreateSessionResponse, GpxResponse};
use crate::runtime::{spawn_session, SessionHandle};
use crate::AppState;

async fn lookup(state: &AppState, id: Uuid) -> Result<SessionHandle, (StatusCode, Json<shared::ApiError>)> {
    state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session {id} not found")))
}

/// POST /api/sessions - Start navigating a planned route
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), (StatusCode, Json<shared::ApiError>)> {
    let id = Uuid::new_v4();
    let handle = spawn_session(req.route, req.destination, state.session_services());
    let snapshot = handle.snapshot();
    state.sessions.insert(id, handle).await;

    tracing::info!("session {id} started");
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { id, snapshot })))
}

/// GET /api/sessions/:id - Latest published state
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(lookup(&state, id).await?.snapshot()))
}

/// POST /api/sessions/:id/events - Location, viewport or navigation toggle
pub async fn post_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SessionInput>,
) -> Result<StatusCode, (StatusCode, Json<shared::ApiError>)> {
    lookup(&state, id)
        .await?
        .send(input)
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|err| api_error(StatusCode::GONE, err.to_string()))
}

/// GET /api/sessions/:id/gpx - Precise path as base64 GPX
pub async fn export_gpx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<GpxResponse> {
    let snapshot = lookup(&state, id).await?.snapshot();
    let name = snapshot
        .active_route
        .as_ref()
        .map_or("greenpath", |route| route.name.as_str());

    encode_path_as_gpx(name, &snapshot.path)
        .map(|gpx_base64| Json(GpxResponse { gpx_base64 }))
        .map_err(|err| match err {
            ExportError::EmptyPath => api_error(StatusCode::NOT_FOUND, "No route drawn yet"),
            other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })
}

/// DELETE /api/sessions/:id - Back to the home screen
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<shared::ApiError>)> {
    let handle = state
        .sessions
        .remove(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session {id} not found")))?;
    // Already stopped is fine: the end state is the same.
    let _ = handle.end();

    tracing::info!("session {id} ended");
    Ok(StatusCode::NO_CONTENT)
}
