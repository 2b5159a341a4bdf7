//! Session and participant directory handlers
//!
//! Collaborator glue: just enough session and directory surface for scans
//! and finalization to resolve ownership and identities.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use serde::Deserialize;

use crate::{get_identity, AppError, AppState, SuccessResponse};
use tally_core::models::{ParticipantInfo, Session};
use tally_core::Error;

/// Request body for creating a session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub group_id: Option<String>,
}

/// POST /api/sessions - Create a session owned by the caller
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Session>, AppError> {
    let identity = get_identity(request.headers());

    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateSessionRequest = if bytes.is_empty() {
        CreateSessionRequest { group_id: None }
    } else {
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?
    };

    let session_id = state
        .db
        .create_session(&identity.id, req.group_id.as_deref())?;
    let session = state
        .db
        .get_session(session_id)?
        .ok_or_else(|| AppError::internal("Session not found after creation"))?;

    Ok(Json(session))
}

/// GET /api/sessions/:id - Get a session (owner only)
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Session>, AppError> {
    let identity = get_identity(request.headers());

    let session = state
        .db
        .get_session(id)?
        .ok_or_else(|| AppError::not_found("Session not found"))?;

    if session.creator_id != identity.id {
        return Err(Error::Forbidden("not the session owner".into()).into());
    }

    Ok(Json(session))
}

/// Request body for registering a participant directory entry
#[derive(Debug, Deserialize)]
pub struct RegisterParticipantRequest {
    pub unique_id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// POST /api/participants - Register or update a directory entry
pub async fn register_participant(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: RegisterParticipantRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    if req.unique_id.trim().is_empty() || req.username.trim().is_empty() {
        return Err(AppError::bad_request("unique_id and username are required"));
    }

    state.db.register_participant(&ParticipantInfo {
        unique_id: req.unique_id,
        username: req.username,
        avatar_url: req.avatar_url,
    })?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/participants/:unique_id - Look up a directory entry
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(unique_id): Path<String>,
) -> Result<Json<ParticipantInfo>, AppError> {
    let participant = state
        .db
        .get_participant(&unique_id)?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;

    Ok(Json(participant))
}
