//! Finalization and settlement query handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::Deserialize;

use crate::{get_identity, AppError, AppState, MAX_PAGE_LIMIT};
use tally_core::allocation;
use tally_core::models::{
    ParticipantInfo, ParticipantSettlement, SettlementItem, SettlementSnapshot,
};
use tally_core::Error;

/// Request body for finalizing a session
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    /// Roster of participant directory ids
    pub participants: Vec<String>,
    /// Reviewed line items with split instructions
    pub items: Vec<SettlementItem>,
}

/// POST /api/sessions/:id/finalize - Compute and persist the settlement
///
/// Owner only. Validation failures reject the whole call; nothing partial is
/// ever persisted. Re-finalizing replaces the stored snapshot.
pub async fn finalize_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    request: Request,
) -> Result<Json<SettlementSnapshot>, AppError> {
    let identity = get_identity(request.headers());

    let session = state
        .db
        .get_session(session_id)?
        .ok_or_else(|| AppError::not_found("Session not found"))?;
    if session.creator_id != identity.id {
        return Err(Error::Forbidden("not the session owner".into()).into());
    }

    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: FinalizeRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    // Resolve the roster through the participant directory so snapshots
    // carry display identities, not just ids
    let mut participants: Vec<ParticipantInfo> = Vec::with_capacity(req.participants.len());
    for unique_id in &req.participants {
        let info = state.db.get_participant(unique_id)?.ok_or_else(|| {
            AppError::bad_request(&format!("Unknown participant '{}'", unique_id))
        })?;
        participants.push(info);
    }

    let result = allocation::finalize(&participants, &req.items)?;

    let snapshot = SettlementSnapshot {
        session_id,
        participants,
        allocations: result.allocations,
        totals: result.totals,
        finalized_at: chrono::Utc::now(),
    };

    // A snapshot computed but not persisted is not authoritative, so write
    // failures surface as server errors
    state
        .db
        .upsert_settlement(&snapshot)
        .map_err(|e| Error::Persistence(format!("settlement write failed: {}", e)))?;

    Ok(Json(snapshot))
}

/// GET /api/sessions/:id/settlement - Get the stored snapshot for a session
pub async fn get_settlement(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<SettlementSnapshot>, AppError> {
    let snapshot = state
        .db
        .get_settlement(session_id)?
        .ok_or_else(|| AppError::not_found("No settlement for this session"))?;

    Ok(Json(snapshot))
}

/// Query params for settlement history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Return at most this many settlements (newest first); omit for all
    pub limit: Option<i64>,
}

/// GET /api/participants/:unique_id/settlements - Settlement history
pub async fn list_participant_settlements(
    State(state): State<Arc<AppState>>,
    Path(unique_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ParticipantSettlement>>, AppError> {
    let limit = match query.limit {
        Some(limit) if limit <= 0 => {
            return Err(AppError::bad_request("limit must be positive"));
        }
        Some(limit) => Some(limit.min(MAX_PAGE_LIMIT)),
        None => None,
    };

    let settlements = state.db.settlements_for_participant(&unique_id, limit)?;

    Ok(Json(settlements))
}
