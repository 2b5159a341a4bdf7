//! Receipt scan handler

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::Deserialize;

use crate::{get_identity, AppError, AppState, MAX_UPLOAD_SIZE};
use tally_core::ai::ParseResult;
use tally_core::Error;

/// Query params for the scan endpoint
#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    /// Receipt language hint forwarded to the model (e.g. "de")
    pub lang: Option<String>,
}

/// Releases the per-session scan slot when the request finishes, including
/// on cancellation
struct ScanGuard {
    state: Arc<AppState>,
    session_id: i64,
}

impl ScanGuard {
    /// Claim the scan slot for a session; `None` if a scan is already running
    fn claim(state: Arc<AppState>, session_id: i64) -> Option<Self> {
        let mut in_flight = state.scans_in_flight.lock().ok()?;
        if !in_flight.insert(session_id) {
            return None;
        }
        drop(in_flight);
        Some(Self { state, session_id })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.state.scans_in_flight.lock() {
            in_flight.remove(&self.session_id);
        }
    }
}

/// POST /api/sessions/:id/scan - Parse a receipt image into line items
///
/// Body: raw image bytes, `content-type` carries the MIME type. Provider
/// failures never surface here; the result degrades to the mock parse and
/// the caller can tell from `source`.
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(query): Query<ScanQuery>,
    request: Request,
) -> Result<Json<ParseResult>, AppError> {
    let identity = get_identity(request.headers());

    let session = state
        .db
        .get_session(session_id)?
        .ok_or_else(|| AppError::not_found("Session not found"))?;
    if session.creator_id != identity.id {
        return Err(Error::Forbidden("not the session owner".into()).into());
    }

    let mime = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    let _guard = ScanGuard::claim(state.clone(), session_id)
        .ok_or_else(|| AppError::conflict("A scan is already running for this session"))?;

    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or file too large (max 10MB)"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("No image data provided"));
    }

    let result = state
        .gateway
        .parse_receipt(
            &bytes,
            &mime,
            query.lang.as_deref(),
            &format!("session-{}", session_id),
        )
        .await;

    Ok(Json(result))
}
