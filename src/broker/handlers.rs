use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::broker::BrokerState;
use crate::common::errors::AppError;
use crate::session::SessionId;

/// Body of a registration and of a successful lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct PeerAddress {
    pub addr: String,
}

pub async fn register_session(
    Path(id): Path<String>,
    State(state): State<BrokerState>,
    Json(body): Json<PeerAddress>,
) -> Result<StatusCode, AppError> {
    let id = SessionId::parse(&id).map_err(|err| AppError::BadRequest(err.to_string()))?;
    if body.addr.trim().is_empty() {
        return Err(AppError::BadRequest("peer address is empty".to_string()));
    }

    if !state.try_register(id.as_str(), body.addr.clone()) {
        tracing::warn!(session = %id, "registration conflict");
        return Err(AppError::Conflict(format!(
            "session {id} is already registered"
        )));
    }

    tracing::debug!(session = %id, addr = %body.addr, "session registered");
    Ok(StatusCode::CREATED)
}

pub async fn lookup_session(
    Path(id): Path<String>,
    State(state): State<BrokerState>,
) -> Result<Json<PeerAddress>, AppError> {
    match state.lookup(&id) {
        Some(peer) => {
            tracing::debug!(session = %id, "session resolved");
            Ok(Json(PeerAddress { addr: peer.addr }))
        }
        None => Err(AppError::NotFound(format!("no session {id}"))),
    }
}

pub async fn release_session(
    Path(id): Path<String>,
    State(state): State<BrokerState>,
) -> StatusCode {
    state.release(&id);
    tracing::debug!(session = %id, active = state.active_sessions(), "session released");
    // releasing an unknown session is a no-op, not an error
    StatusCode::NO_CONTENT
}
