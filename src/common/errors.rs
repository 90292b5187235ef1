use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of the pairing core, as seen by both roles.
///
/// Setup-time variants (`RegistrationConflict`, `BrokerUnreachable`,
/// `PeerNotFound`, `ConnectTimeout`) are terminal for the session: the user
/// is told to regenerate or rescan the QR code. `ChannelNotOpen` and
/// `TransferEncodingFailure` concern a single operation and leave the
/// session usable.
#[derive(Error, Debug)]
pub enum PairError {
    #[error("session identifier is already registered at the broker")]
    RegistrationConflict,

    #[error("rendezvous broker unreachable")]
    BrokerUnreachable(#[source] anyhow::Error),

    #[error("no peer is registered under that session identifier")]
    PeerNotFound,

    #[error("direct connection attempt timed out")]
    ConnectTimeout,

    #[error("channel is not open")]
    ChannelNotOpen,

    #[error("transfer encoding failed: {0}")]
    TransferEncodingFailure(String),

    /// Catch-all for unexpected local failures (socket setup and the like).
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Broker-side error types with HTTP status code mapping.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unexpected errors are logged with full context, clients get a
    /// generic message.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Internal(ref err) => {
                tracing::error!(error = ?err, "internal broker error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = AxumJson(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
