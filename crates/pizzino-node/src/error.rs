use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use pizzino_shared::{CodecError, DatagramId, SessionError, UserId};
use pizzino_store::StoreError;

/// Failures surfaced by the node's routing engine.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Not found")]
    NotFound,

    #[error("Duplicate record: {0}")]
    UniquenessViolation(String),

    #[error("Protocol violation in datagram {id}: {reason}")]
    ProtocolViolation { id: DatagramId, reason: String },

    #[error("Backing store failure: {0}")]
    BackingStoreFailure(String),

    #[error("Authentication failed: {0}")]
    UpstreamAuthFailure(String),

    #[error("Codec failure: {0}")]
    CodecFailure(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for NodeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => NodeError::NotFound,
            StoreError::UniquenessViolation(key) => NodeError::UniquenessViolation(key),
            StoreError::EmptyBundle => NodeError::BadRequest(e.to_string()),
            other => NodeError::BackingStoreFailure(other.to_string()),
        }
    }
}

impl From<SessionError> for NodeError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MissingToken | SessionError::InvalidToken(_) => {
                NodeError::UpstreamAuthFailure(e.to_string())
            }
            other => NodeError::CodecFailure(other.to_string()),
        }
    }
}

impl From<CodecError> for NodeError {
    fn from(e: CodecError) -> Self {
        NodeError::CodecFailure(e.to_string())
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            NodeError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            NodeError::UniquenessViolation(_) => (StatusCode::CONFLICT, self.to_string()),
            NodeError::ProtocolViolation { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            NodeError::BackingStoreFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            NodeError::UpstreamAuthFailure(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            NodeError::CodecFailure(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            NodeError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Failures of a single hand-off to a downstream node.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No downstream route for {0}")]
    Unrouted(UserId),

    #[error("Downstream refused datagram: {0}")]
    Refused(String),
}
