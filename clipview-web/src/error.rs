//! Web handler errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clipview_core::ActionError;

/// Errors a handler turns into an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The caller has no mounted preview
    #[error("No preview is mounted for this session")]
    NoPreview,

    /// Request parameters were missing or malformed
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request
        reason: String,
    },

    /// Blob was never published or has been revoked
    #[error("Blob not found: {id}")]
    BlobNotFound {
        /// Requested blob id
        id: String,
    },

    /// Alternate download could not be resolved upstream
    #[error("Alternate download failed: {0}")]
    Upstream(#[from] ActionError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match self {
            WebError::NoPreview => StatusCode::NOT_FOUND,
            WebError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            WebError::BlobNotFound { .. } => StatusCode::NOT_FOUND,
            WebError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        (status, self.to_string()).into_response()
    }
}
