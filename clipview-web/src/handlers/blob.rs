//! Published subtitle blobs

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::error::WebError;
use crate::server::AppState;

/// Serves a blob until its URL is revoked.
///
/// # Errors
///
/// - `WebError::BlobNotFound` - Unknown id, or the blob was revoked on unmount
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let blob = Uuid::parse_str(&id)
        .ok()
        .and_then(|uuid| state.blobs.get(&uuid))
        .ok_or(WebError::BlobNotFound { id })?;

    Ok((
        [
            (CONTENT_TYPE, blob.content_type),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        blob.data,
    ))
}
