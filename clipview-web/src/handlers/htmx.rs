//! HTMX handlers for preview partial updates

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use clipview_core::actions::{Clipboard, Notifier, copy_direct_link};
use clipview_core::{PlaybackState, Preview};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::pages::CAPTION_SETTLE_DEADLINE;
use super::require_path;
use crate::components::{customise_link_menu, notification_toast, preview_area};
use crate::error::WebError;
use crate::server::AppState;
use crate::session;

/// Longest a single poll waits for the demuxer before answering "still loading".
pub const DEMUX_POLL_WAIT: Duration = Duration::from_secs(5);

/// File a partial was rendered for.
#[derive(Debug, Deserialize)]
pub struct PreviewScope {
    /// Storage path of the file; partials for another file are refused
    pub path: Option<String>,
}

/// Renders the current preview area, waiting briefly for a pending demuxer.
///
/// The wait happens on the demuxer's state channel, so the session stays
/// usable while the fragment is held.
///
/// # Errors
///
/// - `WebError::NoPreview` - No preview is mounted, or it shows another file
pub async fn preview_player(
    State(state): State<AppState>,
    Query(scope): Query<PreviewScope>,
    headers: HeaderMap,
) -> Result<Html<String>, WebError> {
    let pending = {
        let preview = mounted_preview(&state, &headers).await?;
        let mut preview = preview.lock().await;
        ensure_showing(&preview, scope.path.as_deref())?;
        preview.poll();
        preview.demux_updates()
    };
    if let Some(mut updates) = pending {
        // Timing out leaves the preview loading; the fragment polls again.
        let _ = tokio::time::timeout(DEMUX_POLL_WAIT, updates.wait_for(|s| !s.is_loading())).await;
    }

    let preview = mounted_preview(&state, &headers).await?;
    let mut preview = preview.lock().await;
    ensure_showing(&preview, scope.path.as_deref())?;
    if *preview.poll() == PlaybackState::Ready {
        preview.settle_captions(CAPTION_SETTLE_DEADLINE).await;
    }

    Ok(Html(preview_area(&preview.view(), &preview.file().path)))
}

/// Toggles the customise-link overlay.
///
/// # Errors
///
/// - `WebError::NoPreview` - No preview is mounted, or it shows another file
pub async fn toggle_menu(
    State(state): State<AppState>,
    Query(scope): Query<PreviewScope>,
    headers: HeaderMap,
) -> Result<Html<String>, WebError> {
    let preview = mounted_preview(&state, &headers).await?;
    let mut preview = preview.lock().await;
    ensure_showing(&preview, scope.path.as_deref())?;
    let menu = preview.toggle_menu();
    debug!(?menu, "Toggled customise-link overlay");
    Ok(Html(customise_link_menu(
        menu,
        preview.resources(),
        &preview.file().path,
    )))
}

/// Query naming the file whose link is copied.
#[derive(Debug, Deserialize)]
pub struct CopyLinkQuery {
    /// Storage path of the file
    pub path: String,
    /// Access token overriding the stored one
    pub odpt: Option<String>,
}

/// Copies the direct link of a file.
///
/// The link reaches the client clipboard through an `HX-Trigger`
/// `copyDirectLink` event; the success toast is swapped in out-of-band.
///
/// # Errors
///
/// - `WebError::InvalidRequest` - Empty `path`
pub async fn copy_link(
    State(state): State<AppState>,
    Query(query): Query<CopyLinkQuery>,
) -> Result<Response, WebError> {
    require_path(&query.path)?;
    let token = query
        .odpt
        .clone()
        .filter(|token| !token.is_empty())
        .or_else(|| state.tokens.stored_token(&query.path));
    let resources = state.context.resolver.resolve(&query.path, token.as_deref());

    let response = CopyLinkResponse::default();
    copy_direct_link(&resources, &response, &response);
    Ok(response.into_response())
}

fn ensure_showing(preview: &Preview, path: Option<&str>) -> Result<(), WebError> {
    match path {
        Some(path) if preview.file().path != path => Err(WebError::NoPreview),
        _ => Ok(()),
    }
}

async fn mounted_preview(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<Mutex<Preview>>, WebError> {
    let session_id = session::session_id(headers).ok_or(WebError::NoPreview)?;
    state.sessions.get(&session_id).await.ok_or(WebError::NoPreview)
}

/// Collects the copied link and toasts into one HTMX response.
#[derive(Default)]
struct CopyLinkResponse {
    link: RefCell<Option<String>>,
    toasts: RefCell<Vec<String>>,
}

impl Clipboard for CopyLinkResponse {
    fn copy(&self, text: &str) {
        *self.link.borrow_mut() = Some(text.to_string());
    }
}

impl Notifier for CopyLinkResponse {
    fn success(&self, message: &str) {
        self.toasts
            .borrow_mut()
            .push(notification_toast(message, "success"));
    }
}

impl IntoResponse for CopyLinkResponse {
    fn into_response(self) -> Response {
        let link = self.link.into_inner().unwrap_or_default();
        let mut response = Html(self.toasts.into_inner().join("")).into_response();
        let trigger = json!({ "copyDirectLink": { "link": link } }).to_string();
        if let Ok(value) = HeaderValue::from_str(&trigger) {
            response.headers_mut().insert("HX-Trigger", value);
        }
        response
    }
}
