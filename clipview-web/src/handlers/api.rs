//! JSON API handlers for preview state and downloads

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Json, Redirect};
use clipview_core::actions::{ActionTrigger, action_triggers};
use clipview_core::capability::classify_request;
use clipview_core::{MediaFile, PlaybackState, PreviewView, ResolvedResources, ResourceMenu};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::require_path;
use crate::error::WebError;
use crate::server::AppState;
use crate::session;

/// Query naming a stored file.
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    /// Storage path of the file
    pub path: String,
    /// Access token overriding the stored one
    pub odpt: Option<String>,
}

impl PathQuery {
    fn token(&self, state: &AppState) -> Option<String> {
        self.odpt
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| state.tokens.stored_token(&self.path))
    }
}

/// Optional scope of an unmount request.
#[derive(Debug, Deserialize)]
pub struct UnmountQuery {
    /// Only unmount while the preview still shows this file
    pub path: Option<String>,
}

/// Mounted preview state, present when the session previews the same file.
#[derive(Debug, Serialize)]
pub struct MountedState {
    /// Playback half of the preview state
    pub playback: PlaybackState,
    /// Customise-link overlay state
    pub menu: ResourceMenu,
    /// What the preview area currently shows
    pub view: PreviewView,
}

/// Resolution of one file for clients rendering their own player.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// URLs derived from the path and token
    pub resources: ResolvedResources,
    /// Classification of this client and file, e.g. `RichDesktop+Standard`
    pub capability: String,
    /// Whether playback needs the FLV demuxer
    pub requires_demux: bool,
    /// Controls offered beneath the player
    pub actions: Vec<ActionTrigger>,
    /// Live state of the session's preview of this file
    pub mounted: Option<MountedState>,
}

/// Resolves a file and reports how this client would play it.
///
/// # Errors
///
/// - `WebError::InvalidRequest` - Empty `path`
pub async fn api_preview(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Json<PreviewResponse>, WebError> {
    require_path(&query.path)?;
    let file = MediaFile::from_path(&query.path);
    let resources = state
        .context
        .resolver
        .resolve(&file.path, query.token(&state).as_deref());
    let capability = classify_request(&headers, &file.name);
    let actions = action_triggers(
        &resources,
        state.context.resolver.base_url(),
        &state.context.hostname,
    );

    let mut mounted = None;
    if let Some(id) = session::session_id(&headers) {
        if let Some(preview) = state.sessions.get(&id).await {
            let mut preview = preview.lock().await;
            if preview.file().path == file.path {
                preview.poll();
                mounted = Some(MountedState {
                    playback: preview.state().clone(),
                    menu: preview.menu(),
                    view: preview.view(),
                });
            }
        }
    }

    Ok(Json(PreviewResponse {
        resources,
        capability: capability.to_string(),
        requires_demux: capability.requires_demux(),
        actions,
        mounted,
    }))
}

/// Unmounts the caller's preview.
///
/// The page sends this on `pagehide` with its own `path`, which leaves a
/// newer preview of the same session mounted.
///
/// # Errors
///
/// - `WebError::NoPreview` - No preview is mounted, or it shows another file
pub async fn api_unmount_preview(
    State(state): State<AppState>,
    Query(query): Query<UnmountQuery>,
    headers: HeaderMap,
) -> Result<StatusCode, WebError> {
    let session_id = session::session_id(&headers).ok_or(WebError::NoPreview)?;
    if state
        .sessions
        .remove(&session_id, query.path.as_deref())
        .await
    {
        info!(session = %session_id, "Preview unmounted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NoPreview)
    }
}

/// Resolves where the raw endpoint sends the file and redirects there,
/// through the alternate host when one is configured.
///
/// # Errors
///
/// - `WebError::InvalidRequest` - Empty `path`
/// - `WebError::Upstream` - Upstream unreachable or answered without a redirect
pub async fn api_alternate_download(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Redirect, WebError> {
    require_path(&query.path)?;
    let video_url = state
        .context
        .resolver
        .raw_url(&query.path, query.token(&state).as_deref());

    match state.redirects.resolve(&video_url).await {
        Ok(location) => {
            info!(path = %query.path, %location, "Alternate download resolved");
            Ok(Redirect::temporary(&location))
        }
        Err(e) => {
            warn!(path = %query.path, error = %e, "Alternate download failed");
            Err(e.into())
        }
    }
}
