//! Full preview page

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use clipview_core::{MediaFile, PlaybackState, Preview};
use serde::Deserialize;
use tracing::info;

use super::require_path;
use crate::components::{
    action_bar, card, customise_link_menu, file_header, page_shell, preview_area,
    unmount_on_pagehide,
};
use crate::error::WebError;
use crate::server::AppState;
use crate::session;

/// How long page rendering waits for the subtitle track before giving up on it.
pub const CAPTION_SETTLE_DEADLINE: Duration = Duration::from_secs(2);

/// Query parameters identifying the file to preview.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Storage path of the file
    pub path: String,
    /// Display name; defaults to the last path segment
    pub name: Option<String>,
    /// Known video width in pixels
    pub width: Option<u32>,
    /// Known video height in pixels
    pub height: Option<u32>,
    /// Access token overriding the stored one
    pub odpt: Option<String>,
}

impl PreviewQuery {
    /// Media file described by the query.
    pub fn media_file(&self) -> MediaFile {
        let mut file = MediaFile::from_path(&self.path).with_dimensions(self.width, self.height);
        if let Some(name) = self.name.as_ref().filter(|name| !name.is_empty()) {
            file.name = name.clone();
        }
        file
    }

    /// Explicit token, else the one stored for the file's route.
    pub fn token(&self, state: &AppState) -> Option<String> {
        self.odpt
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| state.tokens.stored_token(&self.path))
    }
}

/// Renders the preview page for one file.
///
/// Replaces any preview the session had mounted. Standard files render with
/// their player; FLV renders the loading view, which polls until the
/// demuxer settles.
///
/// # Errors
///
/// - `WebError::InvalidRequest` - Empty `path`
pub async fn preview_page(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    require_path(&query.path)?;
    let (session_id, fresh) = session::session_or_new(&headers);
    let file = query.media_file();
    let token = query.token(&state);

    let mut preview = Preview::open(
        file,
        session::user_agent(&headers),
        token.clone(),
        state.context.clone(),
    );
    preview.poll();
    if *preview.state() == PlaybackState::Ready {
        preview.settle_captions(CAPTION_SETTLE_DEADLINE).await;
    }

    info!(
        session = %session_id,
        path = %preview.file().path,
        capability = %preview.capability(),
        "Rendering preview page"
    );

    let path = &preview.file().path;
    let content = format!(
        "{}{}{}{}",
        file_header(&preview.file().name, path),
        card(&format!(
            "{}{}",
            preview_area(&preview.view(), path),
            action_bar(&preview.actions(), path, token.as_deref())
        )),
        customise_link_menu(preview.menu(), preview.resources(), path),
        unmount_on_pagehide(path)
    );
    let page = page_shell(&preview.file().name, &content);

    state.sessions.replace(&session_id, preview).await;

    let mut response = Html(page).into_response();
    if fresh {
        if let Ok(cookie) = HeaderValue::from_str(&session::session_cookie(&session_id)) {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_name_to_basename() {
        let query = PreviewQuery {
            path: "/Movies/clip.mp4".to_string(),
            name: None,
            width: Some(1920),
            height: None,
            odpt: None,
        };
        let file = query.media_file();
        assert_eq!(file.name, "clip.mp4");
        assert_eq!(file.width(), Some(1920));
        assert_eq!(file.height(), None);
    }
}
