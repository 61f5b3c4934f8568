//! HTMX + Tailwind preview server
//!
//! Serves the preview page, its HTMX partials, the JSON API and the subtitle
//! blobs published by mounted native players.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use clipview_core::config::ClipviewConfig;
use clipview_core::demux::{DemuxModuleSource, HttpDemuxSource};
use clipview_core::player::{
    BrowserEngine, HttpSubtitleFetcher, InMemoryBlobStore, PlayerEngine, PlayerServices,
    SubtitleFetcher,
};
use clipview_core::{ClipviewError, PreviewContext, RedirectResolver, TokenStore};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::handlers::{
    api_alternate_download, api_preview, api_unmount_preview, copy_link, preview_page,
    preview_player, serve_blob, toggle_menu,
};
use crate::session::PreviewSessions;

/// Route prefix subtitle blobs are served under.
pub const BLOB_ROUTE_PREFIX: &str = "/blob/";

/// External player icons served under `/players`.
const PLAYER_ICONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static/players");

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<ClipviewConfig>,
    /// Collaborators each new preview is opened with
    pub context: PreviewContext,
    /// Store behind `/blob/{id}`, shared with the player services
    pub blobs: Arc<InMemoryBlobStore>,
    /// Access tokens of protected routes
    pub tokens: Arc<dyn TokenStore>,
    /// Upstream redirect lookup for the alternate download
    pub redirects: RedirectResolver,
    /// Mounted previews by session
    pub sessions: PreviewSessions,
}

impl AppState {
    /// Creates state backed by the upstream storage API and the browser engine.
    ///
    /// # Errors
    ///
    /// - `ClipviewError::Subtitle` - Subtitle HTTP client could not be built
    /// - `ClipviewError::Demux` - Demuxer HTTP client could not be built
    /// - `ClipviewError::Action` - Redirect HTTP client could not be built
    pub fn new(config: ClipviewConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ClipviewError> {
        let timeout = config.server.request_timeout;
        let user_agent = config.server.user_agent;
        let subtitles = Arc::new(HttpSubtitleFetcher::new(
            config.server.upstream_origin.clone(),
            timeout,
            user_agent,
        )?);
        let demux_source = Arc::new(HttpDemuxSource::new(
            config.server.demux_script_url.clone(),
            timeout,
            user_agent,
        )?);

        Self::with_services(
            config,
            Arc::new(BrowserEngine::new()),
            subtitles,
            demux_source,
            tokens,
        )
    }

    /// Creates state around explicit engine, subtitle and demuxer collaborators.
    ///
    /// # Errors
    ///
    /// - `ClipviewError::Action` - Redirect HTTP client could not be built
    pub fn with_services(
        config: ClipviewConfig,
        engine: Arc<dyn PlayerEngine>,
        subtitles: Arc<dyn SubtitleFetcher>,
        demux_source: Arc<dyn DemuxModuleSource>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ClipviewError> {
        let blobs = Arc::new(InMemoryBlobStore::new(BLOB_ROUTE_PREFIX));
        let services = PlayerServices {
            engine,
            subtitles,
            blobs: blobs.clone(),
        };
        let redirects = RedirectResolver::new(
            config.server.upstream_origin.clone(),
            config.server.alternate_host.clone(),
            config.server.request_timeout,
            config.server.user_agent,
        )?;

        Ok(Self {
            context: PreviewContext::new(&config, services, demux_source),
            config: Arc::new(config),
            blobs,
            tokens,
            redirects,
            sessions: PreviewSessions::new(),
        })
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Main page
        .route("/preview", get(preview_page))
        // HTMX partial update endpoints
        .route("/htmx/preview/player", get(preview_player))
        .route("/htmx/preview/menu", post(toggle_menu))
        .route("/htmx/preview/copy-link", post(copy_link))
        // JSON API endpoints
        .route("/api/preview", get(api_preview).delete(api_unmount_preview))
        .route("/api/download/alternate", get(api_alternate_download))
        // Subtitle blobs
        .route("/blob/{id}", get(serve_blob))
        // External player icons
        .nest_service("/players", ServeDir::new(PLAYER_ICONS_DIR))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the preview server until it fails.
///
/// Previews idle for the configured session timeout are unmounted in the
/// background.
///
/// # Errors
///
/// - `ClipviewError` - State construction failed
/// - `std::io::Error` - Binding or serving failed
pub async fn run_server(
    config: ClipviewConfig,
    tokens: Arc<dyn TokenStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let base_url = config.server.base_url.clone();
    let idle_timeout = config.server.session_idle_timeout;
    let state = AppState::new(config, tokens)?;
    let _sweeper = state.sessions.spawn_idle_sweeper(idle_timeout);
    let app = build_router(state);

    info!(%address, %base_url, "Clipview preview server running");
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
