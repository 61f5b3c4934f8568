//! Router-level tests for the preview server

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use clipview_core::config::{ClipviewConfig, HostRewrite};
use clipview_core::resolver::ProtectedRoutes;
use clipview_core::test_mocks::{MockDemuxSource, MockSubtitles, RecordingEngine};
use clipview_web::{AppState, build_router};
use tower::ServiceExt;

const DESKTOP: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 Version/17.0 Safari/605.1.15";
const MOBILE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";

struct Harness {
    state: AppState,
    engine: Arc<RecordingEngine>,
    demux: Arc<MockDemuxSource>,
}

impl Harness {
    fn new(config: ClipviewConfig, demux: MockDemuxSource, subtitles: MockSubtitles) -> Self {
        let engine = Arc::new(RecordingEngine::new());
        let demux = Arc::new(demux);
        let state = AppState::with_services(
            config,
            engine.clone(),
            Arc::new(subtitles),
            demux.clone(),
            Arc::new(ProtectedRoutes::new().with_route("/Private", "hashed")),
        )
        .unwrap();
        Self {
            state,
            engine,
            demux,
        }
    }

    fn default_with(demux: MockDemuxSource, subtitles: MockSubtitles) -> Self {
        Self::new(ClipviewConfig::default(), demux, subtitles)
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, method: Method, uri: &str, user_agent: &str, session: Option<&str>) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, user_agent);
        if let Some(session) = session {
            request = request.header(COOKIE, format!("clipview_session={session}"));
        }
        self.router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Opens a preview page and returns the session id and body.
    async fn open(&self, uri: &str, user_agent: &str, session: Option<&str>) -> (String, String) {
        let response = self.send(Method::GET, uri, user_agent, session).await;
        assert_eq!(response.status(), StatusCode::OK);
        let session = match session {
            Some(session) => session.to_string(),
            None => cookie_session(&response),
        };
        (session, body_text(response).await)
    }
}

fn cookie_session(response: &Response) -> String {
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("fresh session sets a cookie")
        .to_str()
        .unwrap();
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("clipview_session="))
        .unwrap()
        .to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Attribute URI in `body` starting with `prefix`, with `&amp;` decoded.
fn rendered_uri(body: &str, prefix: &str) -> String {
    let start = body.find(prefix).expect("uri rendered");
    let end = body[start..].find('"').unwrap();
    body[start..start + end].replace("&amp;", "&")
}

#[tokio::test]
async fn test_desktop_mp4_page_renders_rich_player() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());

    let (session, body) = harness
        .open("/preview?path=/Movies/clip.mp4", DESKTOP, None)
        .await;

    assert!(!session.is_empty());
    assert!(body.contains(r#"data-view="player""#));
    assert!(body.contains("new Artplayer(options)"));
    assert!(body.contains(r#""url":"/api/raw/?path=/Movies/clip.mp4""#));
    assert!(body.contains(r#"data-action="copy_direct_link""#));
    assert!(body.contains(r#"data-menu="closed""#));
    assert_eq!(harness.demux.load_count(), 0);
    assert_eq!(harness.state.sessions.len().await, 1);
}

#[tokio::test]
async fn test_mobile_flv_shows_loading_until_demuxer_ready() {
    let harness = Harness::default_with(MockDemuxSource::gated(), MockSubtitles::failing());

    let (session, body) = harness
        .open("/preview?path=/Movies/clip.flv&odpt=abc", MOBILE, None)
        .await;
    assert!(body.contains(r#"data-view="loading""#));
    assert!(body.contains("Loading FLV extension..."));
    assert_eq!(harness.engine.create_count(), 0);

    harness.demux.release();
    let response = harness
        .send(Method::GET, "/htmx/preview/player", MOBILE, Some(&session))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fragment = body_text(response).await;

    assert!(fragment.contains(r#"data-view="player""#));
    assert!(fragment.contains("new Plyr("));
    assert!(!fragment.contains("<source "));
    assert!(fragment.contains(r#"data-role="demux-bootstrap""#));
    assert_eq!(
        harness.demux.module().events()[0],
        "create /api/raw/?path=/Movies/clip.flv&odpt=abc"
    );
}

#[tokio::test]
async fn test_demux_failure_renders_error_fragment() {
    let harness = Harness::default_with(
        MockDemuxSource::failing("network error"),
        MockSubtitles::failing(),
    );

    let (session, _) = harness
        .open("/preview?path=/Live/stream.flv", DESKTOP, None)
        .await;
    let response = harness
        .send(Method::GET, "/htmx/preview/player", DESKTOP, Some(&session))
        .await;
    let fragment = body_text(response).await;

    assert!(fragment.contains(r#"data-view="error""#));
    assert!(fragment.contains("network error"));
    assert!(!fragment.contains("Artplayer"));
    assert_eq!(harness.engine.create_count(), 0);
}

#[tokio::test]
async fn test_unmount_destroys_player_once() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (session, _) = harness
        .open("/preview?path=/Movies/clip.mp4", DESKTOP, None)
        .await;

    let response = harness
        .send(Method::DELETE, "/api/preview", DESKTOP, Some(&session))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.engine.destroy_count(), 1);
    assert_eq!(harness.engine.destroy_flags(), vec![false]);

    let response = harness
        .send(Method::DELETE, "/api/preview", DESKTOP, Some(&session))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_opening_another_file_replaces_preview() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (session, _) = harness.open("/preview?path=/a.mp4", DESKTOP, None).await;
    harness
        .open("/preview?path=/b.mp4", DESKTOP, Some(&session))
        .await;

    assert_eq!(harness.engine.create_count(), 2);
    assert_eq!(harness.engine.destroy_count(), 1);
    assert_eq!(harness.engine.live_instances(), 1);
    assert_eq!(harness.state.sessions.len().await, 1);
}

#[tokio::test]
async fn test_subtitle_blob_is_served_until_unmount() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::serving(b"WEBVTT\n"));
    let (session, body) = harness
        .open("/preview?path=/Movies/clip.mp4", MOBILE, None)
        .await;

    let start = body.find("/blob/").expect("caption track bound to a blob");
    let blob_url = &body[start..start + "/blob/".len() + 36];

    let response = harness.send(Method::GET, blob_url, MOBILE, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/vtt");
    assert_eq!(body_text(response).await, "WEBVTT\n");

    harness
        .send(Method::DELETE, "/api/preview", MOBILE, Some(&session))
        .await;
    let response = harness.send(Method::GET, blob_url, MOBILE, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_copy_link_triggers_clipboard_and_one_toast() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(
            Method::POST,
            "/htmx/preview/copy-link?path=/Movies/clip.mp4&odpt=abc",
            DESKTOP,
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let trigger: serde_json::Value =
        serde_json::from_str(response.headers()["hx-trigger"].to_str().unwrap()).unwrap();
    assert_eq!(
        trigger["copyDirectLink"]["link"],
        "http://127.0.0.1:3000/api/raw/?path=/Movies/clip.mp4&odpt=abc"
    );
    let body = body_text(response).await;
    assert_eq!(body.matches("Copied direct link to clipboard.").count(), 1);
}

#[tokio::test]
async fn test_copy_link_uses_stored_token() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(Method::POST, "/htmx/preview/copy-link?path=/Private/a.mp4", DESKTOP, None)
        .await;

    let trigger = response.headers()["hx-trigger"].to_str().unwrap().to_string();
    assert!(trigger.contains("/api/raw/?path=/Private/a.mp4&odpt=hashed"));
}

#[tokio::test]
async fn test_menu_toggle_requires_session() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(Method::POST, "/htmx/preview/menu", DESKTOP, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (session, _) = harness.open("/preview?path=/a.mp4", DESKTOP, None).await;
    let open = body_text(
        harness
            .send(Method::POST, "/htmx/preview/menu", DESKTOP, Some(&session))
            .await,
    )
    .await;
    assert!(open.contains(r#"data-menu="open""#));

    let closed = body_text(
        harness
            .send(Method::POST, "/htmx/preview/menu", DESKTOP, Some(&session))
            .await,
    )
    .await;
    assert!(closed.contains(r#"data-menu="closed""#));
}

#[tokio::test]
async fn test_api_preview_reports_capability_and_mounted_state() {
    let harness = Harness::default_with(MockDemuxSource::gated(), MockSubtitles::failing());

    let response = harness
        .send(Method::GET, "/api/preview?path=/Movies/clip.flv&odpt=abc", MOBILE, None)
        .await;
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["capability"], "NativeMobile+Flv");
    assert_eq!(json["requires_demux"], true);
    assert_eq!(
        json["resources"]["video_url"],
        "/api/raw/?path=/Movies/clip.flv&odpt=abc"
    );
    assert!(json["mounted"].is_null());
    assert_eq!(json["actions"].as_array().unwrap().len(), 8);

    let (session, _) = harness
        .open("/preview?path=/Movies/clip.flv&odpt=abc", MOBILE, None)
        .await;
    let response = harness
        .send(
            Method::GET,
            "/api/preview?path=/Movies/clip.flv&odpt=abc",
            MOBILE,
            Some(&session),
        )
        .await;
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["mounted"]["playback"]["state"], "loading_demux");
    assert_eq!(json["mounted"]["view"]["view"], "loading");
}

/// Storage stub redirecting raw downloads for clients sending `agent`.
async fn spawn_upstream(agent: &'static str) -> String {
    let upstream = Router::new().route(
        "/api/raw/",
        get(move |headers: HeaderMap| async move {
            if headers.get(USER_AGENT).and_then(|value| value.to_str().ok()) == Some(agent) {
                Redirect::to("https://tenant-my.sharepoint.com/download.aspx?id=1").into_response()
            } else {
                StatusCode::FORBIDDEN.into_response()
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    format!("http://{address}")
}

#[tokio::test]
async fn test_alternate_download_rewrites_redirect_host() {
    let mut config = ClipviewConfig::default();
    config.server.upstream_origin = spawn_upstream("clipview/0.1.0").await;
    config.server.alternate_host = Some(HostRewrite {
        from: "tenant-my.sharepoint.com".to_string(),
        to: "dl.example.com".to_string(),
    });
    let harness = Harness::new(config, MockDemuxSource::ready(), MockSubtitles::failing());

    let response = harness
        .send(Method::GET, "/api/download/alternate?path=/a.mp4", DESKTOP, None)
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[LOCATION],
        "https://dl.example.com/download.aspx?id=1"
    );
}

#[tokio::test]
async fn test_unknown_blob_is_not_found() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(Method::GET, "/blob/not-a-uuid", DESKTOP, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_external_player_icons_are_served() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (_, body) = harness
        .open("/preview?path=/Movies/clip.mp4", DESKTOP, None)
        .await;
    assert!(body.contains("/players/vlc.svg"));

    let response = harness
        .send(Method::GET, "/players/vlc.svg", DESKTOP, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("<svg"));
}

#[tokio::test]
async fn test_empty_path_is_rejected() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());

    let page = harness.send(Method::GET, "/preview?path=", DESKTOP, None).await;
    assert_eq!(page.status(), StatusCode::BAD_REQUEST);
    let api = harness.send(Method::GET, "/api/preview?path=", DESKTOP, None).await;
    assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.state.sessions.len().await, 0);
}

#[tokio::test]
async fn test_alternate_download_sends_configured_user_agent() {
    let mut config = ClipviewConfig::default();
    config.server.upstream_origin = spawn_upstream("clipview-test/2.0").await;
    config.server.user_agent = "clipview-test/2.0";
    let harness = Harness::new(config, MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(Method::GET, "/api/download/alternate?path=/a.mp4", DESKTOP, None)
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let mut config = ClipviewConfig::default();
    config.server.upstream_origin = spawn_upstream("clipview-test/2.0").await;
    let harness = Harness::new(config, MockDemuxSource::ready(), MockSubtitles::failing());
    let response = harness
        .send(Method::GET, "/api/download/alternate?path=/a.mp4", DESKTOP, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_page_actions_keep_explicit_token() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (_, body) = harness
        .open("/preview?path=/Movies/clip.mp4&odpt=abc", DESKTOP, None)
        .await;

    let copy = rendered_uri(&body, "/htmx/preview/copy-link?");
    assert_eq!(copy, "/htmx/preview/copy-link?path=%2FMovies%2Fclip.mp4&odpt=abc");
    let alternate = rendered_uri(&body, "/api/download/alternate?");
    assert_eq!(alternate, "/api/download/alternate?path=%2FMovies%2Fclip.mp4&odpt=abc");

    let response = harness.send(Method::POST, &copy, DESKTOP, None).await;
    let trigger: serde_json::Value =
        serde_json::from_str(response.headers()["hx-trigger"].to_str().unwrap()).unwrap();
    assert_eq!(
        trigger["copyDirectLink"]["link"],
        "http://127.0.0.1:3000/api/raw/?path=/Movies/clip.mp4&odpt=abc"
    );
}

#[tokio::test]
async fn test_display_name_is_escaped_in_page() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (_, body) = harness
        .open(
            "/preview?path=/a.mp4&name=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            DESKTOP,
            None,
        )
        .await;

    assert!(!body.contains("<script>alert(1)</script>"));
    assert_eq!(body.matches("&lt;script&gt;alert(1)&lt;/script&gt;").count(), 2);
}

#[tokio::test]
async fn test_idle_previews_are_evicted() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    for _ in 0..5 {
        harness.open("/preview?path=/a.mp4", DESKTOP, None).await;
    }
    assert_eq!(harness.state.sessions.len().await, 5);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (active, _) = harness.open("/preview?path=/b.mp4", DESKTOP, None).await;

    let evicted = harness
        .state
        .sessions
        .evict_idle(Duration::from_millis(100))
        .await;
    assert_eq!(evicted, 5);
    assert_eq!(harness.state.sessions.len().await, 1);
    assert_eq!(harness.engine.live_instances(), 1);

    let response = harness
        .send(Method::POST, "/htmx/preview/menu", DESKTOP, Some(&active))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_closing_page_only_unmounts_its_own_file() {
    let harness = Harness::default_with(MockDemuxSource::ready(), MockSubtitles::failing());
    let (session, page) = harness.open("/preview?path=/a.mp4", DESKTOP, None).await;
    assert!(page.contains("fetch('/api/preview?path=%2Fa.mp4'"));
    harness
        .open("/preview?path=/b.mp4", DESKTOP, Some(&session))
        .await;

    let stale = harness
        .send(Method::DELETE, "/api/preview?path=%2Fa.mp4", DESKTOP, Some(&session))
        .await;
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.engine.live_instances(), 1);

    let current = harness
        .send(Method::DELETE, "/api/preview?path=%2Fb.mp4", DESKTOP, Some(&session))
        .await;
    assert_eq!(current.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.engine.live_instances(), 0);
    assert!(harness.state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_poll_for_replaced_file_is_refused() {
    let harness = Harness::default_with(MockDemuxSource::gated(), MockSubtitles::failing());
    let (session, page) = harness.open("/preview?path=/Live/a.flv", MOBILE, None).await;
    let stale_poll = rendered_uri(&page, "/htmx/preview/player?");
    assert_eq!(stale_poll, "/htmx/preview/player?path=%2FLive%2Fa.flv");

    harness
        .open("/preview?path=/Live/b.flv", MOBILE, Some(&session))
        .await;
    let stale = harness
        .send(Method::GET, &stale_poll, MOBILE, Some(&session))
        .await;
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);

    harness.demux.release();
    let current = harness
        .send(
            Method::GET,
            "/htmx/preview/player?path=%2FLive%2Fb.flv",
            MOBILE,
            Some(&session),
        )
        .await;
    assert_eq!(current.status(), StatusCode::OK);
    let fragment = body_text(current).await;
    assert!(fragment.contains("path=/Live/b.flv"));
    assert!(!fragment.contains("/Live/a.flv"));
}

#[tokio::test]
async fn test_session_usable_while_poll_waits_for_demuxer() {
    let harness = Harness::default_with(MockDemuxSource::gated(), MockSubtitles::failing());
    let (session, _) = harness
        .open("/preview?path=/Live/stream.flv", MOBILE, None)
        .await;

    let request = Request::builder()
        .uri("/htmx/preview/player?path=%2FLive%2Fstream.flv")
        .header(USER_AGENT, MOBILE)
        .header(COOKIE, format!("clipview_session={session}"))
        .body(Body::empty())
        .unwrap();
    let poll = tokio::spawn(harness.router().oneshot(request));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let menu = tokio::time::timeout(
        Duration::from_secs(1),
        harness.send(Method::POST, "/htmx/preview/menu", MOBILE, Some(&session)),
    )
    .await
    .expect("menu answered while the poll waits");
    assert_eq!(menu.status(), StatusCode::OK);

    harness.demux.release();
    let fragment = body_text(poll.await.unwrap().unwrap()).await;
    assert!(fragment.contains(r#"data-view="player""#));
}
