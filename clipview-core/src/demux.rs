//! On-demand loading of the FLV demuxer.
//!
//! Browsers cannot decode FLV natively, so FLV previews need a client-side
//! demuxer that feeds remuxed segments into the media element. The demuxer is
//! fetched only for FLV files, once per file, and its progress is observable
//! as a three-state [`DemuxState`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::player::MediaSurface;

/// Errors raised while obtaining or using the demux module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DemuxError {
    /// The module could not be loaded. The reason is shown to the user verbatim.
    #[error("{reason}")]
    LoadFailed { reason: String },

    #[error("demuxer script request returned status {status}")]
    BadStatus { status: u16 },

    #[error("demuxer script is empty")]
    EmptyScript,

    #[error("demuxer loader stopped before settling")]
    LoaderStopped,

    #[error("demuxer attachment failed: {reason}")]
    AttachFailed { reason: String },
}

/// Source settings for one demuxed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxMediaConfig {
    pub url: String,
    /// Container handled by the demuxer, always `flv` here
    pub kind: &'static str,
}

impl DemuxMediaConfig {
    pub fn flv(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: "flv",
        }
    }
}

/// A loaded demux library able to create per-stream players.
pub trait DemuxModule: Send + Sync + fmt::Debug {
    /// Library name, used in logs
    fn name(&self) -> &str;

    /// Creates a demux player for one stream.
    ///
    /// # Errors
    ///
    /// - `DemuxError::AttachFailed` - The module refused the configuration
    fn create_player(&self, config: DemuxMediaConfig) -> Result<Box<dyn DemuxPlayer>, DemuxError>;
}

/// A demux player bound to a single stream.
pub trait DemuxPlayer: Send + fmt::Debug {
    /// Binds the player to a rendered media surface.
    ///
    /// # Errors
    ///
    /// - `DemuxError::AttachFailed` - The surface cannot accept a demuxed stream
    fn attach_media_element(&mut self, surface: &MediaSurface) -> Result<(), DemuxError>;

    /// Starts fetching and demuxing the stream.
    fn load(&mut self);

    /// Unbinds from the media surface.
    fn detach_media_element(&mut self);

    /// Releases the player. Further calls are no-ops.
    fn destroy(&mut self);

    /// Page script that drives the demuxer in the browser, once attached and loading.
    fn bootstrap_script(&self) -> Option<String>;
}

/// Asynchronous provider of the demux module.
#[async_trait]
pub trait DemuxModuleSource: Send + Sync {
    /// Loads the module.
    ///
    /// # Errors
    ///
    /// - `DemuxError` - Any failure; the loader reports it as [`DemuxState::Failed`]
    async fn load(&self) -> Result<Arc<dyn DemuxModule>, DemuxError>;
}

/// Observable loading state.
#[derive(Clone, Debug)]
pub enum DemuxState {
    Loading,
    Ready(Arc<dyn DemuxModule>),
    Failed(String),
}

impl DemuxState {
    pub fn is_loading(&self) -> bool {
        matches!(self, DemuxState::Loading)
    }
}

/// Handle to one in-flight or settled demux module request.
///
/// Spawning requests the module exactly once. Dropping the loader aborts an
/// unfinished request; a fresh file needs a fresh loader.
pub struct DemuxLoader {
    state: watch::Receiver<DemuxState>,
    task: JoinHandle<()>,
}

impl DemuxLoader {
    /// Starts loading on the current tokio runtime.
    pub fn spawn(source: Arc<dyn DemuxModuleSource>) -> Self {
        let (sender, receiver) = watch::channel(DemuxState::Loading);

        let task = tokio::spawn(async move {
            let settled = match source.load().await {
                Ok(module) => {
                    info!(module = module.name(), "Demux module ready");
                    DemuxState::Ready(module)
                }
                Err(e) => {
                    warn!(error = %e, "Demux module failed to load");
                    DemuxState::Failed(e.to_string())
                }
            };
            // Receiver may already be gone if the preview was unmounted.
            let _ = sender.send(settled);
        });

        Self {
            state: receiver,
            task,
        }
    }

    /// Current state without waiting.
    pub fn state(&self) -> DemuxState {
        self.state.borrow().clone()
    }

    /// Waits until the request leaves [`DemuxState::Loading`].
    pub async fn settled(&mut self) -> DemuxState {
        match self.state.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => DemuxState::Failed(DemuxError::LoaderStopped.to_string()),
        }
    }

    /// Additional observer of the same request.
    pub fn subscribe(&self) -> watch::Receiver<DemuxState> {
        self.state.clone()
    }
}

impl Drop for DemuxLoader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for DemuxLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemuxLoader")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Fetches the demuxer script over HTTP.
pub struct HttpDemuxSource {
    client: reqwest::Client,
    script_url: String,
}

impl HttpDemuxSource {
    /// # Errors
    ///
    /// - `DemuxError::LoadFailed` - The HTTP client could not be built
    pub fn new(
        script_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, DemuxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DemuxError::LoadFailed {
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(client, script_url))
    }

    pub fn with_client(client: reqwest::Client, script_url: impl Into<String>) -> Self {
        Self {
            client,
            script_url: script_url.into(),
        }
    }
}

#[async_trait]
impl DemuxModuleSource for HttpDemuxSource {
    async fn load(&self) -> Result<Arc<dyn DemuxModule>, DemuxError> {
        debug!(url = %self.script_url, "Requesting demuxer script");

        let response = self
            .client
            .get(&self.script_url)
            .send()
            .await
            .map_err(|e| DemuxError::LoadFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DemuxError::BadStatus {
                status: status.as_u16(),
            });
        }

        let script = response.bytes().await.map_err(|e| DemuxError::LoadFailed {
            reason: e.to_string(),
        })?;

        Ok(Arc::new(ScriptDemuxModule::new(script)?))
    }
}

/// The mpegts.js library, held as script text.
pub struct ScriptDemuxModule {
    script: Arc<str>,
}

impl ScriptDemuxModule {
    /// # Errors
    ///
    /// - `DemuxError::EmptyScript` - No script content
    /// - `DemuxError::LoadFailed` - Content is not UTF-8
    pub fn new(script: Bytes) -> Result<Self, DemuxError> {
        if script.is_empty() {
            return Err(DemuxError::EmptyScript);
        }
        let text = std::str::from_utf8(&script).map_err(|e| DemuxError::LoadFailed {
            reason: format!("demuxer script is not UTF-8: {e}"),
        })?;
        Ok(Self {
            script: Arc::from(text),
        })
    }

    pub fn script_len(&self) -> usize {
        self.script.len()
    }
}

impl fmt::Debug for ScriptDemuxModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptDemuxModule")
            .field("script_len", &self.script.len())
            .finish()
    }
}

impl DemuxModule for ScriptDemuxModule {
    fn name(&self) -> &str {
        "mpegts.js"
    }

    fn create_player(&self, config: DemuxMediaConfig) -> Result<Box<dyn DemuxPlayer>, DemuxError> {
        if config.url.is_empty() {
            return Err(DemuxError::AttachFailed {
                reason: "stream url is empty".to_string(),
            });
        }
        Ok(Box::new(ScriptDemuxPlayer {
            script: Arc::clone(&self.script),
            config,
            media_id: None,
            loading: false,
            destroyed: false,
        }))
    }
}

#[derive(Debug)]
struct ScriptDemuxPlayer {
    script: Arc<str>,
    config: DemuxMediaConfig,
    media_id: Option<String>,
    loading: bool,
    destroyed: bool,
}

impl DemuxPlayer for ScriptDemuxPlayer {
    fn attach_media_element(&mut self, surface: &MediaSurface) -> Result<(), DemuxError> {
        if self.destroyed {
            return Err(DemuxError::AttachFailed {
                reason: "player already destroyed".to_string(),
            });
        }
        self.media_id = Some(surface.media_id().to_string());
        Ok(())
    }

    fn load(&mut self) {
        self.loading = self.media_id.is_some() && !self.destroyed;
    }

    fn detach_media_element(&mut self) {
        self.media_id = None;
        self.loading = false;
    }

    fn destroy(&mut self) {
        self.detach_media_element();
        self.destroyed = true;
    }

    fn bootstrap_script(&self) -> Option<String> {
        let media_id = self.media_id.as_deref().filter(|_| self.loading)?;
        let config = serde_json::json!({ "type": self.config.kind, "url": self.config.url });

        Some(format!(
            r#"<script>{library}</script>
<script>
(function () {{
    const media = document.getElementById({media_id});
    if (!media) return;
    const player = mpegts.createPlayer({config});
    player.attachMediaElement(media);
    player.load();
    window.addEventListener('pagehide', function () {{ player.destroy(); }});
}})();
</script>"#,
            library = escape_script(&self.script),
            media_id = serde_json::Value::from(media_id),
        ))
    }
}

/// Keeps inline script text from closing its `<script>` element early.
pub fn escape_script(script: &str) -> String {
    script.replace("</", r"<\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mocks::MockDemuxSource;

    #[tokio::test]
    async fn test_loader_reaches_ready() {
        let source = Arc::new(MockDemuxSource::ready());
        let mut loader = DemuxLoader::spawn(source.clone());

        let state = loader.settled().await;
        assert!(matches!(state, DemuxState::Ready(_)));
        assert!(matches!(loader.state(), DemuxState::Ready(_)));
        assert_eq!(source.load_count(), 1);
    }

    #[tokio::test]
    async fn test_loader_reports_failure_message() {
        let source = Arc::new(MockDemuxSource::failing("network error"));
        let mut loader = DemuxLoader::spawn(source);

        match loader.settled().await {
            DemuxState::Failed(message) => assert_eq!(message, "network error"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_settled_pending_until_source_resolves() {
        let source = Arc::new(MockDemuxSource::gated());
        let mut loader = DemuxLoader::spawn(source.clone());
        {
            let mut settled = tokio_test::task::spawn(loader.settled());
            tokio_test::assert_pending!(settled.poll());
        }

        source.release();
        assert!(matches!(loader.settled().await, DemuxState::Ready(_)));
    }

    #[tokio::test]
    async fn test_loader_starts_in_loading() {
        let source = Arc::new(MockDemuxSource::gated());
        let mut loader = DemuxLoader::spawn(source.clone());

        assert!(loader.state().is_loading());
        let mut observer = loader.subscribe();
        source.release();

        assert!(matches!(loader.settled().await, DemuxState::Ready(_)));
        assert!(!observer.borrow_and_update().is_loading());
    }

    #[test]
    fn test_script_module_rejects_empty_script() {
        assert_eq!(
            ScriptDemuxModule::new(Bytes::new()).unwrap_err(),
            DemuxError::EmptyScript
        );
    }

    #[test]
    fn test_script_player_bootstrap_requires_attach_and_load() {
        let module = ScriptDemuxModule::new(Bytes::from_static(b"var mpegts = {};")).unwrap();
        let mut player = module
            .create_player(DemuxMediaConfig::flv("/api/raw/?path=/a.flv"))
            .unwrap();
        assert!(player.bootstrap_script().is_none());

        let surface = MediaSurface::new("native");
        player.attach_media_element(&surface).unwrap();
        assert!(player.bootstrap_script().is_none());

        player.load();
        let script = player.bootstrap_script().unwrap();
        assert!(script.contains(surface.media_id()));
        assert!(script.contains(r#""type":"flv""#));
        assert!(script.contains("/api/raw/?path=/a.flv"));

        player.destroy();
        assert!(player.bootstrap_script().is_none());
        assert!(player.attach_media_element(&surface).is_err());
    }

    #[test]
    fn test_escape_script() {
        assert_eq!(escape_script("a</script>b"), r"a<\/script>b");
    }
}
