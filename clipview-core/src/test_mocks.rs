//! Recording mocks for preview tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::demux::{DemuxError, DemuxMediaConfig, DemuxModule, DemuxModuleSource, DemuxPlayer};
use crate::player::{
    BlobStore, BrowserEngine, EngineConfig, EngineHandle, EngineInstance, InMemoryBlobStore,
    MediaSurface, PlayerEngine, PlayerError, PlayerServices, SubtitleError, SubtitleFetcher,
};

/// Engine wrapper counting creations and destructions.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    inner: BrowserEngine,
    creates: AtomicUsize,
    destroys: Arc<Mutex<Vec<bool>>>,
    fail_creation: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose every `create` fails.
    pub fn failing() -> Self {
        Self {
            fail_creation: true,
            ..Self::default()
        }
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroys.lock().len()
    }

    /// `remove_surface` flag of every destroy call, in order.
    pub fn destroy_flags(&self) -> Vec<bool> {
        self.destroys.lock().clone()
    }

    pub fn live_instances(&self) -> usize {
        self.inner.live_instances()
    }
}

impl PlayerEngine for RecordingEngine {
    fn create(
        &self,
        config: &EngineConfig,
        surface: &MediaSurface,
    ) -> Result<Box<dyn EngineInstance>, PlayerError> {
        if self.fail_creation {
            return Err(PlayerError::EngineCreation {
                reason: "engine unavailable".to_string(),
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.create(config, surface)?;
        Ok(Box::new(RecordingInstance {
            inner,
            destroys: Arc::clone(&self.destroys),
        }))
    }
}

#[derive(Debug)]
struct RecordingInstance {
    inner: Box<dyn EngineInstance>,
    destroys: Arc<Mutex<Vec<bool>>>,
}

impl EngineInstance for RecordingInstance {
    fn handle(&self) -> EngineHandle {
        self.inner.handle()
    }

    fn bind_caption_track(&mut self, src: &str) {
        self.inner.bind_caption_track(src);
    }

    fn markup(&self) -> String {
        self.inner.markup()
    }

    fn destroy(&mut self, remove_surface: bool) {
        self.destroys.lock().push(remove_surface);
        self.inner.destroy(remove_surface);
    }
}

/// Blob store wrapper counting creations and revocations.
#[derive(Debug, Default)]
pub struct RecordingBlobStore {
    inner: InMemoryBlobStore,
    created: AtomicUsize,
    revoked: Mutex<HashMap<String, usize>>,
}

impl RecordingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn revocations(&self, url: &str) -> usize {
        self.revoked.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_revocations(&self) -> usize {
        self.revoked.lock().values().sum()
    }

    pub fn inner(&self) -> &InMemoryBlobStore {
        &self.inner
    }
}

impl BlobStore for RecordingBlobStore {
    fn create_object_url(&self, data: Bytes, content_type: &str) -> String {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_object_url(data, content_type)
    }

    fn revoke_object_url(&self, url: &str) -> bool {
        *self.revoked.lock().entry(url.to_string()).or_default() += 1;
        self.inner.revoke_object_url(url)
    }
}

#[derive(Debug)]
enum SubtitleBehavior {
    Serve(Bytes),
    Fail,
    Gated(Bytes),
}

/// Subtitle fetcher serving canned bytes, failing, or waiting for release.
#[derive(Debug, Clone)]
pub struct MockSubtitles {
    behavior: Arc<SubtitleBehavior>,
    gate: Arc<Notify>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockSubtitles {
    fn with(behavior: SubtitleBehavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
            gate: Arc::new(Notify::new()),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn serving(data: &'static [u8]) -> Self {
        Self::with(SubtitleBehavior::Serve(Bytes::from_static(data)))
    }

    pub fn failing() -> Self {
        Self::with(SubtitleBehavior::Fail)
    }

    /// Serves `data` only after [`MockSubtitles::release`].
    pub fn gated(data: &'static [u8]) -> Self {
        Self::with(SubtitleBehavior::Gated(Bytes::from_static(data)))
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl SubtitleFetcher for MockSubtitles {
    async fn fetch(&self, url: &str) -> Result<Bytes, SubtitleError> {
        self.requested.lock().push(url.to_string());
        match self.behavior.as_ref() {
            SubtitleBehavior::Serve(data) => Ok(data.clone()),
            SubtitleBehavior::Fail => Err(SubtitleError::Status { status: 404 }),
            SubtitleBehavior::Gated(data) => {
                self.gate.notified().await;
                Ok(data.clone())
            }
        }
    }
}

/// Demux module recording every call made on it and its players.
#[derive(Debug, Default)]
pub struct MockDemuxModule {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockDemuxModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl DemuxModule for MockDemuxModule {
    fn name(&self) -> &str {
        "mock-demux"
    }

    fn create_player(&self, config: DemuxMediaConfig) -> Result<Box<dyn DemuxPlayer>, DemuxError> {
        self.events.lock().push(format!("create {}", config.url));
        Ok(Box::new(MockDemuxPlayer {
            events: Arc::clone(&self.events),
            media_id: None,
            loading: false,
        }))
    }
}

#[derive(Debug)]
struct MockDemuxPlayer {
    events: Arc<Mutex<Vec<String>>>,
    media_id: Option<String>,
    loading: bool,
}

impl DemuxPlayer for MockDemuxPlayer {
    fn attach_media_element(&mut self, surface: &MediaSurface) -> Result<(), DemuxError> {
        self.events.lock().push(format!("attach {}", surface.media_id()));
        self.media_id = Some(surface.media_id().to_string());
        Ok(())
    }

    fn load(&mut self) {
        self.events.lock().push("load".to_string());
        self.loading = true;
    }

    fn detach_media_element(&mut self) {
        self.events.lock().push("detach".to_string());
        self.media_id = None;
    }

    fn destroy(&mut self) {
        self.events.lock().push("destroy".to_string());
        self.loading = false;
    }

    fn bootstrap_script(&self) -> Option<String> {
        let media_id = self.media_id.as_deref().filter(|_| self.loading)?;
        Some(format!(r#"<script data-role="demux-bootstrap">{media_id}</script>"#))
    }
}

#[derive(Debug)]
enum SourceBehavior {
    Ready,
    Fail(String),
    Gated,
}

/// Demux source that succeeds, fails, or waits for release.
#[derive(Debug)]
pub struct MockDemuxSource {
    behavior: SourceBehavior,
    gate: Notify,
    loads: AtomicUsize,
    module: Arc<MockDemuxModule>,
}

impl MockDemuxSource {
    fn with(behavior: SourceBehavior) -> Self {
        Self {
            behavior,
            gate: Notify::new(),
            loads: AtomicUsize::new(0),
            module: Arc::new(MockDemuxModule::new()),
        }
    }

    pub fn ready() -> Self {
        Self::with(SourceBehavior::Ready)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with(SourceBehavior::Fail(reason.to_string()))
    }

    /// Resolves with the module only after [`MockDemuxSource::release`].
    pub fn gated() -> Self {
        Self::with(SourceBehavior::Gated)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// The module handed out on success.
    pub fn module(&self) -> Arc<MockDemuxModule> {
        Arc::clone(&self.module)
    }
}

#[async_trait]
impl DemuxModuleSource for MockDemuxSource {
    async fn load(&self) -> Result<Arc<dyn DemuxModule>, DemuxError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            SourceBehavior::Ready => Ok(self.module.clone()),
            SourceBehavior::Fail(reason) => Err(DemuxError::LoadFailed {
                reason: reason.clone(),
            }),
            SourceBehavior::Gated => {
                self.gate.notified().await;
                Ok(self.module.clone())
            }
        }
    }
}

/// Bundle of recording collaborators.
pub struct TestServices {
    pub engine: Arc<RecordingEngine>,
    pub subtitles: Arc<MockSubtitles>,
    pub blobs: Arc<RecordingBlobStore>,
}

impl TestServices {
    pub fn new(subtitles: MockSubtitles) -> Self {
        Self::with_engine(RecordingEngine::new(), subtitles)
    }

    pub fn with_engine(engine: RecordingEngine, subtitles: MockSubtitles) -> Self {
        Self {
            engine: Arc::new(engine),
            subtitles: Arc::new(subtitles),
            blobs: Arc::new(RecordingBlobStore::new()),
        }
    }

    pub fn player_services(&self) -> PlayerServices {
        PlayerServices {
            engine: self.engine.clone(),
            subtitles: self.subtitles.clone(),
            blobs: self.blobs.clone(),
        }
    }
}
