//! Native-container adapter around a standards-based player (Plyr).
//!
//! Used for every mobile client. Standard containers get an explicit source
//! list; FLV gets none and is fed by the demuxer after the media surface
//! exists. Subtitles are fetched in the background and bound to the caption
//! track as a blob URL once they arrive.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::engine::{EngineConfig, EngineHandle, EngineInstance};
use super::{MediaSurface, PlayerError, PlayerServices, aspect_ratio};
use crate::capability::ContainerKind;
use crate::config::PreviewConfig;
use crate::demux::{DemuxError, DemuxMediaConfig, DemuxModule, DemuxPlayer};
use crate::media::MediaFile;
use crate::resolver::ResolvedResources;

const SUBTITLE_CONTENT_TYPE: &str = "text/vtt";

/// Source description handed to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub poster: String,
    /// Static sources; absent for FLV, which is attached through the demuxer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceEntry>>,
    pub tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionTrack {
    pub kind: &'static str,
    pub label: String,
    pub src: String,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeOptions {
    pub ratio: String,
    pub fullscreen: FullscreenOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullscreenOptions {
    pub ios_native: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativePlayerConfig {
    pub source: NativeSource,
    pub options: NativeOptions,
}

impl NativePlayerConfig {
    pub fn build(
        file: &MediaFile,
        resources: &ResolvedResources,
        container: ContainerKind,
        preview: &PreviewConfig,
    ) -> Self {
        let sources = match container {
            ContainerKind::Standard => Some(vec![SourceEntry {
                src: resources.video_url.clone(),
            }]),
            ContainerKind::FlvRequiresDemux => None,
        };

        Self {
            source: NativeSource {
                kind: "video",
                title: file.name.clone(),
                poster: resources.thumbnail_url.clone(),
                sources,
                tracks: vec![CaptionTrack {
                    kind: "captions",
                    label: file.name.clone(),
                    src: String::new(),
                    default: true,
                }],
            },
            options: NativeOptions {
                ratio: aspect_ratio(file.width(), file.height(), preview.default_aspect),
                fullscreen: FullscreenOptions { ios_native: true },
            },
        }
    }

    pub fn requires_demux(&self) -> bool {
        self.source.sources.is_none()
    }
}

#[derive(Debug)]
struct NativeShared {
    mounted: bool,
    instance: Option<Box<dyn EngineInstance>>,
    blob_url: Option<String>,
}

/// Mounted native player.
///
/// Unmounting (explicitly or on drop) revokes the subtitle blob, detaches the
/// demux player and destroys the engine instance, each exactly once.
pub struct NativePlayerAdapter {
    surface: MediaSurface,
    services: PlayerServices,
    shared: Arc<Mutex<NativeShared>>,
    demux_player: Option<Box<dyn DemuxPlayer>>,
    caption_task: Option<JoinHandle<()>>,
}

impl NativePlayerAdapter {
    /// Mounts the player and starts the background subtitle fetch.
    ///
    /// FLV configurations need the ready demux module; it is attached to this
    /// adapter's own surface right after the engine instance exists.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `PlayerError::EngineCreation` - The engine rejected the configuration
    /// - `PlayerError::Demux` - FLV without a ready module, or attachment failed
    pub fn mount(
        config: NativePlayerConfig,
        resources: &ResolvedResources,
        services: &PlayerServices,
        demux: Option<Arc<dyn DemuxModule>>,
    ) -> Result<Self, PlayerError> {
        let surface = MediaSurface::new("native");
        let requires_demux = config.requires_demux();
        let instance = services
            .engine
            .create(&EngineConfig::Native(config), &surface)?;

        let mut adapter = Self {
            surface,
            services: services.clone(),
            shared: Arc::new(Mutex::new(NativeShared {
                mounted: true,
                instance: Some(instance),
                blob_url: None,
            })),
            demux_player: None,
            caption_task: None,
        };

        // On error the adapter is dropped, which releases the instance.
        if requires_demux {
            let module = demux.ok_or_else(|| DemuxError::AttachFailed {
                reason: "demux module is not ready".to_string(),
            })?;
            let mut player = module.create_player(DemuxMediaConfig::flv(&resources.video_url))?;
            player.attach_media_element(&adapter.surface)?;
            player.load();
            debug!(module = module.name(), surface = adapter.surface.media_id(), "Demuxer attached");
            adapter.demux_player = Some(player);
        }

        adapter.caption_task = Some(adapter.spawn_caption_fetch(resources.subtitle_url.clone()));
        Ok(adapter)
    }

    fn spawn_caption_fetch(&self, subtitle_url: String) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let fetcher = Arc::clone(&self.services.subtitles);
        let blobs = Arc::clone(&self.services.blobs);

        tokio::spawn(async move {
            let data = match fetcher.fetch(&subtitle_url).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(url = %subtitle_url, error = %e, "Could not load subtitle");
                    return;
                }
            };

            let mut shared = shared.lock();
            if !shared.mounted {
                debug!(url = %subtitle_url, "Discarding subtitle for unmounted player");
                return;
            }
            let blob_url = blobs.create_object_url(data, SUBTITLE_CONTENT_TYPE);
            if let Some(instance) = shared.instance.as_mut() {
                instance.bind_caption_track(&blob_url);
            }
            shared.blob_url = Some(blob_url);
        })
    }

    /// Waits up to `deadline` for the subtitle fetch to finish.
    ///
    /// Returns `true` once the fetch has completed, with or without captions.
    pub async fn settle_captions(&mut self, deadline: Duration) -> bool {
        let Some(task) = self.caption_task.as_mut() else {
            return true;
        };
        match tokio::time::timeout(deadline, task).await {
            Ok(_) => {
                self.caption_task = None;
                true
            }
            Err(_) => false,
        }
    }

    /// Blob URL currently bound to the caption track.
    pub fn caption_url(&self) -> Option<String> {
        self.shared.lock().blob_url.clone()
    }

    pub fn surface(&self) -> &MediaSurface {
        &self.surface
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.shared.lock().instance.as_ref().map(|i| i.handle())
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    pub fn has_demux_player(&self) -> bool {
        self.demux_player.is_some()
    }

    /// Player markup followed by the demuxer bootstrap, if any.
    pub fn render(&self) -> String {
        let mut markup = self
            .shared
            .lock()
            .instance
            .as_ref()
            .map(|instance| instance.markup())
            .unwrap_or_default();
        if let Some(script) = self.demux_player.as_ref().and_then(|p| p.bootstrap_script()) {
            markup.push('\n');
            markup.push_str(&script);
        }
        markup
    }

    /// Releases everything the adapter acquired. Idempotent.
    pub fn unmount(&mut self) {
        let mut shared = self.shared.lock();
        if !shared.mounted {
            return;
        }
        shared.mounted = false;

        if let Some(blob_url) = shared.blob_url.take() {
            self.services.blobs.revoke_object_url(&blob_url);
        }
        if let Some(mut player) = self.demux_player.take() {
            player.detach_media_element();
            player.destroy();
        }
        if let Some(mut instance) = shared.instance.take() {
            instance.destroy(false);
        }
        debug!(surface = self.surface.container_id(), "Native player unmounted");
    }
}

impl Drop for NativePlayerAdapter {
    fn drop(&mut self) {
        self.unmount();
    }
}
