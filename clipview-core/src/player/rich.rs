//! Feature-rich adapter around Artplayer, used for every non-mobile client.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::engine::{EngineConfig, EngineHandle, EngineInstance};
use super::{MediaSurface, PlayerError, PlayerServices};
use crate::capability::ContainerKind;
use crate::config::PreviewConfig;
use crate::demux::{DemuxError, DemuxMediaConfig, DemuxModule, DemuxPlayer};
use crate::resolver::ResolvedResources;

/// Receives the engine handle once the instance exists.
pub type InstanceCallback = Box<dyn FnOnce(EngineHandle) + Send>;

/// Danmaku overlay plugin settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanmakuPlugin {
    /// URL of the Bilibili-format XML comment file
    pub danmuku: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoreVideoAttr {
    pub cross_origin: &'static str,
    /// Id of the `<video>` element, set by the engine from the surface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Artplayer option bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RichPlayerOptions {
    /// Static source; empty for FLV, which the demuxer feeds instead
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub poster: String,
    pub pip: bool,
    pub auto_mini: bool,
    pub screenshot: bool,
    pub setting: bool,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub flip: bool,
    pub playback_rate: bool,
    pub aspect_ratio: bool,
    pub fullscreen: bool,
    pub fullscreen_web: bool,
    pub subtitle_offset: bool,
    pub mini_progress_bar: bool,
    pub mutex: bool,
    pub backdrop: bool,
    pub plays_inline: bool,
    pub auto_playback: bool,
    pub airplay: bool,
    pub theme: String,
    pub more_video_attr: MoreVideoAttr,
    #[serde(skip)]
    pub danmaku: DanmakuPlugin,
}

impl RichPlayerOptions {
    pub fn build(
        resources: &ResolvedResources,
        container: ContainerKind,
        preview: &PreviewConfig,
    ) -> Self {
        let (url, kind) = match container {
            ContainerKind::Standard => (resources.video_url.clone(), None),
            ContainerKind::FlvRequiresDemux => (String::new(), Some("flv")),
        };

        Self {
            url,
            kind,
            poster: resources.thumbnail_url.clone(),
            pip: true,
            auto_mini: true,
            screenshot: true,
            setting: true,
            loop_playback: true,
            flip: true,
            playback_rate: true,
            aspect_ratio: true,
            fullscreen: true,
            fullscreen_web: true,
            subtitle_offset: true,
            mini_progress_bar: true,
            mutex: true,
            backdrop: true,
            plays_inline: true,
            auto_playback: true,
            airplay: true,
            theme: preview.theme.clone(),
            more_video_attr: MoreVideoAttr {
                cross_origin: "anonymous",
                id: None,
            },
            danmaku: DanmakuPlugin {
                danmuku: resources.caption_overlay_url.clone(),
            },
        }
    }

    pub fn requires_demux(&self) -> bool {
        self.kind == Some("flv")
    }
}

/// Mounted rich player.
///
/// The engine instance is destroyed on unmount without waiting for network
/// teardown, so no playback survives navigation.
pub struct RichPlayerAdapter {
    surface: MediaSurface,
    instance: Option<Box<dyn EngineInstance>>,
    demux_player: Option<Box<dyn DemuxPlayer>>,
}

impl RichPlayerAdapter {
    /// Creates the engine instance, attaches the demuxer for FLV and reports
    /// the instance handle through `on_instance`.
    ///
    /// # Errors
    ///
    /// - `PlayerError::EngineCreation` - The engine rejected the options
    /// - `PlayerError::Demux` - FLV without a ready module, or attachment failed
    pub fn mount(
        options: RichPlayerOptions,
        resources: &ResolvedResources,
        services: &PlayerServices,
        demux: Option<Arc<dyn DemuxModule>>,
        on_instance: Option<InstanceCallback>,
    ) -> Result<Self, PlayerError> {
        let surface = MediaSurface::new("rich");
        let requires_demux = options.requires_demux();
        let instance = services.engine.create(&EngineConfig::Rich(options), &surface)?;

        let mut adapter = Self {
            surface,
            instance: Some(instance),
            demux_player: None,
        };

        if requires_demux {
            let module = demux.ok_or_else(|| DemuxError::AttachFailed {
                reason: "demux module is not ready".to_string(),
            })?;
            let mut player = module.create_player(DemuxMediaConfig::flv(&resources.video_url))?;
            player.attach_media_element(&adapter.surface)?;
            player.load();
            adapter.demux_player = Some(player);
        }

        if let (Some(callback), Some(handle)) = (on_instance, adapter.handle()) {
            callback(handle);
        }

        Ok(adapter)
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.instance.as_ref().map(|instance| instance.handle())
    }

    pub fn surface(&self) -> &MediaSurface {
        &self.surface
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.is_some()
    }

    pub fn render(&self) -> String {
        let mut markup = self
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

    /// Destroys the engine instance. Idempotent.
    pub fn unmount(&mut self) {
        if let Some(mut player) = self.demux_player.take() {
            player.detach_media_element();
            player.destroy();
        }
        if let Some(mut instance) = self.instance.take() {
            instance.destroy(false);
            debug!(surface = self.surface.container_id(), "Rich player unmounted");
        }
    }
}

impl Drop for RichPlayerAdapter {
    fn drop(&mut self) {
        self.unmount();
    }
}
