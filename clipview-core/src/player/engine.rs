//! Player engine instances.
//!
//! An engine turns an adapter's configuration into a live instance rendered
//! into the adapter's [`MediaSurface`]. The browser engine emits the page
//! markup that boots Plyr or Artplayer and keeps a registry of instances
//! that have not been destroyed yet.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use super::native::NativePlayerConfig;
use super::rich::RichPlayerOptions;
use super::{MediaSurface, PlayerError};
use crate::demux::escape_script;

/// Configuration for either player family.
#[derive(Debug, Clone)]
pub enum EngineConfig {
    Native(NativePlayerConfig),
    Rich(RichPlayerOptions),
}

/// Identifies a live instance to code outside the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHandle {
    pub instance_id: String,
    pub surface_id: String,
    pub engine: &'static str,
}

/// Creates engine instances.
pub trait PlayerEngine: Send + Sync {
    /// # Errors
    ///
    /// - `PlayerError::EngineCreation` - The engine rejected the configuration
    fn create(
        &self,
        config: &EngineConfig,
        surface: &MediaSurface,
    ) -> Result<Box<dyn EngineInstance>, PlayerError>;
}

/// A live player. Exclusively owned by the adapter that created it.
pub trait EngineInstance: Send + fmt::Debug {
    fn handle(&self) -> EngineHandle;

    /// Points the caption track at `src`. Engines without a native track ignore it.
    fn bind_caption_track(&mut self, _src: &str) {}

    /// Markup that renders and boots the player.
    fn markup(&self) -> String;

    /// Tears the instance down immediately, without waiting for network
    /// teardown. `remove_surface` also removes the rendered element.
    fn destroy(&mut self, remove_surface: bool);
}

/// Engine emitting browser markup for Plyr (native) and Artplayer (rich).
#[derive(Debug, Clone, Default)]
pub struct BrowserEngine {
    live: Arc<Mutex<HashSet<String>>>,
}

impl BrowserEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances created and not yet destroyed.
    pub fn live_instances(&self) -> usize {
        self.live.lock().len()
    }
}

impl PlayerEngine for BrowserEngine {
    fn create(
        &self,
        config: &EngineConfig,
        surface: &MediaSurface,
    ) -> Result<Box<dyn EngineInstance>, PlayerError> {
        let instance_id = Uuid::new_v4().to_string();
        let config = match config {
            EngineConfig::Native(native) => EngineConfig::Native(native.clone()),
            EngineConfig::Rich(rich) => {
                if rich.url.is_empty() && rich.kind.is_none() {
                    return Err(PlayerError::EngineCreation {
                        reason: "rich player needs a source url".to_string(),
                    });
                }
                let mut rich = rich.clone();
                rich.more_video_attr.id = Some(surface.media_id().to_string());
                EngineConfig::Rich(rich)
            }
        };

        self.live.lock().insert(instance_id.clone());
        debug!(instance = %instance_id, surface = surface.container_id(), "Engine instance created");

        Ok(Box::new(BrowserInstance {
            instance_id,
            surface: surface.clone(),
            config,
            registry: Arc::clone(&self.live),
            destroyed: false,
        }))
    }
}

#[derive(Debug)]
struct BrowserInstance {
    instance_id: String,
    surface: MediaSurface,
    config: EngineConfig,
    registry: Arc<Mutex<HashSet<String>>>,
    destroyed: bool,
}

impl EngineInstance for BrowserInstance {
    fn handle(&self) -> EngineHandle {
        EngineHandle {
            instance_id: self.instance_id.clone(),
            surface_id: self.surface.container_id().to_string(),
            engine: match self.config {
                EngineConfig::Native(_) => "plyr",
                EngineConfig::Rich(_) => "artplayer",
            },
        }
    }

    fn bind_caption_track(&mut self, src: &str) {
        if let EngineConfig::Native(native) = &mut self.config {
            for track in &mut native.source.tracks {
                track.src = src.to_string();
            }
        }
    }

    fn markup(&self) -> String {
        if self.destroyed {
            return String::new();
        }
        match &self.config {
            EngineConfig::Native(native) => plyr_markup(&self.surface, native),
            EngineConfig::Rich(rich) => artplayer_markup(&self.surface, rich),
        }
    }

    fn destroy(&mut self, remove_surface: bool) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.registry.lock().remove(&self.instance_id);
        trace!(instance = %self.instance_id, remove_surface, "Engine instance destroyed");
    }
}

impl Drop for BrowserInstance {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.instance_id);
    }
}

fn plyr_markup(surface: &MediaSurface, config: &NativePlayerConfig) -> String {
    let source = &config.source;
    let sources: String = source
        .sources
        .iter()
        .flatten()
        .map(|entry| format!(r#"<source src="{}" />"#, escape_html(&entry.src)))
        .collect();
    let tracks: String = source
        .tracks
        .iter()
        .map(|track| {
            format!(
                r#"<track kind="{}" label="{}" src="{}"{} />"#,
                track.kind,
                escape_html(&track.label),
                escape_html(&track.src),
                if track.default { " default" } else { "" }
            )
        })
        .collect();
    let options = serde_json::to_string(&config.options).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"<div id="{container}" class="plyr-surface">
    <video id="{media}" controls playsinline crossorigin="anonymous" poster="{poster}" data-title="{title}">
        {sources}
        {tracks}
    </video>
</div>
<script>
(function () {{
    const player = new Plyr(document.getElementById("{media}"), {options});
    window.addEventListener('pagehide', function () {{ player.destroy(); }});
}})();
</script>"#,
        container = surface.container_id(),
        media = surface.media_id(),
        poster = escape_html(&source.poster),
        title = escape_html(&source.title),
        options = escape_script(&options),
    )
}

fn artplayer_markup(surface: &MediaSurface, options: &RichPlayerOptions) -> String {
    let json = serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string());
    let plugin = serde_json::to_string(&options.danmaku).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"<div id="{container}" class="artplayer-surface" style="height: 545px"></div>
<script>
(function () {{
    const options = {json};
    options.container = document.getElementById("{container}");
    options.plugins = [artplayerPluginDanmuku({plugin})];
    const art = new Artplayer(options);
    window.addEventListener('pagehide', function () {{ art.destroy(false); }});
}})();
</script>"#,
        container = surface.container_id(),
        json = escape_script(&json),
        plugin = escape_script(&plugin),
    )
}

/// Escapes text for use inside HTML attributes and element content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
