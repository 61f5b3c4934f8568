//! Player adapters and the resources they own.
//!
//! An adapter wraps one third-party playback engine behind the preview
//! contract: it acquires its engine instance on mount and releases it, along
//! with any subtitle blob or demux player, on unmount.

pub mod blob;
pub mod engine;
pub mod native;
pub mod rich;
pub mod subtitles;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

pub use blob::{Blob, BlobStore, InMemoryBlobStore};
pub use engine::{BrowserEngine, EngineConfig, EngineHandle, EngineInstance, PlayerEngine};
pub use native::{NativePlayerAdapter, NativePlayerConfig};
pub use rich::{InstanceCallback, RichPlayerAdapter, RichPlayerOptions};
pub use subtitles::{HttpSubtitleFetcher, SubtitleError, SubtitleFetcher};

use crate::demux::DemuxError;

/// Errors raised while mounting a player.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player engine failed to start: {reason}")]
    EngineCreation { reason: String },

    #[error(transparent)]
    Demux(#[from] DemuxError),
}

/// Collaborators every adapter mounts against.
#[derive(Clone)]
pub struct PlayerServices {
    pub engine: Arc<dyn PlayerEngine>,
    pub subtitles: Arc<dyn SubtitleFetcher>,
    pub blobs: Arc<dyn BlobStore>,
}

/// The element an adapter renders into.
///
/// Owned by the adapter that created it, so attachment never needs a global
/// document lookup: the adapter hands out its own element ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSurface {
    container_id: String,
    media_id: String,
}

impl MediaSurface {
    pub fn new(prefix: &str) -> Self {
        let container_id = format!("{prefix}-{}", Uuid::new_v4().simple());
        let media_id = format!("{container_id}-media");
        Self {
            container_id,
            media_id,
        }
    }

    /// Id of the wrapping element the engine renders into.
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Id of the `<video>` element itself.
    pub fn media_id(&self) -> &str {
        &self.media_id
    }
}

/// `width:height` for the player, each side defaulting independently.
pub fn aspect_ratio(width: Option<u32>, height: Option<u32>, default: (u32, u32)) -> String {
    format!(
        "{}:{}",
        width.unwrap_or(default.0),
        height.unwrap_or(default.1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surfaces_are_unique() {
        let first = MediaSurface::new("rich");
        let second = MediaSurface::new("rich");
        assert_ne!(first, second);
        assert!(first.container_id().starts_with("rich-"));
        assert_eq!(first.media_id(), format!("{}-media", first.container_id()));
    }

    #[test]
    fn test_aspect_ratio_defaults() {
        assert_eq!(aspect_ratio(None, None, (16, 9)), "16:9");
        assert_eq!(aspect_ratio(Some(1920), Some(800), (16, 9)), "1920:800");
        assert_eq!(aspect_ratio(Some(4), None, (16, 9)), "4:9");
    }
}
