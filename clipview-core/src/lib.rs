//! Clipview Core - Video preview for a cloud-storage file browser
//!
//! This crate resolves a stored file into its raw, subtitle, danmaku and
//! thumbnail URLs, decides how a client can play it, manages the player
//! adapters and their lifecycle, and builds the actions offered beneath the
//! player.

pub mod actions;
pub mod capability;
pub mod config;
pub mod demux;
pub mod media;
pub mod orchestrator;
pub mod player;
pub mod resolver;
pub mod tracing_setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

// Re-export main types for convenient access
pub use actions::{ActionError, ActionTrigger, ExternalPlayer, RedirectResolver};
pub use capability::{ContainerKind, DeviceClass, PlaybackCapability};
pub use config::ClipviewConfig;
pub use demux::{DemuxError, DemuxLoader, DemuxState, HttpDemuxSource};
pub use media::{MediaFile, VideoDimensions};
pub use orchestrator::{PlaybackState, Preview, PreviewContext, PreviewView, ResourceMenu};
pub use player::{PlayerError, PlayerServices, SubtitleError};
pub use resolver::{PathResolver, ProtectedRoutes, ResolvedResources, TokenStore};

/// Errors that can bubble up from any Clipview subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ClipviewError {
    #[error("Demux error: {0}")]
    Demux(#[from] DemuxError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preview server error: {reason}")]
    Server { reason: String },
}

impl ClipviewError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ClipviewError::Demux(e) => match e {
                DemuxError::LoadFailed { reason } => reason.clone(),
                DemuxError::BadStatus { status } => {
                    format!("FLV extension unavailable (HTTP {status})")
                }
                _ => "FLV playback is unavailable".to_string(),
            },
            ClipviewError::Player(_) => "The player could not be started".to_string(),
            ClipviewError::Subtitle(_) => "Subtitles could not be loaded".to_string(),
            ClipviewError::Action(e) => match e {
                ActionError::NoRedirect { status } => {
                    format!("Storage did not provide a download link (HTTP {status})")
                }
                _ => "Alternate download failed".to_string(),
            },
            ClipviewError::Configuration { .. } => "Configuration error occurred".to_string(),
            ClipviewError::Io(_) => "File system error occurred".to_string(),
            ClipviewError::Server { reason } => format!("Preview server error: {reason}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ClipviewError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClipviewError>;

impl ClipviewError {
    pub fn from_server_error(error: impl std::fmt::Display) -> Self {
        ClipviewError::Server {
            reason: error.to_string(),
        }
    }
}
