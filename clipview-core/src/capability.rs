//! Client and container classification.
//!
//! Decides which player adapter serves a request and whether the FLV
//! demuxer has to be loaded. Classification is total: unknown clients are
//! desktops and unknown extensions are standard containers.

use std::fmt;
use std::sync::LazyLock;

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use regex::Regex;
use serde::Serialize;

use crate::media::extension_of;

static MOBILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(iPhone|iPod|Android|ios|iPad|BlackBerry|Backerry|WebOS|Symbian|Windows Phone|Phone)")
        .expect("mobile user agent pattern is valid")
});

/// Which adapter family a client gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceClass {
    /// Standards-based player, always used on phones and tablets
    NativeMobile,
    /// Full-featured player for everything else
    RichDesktop,
}

/// Whether the browser can decode the container on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContainerKind {
    Standard,
    /// Needs the client-side demuxer
    FlvRequiresDemux,
}

/// The {device, container} pair that drives player selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlaybackCapability {
    pub device: DeviceClass,
    pub container: ContainerKind,
}

impl PlaybackCapability {
    pub fn requires_demux(&self) -> bool {
        self.container == ContainerKind::FlvRequiresDemux
    }

    pub fn is_mobile(&self) -> bool {
        self.device == DeviceClass::NativeMobile
    }
}

impl Default for PlaybackCapability {
    fn default() -> Self {
        Self {
            device: DeviceClass::RichDesktop,
            container: ContainerKind::Standard,
        }
    }
}

impl fmt::Display for PlaybackCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = match self.device {
            DeviceClass::NativeMobile => "NativeMobile",
            DeviceClass::RichDesktop => "RichDesktop",
        };
        let container = match self.container {
            ContainerKind::Standard => "Standard",
            ContainerKind::FlvRequiresDemux => "Flv",
        };
        write!(f, "{device}+{container}")
    }
}

/// Classifies a client from its user agent string.
pub fn classify_device(user_agent: &str) -> DeviceClass {
    if MOBILE_PATTERN.is_match(user_agent) {
        DeviceClass::NativeMobile
    } else {
        DeviceClass::RichDesktop
    }
}

/// Classifies a container from the file name's extension.
pub fn classify_container(file_name: &str) -> ContainerKind {
    match extension_of(file_name).as_deref() {
        Some("flv") => ContainerKind::FlvRequiresDemux,
        _ => ContainerKind::Standard,
    }
}

/// Pure classification of (user agent, file name).
pub fn classify(user_agent: &str, file_name: &str) -> PlaybackCapability {
    PlaybackCapability {
        device: classify_device(user_agent),
        container: classify_container(file_name),
    }
}

/// Classifies straight from request headers; a missing or non-UTF-8
/// `User-Agent` counts as a desktop client.
pub fn classify_request(headers: &HeaderMap, file_name: &str) -> PlaybackCapability {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    classify(user_agent, file_name)
}
