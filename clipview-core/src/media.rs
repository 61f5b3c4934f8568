//! File descriptors handed to the preview by the file browser.

use serde::{Deserialize, Serialize};

/// Intrinsic dimensions reported by the storage provider for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A single remote video file selected in the browser.
///
/// Owned by the caller; the preview never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Route path of the file, e.g. `/Movies/clip.mp4`
    pub path: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub video: Option<VideoDimensions>,
}

impl MediaFile {
    /// Creates a descriptor whose display name is the last path segment.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            video: None,
        }
    }

    /// Attaches intrinsic dimensions.
    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.video = if width.is_none() && height.is_none() {
            None
        } else {
            Some(VideoDimensions { width, height })
        };
        self
    }

    pub fn width(&self) -> Option<u32> {
        self.video.and_then(|v| v.width)
    }

    pub fn height(&self) -> Option<u32> {
        self.video.and_then(|v| v.height)
    }

    /// Lower-cased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Lower-cased extension of a file name; `None` when the name has no dot
/// or ends with one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}
