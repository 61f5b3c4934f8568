//! HTTP request handlers organized by functionality

pub mod api;
pub mod blob;
pub mod htmx;
pub mod pages;

// Re-export handler functions
pub use api::{
    MountedState, PathQuery, PreviewResponse, UnmountQuery, api_alternate_download, api_preview,
    api_unmount_preview,
};
pub use blob::serve_blob;
pub use htmx::{CopyLinkQuery, PreviewScope, copy_link, preview_player, toggle_menu};
pub use pages::{PreviewQuery, preview_page};

use crate::error::WebError;

/// Rejects a request whose `path` parameter is empty.
pub(crate) fn require_path(path: &str) -> Result<(), WebError> {
    if path.trim().is_empty() {
        return Err(WebError::InvalidRequest {
            reason: "path must not be empty".to_string(),
        });
    }
    Ok(())
}
