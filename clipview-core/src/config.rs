//! Centralized configuration for Clipview.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Clipview components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ClipviewConfig {
    pub endpoints: EndpointConfig,
    pub preview: PreviewConfig,
    pub server: ServerConfig,
}

/// Routes of the upstream file API that previews link against.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Raw-content endpoint, streams or redirects to file bytes
    pub raw_path: String,
    /// Thumbnail endpoint
    pub thumbnail_path: String,
    /// Query parameter carrying the hashed access token
    pub token_param: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            raw_path: "/api/raw/".to_string(),
            thumbnail_path: "/api/thumbnail/".to_string(),
            token_param: "odpt".to_string(),
        }
    }
}

/// Companion-file conventions and player presentation defaults.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Extension of the sibling subtitle file (WebVTT)
    pub caption_extension: String,
    /// Folder, relative to the video's directory, holding danmaku data
    pub overlay_folder: String,
    /// Extension of the danmaku data file
    pub overlay_extension: String,
    /// Thumbnail size requested from the upstream API
    pub thumbnail_size: String,
    /// Aspect ratio used when the file has no intrinsic dimensions
    pub default_aspect: (u32, u32),
    /// Text shown while the FLV demuxer loads
    pub demux_loading_text: String,
    /// Accent colour handed to the rich player
    pub theme: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            caption_extension: "vtt".to_string(),
            overlay_folder: "弹幕XML".to_string(),
            overlay_extension: "xml".to_string(),
            thumbnail_size: "large".to_string(),
            default_aspect: (16, 9),
            demux_loading_text: "Loading FLV extension...".to_string(),
            theme: "#23ade5".to_string(),
        }
    }
}

/// Host substring replacement applied to re-resolved download locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    pub from: String,
    pub to: String,
}

/// Web server and upstream connectivity configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the preview server binds to
    pub host: String,
    /// Port the preview server binds to
    pub port: u16,
    /// Public origin used for shareable absolute links
    pub base_url: String,
    /// Origin of the file API, used for server-side fetches
    pub upstream_origin: String,
    /// Timeout for upstream requests (subtitles, demuxer, redirects)
    pub request_timeout: Duration,
    /// Location of the FLV demuxer script
    pub demux_script_url: String,
    /// Optional rewrite for the alternate download action
    pub alternate_host: Option<HostRewrite>,
    /// User agent for upstream HTTP requests
    pub user_agent: &'static str,
    /// Mounted previews untouched for this long are unmounted
    pub session_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            base_url: "http://127.0.0.1:3000".to_string(),
            upstream_origin: "http://127.0.0.1:3000".to_string(),
            request_timeout: Duration::from_secs(15),
            demux_script_url: "https://cdn.jsdelivr.net/npm/mpegts.js@1.7.3/dist/mpegts.js"
                .to_string(),
            alternate_host: None,
            user_agent: "clipview/0.1.0",
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl ClipviewConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("CLIPVIEW_BASE_URL") {
            config.server.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Ok(upstream) = std::env::var("CLIPVIEW_UPSTREAM") {
            config.server.upstream_origin = upstream.trim_end_matches('/').to_string();
        }

        if let Ok(port) = std::env::var("CLIPVIEW_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(timeout) = std::env::var("CLIPVIEW_REQUEST_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.server.request_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(idle) = std::env::var("CLIPVIEW_SESSION_IDLE") {
            if let Ok(seconds) = idle.parse::<u64>() {
                config.server.session_idle_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(script) = std::env::var("CLIPVIEW_DEMUX_SCRIPT") {
            config.server.demux_script_url = script;
        }

        if let (Ok(from), Ok(to)) = (
            std::env::var("CLIPVIEW_REWRITE_FROM"),
            std::env::var("CLIPVIEW_REWRITE_TO"),
        ) {
            config.server.alternate_host = Some(HostRewrite { from, to });
        }

        if let Ok(folder) = std::env::var("CLIPVIEW_OVERLAY_FOLDER") {
            config.preview.overlay_folder = folder;
        }

        config
    }

    /// Hostname portion of the public base URL, empty when unparsable.
    pub fn base_hostname(&self) -> String {
        url::Url::parse(&self.server.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_match_file_api() {
        let config = ClipviewConfig::default();
        assert_eq!(config.endpoints.raw_path, "/api/raw/");
        assert_eq!(config.endpoints.thumbnail_path, "/api/thumbnail/");
        assert_eq!(config.endpoints.token_param, "odpt");
        assert_eq!(config.preview.default_aspect, (16, 9));
        assert_eq!(config.server.user_agent, "clipview/0.1.0");
        assert_eq!(config.server.session_idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_base_hostname() {
        let mut config = ClipviewConfig::default();
        config.server.base_url = "https://drive.example.com:8443".to_string();
        assert_eq!(config.base_hostname(), "drive.example.com");

        config.server.base_url = "not a url".to_string();
        assert_eq!(config.base_hostname(), "");
    }
}
