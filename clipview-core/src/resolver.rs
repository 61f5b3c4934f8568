//! Companion resource resolution for a previewed video.
//!
//! Every URL a preview needs is derived from the video's route path and an
//! optional access token by pure string construction. Nothing here touches
//! the network.

use serde::Serialize;

use crate::config::{ClipviewConfig, EndpointConfig, PreviewConfig};

/// URLs for one render of one file. Rebuilt whenever the path or token
/// changes; never cached across files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedResources {
    pub video_url: String,
    pub subtitle_url: String,
    pub caption_overlay_url: String,
    pub thumbnail_url: String,
    /// Absolute raw link, suitable for the clipboard and external players
    pub direct_download_url: String,
}

/// Builds raw/thumbnail URLs and sibling paths for a video route path.
#[derive(Debug, Clone)]
pub struct PathResolver {
    endpoints: EndpointConfig,
    preview: PreviewConfig,
    base_url: String,
}

impl PathResolver {
    pub fn new(config: &ClipviewConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            preview: config.preview.clone(),
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves every companion URL for `path`.
    pub fn resolve(&self, path: &str, token: Option<&str>) -> ResolvedResources {
        let video_url = self.raw_url(path, token);
        ResolvedResources {
            subtitle_url: self.raw_url(&self.subtitle_path(path), token),
            caption_overlay_url: self.raw_url(&self.overlay_path(path), token),
            thumbnail_url: self.thumbnail_url(path, token),
            direct_download_url: self.absolute(&video_url),
            video_url,
        }
    }

    /// Raw-content URL: `<raw>?path=<path>[&odpt=<token>]`.
    pub fn raw_url(&self, path: &str, token: Option<&str>) -> String {
        format!(
            "{}?path={}{}",
            self.endpoints.raw_path,
            encode_path(path),
            self.token_suffix(token)
        )
    }

    /// Thumbnail URL requesting the configured (largest) size.
    pub fn thumbnail_url(&self, path: &str, token: Option<&str>) -> String {
        format!(
            "{}?path={}&size={}{}",
            self.endpoints.thumbnail_path,
            encode_path(path),
            self.preview.thumbnail_size,
            self.token_suffix(token)
        )
    }

    /// Sibling subtitle path: the video's extension swapped for the caption
    /// extension, or the caption extension appended when the basename has no
    /// extension.
    pub fn subtitle_path(&self, path: &str) -> String {
        let (dir, basename) = split_basename(path);
        let stem = strip_extension(basename);
        let prefix = &path[..dir.len() + stem.len()];
        format!("{prefix}.{}", self.preview.caption_extension)
    }

    /// Danmaku data path: `<dir>/<overlay folder>/<stem>.<overlay ext>`.
    ///
    /// Paths without a `/` resolve relative to the file's own directory.
    pub fn overlay_path(&self, path: &str) -> String {
        let (dir, basename) = split_basename(path);
        let stem = strip_extension(basename);
        format!(
            "{dir}{}/{stem}.{}",
            self.preview.overlay_folder, self.preview.overlay_extension
        )
    }

    /// Prefixes a root-relative URL with the public base URL.
    pub fn absolute(&self, relative: &str) -> String {
        format!("{}{relative}", self.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token_suffix(&self, token: Option<&str>) -> String {
        match token {
            Some(token) if !token.is_empty() => format!(
                "&{}={}",
                self.endpoints.token_param,
                urlencoding::encode(token)
            ),
            _ => String::new(),
        }
    }
}

/// Splits a path into its directory prefix (including the trailing `/`,
/// empty when there is none) and basename.
fn split_basename(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    }
}

fn strip_extension(basename: &str) -> &str {
    basename
        .rfind('.')
        .map_or(basename, |index| &basename[..index])
}

/// Percent-encodes each segment, keeping `/` separators readable.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Synchronous lookup of the access token for a protected route.
pub trait TokenStore: Send + Sync {
    /// Returns the hashed token covering `route_path`, if any.
    fn stored_token(&self, route_path: &str) -> Option<String>;
}

/// Token store keyed by protected route prefixes.
///
/// A prefix covers itself and everything below it; the longest matching
/// prefix wins.
#[derive(Debug, Clone, Default)]
pub struct ProtectedRoutes {
    routes: Vec<(String, String)>,
}

impl ProtectedRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` for `route` and everything beneath it.
    pub fn insert(&mut self, route: impl Into<String>, token: impl Into<String>) {
        let route = route.into().trim_end_matches('/').to_string();
        let token = token.into();
        match self.routes.iter_mut().find(|(existing, _)| *existing == route) {
            Some(entry) => entry.1 = token,
            None => self.routes.push((route, token)),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>, token: impl Into<String>) -> Self {
        self.insert(route, token);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl TokenStore for ProtectedRoutes {
    fn stored_token(&self, route_path: &str) -> Option<String> {
        self.routes
            .iter()
            .filter(|(route, _)| covers(route, route_path))
            .max_by_key(|(route, _)| route.len())
            .map(|(_, token)| token.clone())
    }
}

fn covers(route: &str, path: &str) -> bool {
    if route.is_empty() {
        return true;
    }
    match path.strip_prefix(route) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(&ClipviewConfig::default())
    }

    #[test]
    fn test_desktop_mp4_scenario_urls() {
        let resources = resolver().resolve("/Movies/clip.mp4", None);

        assert_eq!(resources.video_url, "/api/raw/?path=/Movies/clip.mp4");
        assert_eq!(resources.subtitle_url, "/api/raw/?path=/Movies/clip.vtt");
        assert_eq!(
            resources.thumbnail_url,
            "/api/thumbnail/?path=/Movies/clip.mp4&size=large"
        );
        assert_eq!(
            resources.direct_download_url,
            "http://127.0.0.1:3000/api/raw/?path=/Movies/clip.mp4"
        );
    }

    #[test]
    fn test_token_appended_to_every_url() {
        let resources = resolver().resolve("/Movies/clip.flv", Some("abc"));

        assert_eq!(resources.video_url, "/api/raw/?path=/Movies/clip.flv&odpt=abc");
        assert_eq!(resources.subtitle_url, "/api/raw/?path=/Movies/clip.vtt&odpt=abc");
        assert_eq!(
            resources.thumbnail_url,
            "/api/thumbnail/?path=/Movies/clip.flv&size=large&odpt=abc"
        );
        assert!(resources.caption_overlay_url.ends_with("&odpt=abc"));
    }

    #[test]
    fn test_subtitle_path_without_extension() {
        let resolver = resolver();
        assert_eq!(resolver.subtitle_path("/Movies/clip"), "/Movies/clip.vtt");
        assert_eq!(resolver.subtitle_path("/v1.2/clip"), "/v1.2/clip.vtt");
        assert_eq!(resolver.subtitle_path("clip"), "clip.vtt");
    }

    #[test]
    fn test_overlay_path_in_danmaku_folder() {
        let resolver = resolver();
        assert_eq!(
            resolver.overlay_path("/Movies/clip.mp4"),
            "/Movies/弹幕XML/clip.xml"
        );
        assert_eq!(resolver.overlay_path("/clip.mp4"), "/弹幕XML/clip.xml");
    }

    #[test]
    fn test_overlay_path_without_separator_or_extension() {
        let resolver = resolver();
        assert_eq!(resolver.overlay_path("clip.mp4"), "弹幕XML/clip.xml");
        assert_eq!(resolver.overlay_path("clip"), "弹幕XML/clip.xml");
        assert_eq!(resolver.overlay_path("/Shows/pilot"), "/Shows/弹幕XML/pilot.xml");
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let url = resolver().raw_url("/My Videos/a&b.mp4", Some("t/k"));
        assert_eq!(url, "/api/raw/?path=/My%20Videos/a%26b.mp4&odpt=t%2Fk");
    }

    #[test]
    fn test_empty_token_is_ignored() {
        assert_eq!(
            resolver().raw_url("/a.mp4", Some("")),
            "/api/raw/?path=/a.mp4"
        );
    }

    #[test]
    fn test_protected_routes_longest_prefix_wins() {
        let store = ProtectedRoutes::new()
            .with_route("/Private", "outer")
            .with_route("/Private/Deep/", "inner");

        assert_eq!(store.stored_token("/Private/a.mp4").as_deref(), Some("outer"));
        assert_eq!(
            store.stored_token("/Private/Deep/b.mp4").as_deref(),
            Some("inner")
        );
        assert_eq!(store.stored_token("/PrivateX/c.mp4"), None);
        assert_eq!(store.stored_token("/Public/d.mp4"), None);
    }

    #[test]
    fn test_protected_routes_insert_replaces_token() {
        let mut store = ProtectedRoutes::new();
        store.insert("/Private", "old");
        store.insert("/Private/", "new");
        assert_eq!(store.stored_token("/Private").as_deref(), Some("new"));
    }

    proptest! {
        #[test]
        fn prop_subtitle_replaces_extension(
            dir in "(/[a-zA-Z0-9_]{1,8}){0,3}",
            stem in "[a-zA-Z0-9_]{1,12}",
            ext in "[a-z0-9]{1,4}",
            token in proptest::option::of("[a-z0-9]{1,8}"),
        ) {
            let resolver = resolver();
            let path = format!("{dir}/{stem}.{ext}");
            let expected = resolver.raw_url(&format!("{dir}/{stem}.vtt"), token.as_deref());
            let resources = resolver.resolve(&path, token.as_deref());

            prop_assert_eq!(&resources.subtitle_url, &expected);
            prop_assert_eq!(resources.subtitle_url.contains("&odpt="), token.is_some());
        }

        #[test]
        fn prop_extensionless_basename_appends_caption_extension(
            dir in "(/[a-z.]{1,8}){0,3}",
            basename in "[a-zA-Z0-9_ ]{1,12}",
        ) {
            let resolver = resolver();
            let path = format!("{dir}/{basename}");
            let resources = resolver.resolve(&path, None);
            prop_assert_eq!(
                resources.subtitle_url,
                resolver.raw_url(&format!("{path}.vtt"), None)
            );
        }
    }
}
