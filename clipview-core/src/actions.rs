//! Action triggers rendered beneath a preview.
//!
//! Download, alternate-host download, copy-direct-link, customise-link and
//! deep links into external players, all bound to the resolved URLs of the
//! current file.

use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::HostRewrite;
use crate::resolver::ResolvedResources;

/// Notification shown after copying the direct link.
pub const COPY_SUCCESS_MESSAGE: &str = "Copied direct link to clipboard.";

/// Desktop and mobile players reachable through custom URI schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalPlayer {
    Iina,
    Vlc,
    PotPlayer,
    NPlayer,
}

impl ExternalPlayer {
    pub const ALL: [ExternalPlayer; 4] = [
        ExternalPlayer::Iina,
        ExternalPlayer::Vlc,
        ExternalPlayer::PotPlayer,
        ExternalPlayer::NPlayer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExternalPlayer::Iina => "IINA",
            ExternalPlayer::Vlc => "VLC",
            ExternalPlayer::PotPlayer => "PotPlayer",
            ExternalPlayer::NPlayer => "nPlayer",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ExternalPlayer::Iina => "/players/iina.svg",
            ExternalPlayer::Vlc => "/players/vlc.svg",
            ExternalPlayer::PotPlayer => "/players/potplayer.svg",
            ExternalPlayer::NPlayer => "/players/nplayer.svg",
        }
    }

    /// Deep link opening `video_url` in this player.
    ///
    /// nPlayer takes a bare host instead of the full base URL.
    pub fn deep_link(self, base_url: &str, hostname: &str, video_url: &str) -> String {
        match self {
            ExternalPlayer::Iina => format!("iina://weblink?url={base_url}{video_url}"),
            ExternalPlayer::Vlc => format!("vlc://{base_url}{video_url}"),
            ExternalPlayer::PotPlayer => format!("potplayer://{base_url}{video_url}"),
            ExternalPlayer::NPlayer => format!("nplayer-http://{hostname}{video_url}"),
        }
    }
}

/// One control rendered beneath the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionTrigger {
    /// Opens the raw URL
    Download { url: String },
    /// Re-resolves the raw URL upstream and opens the rewritten location
    AlternateDownload { source_url: String },
    /// Copies the absolute raw link and confirms with a notification
    CopyDirectLink { link: String },
    /// Opens the customise-link overlay
    CustomiseLink,
    ExternalPlayer {
        player: ExternalPlayer,
        label: &'static str,
        uri: String,
    },
}

/// Triggers for a resolved file, in display order.
pub fn action_triggers(
    resources: &ResolvedResources,
    base_url: &str,
    hostname: &str,
) -> Vec<ActionTrigger> {
    let mut triggers = vec![
        ActionTrigger::Download {
            url: resources.video_url.clone(),
        },
        ActionTrigger::AlternateDownload {
            source_url: resources.video_url.clone(),
        },
        ActionTrigger::CopyDirectLink {
            link: resources.direct_download_url.clone(),
        },
        ActionTrigger::CustomiseLink,
    ];
    triggers.extend(ExternalPlayer::ALL.into_iter().map(|player| {
        ActionTrigger::ExternalPlayer {
            player,
            label: player.label(),
            uri: player.deep_link(base_url, hostname, &resources.video_url),
        }
    }));
    triggers
}

/// Destination of copied text.
pub trait Clipboard {
    fn copy(&self, text: &str);
}

/// Success toasts.
pub trait Notifier {
    fn success(&self, message: &str);
}

/// Copies the absolute raw link and fires one success notification.
pub fn copy_direct_link(
    resources: &ResolvedResources,
    clipboard: &dyn Clipboard,
    notifier: &dyn Notifier,
) {
    clipboard.copy(&resources.direct_download_url);
    notifier.success(COPY_SUCCESS_MESSAGE);
}

/// Failures of the alternate download action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream did not redirect (status {status})")]
    NoRedirect { status: u16 },

    #[error("upstream redirect location is invalid")]
    InvalidLocation,
}

/// Replaces the first occurrence of the configured host substring.
pub fn rewrite_location(location: &str, rewrite: Option<&HostRewrite>) -> String {
    match rewrite {
        Some(rewrite) if !rewrite.from.is_empty() => location.replacen(&rewrite.from, &rewrite.to, 1),
        _ => location.to_string(),
    }
}

/// Resolves where the raw endpoint redirects to, without following it.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: reqwest::Client,
    upstream_origin: String,
    rewrite: Option<HostRewrite>,
}

impl RedirectResolver {
    /// # Errors
    ///
    /// - `ActionError::Request` - The HTTP client could not be built
    pub fn new(
        upstream_origin: impl Into<String>,
        rewrite: Option<HostRewrite>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            upstream_origin: upstream_origin.into().trim_end_matches('/').to_string(),
            rewrite,
        })
    }

    /// Final download location for a raw URL, with the host rewrite applied.
    ///
    /// # Errors
    ///
    /// - `ActionError::Request` - Upstream unreachable
    /// - `ActionError::NoRedirect` - Upstream answered without a redirect
    /// - `ActionError::InvalidLocation` - `Location` header missing or not UTF-8
    pub async fn resolve(&self, video_url: &str) -> Result<String, ActionError> {
        let url = if video_url.starts_with('/') {
            format!("{}{video_url}", self.upstream_origin)
        } else {
            video_url.to_string()
        };

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_redirection() {
            return Err(ActionError::NoRedirect {
                status: status.as_u16(),
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ActionError::InvalidLocation)?;
        debug!(%url, %location, "Resolved raw redirect");

        Ok(rewrite_location(location, self.rewrite.as_ref()))
    }
}
