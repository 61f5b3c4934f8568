//! Preview orchestration.
//!
//! A [`Preview`] is one mounted preview of one file: it resolves the file's
//! URLs, classifies the client, loads the demuxer for FLV, mounts the chosen
//! adapter and exposes the action triggers. Opening a different file means
//! building a new `Preview`; dropping or unmounting the old one releases its
//! player.
//!
//! Playback state machine:
//!
//! ```text
//! DetectingCapability --standard--> Ready
//!         |
//!         +--flv--> LoadingDemux --ok--> Ready
//!                        |
//!                        +--err--> Error (terminal)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actions::{ActionTrigger, action_triggers};
use crate::capability::{DeviceClass, PlaybackCapability, classify};
use crate::config::{ClipviewConfig, PreviewConfig};
use crate::demux::{DemuxLoader, DemuxModule, DemuxModuleSource, DemuxState};
use crate::media::MediaFile;
use crate::player::{
    EngineHandle, InstanceCallback, NativePlayerAdapter, NativePlayerConfig, PlayerServices,
    RichPlayerAdapter, RichPlayerOptions,
};
use crate::resolver::{PathResolver, ResolvedResources};

/// Everything a preview needs besides the file itself.
#[derive(Clone)]
pub struct PreviewContext {
    pub resolver: PathResolver,
    pub preview: PreviewConfig,
    pub services: PlayerServices,
    pub demux_source: Arc<dyn DemuxModuleSource>,
    /// Hostname for deep links that take a bare host
    pub hostname: String,
}

impl PreviewContext {
    pub fn new(
        config: &ClipviewConfig,
        services: PlayerServices,
        demux_source: Arc<dyn DemuxModuleSource>,
    ) -> Self {
        Self {
            resolver: PathResolver::new(config),
            preview: config.preview.clone(),
            services,
            demux_source,
            hostname: config.base_hostname(),
        }
    }
}

/// Playback half of the preview state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    DetectingCapability,
    LoadingDemux,
    Error { message: String },
    Ready,
}

/// Customise-link overlay, independent of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMenu {
    Closed,
    Open,
}

/// The adapter chosen for a ready preview.
pub enum ActiveAdapter {
    Native(NativePlayerAdapter),
    Rich(RichPlayerAdapter),
}

impl ActiveAdapter {
    pub fn render(&self) -> String {
        match self {
            ActiveAdapter::Native(adapter) => adapter.render(),
            ActiveAdapter::Rich(adapter) => adapter.render(),
        }
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        match self {
            ActiveAdapter::Native(adapter) => adapter.handle(),
            ActiveAdapter::Rich(adapter) => adapter.handle(),
        }
    }

    fn unmount(&mut self) {
        match self {
            ActiveAdapter::Native(adapter) => adapter.unmount(),
            ActiveAdapter::Rich(adapter) => adapter.unmount(),
        }
    }
}

/// What the preview area shows right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PreviewView {
    Loading { text: String },
    Error { message: String },
    Player { markup: String },
}

/// One mounted preview.
pub struct Preview {
    file: MediaFile,
    capability: PlaybackCapability,
    resources: ResolvedResources,
    state: PlaybackState,
    menu: ResourceMenu,
    loader: Option<DemuxLoader>,
    adapter: Option<ActiveAdapter>,
    on_instance: Option<InstanceCallback>,
    context: PreviewContext,
}

impl Preview {
    /// Opens a preview for `file`.
    ///
    /// Capability detection completes synchronously. Standard containers
    /// mount their adapter immediately; FLV starts the demuxer request and
    /// stays in `LoadingDemux` until [`Preview::advance`] or
    /// [`Preview::poll`] observes the outcome.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(
        file: MediaFile,
        user_agent: &str,
        token: Option<String>,
        context: PreviewContext,
    ) -> Self {
        Self::open_with_callback(file, user_agent, token, context, None)
    }

    /// Like [`Preview::open`], reporting the rich engine's handle to `on_instance`.
    pub fn open_with_callback(
        file: MediaFile,
        user_agent: &str,
        token: Option<String>,
        context: PreviewContext,
        on_instance: Option<InstanceCallback>,
    ) -> Self {
        let resources = context.resolver.resolve(&file.path, token.as_deref());
        let mut preview = Self {
            capability: PlaybackCapability::default(),
            resources,
            state: PlaybackState::DetectingCapability,
            menu: ResourceMenu::Closed,
            loader: None,
            adapter: None,
            on_instance,
            context,
            file,
        };

        preview.capability = classify(user_agent, &preview.file.name);
        info!(
            path = %preview.file.path,
            capability = %preview.capability,
            "Opening preview"
        );

        if preview.capability.requires_demux() {
            preview.loader = Some(DemuxLoader::spawn(Arc::clone(&preview.context.demux_source)));
            preview.state = PlaybackState::LoadingDemux;
        } else {
            preview.mount(None);
        }
        preview
    }

    /// Waits for a pending demuxer request and applies its outcome.
    pub async fn advance(&mut self) -> &PlaybackState {
        if self.state == PlaybackState::LoadingDemux {
            if let Some(loader) = self.loader.as_mut() {
                let settled = loader.settled().await;
                self.apply_demux(settled);
            }
        }
        &self.state
    }

    /// Applies the demuxer outcome if it has already settled.
    pub fn poll(&mut self) -> &PlaybackState {
        if self.state == PlaybackState::LoadingDemux {
            if let Some(state) = self.loader.as_ref().map(DemuxLoader::state) {
                if !state.is_loading() {
                    self.apply_demux(state);
                }
            }
        }
        &self.state
    }

    /// Observer of the pending demuxer request, while one is pending.
    ///
    /// Lets callers wait for the outcome without holding the preview; the
    /// outcome is applied by the next [`Preview::poll`].
    pub fn demux_updates(&self) -> Option<watch::Receiver<DemuxState>> {
        if self.state != PlaybackState::LoadingDemux {
            return None;
        }
        self.loader.as_ref().map(DemuxLoader::subscribe)
    }

    fn apply_demux(&mut self, state: DemuxState) {
        match state {
            DemuxState::Loading => {}
            DemuxState::Ready(module) => self.mount(Some(module)),
            DemuxState::Failed(message) => {
                warn!(path = %self.file.path, %message, "Preview failed");
                self.state = PlaybackState::Error { message };
            }
        }
    }

    fn mount(&mut self, demux: Option<Arc<dyn DemuxModule>>) {
        let container = self.capability.container;
        let services = &self.context.services;

        let mounted = match self.capability.device {
            DeviceClass::NativeMobile => {
                let config = NativePlayerConfig::build(
                    &self.file,
                    &self.resources,
                    container,
                    &self.context.preview,
                );
                NativePlayerAdapter::mount(config, &self.resources, services, demux)
                    .map(ActiveAdapter::Native)
            }
            DeviceClass::RichDesktop => {
                let options =
                    RichPlayerOptions::build(&self.resources, container, &self.context.preview);
                RichPlayerAdapter::mount(
                    options,
                    &self.resources,
                    services,
                    demux,
                    self.on_instance.take(),
                )
                .map(ActiveAdapter::Rich)
            }
        };

        match mounted {
            Ok(adapter) => {
                debug!(path = %self.file.path, "Player mounted");
                self.adapter = Some(adapter);
                self.state = PlaybackState::Ready;
            }
            Err(e) => {
                warn!(path = %self.file.path, error = %e, "Player failed to mount");
                self.state = PlaybackState::Error {
                    message: e.to_string(),
                };
            }
        }
    }

    /// Waits up to `deadline` for the native adapter's subtitle fetch.
    pub async fn settle_captions(&mut self, deadline: Duration) -> bool {
        match self.adapter.as_mut() {
            Some(ActiveAdapter::Native(adapter)) => adapter.settle_captions(deadline).await,
            _ => true,
        }
    }

    pub fn view(&self) -> PreviewView {
        match (&self.state, &self.adapter) {
            (PlaybackState::Error { message }, _) => PreviewView::Error {
                message: message.clone(),
            },
            (PlaybackState::Ready, Some(adapter)) => PreviewView::Player {
                markup: adapter.render(),
            },
            _ => PreviewView::Loading {
                text: self.context.preview.demux_loading_text.clone(),
            },
        }
    }

    pub fn actions(&self) -> Vec<ActionTrigger> {
        action_triggers(
            &self.resources,
            self.context.resolver.base_url(),
            &self.context.hostname,
        )
    }

    pub fn toggle_menu(&mut self) -> ResourceMenu {
        self.menu = match self.menu {
            ResourceMenu::Closed => ResourceMenu::Open,
            ResourceMenu::Open => ResourceMenu::Closed,
        };
        self.menu
    }

    pub fn set_menu(&mut self, menu: ResourceMenu) {
        self.menu = menu;
    }

    pub fn menu(&self) -> ResourceMenu {
        self.menu
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn capability(&self) -> PlaybackCapability {
        self.capability
    }

    pub fn resources(&self) -> &ResolvedResources {
        &self.resources
    }

    pub fn file(&self) -> &MediaFile {
        &self.file
    }

    pub fn adapter(&self) -> Option<&ActiveAdapter> {
        self.adapter.as_ref()
    }

    /// Releases the player and cancels a pending demuxer request. Idempotent.
    pub fn unmount(&mut self) {
        self.loader = None;
        if let Some(mut adapter) = self.adapter.take() {
            adapter.unmount();
            debug!(path = %self.file.path, "Preview unmounted");
        }
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        self.unmount();
    }
}
