//! Preview sessions keyed by a browser cookie
//!
//! Each browser gets one session id and at most one mounted preview. Opening
//! another file replaces the session's preview, unmounting the old one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::{COOKIE, USER_AGENT};
use clipview_core::Preview;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "clipview_session";

/// Shortest pause between idle sweeps.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

struct SessionEntry {
    preview: Arc<Mutex<Preview>>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new(preview: Preview) -> Self {
        Self {
            preview: Arc::new(Mutex::new(preview)),
            last_seen: Instant::now(),
        }
    }
}

/// Mounted previews by session id.
#[derive(Clone, Default)]
pub struct PreviewSessions {
    previews: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl PreviewSessions {
    /// Creates an empty session map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preview mounted for `session_id`, if any. Counts as activity.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Preview>>> {
        let mut previews = self.previews.write().await;
        let entry = previews.get_mut(session_id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.preview))
    }

    /// Mounts `preview` for `session_id`, unmounting whatever was there.
    pub async fn replace(&self, session_id: &str, preview: Preview) {
        let previous = self
            .previews
            .write()
            .await
            .insert(session_id.to_string(), SessionEntry::new(preview));
        if let Some(previous) = previous {
            previous.preview.lock().await.unmount();
            debug!(session = session_id, "Replaced preview");
        }
    }

    /// Unmounts and forgets the session's preview.
    ///
    /// With `path`, the preview is only removed while it still shows that
    /// file, so a closing page cannot unmount a newer preview of the same
    /// session. Returns `false` if nothing was removed.
    pub async fn remove(&self, session_id: &str, path: Option<&str>) -> bool {
        let Some(preview) = self.peek(session_id).await else {
            return false;
        };
        if let Some(path) = path {
            if preview.lock().await.file().path != path {
                return false;
            }
        }

        let removed = {
            let mut previews = self.previews.write().await;
            match previews.get(session_id) {
                Some(entry) if Arc::ptr_eq(&entry.preview, &preview) => previews.remove(session_id),
                _ => None,
            }
        };
        match removed {
            Some(entry) => {
                entry.preview.lock().await.unmount();
                true
            }
            None => false,
        }
    }

    /// Unmounts every preview untouched for at least `max_idle`.
    ///
    /// Returns the number of previews evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.previews.write().await.retain(|_, entry| {
            let idle = now.duration_since(entry.last_seen) >= max_idle;
            if idle {
                evicted.push(Arc::clone(&entry.preview));
            }
            !idle
        });

        for preview in &evicted {
            preview.lock().await.unmount();
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle previews");
        }
        evicted.len()
    }

    /// Periodically evicts previews idle for `max_idle`.
    pub fn spawn_idle_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let sessions = self.clone();
        let period = (max_idle / 4).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                sessions.evict_idle(max_idle).await;
            }
        })
    }

    /// Number of mounted previews.
    pub async fn len(&self) -> usize {
        self.previews.read().await.len()
    }

    /// Whether no preview is mounted.
    pub async fn is_empty(&self) -> bool {
        self.previews.read().await.is_empty()
    }

    async fn peek(&self, session_id: &str) -> Option<Arc<Mutex<Preview>>> {
        self.previews
            .read()
            .await
            .get(session_id)
            .map(|entry| Arc::clone(&entry.preview))
    }
}

/// Session id from the request cookie.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Existing session id, or a fresh one flagged as new.
pub fn session_or_new(headers: &HeaderMap) -> (String, bool) {
    match session_id(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().simple().to_string(), true),
    }
}

/// `Set-Cookie` value establishing `session_id`.
pub fn session_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

/// Request user agent, empty when absent.
pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
