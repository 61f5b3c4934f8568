//! Locally addressable blobs for fetched subtitle tracks.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

/// Published bytes with their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub content_type: String,
}

/// Object-URL registry. Every created URL must be revoked exactly once.
pub trait BlobStore: Send + Sync {
    /// Publishes `data` and returns the URL it is served under.
    fn create_object_url(&self, data: Bytes, content_type: &str) -> String;

    /// Withdraws a URL. Returns `false` if it was unknown or already revoked.
    fn revoke_object_url(&self, url: &str) -> bool;
}

/// Blob registry served by the preview server under a fixed route prefix.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    prefix: String,
    blobs: RwLock<HashMap<Uuid, Blob>>,
}

impl InMemoryBlobStore {
    /// `prefix` is the route the blobs are served from, e.g. `/blob/`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Blob> {
        self.blobs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn id_of(&self, url: &str) -> Option<Uuid> {
        url.strip_prefix(&self.prefix)
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("/blob/")
    }
}

impl BlobStore for InMemoryBlobStore {
    fn create_object_url(&self, data: Bytes, content_type: &str) -> String {
        let id = Uuid::new_v4();
        self.blobs.write().insert(
            id,
            Blob {
                data,
                content_type: content_type.to_string(),
            },
        );
        format!("{}{id}", self.prefix)
    }

    fn revoke_object_url(&self, url: &str) -> bool {
        match self.id_of(url) {
            Some(id) => self.blobs.write().remove(&id).is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_revoke() {
        let store = InMemoryBlobStore::default();
        let url = store.create_object_url(Bytes::from_static(b"WEBVTT"), "text/vtt");
        assert!(url.starts_with("/blob/"));

        let id = Uuid::parse_str(url.trim_start_matches("/blob/")).unwrap();
        let blob = store.get(&id).unwrap();
        assert_eq!(blob.data, Bytes::from_static(b"WEBVTT"));
        assert_eq!(blob.content_type, "text/vtt");

        assert!(store.revoke_object_url(&url));
        assert!(!store.revoke_object_url(&url));
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_revoke_foreign_url() {
        let store = InMemoryBlobStore::default();
        assert!(!store.revoke_object_url("/elsewhere/123"));
        assert!(!store.revoke_object_url("/blob/not-a-uuid"));
    }
}
