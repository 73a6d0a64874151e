//! Revocable preview resources.
//!
//! Each binary preview frame becomes a handle addressable by a URL-like
//! string. The handle's bytes stay resolvable until it is revoked.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

const URL_PREFIX: &str = "blob:comfy-preview/";

/// Handle to one live preview image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    id: Uuid,
    url: String,
}

impl PreviewHandle {
    /// Unique id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// URL-like address, resolvable through [`PreviewRegistry::resolve`].
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Owner of preview bytes, keyed by handle URL.
#[derive(Default)]
pub struct PreviewRegistry {
    live: Mutex<HashMap<String, Bytes>>,
}

impl PreviewRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh handle.
    pub fn create(&self, bytes: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        let url = format!("{URL_PREFIX}{id}");
        self.live.lock().insert(url.clone(), bytes);
        PreviewHandle { id, url }
    }

    /// Revoke `handle`. Returns `false` if it was not live.
    pub fn revoke(&self, handle: &PreviewHandle) -> bool {
        let revoked = self.live.lock().remove(&handle.url).is_some();
        if revoked {
            tracing::debug!(url = %handle.url, "Revoked preview");
        } else {
            tracing::debug!(url = %handle.url, "Preview already revoked");
        }
        revoked
    }

    /// Bytes behind a live handle URL.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.live.lock().get(url).cloned()
    }

    /// Whether `handle` is still live.
    #[must_use]
    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.lock().contains_key(&handle.url)
    }

    /// Number of live handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}
