//! In-memory identity persistence.

use comfy_core::{IdentityStore, StorageError};
use parking_lot::RwLock;

/// In-memory identity store.
///
/// Useful for tests and short-lived processes.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: RwLock<Option<String>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already remembers `identity`.
    #[must_use]
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: RwLock::new(Some(identity.into())),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.identity.read().clone())
    }

    fn save(&self, identity: &str) -> Result<(), StorageError> {
        *self.identity.write() = Some(identity.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.identity.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let store = MemoryIdentityStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("alice").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("alice"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
