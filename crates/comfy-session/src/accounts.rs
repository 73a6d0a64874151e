//! Account directory implementations.

use std::{
    collections::HashSet,
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use comfy_core::{AccountDirectory, AccountError};
use parking_lot::RwLock;

/// Reject anything that is not a single plain path component.
fn validate(name: &str) -> Result<(), AccountError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name && !name.trim().is_empty() => Ok(()),
        _ => Err(AccountError::InvalidName(name.to_string())),
    }
}

/// In-memory account directory.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    names: RwLock<HashSet<String>>,
}

impl MemoryAccounts {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory containing `names`.
    #[must_use]
    pub fn with_accounts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Remove `name`. Returns `false` if it did not exist.
    pub fn remove(&self, name: &str) -> bool {
        self.names.write().remove(name)
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccounts {
    async fn exists(&self, identity: &str) -> Result<bool, AccountError> {
        Ok(self.names.read().contains(identity))
    }

    async fn create(&self, identity: &str) -> Result<(), AccountError> {
        validate(identity)?;
        if self.names.write().insert(identity.to_string()) {
            Ok(())
        } else {
            Err(AccountError::AlreadyExists(identity.to_string()))
        }
    }
}

/// Account directory with one folder per identity under a root.
#[derive(Debug, Clone)]
pub struct DirAccounts {
    root: PathBuf,
}

impl DirAccounts {
    /// Directory rooted at `root`. The root is created on first registration.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder of `identity`.
    ///
    /// # Errors
    /// Returns error if `identity` is not a valid folder name.
    pub fn folder(&self, identity: &str) -> Result<PathBuf, AccountError> {
        validate(identity)?;
        Ok(self.root.join(identity))
    }
}

#[async_trait]
impl AccountDirectory for DirAccounts {
    async fn exists(&self, identity: &str) -> Result<bool, AccountError> {
        let folder = self.folder(identity)?;
        match tokio::fs::metadata(&folder).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, identity: &str) -> Result<(), AccountError> {
        let folder = self.folder(identity)?;
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&folder).await {
            Ok(()) => {
                tracing::info!(identity, "Registered account");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(AccountError::AlreadyExists(identity.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_names() {
        assert!(validate("alice").is_ok());
        assert!(validate("user 1").is_ok());
        for bad in ["", " ", ".", "..", "a/b", "/abs", "../up"] {
            assert!(
                matches!(validate(bad), Err(AccountError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_memory_accounts() {
        let accounts = MemoryAccounts::with_accounts(["alice"]);
        assert!(accounts.exists("alice").await.unwrap());
        assert!(!accounts.exists("bob").await.unwrap());

        accounts.create("bob").await.unwrap();
        assert!(matches!(
            accounts.create("bob").await,
            Err(AccountError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_dir_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = DirAccounts::new(dir.path().join("users"));

        assert!(!accounts.exists("alice").await.unwrap());
        accounts.create("alice").await.unwrap();
        assert!(accounts.exists("alice").await.unwrap());
        assert!(dir.path().join("users").join("alice").is_dir());

        assert!(matches!(
            accounts.create("alice").await,
            Err(AccountError::AlreadyExists(_))
        ));
        assert!(matches!(
            accounts.exists("../etc").await,
            Err(AccountError::InvalidName(_))
        ));
    }
}
