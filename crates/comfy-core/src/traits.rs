//! Core traits for identity persistence and account lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection phase of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// No transport.
    #[default]
    Closed,
    /// Handshake in flight.
    Connecting,
    /// Transport open and subscriptions attached.
    Open,
}

impl ConnectionPhase {
    /// Whether a `connect` request should be ignored in this phase.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid stored data: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("No configuration directory available")]
    NoConfigDir,
}

/// Persistence for the identity used to reconnect.
///
/// Calls are synchronous: the session invokes them while applying a state
/// transition and never suspends there.
pub trait IdentityStore: Send + Sync {
    /// Load the persisted identity, if any.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persist `identity`.
    fn save(&self, identity: &str) -> Result<(), StorageError>;

    /// Forget the persisted identity.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Account lookup error.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid account name: {0:?}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External registry answering whether an identity exists.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Whether `identity` is a known account.
    async fn exists(&self, identity: &str) -> Result<bool, AccountError>;

    /// Register `identity`.
    ///
    /// Fails with [`AccountError::AlreadyExists`] when it is taken.
    async fn create(&self, identity: &str) -> Result<(), AccountError>;
}
