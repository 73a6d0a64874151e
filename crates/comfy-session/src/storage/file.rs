//! JSON profile file identity persistence.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use comfy_core::{IdentityStore, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const APP_DIR: &str = "comfy-session";
const PROFILE_FILE: &str = "profile.json";

/// Persisted client profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Generated once, survives logout.
    pub client_id: Uuid,
    /// Identity used to reconnect.
    #[serde(default)]
    pub username: Option<String>,
    /// Unix seconds of the last save.
    #[serde(default)]
    pub last_used: i64,
}

impl ClientProfile {
    fn fresh() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            username: None,
            last_used: now(),
        }
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Identity store backed by a JSON profile file.
pub struct FileIdentityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIdentityStore {
    /// Store at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store under the user's config directory.
    ///
    /// # Errors
    /// Returns error if the platform has no config directory.
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::new(dir.join(APP_DIR).join(PROFILE_FILE)))
    }

    /// Path of the profile file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current profile, creating and persisting one if none exists.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or written.
    pub fn profile(&self) -> Result<ClientProfile, StorageError> {
        let _guard = self.lock.lock();
        self.read_or_create()
    }

    fn read(&self) -> Result<Option<ClientProfile>, StorageError> {
        match fs::read(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_or_create(&self) -> Result<ClientProfile, StorageError> {
        if let Some(profile) = self.read()? {
            return Ok(profile);
        }
        let profile = ClientProfile::fresh();
        self.write(&profile)?;
        tracing::info!(client_id = %profile.client_id, "Created client profile");
        Ok(profile)
    }

    fn write(&self, profile: &ClientProfile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(profile)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.and_then(|p| p.username))
    }

    fn save(&self, identity: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut profile = self.read_or_create()?;
        profile.username = Some(identity.to_string());
        profile.last_used = now();
        self.write(&profile)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let Some(mut profile) = self.read()? else {
            return Ok(());
        };
        profile.username = None;
        self.write(&profile)
    }
}
