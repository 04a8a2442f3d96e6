//! Persisted session slots.
//!
//! Two slots back a session: a durable bearer token and a short-lived
//! cached copy of the user's profile. The cached profile is only ever a
//! placeholder for display; it is cleared together with the token.

use std::path::PathBuf;

use chrono::Duration;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheManager, CachedData};
use crate::models::{AccessToken, Profile};

/// Token file name in the data directory
const TOKEN_FILE: &str = "token.json";

/// Cache entry name for the profile snapshot
const PROFILE_ENTRY: &str = "profile";

/// Keychain service and account holding the token
const KEYRING_SERVICE: &str = "jobscout";
const KEYRING_ACCOUNT: &str = "access-token";

/// Default lifetime of the cached profile.
pub const DEFAULT_PROFILE_TTL_MINUTES: i64 = 30;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),
}

/// Token slot plus profile cache slot.
pub trait SessionStorage: Send {
    fn load_token(&self) -> Result<Option<AccessToken>, StorageError>;
    fn save_token(&mut self, token: &AccessToken) -> Result<(), StorageError>;
    fn clear_token(&mut self) -> Result<(), StorageError>;

    /// Returns the cached profile unless it is missing or past its TTL.
    fn load_profile(&self) -> Result<Option<CachedData<Profile>>, StorageError>;
    fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError>;
    fn clear_profile(&mut self) -> Result<(), StorageError>;

    /// Clear both slots. Both are attempted even if the first fails.
    fn clear_all(&mut self) -> Result<(), StorageError> {
        let token = self.clear_token();
        let profile = self.clear_profile();
        token.and(profile)
    }
}

impl<T: SessionStorage + ?Sized> SessionStorage for Box<T> {
    fn load_token(&self) -> Result<Option<AccessToken>, StorageError> {
        (**self).load_token()
    }

    fn save_token(&mut self, token: &AccessToken) -> Result<(), StorageError> {
        (**self).save_token(token)
    }

    fn clear_token(&mut self) -> Result<(), StorageError> {
        (**self).clear_token()
    }

    fn load_profile(&self) -> Result<Option<CachedData<Profile>>, StorageError> {
        (**self).load_profile()
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError> {
        (**self).save_profile(profile)
    }

    fn clear_profile(&mut self) -> Result<(), StorageError> {
        (**self).clear_profile()
    }
}

fn fresh(cached: Option<CachedData<Profile>>, ttl: Duration) -> Option<CachedData<Profile>> {
    match cached {
        Some(entry) if entry.is_expired(ttl) => {
            debug!(age_minutes = entry.age_minutes(), "Cached profile expired");
            None
        }
        other => other,
    }
}

// ============================================================================
// File storage
// ============================================================================

#[derive(Serialize, Deserialize)]
struct TokenFile {
    access_token: AccessToken,
}

/// Token on disk under the data directory, profile in the cache directory.
pub struct FileStorage {
    data_dir: PathBuf,
    cache: CacheManager,
    profile_ttl: Duration,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf, cache_dir: PathBuf, profile_ttl: Duration) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            cache: CacheManager::new(cache_dir)?,
            profile_ttl,
        })
    }

    fn token_path(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }
}

impl SessionStorage for FileStorage {
    fn load_token(&self) -> Result<Option<AccessToken>, StorageError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let file: TokenFile = serde_json::from_str(&contents)?;
        Ok(Some(file.access_token))
    }

    fn save_token(&mut self, token: &AccessToken) -> Result<(), StorageError> {
        let path = self.token_path();
        let contents = serde_json::to_string(&TokenFile {
            access_token: token.clone(),
        })?;
        std::fs::write(&path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear_token(&mut self) -> Result<(), StorageError> {
        match std::fs::remove_file(self.token_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_profile(&self) -> Result<Option<CachedData<Profile>>, StorageError> {
        Ok(fresh(self.cache.load(PROFILE_ENTRY)?, self.profile_ttl))
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError> {
        self.cache.save(PROFILE_ENTRY, profile)
    }

    fn clear_profile(&mut self) -> Result<(), StorageError> {
        self.cache.remove(PROFILE_ENTRY)
    }
}

// ============================================================================
// Keychain storage
// ============================================================================

/// Token in the OS keychain, profile cache on disk.
pub struct KeyringStorage {
    cache: CacheManager,
    profile_ttl: Duration,
}

impl KeyringStorage {
    pub fn new(cache_dir: PathBuf, profile_ttl: Duration) -> Result<Self, StorageError> {
        Ok(Self {
            cache: CacheManager::new(cache_dir)?,
            profile_ttl,
        })
    }

    fn entry() -> Result<Entry, StorageError> {
        Ok(Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?)
    }
}

impl SessionStorage for KeyringStorage {
    fn load_token(&self) -> Result<Option<AccessToken>, StorageError> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(AccessToken::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_token(&mut self, token: &AccessToken) -> Result<(), StorageError> {
        Self::entry()?.set_password(token.as_str())?;
        Ok(())
    }

    fn clear_token(&mut self) -> Result<(), StorageError> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Failed to delete keychain token");
                Err(e.into())
            }
        }
    }

    fn load_profile(&self) -> Result<Option<CachedData<Profile>>, StorageError> {
        Ok(fresh(self.cache.load(PROFILE_ENTRY)?, self.profile_ttl))
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError> {
        self.cache.save(PROFILE_ENTRY, profile)
    }

    fn clear_profile(&mut self) -> Result<(), StorageError> {
        self.cache.remove(PROFILE_ENTRY)
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Process-local slots; nothing survives the process.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    token: Option<AccessToken>,
    profile: Option<CachedData<Profile>>,
    profile_ttl: Duration,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            token: None,
            profile: None,
            profile_ttl: Duration::minutes(DEFAULT_PROFILE_TTL_MINUTES),
        }
    }

    /// Pre-populate the slots, as if a previous run had saved them.
    pub fn with_slots(token: Option<AccessToken>, profile: Option<CachedData<Profile>>) -> Self {
        Self {
            token,
            profile,
            ..Self::new()
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn load_token(&self) -> Result<Option<AccessToken>, StorageError> {
        Ok(self.token.clone())
    }

    fn save_token(&mut self, token: &AccessToken) -> Result<(), StorageError> {
        self.token = Some(token.clone());
        Ok(())
    }

    fn clear_token(&mut self) -> Result<(), StorageError> {
        self.token = None;
        Ok(())
    }

    fn load_profile(&self) -> Result<Option<CachedData<Profile>>, StorageError> {
        Ok(fresh(self.profile.clone(), self.profile_ttl))
    }

    fn save_profile(&mut self, profile: &Profile) -> Result<(), StorageError> {
        self.profile = Some(CachedData::new(profile.clone()));
        Ok(())
    }

    fn clear_profile(&mut self) -> Result<(), StorageError> {
        self.profile = None;
        Ok(())
    }
}
