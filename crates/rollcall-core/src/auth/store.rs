//! Durable storage for the access/refresh token pair.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FileTokenStore, KeyringTokenStore};
use crate::config::TokenBackend;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The two tokens issued by the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never end up in logs; only their lengths do.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token_len", &self.access_token.len())
            .field("refresh_token_len", &self.refresh_token.len())
            .finish()
    }
}

/// Key/value persistence for the credential pair.
///
/// Implementations do no expiry enforcement of their own. Writes either set
/// both tokens (`save`), replace the access token (`set_access`), or remove
/// both (`clear`).
pub trait TokenStore: Send + Sync {
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError>;

    fn read_access(&self) -> Result<Option<String>, StoreError>;

    fn read_refresh(&self) -> Result<Option<String>, StoreError>;

    /// Overwrite the access token, leaving the refresh token untouched
    fn set_access(&self, token: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Both tokens, or `None` if either one is missing
    fn read(&self) -> Result<Option<CredentialPair>, StoreError> {
        let access = self.read_access()?;
        let refresh = self.read_refresh()?;
        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }
}

/// Open the store selected by `backend`. `data_dir` is only used by the file backend.
pub fn open_store(backend: TokenBackend, data_dir: &Path) -> Result<Arc<dyn TokenStore>, StoreError> {
    Ok(match backend {
        TokenBackend::File => Arc::new(FileTokenStore::new(data_dir.to_path_buf())),
        TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()?),
        TokenBackend::Memory => Arc::new(MemoryTokenStore::default()),
    })
}

#[derive(Debug, Default)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: Mutex<Slots>,
}

impl MemoryTokenStore {
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            slots: Mutex::new(Slots {
                access: Some(pair.access_token),
                refresh: Some(pair.refresh_token),
            }),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let mut slots = self.slots();
        slots.access = Some(pair.access_token.clone());
        slots.refresh = Some(pair.refresh_token.clone());
        Ok(())
    }

    fn read_access(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slots().access.clone())
    }

    fn read_refresh(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slots().refresh.clone())
    }

    fn set_access(&self, token: &str) -> Result<(), StoreError> {
        self.slots().access = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slots() = Slots::default();
        Ok(())
    }
}
