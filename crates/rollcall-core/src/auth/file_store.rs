use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{CredentialPair, StoreError, TokenStore};

/// Token file name in the data directory
const TOKENS_FILE: &str = "tokens.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    /// When the file was last written. Informational only, never an expiry.
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Token store backed by a JSON file in the data directory.
pub struct FileTokenStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENS_FILE)
    }

    /// Time of the last write, if a token file exists
    pub fn updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.updated_at)
    }

    fn load(&self) -> Result<TokenFile, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(TokenFile::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, mut file: TokenFile) -> Result<(), StoreError> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir)?;
        file.updated_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&file)?;

        // Temp file is created 0600; rename swaps it in whole
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(path = %path.display(), "Token file written");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(TokenFile {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
            updated_at: None,
        })
    }

    fn read_access(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.access_token)
    }

    fn read_refresh(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.refresh_token)
    }

    fn set_access(&self, token: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.load()?;
        file.access_token = Some(token.to_string());
        self.write(file)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "Token file removed");
        }
        Ok(())
    }
}
