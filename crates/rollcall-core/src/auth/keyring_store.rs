use keyring::Entry;
use tracing::{debug, warn};

use super::store::{CredentialPair, StoreError, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

const SERVICE_NAME: &str = "rollcall";

/// Token store backed by the OS keychain, one entry per token.
pub struct KeyringTokenStore {
    access: Entry,
    refresh: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Result<Self, StoreError> {
        Ok(Self {
            access: Entry::new(service, ACCESS_TOKEN_KEY)?,
            refresh: Entry::new(service, REFRESH_TOKEN_KEY)?,
        })
    }
}

fn get(entry: &Entry) -> Result<Option<String>, StoreError> {
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn delete(entry: &Entry) -> Result<(), StoreError> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.access.set_password(&pair.access_token)?;
        if let Err(e) = self.refresh.set_password(&pair.refresh_token) {
            // Never leave a fresh access token next to a stale refresh token
            if let Err(rollback) = delete(&self.access) {
                warn!(error = %rollback, "Failed to roll back access token");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn read_access(&self) -> Result<Option<String>, StoreError> {
        get(&self.access)
    }

    fn read_refresh(&self) -> Result<Option<String>, StoreError> {
        get(&self.refresh)
    }

    fn set_access(&self, token: &str) -> Result<(), StoreError> {
        self.access.set_password(token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let access = delete(&self.access);
        let refresh = delete(&self.refresh);
        debug!("Keychain entries cleared");
        access.and(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyring::mock::{self, MockCredential};

    fn store() -> KeyringTokenStore {
        keyring::set_default_credential_builder(mock::default_credential_builder());
        KeyringTokenStore::with_service("rollcall-test").unwrap()
    }

    fn fail_next(entry: &Entry) {
        let credential: &MockCredential = entry.get_credential().downcast_ref().unwrap();
        credential.set_error(keyring::Error::Invalid(
            "keychain".to_string(),
            "locked".to_string(),
        ));
    }

    #[test]
    fn test_saved_pair_reads_back() {
        let store = store();
        assert!(store.read().unwrap().is_none());

        store.save(&CredentialPair::new("A1", "R1")).unwrap();
        assert_eq!(store.read().unwrap(), Some(CredentialPair::new("A1", "R1")));

        store.set_access("A2").unwrap();
        assert_eq!(store.read().unwrap(), Some(CredentialPair::new("A2", "R1")));
    }

    #[test]
    fn test_clear_removes_both_entries() {
        let store = store();
        store.save(&CredentialPair::new("A1", "R1")).unwrap();
        store.clear().unwrap();
        assert!(store.read_access().unwrap().is_none());
        assert!(store.read_refresh().unwrap().is_none());

        // Nothing left to delete is not an error
        store.clear().unwrap();
    }

    #[test]
    fn test_clear_still_removes_refresh_when_access_delete_fails() {
        let store = store();
        store.save(&CredentialPair::new("A1", "R1")).unwrap();

        fail_next(&store.access);
        assert!(matches!(store.clear(), Err(StoreError::Keyring(_))));
        assert!(store.read_refresh().unwrap().is_none());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_failed_save_leaves_no_half_pair() {
        let store = store();
        fail_next(&store.refresh);
        assert!(store.save(&CredentialPair::new("A1", "R1")).is_err());
        assert!(store.read_access().unwrap().is_none());
        assert!(store.read().unwrap().is_none());
    }
}
