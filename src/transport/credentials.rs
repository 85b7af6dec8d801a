//! # Credential Store Collaborator
//!
//! Trait seam for the platform's secure key-value store holding broker
//! credentials. The host application supplies the real implementation
//! (keychain, keystore); an in-memory implementation is provided for tests
//! and headless use.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// Key under which the broker username is stored
pub const USERNAME_KEY: &str = "mqtt.username";

/// Key under which the broker password is stored
pub const PASSWORD_KEY: &str = "mqtt.password";

/// Secure key-value store for connection credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Look up the broker credential pair. Returns `None` unless both the
/// username and password are present.
pub fn broker_credentials(store: &dyn CredentialStore) -> Result<Option<(String, String)>> {
    let username = store.get(USERNAME_KEY)?;
    let password = store.get(PASSWORD_KEY)?;
    Ok(username.zip(password))
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .expect("credential store lock poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .remove(key);
        Ok(())
    }
}
