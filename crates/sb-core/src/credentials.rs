//! Credential persistence
//!
//! The bearer token and the username it was issued to are the only state
//! the client keeps between runs. [`FileCredentialStore`] writes them to
//! `credentials.toml` with mode 0600 on Unix; [`MemoryCredentialStore`] keeps
//! them in memory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Keys held by a credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKey {
    Token,
    Username,
}

/// Stored credential record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Credential {
    fn slot(&mut self, key: CredentialKey) -> &mut Option<String> {
        match key {
            CredentialKey::Token => &mut self.token,
            CredentialKey::Username => &mut self.username,
        }
    }

    fn value(&self, key: CredentialKey) -> Option<&String> {
        match key {
            CredentialKey::Token => self.token.as_ref(),
            CredentialKey::Username => self.username.as_ref(),
        }
    }
}

/// Key-value persistence for the token and username
pub trait CredentialStore: Send + Sync {
    /// Read a value; empty values read as absent
    fn get(&self, key: CredentialKey) -> Option<String>;

    /// Write a value
    fn set(&self, key: CredentialKey, value: &str) -> Result<(), ConfigError>;

    /// Remove a value
    fn delete(&self, key: CredentialKey) -> Result<(), ConfigError>;
}

fn lock(state: &Mutex<Credential>) -> MutexGuard<'_, Credential> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a record
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            state: Mutex::new(credential),
        }
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> Credential {
        lock(&self.state).clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        lock(&self.state)
            .value(key)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), ConfigError> {
        *lock(&self.state).slot(key) = Some(value.to_string());
        Ok(())
    }

    fn delete(&self, key: CredentialKey) -> Result<(), ConfigError> {
        *lock(&self.state).slot(key) = None;
        Ok(())
    }
}

/// TOML file store
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<Credential>,
}

impl FileCredentialStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is reported and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let credential = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Credential file {:?} is corrupt, ignoring it: {}", path, e);
                Credential::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Credential::default(),
            Err(e) => {
                return Err(ConfigError::Invalid(format!(
                    "Failed to read credentials: {}",
                    e
                )))
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(credential),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, credential: &Credential) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Invalid(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(credential)?;
        fs::write(&self.path, content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to write credentials: {}", e)))?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions).map_err(|e| {
                ConfigError::Invalid(format!("Failed to restrict credentials file: {}", e))
            })?;
        }

        tracing::debug!("Credentials written to {:?}", self.path);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        lock(&self.state)
            .value(key)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), ConfigError> {
        let mut state = lock(&self.state);
        *state.slot(key) = Some(value.to_string());
        self.persist(&state)
    }

    fn delete(&self, key: CredentialKey) -> Result<(), ConfigError> {
        let mut state = lock(&self.state);
        *state.slot(key) = None;
        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");

        let store = FileCredentialStore::open(&path).unwrap();
        assert_eq!(store.get(CredentialKey::Token), None);
        store.set(CredentialKey::Token, "abc").unwrap();
        store.set(CredentialKey::Username, "alice").unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get(CredentialKey::Token).as_deref(), Some("abc"));
        assert_eq!(
            reopened.get(CredentialKey::Username).as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_file_store_delete_keeps_other_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");

        let store = FileCredentialStore::open(&path).unwrap();
        store.set(CredentialKey::Token, "abc").unwrap();
        store.set(CredentialKey::Username, "alice").unwrap();
        store.delete(CredentialKey::Token).unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get(CredentialKey::Token), None);
        assert_eq!(
            reopened.get(CredentialKey::Username).as_deref(),
            Some("alice")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        let store = FileCredentialStore::open(&path).unwrap();
        store.set(CredentialKey::Token, "abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = FileCredentialStore::open(&path).unwrap();
        assert_eq!(store.get(CredentialKey::Token), None);
    }

    #[test]
    fn test_empty_value_reads_as_absent() {
        let store = MemoryCredentialStore::new();
        store.set(CredentialKey::Token, "").unwrap();
        assert_eq!(store.get(CredentialKey::Token), None);
    }
}
