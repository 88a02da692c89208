//! Process-wide session context
//!
//! The bearer token is a single value shared by every REST call and socket
//! handshake. Instead of a global, it is reached through a cloneable
//! `SessionContext` handed to each component. Reads always go to the
//! underlying store, so a token refreshed by a re-login is visible to the
//! very next request.

use std::sync::Arc;

use crate::credentials::{CredentialKey, CredentialStore};
use crate::error::ConfigError;

/// Shared handle over the credential store
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Current bearer token
    pub fn token(&self) -> Option<String> {
        self.store.get(CredentialKey::Token)
    }

    /// Username the token was issued to
    pub fn username(&self) -> Option<String> {
        self.store.get(CredentialKey::Username)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Replace the bearer token
    pub fn set_token(&self, token: &str) -> Result<(), ConfigError> {
        self.store.set(CredentialKey::Token, token)
    }

    /// Record a full login
    pub fn set_login(&self, token: &str, username: &str) -> Result<(), ConfigError> {
        self.store.set(CredentialKey::Token, token)?;
        self.store.set(CredentialKey::Username, username)
    }

    /// Forget the bearer token (the username is kept for step-up prompts)
    pub fn clear_token(&self) -> Result<(), ConfigError> {
        self.store.delete(CredentialKey::Token)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .field("username", &self.username())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;

    #[test]
    fn test_clones_share_state() {
        let context = SessionContext::new(Arc::new(MemoryCredentialStore::new()));
        let other = context.clone();

        context.set_login("abc", "alice").unwrap();
        assert_eq!(other.token().as_deref(), Some("abc"));
        assert_eq!(other.username().as_deref(), Some("alice"));

        other.set_token("def").unwrap();
        assert_eq!(context.token().as_deref(), Some("def"));
        assert_eq!(context.username().as_deref(), Some("alice"));
    }

    #[test]
    fn test_clear_token_keeps_username() {
        let context = SessionContext::new(Arc::new(MemoryCredentialStore::new()));
        context.set_login("abc", "alice").unwrap();
        context.clear_token().unwrap();

        assert!(!context.is_authenticated());
        assert_eq!(context.username().as_deref(), Some("alice"));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let context = SessionContext::new(Arc::new(MemoryCredentialStore::new()));
        context.set_login("secret-token", "alice").unwrap();
        assert!(!format!("{:?}", context).contains("secret-token"));
    }
}
