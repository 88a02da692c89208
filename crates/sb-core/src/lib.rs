//! sb-core: Core abstractions and configuration for SSHBridge
//!
//! This crate provides the domain types decoded from the bridge API, the
//! error taxonomy shared by every layer, the TOML configuration file, and
//! the credential store behind the process-wide [`SessionContext`].

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod types;

pub use context::SessionContext;
pub use credentials::{
    Credential, CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{AuthError, BridgeError, ConfigError, NetworkError, SessionError, TransferError};
pub use types::{GroupDescriptor, ServerDescriptor, TRANSFER_CHUNK_SIZE};
