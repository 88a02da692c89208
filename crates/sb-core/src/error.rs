//! Core error types for SSHBridge

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the bridge client
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Transfer error
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Server rejected the credentials or token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server still demands a second factor
    #[error("MFA code rejected")]
    MfaRequired,

    /// Login succeeded but the response carried no token
    #[error("No token received")]
    MissingToken,

    /// No stored user to re-verify
    #[error("User session not found, please login")]
    NotLoggedIn,

    /// Step-up verification failed
    #[error("Access denied: password re-verification failed")]
    StepUpDenied,

    /// Reading from the prompt failed
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Network-related errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Request or connect timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Could not establish a connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Response body had an unexpected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Server answered with a non-success status
    #[error("Request failed ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// File transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// Server reported a failure mid-transfer
    #[error("Remote error: {0}")]
    RemoteChunk(String),

    /// Local file could not be read or written
    #[error("Local I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Socket dropped or refused during the transfer
    #[error("Socket error: {0}")]
    Socket(String),
}

impl TransferError {
    /// Wrap an I/O error with the path it happened on
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Server ended the session
    #[error("Session ended by server")]
    EndedByServer,

    /// Transport dropped
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// Socket-level connection failure
    #[error("Connection error: {0}")]
    ConnectError(String),

    /// Negotiation stopped before the socket was opened
    #[error("Session aborted: {0}")]
    Aborted(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
