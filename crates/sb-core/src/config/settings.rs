//! Client configuration file

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// On-disk layout of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Bridge server endpoints and session policy
    pub bridge: BridgeConfig,
    /// File transfer tuning
    pub transfer: TransferConfig,
}

/// Bridge server endpoints and session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the REST API
    pub api_url: String,

    /// Base URL of the socket endpoint
    pub socket_url: String,

    /// Socket.IO mount path on the socket endpoint
    pub socket_path: String,

    /// Origin header presented on the socket handshake
    pub origin: String,

    /// Servers whose name contains this marker (any case) need step-up
    /// verification before connecting
    pub production_marker: String,

    /// Socket connect timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// REST request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sshbridge.csiq.io".to_string(),
            socket_url: "https://api.sshbridge.csiq.io".to_string(),
            socket_path: "/socket.io/".to_string(),
            origin: "https://sshbridge.csiq.io".to_string(),
            production_marker: "PROD".to_string(),
            connect_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// File transfer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// How long the socket stays open after the final upload chunk
    #[serde(rename = "settle_delay_ms", with = "duration_millis")]
    pub settle_delay: Duration,

    /// Optional bound on upload chunks sent ahead of `upload-progress`
    /// acknowledgements. Unset means no flow control.
    pub max_in_flight_chunks: Option<usize>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            max_in_flight_chunks: None,
        }
    }
}
