//! Socket transport
//!
//! A connected socket is exposed as a pair of channels carrying typed
//! events. The transport itself (handshake, heartbeats, framing) runs in a
//! background task owned by the [`SocketConnector`] implementation.

mod client;

pub use client::{socket_url, SocketIoConnector};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sb_core::SessionError;
use sb_protocol::{ClientEvent, ServerEvent};

/// Capacity of the event channels in each direction
pub const CHANNEL_CAPACITY: usize = 256;

/// Per-connection transport parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketParams {
    /// Bridge session created over REST
    pub session_id: String,
    /// Bearer token presented on the handshake
    pub token: String,
}

/// A live socket
///
/// Dropping `outgoing` asks the transport to disconnect; `incoming` ends
/// after the transport has reported why it stopped.
#[derive(Debug)]
pub struct SocketChannels {
    pub outgoing: mpsc::Sender<ClientEvent>,
    pub incoming: mpsc::Receiver<ServerEvent>,
    /// Transport task, when there is one to wait for
    pub task: Option<JoinHandle<()>>,
}

/// Opens sockets to the bridge server
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Connect and complete the namespace handshake.
    ///
    /// Fails with [`SessionError::ConnectError`] when the server refuses the
    /// connection, and [`SessionError::Disconnected`] when the transport
    /// cannot be established at all.
    async fn connect(&self, params: &SocketParams) -> Result<SocketChannels, SessionError>;
}
