//! sb-protocol: Socket wire protocol for SSHBridge
//!
//! The bridge server speaks Socket.IO v4 over a WebSocket transport. This
//! crate covers the two framing layers (Engine.IO packets and Socket.IO
//! packets, including binary attachments) and the typed event catalogue the
//! client exchanges with the server once a bridge session exists.

pub mod codec;
pub mod error;
pub mod event;
pub mod packet;

pub use codec::{EventCodec, Frame, Incoming};
pub use error::ProtocolError;
pub use event::{
    ClientEvent, DownloadChunk, DownloadProgress, DownloadResult, RawEvent, ServerEvent,
    StartSshPayload, TerminalGeometry, UploadChunk, UploadProgress,
};
pub use packet::{EnginePacket, HandshakeData, PacketKind, SocketPacket};

/// Engine.IO protocol revision spoken by the bridge server
pub const ENGINE_IO_VERSION: u8 = 4;
