//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding socket packets
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Empty text frame
    #[error("Empty packet")]
    EmptyPacket,

    /// Unknown Engine.IO packet type
    #[error("Unknown engine packet type: {0:?}")]
    UnknownEnginePacket(char),

    /// Unknown Socket.IO packet type
    #[error("Unknown socket packet type: {0:?}")]
    UnknownPacketType(char),

    /// Binary packet header carried a malformed attachment count
    #[error("Invalid attachment count in packet: {0}")]
    InvalidAttachmentCount(String),

    /// Event packet without an event name
    #[error("Event packet is missing its name")]
    MissingEventName,

    /// Binary frame arrived while no binary packet was pending
    #[error("Unexpected binary frame")]
    UnexpectedBinary,

    /// Event payload did not have the expected shape
    #[error("Invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
