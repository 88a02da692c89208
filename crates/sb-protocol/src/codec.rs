//! Frame codec for bridge events
//!
//! Turns WebSocket frames into [`Incoming`] items and [`ClientEvent`]s into
//! frames. Binary Socket.IO packets span several frames, so the decoder keeps
//! the announcing packet pending until all of its attachments have arrived.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::event::{error_text, ClientEvent, RawEvent, ServerEvent};
use crate::packet::{EnginePacket, HandshakeData, PacketKind, SocketPacket, DEFAULT_NAMESPACE};

/// A WebSocket data frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

/// Decoded item from the server
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Engine.IO open packet
    Handshake(HandshakeData),
    /// Server heartbeat; must be answered with a pong
    Ping,
    Pong,
    /// Engine.IO close
    Close,
    /// Namespace connect acknowledged
    Connected,
    /// Namespace connect refused by the server middleware
    ConnectRefused(String),
    Event(ServerEvent),
}

/// Binary packet still waiting for attachments
#[derive(Debug)]
struct PendingBinary {
    packet: SocketPacket,
    attachments: Vec<Bytes>,
}

/// Stateful decoder / stateless encoder for bridge frames
#[derive(Debug, Default)]
pub struct EventCodec {
    pending: Option<PendingBinary>,
}

impl EventCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Whether a binary packet is waiting for attachments
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Decode one frame. Returns `None` when the frame produced nothing the
    /// caller needs to act on (partial binary packet, noop, foreign namespace).
    pub fn decode(&mut self, frame: Frame) -> Result<Option<Incoming>, ProtocolError> {
        match frame {
            Frame::Binary(data) => {
                let mut pending = self.pending.take().ok_or(ProtocolError::UnexpectedBinary)?;
                pending.attachments.push(data);
                if pending.attachments.len() < pending.packet.attachments {
                    self.pending = Some(pending);
                    return Ok(None);
                }
                Self::finish(pending.packet, pending.attachments)
            }
            Frame::Text(text) => {
                if let Some(abandoned) = self.pending.take() {
                    tracing::warn!(
                        expected = abandoned.packet.attachments,
                        received = abandoned.attachments.len(),
                        "Binary packet interrupted by text frame, dropping it"
                    );
                }

                match EnginePacket::parse(&text)? {
                    EnginePacket::Open(data) => Ok(Some(Incoming::Handshake(data))),
                    EnginePacket::Ping => Ok(Some(Incoming::Ping)),
                    EnginePacket::Pong => Ok(Some(Incoming::Pong)),
                    EnginePacket::Close => Ok(Some(Incoming::Close)),
                    EnginePacket::Message(body) => self.decode_socket(&body),
                    EnginePacket::Upgrade | EnginePacket::Noop => Ok(None),
                }
            }
        }
    }

    fn decode_socket(&mut self, body: &str) -> Result<Option<Incoming>, ProtocolError> {
        let packet = SocketPacket::parse(body)?;

        if packet.namespace != DEFAULT_NAMESPACE {
            tracing::trace!(namespace = %packet.namespace, "Ignoring packet for other namespace");
            return Ok(None);
        }

        match packet.kind {
            PacketKind::Connect => Ok(Some(Incoming::Connected)),
            PacketKind::Disconnect => Ok(Some(Incoming::Event(ServerEvent::Disconnect {
                reason: "io server disconnect".to_string(),
            }))),
            PacketKind::ConnectError => {
                let message = packet
                    .data
                    .as_ref()
                    .and_then(error_text)
                    .unwrap_or_else(|| "connection refused".to_string());
                Ok(Some(Incoming::ConnectRefused(message)))
            }
            PacketKind::Event => Self::finish(packet, Vec::new()),
            PacketKind::BinaryEvent | PacketKind::BinaryAck if packet.attachments > 0 => {
                self.pending = Some(PendingBinary {
                    packet,
                    attachments: Vec::new(),
                });
                Ok(None)
            }
            PacketKind::BinaryEvent => Self::finish(packet, Vec::new()),
            PacketKind::Ack | PacketKind::BinaryAck => Ok(None),
        }
    }

    fn finish(packet: SocketPacket, attachments: Vec<Bytes>) -> Result<Option<Incoming>, ProtocolError> {
        // The client never requests acks, so any ack is stray.
        if packet.kind == PacketKind::BinaryAck {
            return Ok(None);
        }
        let raw = RawEvent::from_packet(&packet, attachments)?;
        Ok(Some(Incoming::Event(raw.into_server_event()?)))
    }

    /// Encode a client event into its text frame plus attachment frames
    pub fn encode(event: &ClientEvent) -> Result<Vec<Frame>, ProtocolError> {
        let (packet, attachments) = event.to_packet()?;
        let mut frames = Vec::with_capacity(1 + attachments.len());
        frames.push(Frame::Text(EnginePacket::Message(packet.encode()).encode()));
        frames.extend(attachments.into_iter().map(Frame::Binary));
        Ok(frames)
    }

    /// Namespace connect request (`40`)
    pub fn connect_frame() -> Frame {
        Frame::Text(EnginePacket::Message(SocketPacket::connect().encode()).encode())
    }

    /// Namespace disconnect (`41`)
    pub fn disconnect_frame() -> Frame {
        Frame::Text(EnginePacket::Message(SocketPacket::disconnect().encode()).encode())
    }

    /// Heartbeat answer (`3`)
    pub fn pong_frame() -> Frame {
        Frame::Text(EnginePacket::Pong.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TerminalGeometry;

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    #[test]
    fn test_decode_binary_event_across_frames() {
        let mut codec = EventCodec::new();

        let first = codec
            .decode(text(
                r#"451-["scp-download-chunk",{"chunk":{"_placeholder":true,"num":0},"isLast":false}]"#,
            ))
            .unwrap();
        assert!(first.is_none());
        assert!(codec.has_pending());

        let second = codec
            .decode(Frame::Binary(Bytes::from_static(b"0123456789")))
            .unwrap();
        assert!(!codec.has_pending());

        match second {
            Some(Incoming::Event(ServerEvent::DownloadChunk(chunk))) => {
                assert_eq!(chunk.chunk.as_deref(), Some(&b"0123456789"[..]));
                assert!(!chunk.is_last);
            }
            other => panic!("Expected DownloadChunk, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unexpected_binary() {
        let mut codec = EventCodec::new();
        assert!(matches!(
            codec.decode(Frame::Binary(Bytes::from_static(b"x"))),
            Err(ProtocolError::UnexpectedBinary)
        ));
    }

    #[test]
    fn test_text_frame_drops_incomplete_binary_packet() {
        let mut codec = EventCodec::new();
        codec
            .decode(text(r#"451-["output",{"_placeholder":true,"num":0}]"#))
            .unwrap();
        assert!(codec.has_pending());

        let ping = codec.decode(text("2")).unwrap();
        assert_eq!(ping, Some(Incoming::Ping));
        assert!(!codec.has_pending());
    }

    #[test]
    fn test_decode_namespace_connect_and_refusal() {
        let mut codec = EventCodec::new();
        assert_eq!(
            codec.decode(text(r#"40{"sid":"xyz"}"#)).unwrap(),
            Some(Incoming::Connected)
        );
        assert_eq!(
            codec
                .decode(text(r#"44{"message":"Not authorized"}"#))
                .unwrap(),
            Some(Incoming::ConnectRefused("Not authorized".to_string()))
        );
    }

    #[test]
    fn test_decode_server_disconnect_packet() {
        let mut codec = EventCodec::new();
        match codec.decode(text("41")).unwrap() {
            Some(Incoming::Event(ServerEvent::Disconnect { reason })) => {
                assert_eq!(reason, "io server disconnect");
            }
            other => panic!("Expected Disconnect, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ignores_other_namespace() {
        let mut codec = EventCodec::new();
        assert_eq!(
            codec.decode(text(r#"42/admin,["output","x"]"#)).unwrap(),
            None
        );
    }

    #[test]
    fn test_encode_input_emits_attachment_frame() {
        let frames = EventCodec::encode(&ClientEvent::Input(Bytes::from_static(b"\x03"))).unwrap();
        assert_eq!(
            frames,
            vec![
                text(r#"451-["input",{"_placeholder":true,"num":0}]"#),
                Frame::Binary(Bytes::from_static(b"\x03")),
            ]
        );
    }

    #[test]
    fn test_encode_resize_is_single_text_frame() {
        let frames =
            EventCodec::encode(&ClientEvent::Resize(TerminalGeometry::new(132, 43))).unwrap();
        assert_eq!(frames, vec![text(r#"42["resize",{"cols":132,"rows":43}]"#)]);
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(EventCodec::connect_frame(), text("40"));
        assert_eq!(EventCodec::disconnect_frame(), text("41"));
        assert_eq!(EventCodec::pong_frame(), text("3"));
    }
}
