//! Engine.IO and Socket.IO packet framing
//!
//! Every WebSocket text frame carries one Engine.IO packet: a single type
//! digit followed by an optional payload. Engine.IO `message` packets in turn
//! carry one Socket.IO packet:
//!
//! ```text
//! <type>[<attachments>-][<namespace>,][<ack id>][<json data>]
//! ```
//!
//! Binary attachments of a Socket.IO packet travel as separate WebSocket
//! binary frames immediately after the text frame that announces them.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// Namespace used when a packet does not name one
pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake data carried by the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeData {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server would upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Interval between server pings, in milliseconds
    #[serde(default)]
    pub ping_interval: u64,
    /// Time the server waits for a pong, in milliseconds
    #[serde(default)]
    pub ping_timeout: u64,
    /// Largest payload the server accepts
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(HandshakeData),
    Close,
    Ping,
    Pong,
    /// Socket.IO payload
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Parse a WebSocket text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyPacket)?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            // Ping/pong may carry a "probe" payload during transport upgrades,
            // which never happens on a websocket-only connection.
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownEnginePacket(other)),
        }
    }

    /// Encode as a WebSocket text frame
    pub fn encode(&self) -> String {
        match self {
            Self::Open(data) => format!(
                "0{}",
                serde_json::json!({
                    "sid": data.sid,
                    "upgrades": data.upgrades,
                    "pingInterval": data.ping_interval,
                    "pingTimeout": data.ping_timeout,
                    "maxPayload": data.max_payload,
                })
            ),
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Message(body) => format!("4{}", body),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    ConnectError = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl PacketKind {
    /// Convert from the type digit
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Connect),
            '1' => Some(Self::Disconnect),
            '2' => Some(Self::Event),
            '3' => Some(Self::Ack),
            '4' => Some(Self::ConnectError),
            '5' => Some(Self::BinaryEvent),
            '6' => Some(Self::BinaryAck),
            _ => None,
        }
    }

    /// Convert to the type digit
    pub fn as_char(&self) -> char {
        char::from(b'0' + *self as u8)
    }

    /// Whether the packet announces binary attachments
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::BinaryEvent | Self::BinaryAck)
    }
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    pub namespace: String,
    /// Number of binary frames that follow this packet
    pub attachments: usize,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Create a packet on the default namespace
    pub fn new(kind: PacketKind, data: Option<Value>) -> Self {
        Self {
            kind,
            namespace: DEFAULT_NAMESPACE.to_string(),
            attachments: 0,
            ack_id: None,
            data,
        }
    }

    /// Namespace connect request
    pub fn connect() -> Self {
        Self::new(PacketKind::Connect, None)
    }

    /// Namespace disconnect
    pub fn disconnect() -> Self {
        Self::new(PacketKind::Disconnect, None)
    }

    /// Plain event: `["name", ...args]`
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Self::new(PacketKind::Event, Some(event_array(name, args)))
    }

    /// Event whose arguments reference `attachments` binary placeholders
    pub fn binary_event(name: &str, args: Vec<Value>, attachments: usize) -> Self {
        let mut packet = Self::new(PacketKind::BinaryEvent, Some(event_array(name, args)));
        packet.attachments = attachments;
        packet
    }

    /// Event name for event packets
    pub fn event_name(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(Value::as_str)
    }

    /// Event arguments (everything after the name)
    pub fn event_args(&self) -> Vec<Value> {
        match self.data.as_ref().and_then(Value::as_array) {
            Some(items) => items.iter().skip(1).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Parse a Socket.IO packet (the body of an Engine.IO message)
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let kind_char = text.chars().next().ok_or(ProtocolError::EmptyPacket)?;
        let kind =
            PacketKind::from_char(kind_char).ok_or(ProtocolError::UnknownPacketType(kind_char))?;
        let mut rest = &text[kind_char.len_utf8()..];

        let mut attachments = 0;
        if kind.is_binary() {
            let (count, tail) = rest
                .split_once('-')
                .ok_or_else(|| ProtocolError::InvalidAttachmentCount(text.to_string()))?;
            attachments = count
                .parse()
                .map_err(|_| ProtocolError::InvalidAttachmentCount(count.to_string()))?;
            rest = tail;
        }

        let mut namespace = DEFAULT_NAMESPACE.to_string();
        if rest.starts_with('/') {
            match rest.split_once(',') {
                Some((ns, tail)) => {
                    namespace = ns.to_string();
                    rest = tail;
                }
                None => {
                    namespace = rest.to_string();
                    rest = "";
                }
            }
        }

        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            rest[..digits].parse().ok()
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            attachments,
            ack_id,
            data,
        })
    }

    /// Encode as the body of an Engine.IO message
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());
        if self.kind.is_binary() {
            out.push_str(&self.attachments.to_string());
            out.push('-');
        }
        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }
}

fn event_array(name: &str, args: Vec<Value>) -> Value {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(name.to_string()));
    items.extend(args);
    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_engine_open_handshake() {
        let packet = EnginePacket::parse(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();

        match packet {
            EnginePacket::Open(data) => {
                assert_eq!(data.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(data.ping_interval, 25000);
                assert_eq!(data.ping_timeout, 20000);
                assert_eq!(data.max_payload, Some(1_000_000));
            }
            other => panic!("Expected Open, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_control_packets() {
        assert_eq!(EnginePacket::parse("2").unwrap(), EnginePacket::Ping);
        assert_eq!(EnginePacket::parse("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::Pong.encode(), "3");
        assert!(matches!(
            EnginePacket::parse("9"),
            Err(ProtocolError::UnknownEnginePacket('9'))
        ));
        assert!(matches!(
            EnginePacket::parse(""),
            Err(ProtocolError::EmptyPacket)
        ));
    }

    #[test]
    fn test_parse_connect_ack() {
        let packet = SocketPacket::parse(r#"0{"sid":"abc"}"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Connect);
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.data, Some(json!({"sid": "abc"})));
    }

    #[test]
    fn test_parse_event() {
        let packet = SocketPacket::parse(r#"2["output","hello"]"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Event);
        assert_eq!(packet.event_name(), Some("output"));
        assert_eq!(packet.event_args(), vec![json!("hello")]);
        assert_eq!(packet.ack_id, None);
    }

    #[test]
    fn test_parse_binary_event_with_namespace_and_ack() {
        let packet =
            SocketPacket::parse(r#"52-/bridge,17["upload",{"_placeholder":true,"num":1}]"#)
                .unwrap();
        assert_eq!(packet.kind, PacketKind::BinaryEvent);
        assert_eq!(packet.attachments, 2);
        assert_eq!(packet.namespace, "/bridge");
        assert_eq!(packet.ack_id, Some(17));
        assert_eq!(packet.event_name(), Some("upload"));
    }

    #[test]
    fn test_parse_rejects_bad_attachment_count() {
        assert!(matches!(
            SocketPacket::parse(r#"5x-["a"]"#),
            Err(ProtocolError::InvalidAttachmentCount(_))
        ));
        assert!(matches!(
            SocketPacket::parse(r#"5["a"]"#),
            Err(ProtocolError::InvalidAttachmentCount(_))
        ));
    }

    #[test]
    fn test_encode_binary_event() {
        let packet = SocketPacket::binary_event(
            "input",
            vec![json!({"_placeholder": true, "num": 0})],
            1,
        );
        assert_eq!(
            packet.encode(),
            r#"51-["input",{"_placeholder":true,"num":0}]"#
        );
    }

    #[test]
    fn test_encode_connect_and_namespace() {
        assert_eq!(SocketPacket::connect().encode(), "0");

        let mut packet = SocketPacket::event("auth", vec![json!("tok")]);
        packet.namespace = "/admin".to_string();
        assert_eq!(packet.encode(), r#"2/admin,["auth","tok"]"#);
    }
}
