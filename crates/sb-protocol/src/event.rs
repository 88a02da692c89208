//! Typed bridge events
//!
//! # Event Flow
//!
//! 1. Client connects the socket and sends `auth` with its bearer token
//! 2. Client sends `startSSH` describing the target host and PTY geometry
//! 3. Server streams `output`; client sends `input` and `resize`
//! 4. File transfer: `scp-download` answered by `scp-download-result` or a
//!    sequence of `scp-download-chunk`; uploads are a sequence of
//!    `scp-upload-chunk`
//! 5. Server ends with `sessionEnd`, or the transport drops
//!
//! Byte payloads are sent as binary attachments. When decoding, the server
//! may also deliver them as UTF-8 strings, JSON byte arrays or serialized
//! Node buffers (`{"type":"Buffer","data":[...]}`); all are accepted.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProtocolError;
use crate::packet::SocketPacket;

/// PTY geometry forwarded to the remote shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalGeometry {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalGeometry {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Payload of the `startSSH` event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSshPayload {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    pub server_id: String,
    pub cols: u16,
    pub rows: u16,
}

/// One segment of an upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadChunk {
    /// Remote target name or path
    pub file_name: String,
    pub chunk: Bytes,
    pub offset: u64,
    pub is_last: bool,
    pub chunk_index: u64,
}

/// Events sent by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Auth { token: String },
    StartSsh(StartSshPayload),
    Input(Bytes),
    Resize(TerminalGeometry),
    ScpDownload { path: String },
    ScpUploadChunk(UploadChunk),
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Auth { .. } => "auth",
            ClientEvent::StartSsh(_) => "startSSH",
            ClientEvent::Input(_) => "input",
            ClientEvent::Resize(_) => "resize",
            ClientEvent::ScpDownload { .. } => "scp-download",
            ClientEvent::ScpUploadChunk(_) => "scp-upload-chunk",
        }
    }

    /// Build the Socket.IO packet and the binary attachments that follow it
    pub fn to_packet(&self) -> Result<(SocketPacket, Vec<Bytes>), ProtocolError> {
        let name = self.name();
        let packet = match self {
            ClientEvent::Auth { token } => SocketPacket::event(name, vec![json!(token)]),
            ClientEvent::StartSsh(payload) => {
                SocketPacket::event(name, vec![serde_json::to_value(payload)?])
            }
            ClientEvent::Input(data) => {
                return Ok((
                    SocketPacket::binary_event(name, vec![placeholder(0)], 1),
                    vec![data.clone()],
                ));
            }
            ClientEvent::Resize(geometry) => {
                SocketPacket::event(name, vec![serde_json::to_value(geometry)?])
            }
            ClientEvent::ScpDownload { path } => {
                SocketPacket::event(name, vec![json!({ "path": path })])
            }
            ClientEvent::ScpUploadChunk(chunk) => {
                let args = vec![json!({
                    "fileName": chunk.file_name,
                    "chunk": placeholder(0),
                    "offset": chunk.offset,
                    "isLast": chunk.is_last,
                    "chunkIndex": chunk.chunk_index,
                })];
                return Ok((
                    SocketPacket::binary_event(name, args, 1),
                    vec![chunk.chunk.clone()],
                ));
            }
        };
        Ok((packet, Vec::new()))
    }
}

/// Single-shot download response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadResult {
    pub content: Option<Bytes>,
    pub error: Option<String>,
}

/// One segment of a streamed download
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadChunk {
    pub chunk: Option<Bytes>,
    pub is_last: bool,
    pub error: Option<String>,
}

/// Advisory download progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadProgress {
    pub total_size: Option<u64>,
    pub downloaded: u64,
}

/// Server-side upload progress notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub chunk_index: Option<u64>,
    pub received: Option<u64>,
}

/// Events received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Output(Bytes),
    /// Explicit shell-ready signal
    Ready,
    SessionEnd,
    Disconnect { reason: String },
    ConnectError { message: String },
    DownloadResult(DownloadResult),
    DownloadChunk(DownloadChunk),
    DownloadProgress(DownloadProgress),
    UploadProgress(UploadProgress),
    /// Generic server-side error report
    Error { message: String },
    /// Event this client does not handle
    Unknown { name: String },
}

impl ServerEvent {
    /// Whether the event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::SessionEnd
                | ServerEvent::Disconnect { .. }
                | ServerEvent::ConnectError { .. }
        )
    }
}

/// An event packet with its binary attachments resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub args: Vec<Value>,
    pub attachments: Vec<Bytes>,
}

impl RawEvent {
    /// Split an event packet into name and arguments
    pub fn from_packet(packet: &SocketPacket, attachments: Vec<Bytes>) -> Result<Self, ProtocolError> {
        let name = packet
            .event_name()
            .ok_or(ProtocolError::MissingEventName)?
            .to_string();
        Ok(Self {
            name,
            args: packet.event_args(),
            attachments,
        })
    }

    fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    fn bytes(&self, value: &Value) -> Option<Bytes> {
        payload_bytes(value, &self.attachments)
    }

    fn invalid(&self, reason: &str) -> ProtocolError {
        ProtocolError::InvalidPayload {
            event: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Map to a typed server event
    pub fn into_server_event(self) -> Result<ServerEvent, ProtocolError> {
        let event = match self.name.as_str() {
            "output" => {
                let data = self
                    .arg(0)
                    .and_then(|v| self.bytes(v))
                    .ok_or_else(|| self.invalid("expected byte payload"))?;
                ServerEvent::Output(data)
            }
            "ready" => ServerEvent::Ready,
            "sessionEnd" => ServerEvent::SessionEnd,
            "disconnect" => ServerEvent::Disconnect {
                reason: self
                    .arg(0)
                    .and_then(error_text)
                    .unwrap_or_else(|| "server disconnect".to_string()),
            },
            "connect_error" => ServerEvent::ConnectError {
                message: self
                    .arg(0)
                    .and_then(error_text)
                    .unwrap_or_else(|| "connection refused".to_string()),
            },
            "error" => ServerEvent::Error {
                message: self
                    .arg(0)
                    .and_then(error_text)
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            "scp-download-result" => {
                let body = self.arg(0).ok_or_else(|| self.invalid("missing body"))?;
                ServerEvent::DownloadResult(DownloadResult {
                    content: body.get("content").and_then(|v| self.bytes(v)),
                    error: body.get("error").and_then(error_text),
                })
            }
            "scp-download-chunk" => {
                let body = self.arg(0).ok_or_else(|| self.invalid("missing body"))?;
                ServerEvent::DownloadChunk(DownloadChunk {
                    chunk: body.get("chunk").and_then(|v| self.bytes(v)),
                    is_last: body
                        .get("isLast")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    error: body.get("error").and_then(error_text),
                })
            }
            "download-progress" => {
                let body = self.arg(0).ok_or_else(|| self.invalid("missing body"))?;
                ServerEvent::DownloadProgress(DownloadProgress {
                    total_size: body.get("totalSize").and_then(Value::as_u64),
                    downloaded: body.get("downloaded").and_then(Value::as_u64).unwrap_or(0),
                })
            }
            "upload-progress" => {
                let body = self.arg(0).cloned().unwrap_or(Value::Null);
                ServerEvent::UploadProgress(UploadProgress {
                    chunk_index: body.get("chunkIndex").and_then(Value::as_u64),
                    received: body
                        .get("received")
                        .or_else(|| body.get("uploaded"))
                        .and_then(Value::as_u64),
                })
            }
            _ => ServerEvent::Unknown {
                name: self.name.clone(),
            },
        };
        Ok(event)
    }
}

fn placeholder(num: usize) -> Value {
    json!({ "_placeholder": true, "num": num })
}

/// Extract bytes from any of the encodings the server may use
pub fn payload_bytes(value: &Value, attachments: &[Bytes]) -> Option<Bytes> {
    match value {
        Value::String(s) => Some(Bytes::from(s.clone().into_bytes())),
        Value::Array(items) => byte_array(items),
        Value::Object(map) => {
            if map.get("_placeholder").and_then(Value::as_bool) == Some(true) {
                let num = map.get("num").and_then(Value::as_u64)? as usize;
                return attachments.get(num).cloned();
            }
            if map.get("type").and_then(Value::as_str) == Some("Buffer") {
                return map.get("data").and_then(Value::as_array).and_then(|d| byte_array(d));
            }
            None
        }
        _ => None,
    }
}

fn byte_array(items: &[Value]) -> Option<Bytes> {
    items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()
        .map(Bytes::from)
}

pub(crate) fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}
