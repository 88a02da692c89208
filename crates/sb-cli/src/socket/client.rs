//! Socket.IO client over a WebSocket transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use sb_core::config::BridgeConfig;
use sb_core::SessionError;
use sb_protocol::{ClientEvent, EventCodec, Frame, Incoming, ServerEvent, ENGINE_IO_VERSION};

use super::{SocketChannels, SocketConnector, SocketParams, CHANNEL_CAPACITY};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the WebSocket URL for a bridge session
pub fn socket_url(config: &BridgeConfig, session_id: &str) -> Result<Url, SessionError> {
    let mut url = Url::parse(&config.socket_url)
        .map_err(|e| SessionError::Disconnected(format!("invalid socket url: {}", e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(SessionError::Disconnected(format!(
                "unsupported socket url scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| SessionError::Disconnected("cannot rewrite socket url scheme".to_string()))?;
    url.set_path(&config.socket_path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", "websocket")
        .append_pair("sessionId", session_id);

    Ok(url)
}

/// Connector speaking Socket.IO v4 over `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    config: BridgeConfig,
}

impl SocketIoConnector {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    async fn open(
        &self,
        params: &SocketParams,
    ) -> Result<(WsStream, EventCodec, Duration), SessionError> {
        let url = socket_url(&self.config, &params.session_id)?;
        tracing::debug!("Connecting socket to {}", url);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::Disconnected(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            "Origin",
            HeaderValue::from_str(&self.config.origin)
                .map_err(|e| SessionError::Disconnected(format!("invalid origin: {}", e)))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", params.token))
                .map_err(|e| SessionError::Disconnected(format!("invalid token: {}", e)))?,
        );

        let (mut ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::Disconnected(format!("WebSocket connect failed: {}", e)))?;

        let mut codec = EventCodec::new();
        let heartbeat = match next_incoming(&mut ws, &mut codec).await? {
            Incoming::Handshake(handshake) => {
                tracing::debug!(sid = %handshake.sid, "Engine.IO handshake");
                Duration::from_millis(handshake.ping_interval + handshake.ping_timeout)
            }
            other => {
                return Err(SessionError::Disconnected(format!(
                    "unexpected handshake: {:?}",
                    other
                )))
            }
        };

        send_frame(&mut ws, EventCodec::connect_frame())
            .await
            .map_err(|e| SessionError::Disconnected(e.to_string()))?;

        loop {
            match next_incoming(&mut ws, &mut codec).await? {
                Incoming::Connected => break,
                Incoming::ConnectRefused(message) => {
                    return Err(SessionError::ConnectError(message));
                }
                Incoming::Ping => {
                    send_frame(&mut ws, EventCodec::pong_frame())
                        .await
                        .map_err(|e| SessionError::Disconnected(e.to_string()))?;
                }
                Incoming::Close => {
                    return Err(SessionError::Disconnected("transport close".to_string()));
                }
                other => tracing::debug!("Ignoring {:?} before namespace connect", other),
            }
        }

        Ok((ws, codec, heartbeat))
    }
}

#[async_trait]
impl SocketConnector for SocketIoConnector {
    async fn connect(&self, params: &SocketParams) -> Result<SocketChannels, SessionError> {
        let (ws, codec, heartbeat) =
            tokio::time::timeout(self.config.connect_timeout, self.open(params))
                .await
                .map_err(|_| SessionError::Disconnected("socket connect timed out".to_string()))??;
        tracing::info!("Socket connected");

        let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(run_transport(ws, codec, heartbeat, outgoing_rx, incoming_tx));

        Ok(SocketChannels {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            task: Some(task),
        })
    }
}

fn to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.to_string())),
        Message::Binary(data) => Some(Frame::Binary(Bytes::from(data))),
        _ => None,
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.to_vec().into()),
    }
}

async fn send_frame(ws: &mut WsStream, frame: Frame) -> Result<(), tungstenite::Error> {
    ws.send(to_message(frame)).await
}

async fn next_incoming(ws: &mut WsStream, codec: &mut EventCodec) -> Result<Incoming, SessionError> {
    loop {
        let message = ws
            .next()
            .await
            .ok_or_else(|| SessionError::Disconnected("transport close".to_string()))?
            .map_err(|e| SessionError::Disconnected(format!("transport error: {}", e)))?;

        if let Message::Close(_) = message {
            return Err(SessionError::Disconnected("transport close".to_string()));
        }
        let Some(frame) = to_frame(message) else {
            continue;
        };
        match codec.decode(frame) {
            Ok(Some(incoming)) => return Ok(incoming),
            Ok(None) => continue,
            Err(e) => tracing::warn!("Dropping undecodable frame: {}", e),
        }
    }
}

/// Pump frames between the WebSocket and the event channels until either
/// side finishes. The last event delivered is always the reason it stopped.
async fn run_transport(
    ws: WsStream,
    mut codec: EventCodec,
    heartbeat: Duration,
    mut outgoing: mpsc::Receiver<ClientEvent>,
    incoming: mpsc::Sender<ServerEvent>,
) {
    let (mut ws_write, mut ws_read) = ws.split();
    let deadline = tokio::time::sleep(heartbeat);
    tokio::pin!(deadline);

    let reason = 'pump: loop {
        tokio::select! {
            event = outgoing.recv() => {
                let Some(event) = event else {
                    tracing::debug!("Client closed the socket");
                    let _ = ws_write.send(to_message(EventCodec::disconnect_frame())).await;
                    let _ = ws_write.close().await;
                    return;
                };
                let frames = match EventCodec::encode(&event) {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!("Failed to encode {} event: {}", event.name(), e);
                        continue;
                    }
                };
                for frame in frames {
                    if let Err(e) = ws_write.send(to_message(frame)).await {
                        break 'pump ServerEvent::Disconnect { reason: format!("transport error: {}", e) };
                    }
                }
            }

            message = ws_read.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => break ServerEvent::Disconnect { reason: format!("transport error: {}", e) },
                    None => break ServerEvent::Disconnect { reason: "transport close".to_string() },
                };
                if let Message::Close(_) = message {
                    break ServerEvent::Disconnect { reason: "transport close".to_string() };
                }
                let Some(frame) = to_frame(message) else {
                    continue;
                };

                match codec.decode(frame) {
                    Ok(Some(Incoming::Ping)) => {
                        deadline.as_mut().reset(Instant::now() + heartbeat);
                        if let Err(e) = ws_write.send(to_message(EventCodec::pong_frame())).await {
                            break ServerEvent::Disconnect { reason: format!("transport error: {}", e) };
                        }
                    }
                    Ok(Some(Incoming::Close)) => {
                        break ServerEvent::Disconnect { reason: "transport close".to_string() };
                    }
                    Ok(Some(Incoming::ConnectRefused(message))) => {
                        break ServerEvent::ConnectError { message };
                    }
                    Ok(Some(Incoming::Event(event))) => {
                        let terminal = event.is_terminal();
                        if incoming.send(event).await.is_err() || terminal {
                            let _ = ws_write.close().await;
                            return;
                        }
                    }
                    Ok(Some(other)) => tracing::trace!("Ignoring {:?}", other),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Dropping undecodable frame: {}", e),
                }
            }

            _ = &mut deadline => {
                break ServerEvent::Disconnect { reason: "ping timeout".to_string() };
            }
        }
    };

    tracing::debug!("Socket transport stopped: {:?}", reason);
    let _ = ws_write.close().await;
    let _ = incoming.send(reason).await;
}
