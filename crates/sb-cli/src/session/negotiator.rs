//! Bridge session negotiation
//!
//! A session is created over REST first, then a socket is opened for it,
//! authenticated with the bearer token, and asked to start the remote shell.
//! Only once the shell is up does the caller get a [`ReadySession`], which is
//! the only type able to send input, resize or transfer events.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sb_core::{ServerDescriptor, SessionError};
use sb_protocol::{ClientEvent, ServerEvent, StartSshPayload, TerminalGeometry};

use super::state::{SessionState, StateTracker};
use crate::api::{BridgeApi, CreateSessionRequest};
use crate::auth::AuthGateway;
use crate::socket::{SocketChannels, SocketConnector, SocketParams};

/// How long [`ReadySession::close`] waits for the transport to finish
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Drives one session from `Init` to `Ready`
pub struct SessionNegotiator {
    api: Arc<dyn BridgeApi>,
    auth: AuthGateway,
    connector: Arc<dyn SocketConnector>,
    production_marker: String,
    tracker: Arc<StateTracker>,
}

impl SessionNegotiator {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        auth: AuthGateway,
        connector: Arc<dyn SocketConnector>,
        production_marker: impl Into<String>,
    ) -> Self {
        Self {
            api,
            auth,
            connector,
            production_marker: production_marker.into(),
            tracker: Arc::new(StateTracker::new()),
        }
    }

    /// Report each state change to `observer`, e.g. for progress messages
    pub fn on_transition(mut self, observer: impl Fn(SessionState) + Send + Sync + 'static) -> Self {
        self.tracker = Arc::new(StateTracker::with_observer(Box::new(observer)));
        self
    }

    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    /// States visited so far
    pub fn history(&self) -> Vec<SessionState> {
        self.tracker.history()
    }

    /// Negotiate a session with `server` and wait for its shell.
    pub async fn negotiate(
        &self,
        server: &ServerDescriptor,
        geometry: TerminalGeometry,
    ) -> Result<ReadySession, SessionError> {
        if server.is_production(&self.production_marker) {
            self.step_up(server).await?;
        }

        let session_id = self.create_rest_session(server).await?;

        self.tracker.advance(SessionState::SocketConnecting);
        let token = self.auth.context().token().ok_or_else(|| {
            self.fail(SessionState::SocketError);
            SessionError::Aborted("not logged in".to_string())
        })?;
        let params = SocketParams { session_id, token };
        let channels = match self.connector.connect(&params).await {
            Ok(channels) => channels,
            Err(SessionError::ConnectError(message)) => {
                self.tracker.advance(SessionState::ConnectError);
                return Err(SessionError::ConnectError(message));
            }
            Err(e) => {
                tracing::warn!("Socket connection failed: {}", e);
                self.fail(SessionState::SocketError);
                return Err(e);
            }
        };
        self.tracker.advance(SessionState::SocketConnected);

        let SocketChannels {
            outgoing,
            mut incoming,
            task,
        } = channels;

        self.tracker.advance(SessionState::Authenticating);
        if outgoing
            .send(ClientEvent::Auth {
                token: params.token.clone(),
            })
            .await
            .is_err()
        {
            return Err(self.socket_lost(&mut incoming).await);
        }

        self.tracker.advance(SessionState::StartingShell);
        let start = ClientEvent::StartSsh(StartSshPayload {
            name: server.name.clone(),
            host: server.ip.clone(),
            port: server.port,
            username: server.login_name.clone(),
            password: String::new(),
            private_key_path: server.private_key_path.clone(),
            server_id: server.id.clone(),
            cols: geometry.cols,
            rows: geometry.rows,
        });
        if outgoing.send(start).await.is_err() {
            return Err(self.socket_lost(&mut incoming).await);
        }

        let mut pending = VecDeque::new();
        loop {
            let Some(event) = incoming.recv().await else {
                self.tracker.advance(SessionState::Disconnected);
                return Err(SessionError::Disconnected("transport close".to_string()));
            };
            match event {
                ServerEvent::Output(data) => {
                    // First output doubles as the ready signal; keep it for the consumer
                    pending.push_back(ServerEvent::Output(data));
                    break;
                }
                ServerEvent::Ready => break,
                terminal if terminal.is_terminal() => {
                    return Err(self.end_with(terminal));
                }
                ServerEvent::Error { message } => {
                    tracing::warn!("Server error while starting shell: {}", message);
                }
                other => tracing::debug!("Ignoring {:?} while starting shell", other),
            }
        }

        self.tracker.advance(SessionState::Ready);
        tracing::info!(session_id = %params.session_id, "Session ready");

        Ok(ReadySession {
            session_id: params.session_id,
            outgoing: Some(outgoing),
            incoming,
            pending,
            task,
            tracker: Arc::clone(&self.tracker),
        })
    }

    async fn step_up(&self, server: &ServerDescriptor) -> Result<(), SessionError> {
        self.tracker.advance(SessionState::StepUpRequired);
        tracing::info!(server = %server.name, "Production server, password re-verification required");

        match self.auth.verify_step_up().await {
            Ok(()) => {
                self.tracker.advance(SessionState::StepUpOk);
                Ok(())
            }
            Err(e) => {
                self.fail(SessionState::StepUpFail);
                Err(SessionError::Aborted(e.to_string()))
            }
        }
    }

    async fn create_rest_session(&self, server: &ServerDescriptor) -> Result<String, SessionError> {
        let tracker = self.tracker.as_ref();
        let api = self.api.as_ref();
        let request = &CreateSessionRequest::from(server);

        tracing::info!(server = %server.name, ip = %server.ip, "Requesting session");
        tracker.advance(SessionState::CreatingRestSession);

        let result = self
            .auth
            .retry()
            .run(move || async move {
                if tracker.current() == SessionState::RestFailed {
                    tracker.advance(SessionState::CreatingRestSession);
                }
                let result = api.create_session(request).await;
                if matches!(&result, Err(e) if e.is_unauthorized()) {
                    tracker.advance(SessionState::RestFailed);
                }
                result
            })
            .await;

        match result {
            Ok(response) => {
                tracker.advance(SessionState::RestOk);
                tracing::debug!(session_id = %response.session_id, "Session created");
                Ok(response.session_id)
            }
            Err(e) => {
                if tracker.current() != SessionState::RestFailed {
                    tracker.advance(SessionState::RestFailed);
                }
                tracker.advance(SessionState::Aborted);
                Err(SessionError::Aborted(format!("Failed to create session: {}", e)))
            }
        }
    }

    /// Record an intermediate failure state followed by `Aborted`
    fn fail(&self, state: SessionState) {
        self.tracker.advance(state);
        self.tracker.advance(SessionState::Aborted);
    }

    /// The outgoing side closed; report why, if the transport said
    async fn socket_lost(&self, incoming: &mut mpsc::Receiver<ServerEvent>) -> SessionError {
        while let Some(event) = incoming.recv().await {
            if event.is_terminal() {
                return self.end_with(event);
            }
        }
        self.tracker.advance(SessionState::Disconnected);
        SessionError::Disconnected("transport close".to_string())
    }

    fn end_with(&self, event: ServerEvent) -> SessionError {
        let (state, error) = terminal_outcome(event);
        self.tracker.advance(state);
        error
    }
}

/// Terminal state and error for a session-ending event
fn terminal_outcome(event: ServerEvent) -> (SessionState, SessionError) {
    match event {
        ServerEvent::SessionEnd => (SessionState::SessionEnded, SessionError::EndedByServer),
        ServerEvent::ConnectError { message } => (
            SessionState::ConnectError,
            SessionError::ConnectError(message),
        ),
        ServerEvent::Disconnect { reason } => {
            (SessionState::Disconnected, SessionError::Disconnected(reason))
        }
        other => (
            SessionState::Disconnected,
            SessionError::Disconnected(format!("unexpected {:?}", other)),
        ),
    }
}

/// A session whose remote shell is running
///
/// Events are delivered in arrival order, starting with the output that
/// signalled readiness. Once a terminal event has been returned the session
/// is over.
pub struct ReadySession {
    session_id: String,
    outgoing: Option<mpsc::Sender<ClientEvent>>,
    incoming: mpsc::Receiver<ServerEvent>,
    pending: VecDeque<ServerEvent>,
    task: Option<JoinHandle<()>>,
    tracker: Arc<StateTracker>,
}

impl ReadySession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    fn observe(&self, event: &ServerEvent) {
        if !event.is_terminal() {
            return;
        }
        let (state, _) = terminal_outcome(event.clone());
        self.tracker.advance(state);
    }

    fn closed_event(&self) -> ServerEvent {
        ServerEvent::Disconnect {
            reason: "transport close".to_string(),
        }
    }

    /// Next event, waiting for one; `None` once the session has ended
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        if self.state().is_terminal() {
            return None;
        }
        let event = match self.pending.pop_front() {
            Some(event) => event,
            None => self
                .incoming
                .recv()
                .await
                .unwrap_or_else(|| self.closed_event()),
        };
        self.observe(&event);
        Some(event)
    }

    /// Next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<ServerEvent> {
        if self.state().is_terminal() {
            return None;
        }
        let event = match self.pending.pop_front() {
            Some(event) => event,
            None => match self.incoming.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => return None,
                Err(mpsc::error::TryRecvError::Disconnected) => self.closed_event(),
            },
        };
        self.observe(&event);
        Some(event)
    }

    /// Send an event to the server
    pub async fn emit(&self, event: ClientEvent) -> Result<(), SessionError> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| SessionError::Disconnected("socket closed".to_string()))?;
        outgoing
            .send(event)
            .await
            .map_err(|_| SessionError::Disconnected("socket closed".to_string()))
    }

    /// Forward raw keystrokes verbatim
    pub async fn send_input(&self, data: Bytes) -> Result<(), SessionError> {
        self.emit(ClientEvent::Input(data)).await
    }

    /// Forward a local terminal resize
    pub async fn resize(&self, geometry: TerminalGeometry) -> Result<(), SessionError> {
        self.emit(ClientEvent::Resize(geometry)).await
    }

    /// Disconnect and wait briefly for the transport to shut down
    pub async fn close(mut self) {
        self.outgoing.take();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                tracing::debug!("Socket transport did not stop in time");
            }
        }
        tracing::debug!(session_id = %self.session_id, "Session closed");
    }
}

impl std::fmt::Debug for ReadySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySession")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .finish()
    }
}
