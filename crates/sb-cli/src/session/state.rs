//! Session negotiation states

use std::fmt;
use std::sync::Mutex;

/// Where a bridge session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Init,
    StepUpRequired,
    StepUpOk,
    StepUpFail,
    CreatingRestSession,
    RestFailed,
    RestOk,
    SocketConnecting,
    SocketError,
    SocketConnected,
    Authenticating,
    StartingShell,
    Ready,
    SessionEnded,
    Disconnected,
    ConnectError,
    Aborted,
}

impl SessionState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::SessionEnded
                | SessionState::Disconnected
                | SessionState::ConnectError
                | SessionState::Aborted
        )
    }

    /// Whether a socket exists in this state
    fn has_socket(self) -> bool {
        matches!(
            self,
            SessionState::SocketConnected
                | SessionState::Authenticating
                | SessionState::StartingShell
                | SessionState::Ready
        )
    }

    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        // A socket-level failure can end any live session
        if next == ConnectError {
            return true;
        }
        if matches!(next, SessionEnded | Disconnected) && self.has_socket() {
            return true;
        }

        matches!(
            (self, next),
            (Init, StepUpRequired)
                | (Init, CreatingRestSession)
                | (StepUpRequired, StepUpOk)
                | (StepUpRequired, StepUpFail)
                | (StepUpOk, CreatingRestSession)
                | (StepUpFail, Aborted)
                | (CreatingRestSession, RestOk)
                | (CreatingRestSession, RestFailed)
                | (RestFailed, CreatingRestSession)
                | (RestFailed, Aborted)
                | (RestOk, SocketConnecting)
                | (SocketConnecting, SocketConnected)
                | (SocketConnecting, SocketError)
                | (SocketError, Aborted)
                | (SocketConnected, Authenticating)
                | (Authenticating, StartingShell)
                | (StartingShell, Ready)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::StepUpRequired => "STEP_UP_REQUIRED",
            SessionState::StepUpOk => "STEP_UP_OK",
            SessionState::StepUpFail => "STEP_UP_FAIL",
            SessionState::CreatingRestSession => "CREATING_REST_SESSION",
            SessionState::RestFailed => "REST_FAILED",
            SessionState::RestOk => "REST_OK",
            SessionState::SocketConnecting => "SOCKET_CONNECTING",
            SessionState::SocketError => "SOCKET_ERROR",
            SessionState::SocketConnected => "SOCKET_CONNECTED",
            SessionState::Authenticating => "AUTHENTICATING",
            SessionState::StartingShell => "STARTING_SHELL",
            SessionState::Ready => "READY",
            SessionState::SessionEnded => "SESSION_ENDED",
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::ConnectError => "CONNECT_ERROR",
            SessionState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Callback invoked after each accepted transition
pub type TransitionObserver = Box<dyn Fn(SessionState) + Send + Sync>;

/// Validated state history of one session
///
/// Illegal transitions are refused and logged; the recorded history only
/// ever contains legal steps.
pub struct StateTracker {
    history: Mutex<Vec<SessionState>>,
    observer: Option<TransitionObserver>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTracker")
            .field("history", &self.history())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(vec![SessionState::Init]),
            observer: None,
        }
    }

    /// Tracker that reports every accepted transition to `observer`
    pub fn with_observer(observer: TransitionObserver) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new()
        }
    }

    fn history_guard(&self) -> std::sync::MutexGuard<'_, Vec<SessionState>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> SessionState {
        self.history_guard()
            .last()
            .copied()
            .unwrap_or(SessionState::Init)
    }

    /// Move to `next`; returns false (and stays put) if that is illegal
    pub fn advance(&self, next: SessionState) -> bool {
        {
            let mut history = self.history_guard();
            let current = history.last().copied().unwrap_or(SessionState::Init);

            if !current.can_transition_to(next) {
                tracing::error!("Refusing session transition {} -> {}", current, next);
                return false;
            }

            tracing::debug!("Session {} -> {}", current, next);
            history.push(next);
        }

        if let Some(observer) = &self.observer {
            observer(next);
        }
        true
    }

    /// Every state visited so far, starting with `Init`
    pub fn history(&self) -> Vec<SessionState> {
        self.history_guard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path_is_legal() {
        let tracker = StateTracker::new();
        for state in [
            CreatingRestSession,
            RestOk,
            SocketConnecting,
            SocketConnected,
            Authenticating,
            StartingShell,
            Ready,
            SessionEnded,
        ] {
            assert!(tracker.advance(state), "transition to {} refused", state);
        }
        assert_eq!(tracker.current(), SessionEnded);
        assert_eq!(tracker.history().len(), 9);
    }

    #[test]
    fn test_step_up_failure_aborts() {
        let tracker = StateTracker::new();
        assert!(tracker.advance(StepUpRequired));
        assert!(!tracker.advance(CreatingRestSession));
        assert!(tracker.advance(StepUpFail));
        assert!(tracker.advance(Aborted));
        assert!(!tracker.advance(CreatingRestSession));
        assert_eq!(
            tracker.history(),
            vec![Init, StepUpRequired, StepUpFail, Aborted]
        );
    }

    #[test]
    fn test_rest_retry_loop() {
        let tracker = StateTracker::new();
        assert!(tracker.advance(CreatingRestSession));
        assert!(tracker.advance(RestFailed));
        assert!(tracker.advance(CreatingRestSession));
        assert!(tracker.advance(RestOk));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [SessionEnded, Disconnected, ConnectError, Aborted] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(ConnectError));
            assert!(!terminal.can_transition_to(Init));
        }
    }

    #[test]
    fn test_connect_error_from_any_live_state() {
        assert!(SocketConnecting.can_transition_to(ConnectError));
        assert!(Ready.can_transition_to(ConnectError));
        assert!(StartingShell.can_transition_to(SessionEnded));
        assert!(!RestOk.can_transition_to(Disconnected));
    }

    #[test]
    fn test_observer_sees_accepted_transitions_only() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = StateTracker::with_observer(Box::new(move |state| {
            sink.lock().unwrap().push(state);
        }));

        tracker.advance(CreatingRestSession);
        tracker.advance(Ready);
        tracker.advance(RestOk);

        assert_eq!(*seen.lock().unwrap(), vec![CreatingRestSession, RestOk]);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(StepUpRequired.to_string(), "STEP_UP_REQUIRED");
        assert_eq!(ConnectError.to_string(), "CONNECT_ERROR");
    }
}
