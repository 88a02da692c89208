//! Bridge sessions: negotiation state machine and the interactive relay

mod negotiator;
mod relay;
mod state;

pub use negotiator::{ReadySession, SessionNegotiator};
pub use relay::{local_geometry, relay, run_interactive, RawModeGuard, RelayOutcome};
pub use state::{SessionState, StateTracker, TransitionObserver};

#[cfg(test)]
pub(crate) use negotiator::tests::{negotiator, server, session_created, ScriptedConnector};
