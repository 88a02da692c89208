//! Interactive connect command

use anyhow::Result;

use sb_core::SessionError;

use super::{ensure_logged_in, resolve_target, App};
use crate::output::{print_error, print_info, print_warning};
use crate::session::{local_geometry, run_interactive, RelayOutcome};

/// `sshbridge connect <server>`; returns the process exit code
pub async fn connect_command(app: &App, query: &str) -> Result<i32> {
    ensure_logged_in(app).await?;

    print_info(&format!("Initiating connection to {}...", query));
    let server = resolve_target(app, query).await?;
    let label = format!("{} ({})", server.name, server.ip);

    let negotiator = app.negotiator(label);
    let mut session = match negotiator.negotiate(&server, local_geometry()).await {
        Ok(session) => session,
        Err(e) => return Ok(report_failure(e)),
    };

    let outcome = run_interactive(&mut session).await;
    session.close().await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => return Ok(report_failure(e)),
    };
    match &outcome {
        RelayOutcome::SessionEnded => print_warning("Session ended by server."),
        RelayOutcome::Disconnected(reason) => {
            print_warning(&format!("Disconnected from server (reason: {}).", reason))
        }
        RelayOutcome::ConnectError(message) => print_error(&format!("Connection Error: {}", message)),
        RelayOutcome::Interrupted(signal) => print_warning(&format!("Interrupted ({}).", signal)),
    }
    Ok(outcome.exit_code())
}

/// Print a negotiation failure and pick the exit code
fn report_failure(err: SessionError) -> i32 {
    match err {
        SessionError::EndedByServer => {
            print_warning("Session ended by server.");
            0
        }
        SessionError::Disconnected(reason) => {
            print_warning(&format!("Disconnected from server (reason: {}).", reason));
            0
        }
        SessionError::ConnectError(message) => {
            print_error(&format!("Connection Error: {}", message));
            1
        }
        SessionError::Aborted(message) => {
            print_error(&format!("Connection Failed: {}", message));
            1
        }
    }
}
