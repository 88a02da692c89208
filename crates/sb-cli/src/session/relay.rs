//! Interactive terminal relay
//!
//! Pumps keystrokes from the local terminal to a [`ReadySession`] and output
//! back, until the server ends the session or the process is told to stop.

use std::future::Future;
use std::io::{self, Read, Write};

use bytes::Bytes;
use tokio::sync::mpsc;

use sb_core::SessionError;
use sb_protocol::{ServerEvent, TerminalGeometry};

use super::negotiator::ReadySession;

/// Why the relay stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The server sent `sessionEnd`
    SessionEnded,
    Disconnected(String),
    ConnectError(String),
    /// A local termination signal
    Interrupted(String),
}

impl RelayOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayOutcome::ConnectError(_) => 1,
            RelayOutcome::Interrupted(_) => 130,
            RelayOutcome::SessionEnded | RelayOutcome::Disconnected(_) => 0,
        }
    }
}

/// Local terminal raw mode, restored on drop
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Current size of the local terminal, if there is one
pub fn local_geometry() -> TerminalGeometry {
    crossterm::terminal::size()
        .map(|(cols, rows)| TerminalGeometry::new(cols, rows))
        .unwrap_or_default()
}

/// Relay between `session` and the given local endpoints.
///
/// `input` carries raw keystroke bytes, `resizes` local geometry changes.
/// `shutdown` resolves when the process is asked to stop.
pub async fn relay<W, S>(
    session: &mut ReadySession,
    mut input: mpsc::Receiver<Bytes>,
    mut resizes: mpsc::Receiver<TerminalGeometry>,
    mut output: W,
    shutdown: S,
) -> Result<RelayOutcome, SessionError>
where
    W: Write,
    S: Future<Output = String>,
{
    tokio::pin!(shutdown);
    let mut input_open = true;
    let mut resizes_open = true;

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else {
                    return Ok(RelayOutcome::Disconnected("transport close".to_string()));
                };
                match event {
                    ServerEvent::Output(data) => {
                        output
                            .write_all(&data)
                            .and_then(|_| output.flush())
                            .map_err(|e| SessionError::Aborted(format!("stdout: {}", e)))?;
                    }
                    ServerEvent::SessionEnd => return Ok(RelayOutcome::SessionEnded),
                    ServerEvent::Disconnect { reason } => return Ok(RelayOutcome::Disconnected(reason)),
                    ServerEvent::ConnectError { message } => return Ok(RelayOutcome::ConnectError(message)),
                    ServerEvent::Error { message } => tracing::warn!("Server error: {}", message),
                    other => tracing::debug!("Ignoring {:?} during interactive session", other),
                }
            }

            data = input.recv(), if input_open => match data {
                Some(data) => session.send_input(data).await?,
                None => {
                    tracing::debug!("Local input closed");
                    input_open = false;
                }
            },

            geometry = resizes.recv(), if resizes_open => match geometry {
                Some(geometry) => {
                    tracing::debug!(cols = geometry.cols, rows = geometry.rows, "Local resize");
                    session.resize(geometry).await?;
                }
                None => resizes_open = false,
            },

            reason = &mut shutdown => return Ok(RelayOutcome::Interrupted(reason)),
        }
    }
}

/// How long the input thread waits for stdin before rechecking whether the
/// relay is still listening
const INPUT_POLL: std::time::Duration = std::time::Duration::from_millis(100);

/// A blocking byte source the input thread can wait on with a timeout
trait InputSource: Send + 'static {
    /// True when a read would not block
    fn wait_readable(&mut self, timeout: std::time::Duration) -> io::Result<bool>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

struct Stdin(io::Stdin);

#[cfg(unix)]
impl InputSource for Stdin {
    fn wait_readable(&mut self, timeout: std::time::Duration) -> io::Result<bool> {
        use std::os::fd::AsRawFd;

        let mut fds = libc::pollfd {
            fd: self.0.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        // SAFETY: `fds` is a single valid pollfd that outlives the call.
        let ready = unsafe { libc::poll(&mut fds, 1, millis) };
        match ready {
            0 => Ok(false),
            n if n > 0 => Ok(true),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

#[cfg(not(unix))]
impl InputSource for Stdin {
    fn wait_readable(&mut self, _timeout: std::time::Duration) -> io::Result<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Read raw bytes from `source` on a dedicated thread.
///
/// The thread is detached from the runtime so shutting the runtime down never
/// waits on a terminal read. It only reads once input is ready and stops at
/// EOF, on a read error, or within one poll interval of the receiver going
/// away, so nothing typed after the relay ends is swallowed.
fn spawn_input_reader<S: InputSource>(
    mut source: S,
) -> io::Result<(mpsc::Receiver<Bytes>, std::thread::JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(64);
    let handle = std::thread::Builder::new()
        .name("sshbridge-stdin".to_string())
        .spawn(move || {
            let mut buf = [0u8; 4096];
            while !tx.is_closed() {
                match source.wait_readable(INPUT_POLL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        tracing::debug!("stdin poll failed: {}", e);
                        break;
                    }
                }
                match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::trace!("stdin reader stopped");
        })?;
    Ok((rx, handle))
}

#[cfg(unix)]
fn spawn_resize_watcher() -> mpsc::Receiver<TerminalGeometry> {
    use tokio::signal::unix::{signal, SignalKind};

    let (tx, rx) = mpsc::channel(8);
    match signal(SignalKind::window_change()) {
        Ok(mut winch) => {
            tokio::spawn(async move {
                while winch.recv().await.is_some() {
                    if tx.send(local_geometry()).await.is_err() {
                        break;
                    }
                }
            });
        }
        Err(e) => tracing::warn!("Cannot watch terminal resizes: {}", e),
    }
    rx
}

#[cfg(not(unix))]
fn spawn_resize_watcher() -> mpsc::Receiver<TerminalGeometry> {
    let (_tx, rx) = mpsc::channel(1);
    rx
}

#[cfg(unix)]
async fn termination() -> String {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut term), Ok(mut hup)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        let _ = tokio::signal::ctrl_c().await;
        return "interrupt".to_string();
    };

    tokio::select! {
        _ = term.recv() => "SIGTERM".to_string(),
        _ = hup.recv() => "SIGHUP".to_string(),
        _ = tokio::signal::ctrl_c() => "interrupt".to_string(),
    }
}

#[cfg(not(unix))]
async fn termination() -> String {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt".to_string()
}

/// Run `session` against the local terminal.
///
/// Raw mode is held only for the duration of the relay and restored on
/// every exit path, including errors.
pub async fn run_interactive(session: &mut ReadySession) -> Result<RelayOutcome, SessionError> {
    let _raw = RawModeGuard::enter()
        .map_err(|e| SessionError::Aborted(format!("cannot enter raw mode: {}", e)))?;

    let (input, _reader) = spawn_input_reader(Stdin(io::stdin()))
        .map_err(|e| SessionError::Aborted(format!("cannot read from terminal: {}", e)))?;
    let resizes = spawn_resize_watcher();

    // The shell was started at the pre-raw-mode size
    let geometry = local_geometry();
    session.resize(geometry).await?;

    relay(session, input, resizes, std::io::stdout(), termination()).await
}
