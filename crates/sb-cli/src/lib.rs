//! sshbridge: Command-line client for the SSHBridge bridge server
//!
//! Authenticates against the bridge REST API, negotiates bridged terminal
//! sessions over a Socket.IO socket, relays an interactive terminal, and
//! moves files over the same socket.

pub mod api;
pub mod auth;
pub mod commands;
pub mod output;
pub mod session;
pub mod socket;
pub mod transfer;
