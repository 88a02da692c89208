//! CLI command implementations

mod auth;
mod config;
mod connect;
mod list;
mod status;
mod transfer;

pub use auth::{change_password_command, ensure_logged_in, login_command, logout_command, whoami_command};
pub use config::{config_get, config_path, config_set, config_show};
pub use connect::connect_command;
pub use list::{fetch_servers, list_command, resolve_target, visible_servers};
pub use status::status_command;
pub use transfer::{download_command, upload_command};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use sb_core::config::{self as core_config, ConfigFile};
use sb_core::{FileCredentialStore, SessionContext};

use crate::api::{BridgeApi, HttpApi};
use crate::auth::{AuthGateway, Prompter, TerminalPrompter};
use crate::session::{SessionNegotiator, SessionState};
use crate::socket::{SocketConnector, SocketIoConnector};

/// Everything a command needs: configuration and the wired-up clients
#[derive(Clone)]
pub struct App {
    pub config: ConfigFile,
    pub api: Arc<dyn BridgeApi>,
    pub auth: AuthGateway,
    pub connector: Arc<dyn SocketConnector>,
}

impl App {
    /// Wire the HTTP and socket clients over the credential file.
    ///
    /// Credentials live next to the config file in use.
    pub fn from_config(config: ConfigFile, config_path: Option<&Path>) -> Result<Self> {
        let store = FileCredentialStore::open(credentials_path(config_path))
            .context("Failed to open credential store")?;
        let context = SessionContext::new(Arc::new(store));
        let api: Arc<dyn BridgeApi> = Arc::new(
            HttpApi::new(&config.bridge, context.clone()).context("Failed to create HTTP client")?,
        );
        let prompter: Arc<dyn Prompter> = Arc::new(TerminalPrompter::new());
        let connector = Arc::new(SocketIoConnector::new(config.bridge.clone()));

        let auth = AuthGateway::new(api.clone(), context, prompter);

        Ok(Self::new(config, api, auth, connector))
    }

    pub fn new(
        config: ConfigFile,
        api: Arc<dyn BridgeApi>,
        auth: AuthGateway,
        connector: Arc<dyn SocketConnector>,
    ) -> Self {
        Self {
            config,
            api,
            auth,
            connector,
        }
    }

    /// Negotiator printing the usual progress lines
    pub fn negotiator(&self, server_label: String) -> SessionNegotiator {
        SessionNegotiator::new(
            self.api.clone(),
            self.auth.clone(),
            self.connector.clone(),
            self.config.bridge.production_marker.clone(),
        )
        .on_transition(move |state| announce(state, &server_label))
    }
}

fn announce(state: SessionState, server_label: &str) {
    use crate::output::{print_step, print_success};

    match state {
        SessionState::CreatingRestSession => {
            print_step(&format!("Requesting session for {}...", server_label))
        }
        SessionState::RestOk => print_success("Session created. Connecting to bridge..."),
        SessionState::SocketConnected => print_success("Connected to socket. Authenticating..."),
        SessionState::StartingShell => print_step("Starting SSH session..."),
        _ => {}
    }
}

/// Credential file for the given config file
pub fn credentials_path(config_path: Option<&Path>) -> PathBuf {
    match config_path.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join("credentials.toml"),
        Some(_) => PathBuf::from("credentials.toml"),
        None => core_config::default_credentials_path(),
    }
}

/// Config file a command should read or edit
pub fn effective_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(core_config::default_config_path)
}
