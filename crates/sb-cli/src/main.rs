//! SSHBridge CLI
//!
//! Terminal sessions and file transfer to servers behind the SSHBridge
//! bridge server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sb_core::config;
use sshbridge::commands::{self, App};
use sshbridge::output::print_error;

#[derive(Parser)]
#[command(name = "sshbridge")]
#[command(author, version, about = "Terminal and file transfer client for SSHBridge")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "SSHBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the bridge
    Login,

    /// Forget the stored token
    Logout,

    /// Change your bridge password
    ChangePassword,

    /// Show the logged-in user
    Whoami,

    /// List available servers
    /// Alias: ls
    #[command(alias = "ls")]
    List {
        /// Include production servers (asks for confirmation)
        #[arg(long)]
        with_prod: bool,
        /// Show port, login and group columns
        #[arg(short, long)]
        long: bool,
    },

    /// Open an interactive terminal on a server
    Connect {
        /// Server name, hostname or list index
        server: String,
    },

    /// Download a file from a server
    Download {
        /// Server name, hostname or list index
        server: String,
        /// Remote file path
        remote: String,
        /// Local destination (file or directory)
        local: Option<PathBuf>,
    },

    /// Upload a file to a server
    Upload {
        /// Server name, hostname or list index
        server: String,
        /// Local file path
        local: PathBuf,
        /// Remote target path (defaults to the local file name)
        remote: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Show config file path
    Path,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // Logs go to stderr so they never mix with relayed terminal output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            print_error(&format!("Failed to start runtime: {}", e));
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            1
        }
    };
    // The stdin reader is a plain thread; do not wait on it
    runtime.shutdown_timeout(Duration::from_millis(500));
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();

    // Config commands work on the file itself and need no clients
    if let Some(Commands::Config { action }) = &cli.command {
        match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Get { key } => commands::config_get(config_path, key)?,
            ConfigAction::Set { key, value } => commands::config_set(config_path, key, value)?,
            ConfigAction::Path => commands::config_path(config_path),
        }
        return Ok(0);
    }

    let config = config::resolve_config(config_path).context("Failed to load configuration")?;
    let app = App::from_config(config, config_path)?;

    let Some(command) = cli.command else {
        commands::status_command(&app, config_path);
        return Ok(0);
    };

    match command {
        Commands::Login => commands::login_command(&app).await?,
        Commands::Logout => commands::logout_command(&app)?,
        Commands::ChangePassword => commands::change_password_command(&app).await?,
        Commands::Whoami => commands::whoami_command(&app).await?,
        Commands::List { with_prod, long } => commands::list_command(&app, with_prod, long).await?,
        Commands::Connect { server } => return commands::connect_command(&app, &server).await,
        Commands::Download {
            server,
            remote,
            local,
        } => commands::download_command(&app, &server, &remote, local.as_deref()).await?,
        Commands::Upload {
            server,
            local,
            remote,
        } => commands::upload_command(&app, &server, &local, remote.as_deref()).await?,
        Commands::Config { .. } => {}
    }

    Ok(0)
}
