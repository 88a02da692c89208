//! Quick status shown when no subcommand is given

use std::path::Path;

use super::{credentials_path, effective_config_path, App};

pub fn status_command(app: &App, config_path: Option<&Path>) {
    println!();
    println!("  \x1b[1;34mSSHBridge\x1b[0m - Terminal and file transfer over the bridge");
    println!();

    let context = app.auth.context();
    match (context.username(), context.is_authenticated()) {
        (Some(user), true) => println!("  Login: \x1b[32m●\x1b[0m {}", user),
        (Some(user), false) => {
            println!("  Login: \x1b[33m●\x1b[0m {} (logged out)", user);
            println!("         Run: sshbridge login");
        }
        (None, _) => {
            println!("  Login: \x1b[31m●\x1b[0m Not logged in");
            println!("         Run: sshbridge login");
        }
    }

    println!("  API:    {}", app.config.bridge.api_url);
    println!("  Config: {}", effective_config_path(config_path).display());
    println!("  Credentials: {}", credentials_path(config_path).display());
    println!();
    println!("  Run 'sshbridge --help' for commands.");
    println!();
}
