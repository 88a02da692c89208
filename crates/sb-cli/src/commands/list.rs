//! Server listing and lookup

use anyhow::{Context, Result};

use sb_core::types::resolve_server;
use sb_core::ServerDescriptor;

use super::{ensure_logged_in, App};
use crate::output::{format_servers, print_error, print_info, print_step, print_warning};

/// Fetch the server list, re-authenticating once on `401`
pub async fn fetch_servers(app: &App) -> Result<Vec<ServerDescriptor>> {
    print_step("Fetching servers...");
    let api = app.api.as_ref();
    let servers = app
        .auth
        .retry()
        .run(|| api.list_servers())
        .await
        .context("Failed to list servers")?;
    tracing::debug!(count = servers.len(), "Fetched servers");
    Ok(servers)
}

/// Find the server named by `query`: an index into the list, or an exact
/// name or hostname
pub async fn resolve_target(app: &App, query: &str) -> Result<ServerDescriptor> {
    let servers = fetch_servers(app).await?;
    resolve_server(&servers, query)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Server \"{}\" not found.", query))
}

/// Servers to show, paired with their index in the full list
pub fn visible_servers<'a>(
    servers: &'a [ServerDescriptor],
    production_marker: &str,
    with_prod: bool,
) -> Vec<(usize, &'a ServerDescriptor)> {
    servers
        .iter()
        .enumerate()
        .filter(|(_, s)| with_prod || !s.is_production(production_marker))
        .collect()
}

/// `sshbridge list`
pub async fn list_command(app: &App, with_prod: bool, long: bool) -> Result<()> {
    ensure_logged_in(app).await?;

    if with_prod {
        print_error("DANGER: YOU ARE ABOUT TO LIST PRODUCTION SERVERS");
        print_warning("To confirm, please type \"confirm\" below:");
        let answer = app.auth.prompter().input("Confirmation:")?;
        if answer.trim() != "confirm" {
            anyhow::bail!("Confirmation failed. Aborting.");
        }
    }

    let servers = fetch_servers(app).await?;
    let visible = visible_servers(&servers, &app.config.bridge.production_marker, with_prod);
    if visible.is_empty() {
        print_warning("No servers found.");
        return Ok(());
    }

    let groups = if long {
        match app.api.list_groups().await {
            Ok(groups) => Some(groups),
            Err(e) => {
                tracing::warn!("Failed to fetch groups: {}", e);
                Some(Vec::new())
            }
        }
    } else {
        None
    };

    print_info(&format!("Found {} servers:", visible.len()));
    println!("{}", format_servers(&visible, groups.as_deref()));
    Ok(())
}
