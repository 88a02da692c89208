//! File transfer commands

use std::path::Path;

use anyhow::{Context, Result};

use sb_protocol::TerminalGeometry;

use super::{ensure_logged_in, resolve_target, App};
use crate::output::{print_info, print_step, print_success};
use crate::transfer::{
    resolve_download_destination, ConsoleProgress, DownloadJob, UploadJob, UploadOptions,
};

/// `sshbridge download <server> <remote> [local]`
pub async fn download_command(app: &App, query: &str, remote: &str, local: Option<&Path>) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    let destination = resolve_download_destination(remote, local, &cwd);
    let job = DownloadJob::prepare(remote, destination).await?;

    let opened = async {
        ensure_logged_in(app).await?;
        let server = resolve_target(app, query).await?;
        let session = app
            .negotiator(format!("{} ({})", server.name, server.ip))
            .negotiate(&server, TerminalGeometry::default())
            .await?;
        Ok::<_, anyhow::Error>((server, session))
    }
    .await;
    let (server, mut session) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            job.abandon().await;
            return Err(e);
        }
    };

    print_info(&format!("Downloading {} from {}...", remote, server.name));
    let result = job.run(&mut session, &mut ConsoleProgress::new()).await;
    session.close().await;

    let job = result.context("Download failed")?;
    print_success(&format!("Download complete: {}", job.local_path.display()));
    Ok(())
}

/// `sshbridge upload <server> <local> [remote]`
pub async fn upload_command(app: &App, query: &str, local: &Path, remote: Option<&str>) -> Result<()> {
    let job = UploadJob::prepare(local, remote).await?;
    ensure_logged_in(app).await?;
    let server = resolve_target(app, query).await?;

    let mut session = app
        .negotiator(format!("{} ({})", server.name, server.ip))
        .negotiate(&server, TerminalGeometry::default())
        .await?;

    print_info(&format!(
        "Uploading {} to {}:{}...",
        local.display(),
        server.name,
        job.job().remote_path
    ));
    print_step("Connection established. Starting upload...");
    let options = UploadOptions::from(&app.config.transfer);
    let result = job.run(&mut session, options, &mut ConsoleProgress::new()).await;
    session.close().await;

    let job = result.context("Upload failed")?;
    print_success(&format!("Upload complete ({} bytes).", job.offset));
    Ok(())
}
