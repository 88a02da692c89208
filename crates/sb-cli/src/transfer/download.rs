//! Remote-to-local transfer

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use sb_core::TransferError;
use sb_protocol::{ClientEvent, DownloadChunk, DownloadProgress, DownloadResult, ServerEvent};

use super::job::{TransferDirection, TransferJob, TransferStatus};
use super::progress::TransferProgress;
use crate::session::ReadySession;

/// Where a download of `remote` should land.
///
/// An existing directory receives the remote file's basename; any other
/// given path is used as-is; without one the file goes into `cwd`.
pub fn resolve_download_destination(remote: &str, local: Option<&Path>, cwd: &Path) -> PathBuf {
    let file_name = remote_basename(remote);
    match local {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => cwd.join(file_name),
    }
}

fn remote_basename(remote: &str) -> &str {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(remote)
}

/// What one event means for the download
enum Step {
    Continue,
    Done,
}

/// A download whose destination file already exists
#[derive(Debug)]
pub struct DownloadJob {
    job: TransferJob,
    file: Option<File>,
}

impl DownloadJob {
    /// Create the destination file.
    ///
    /// Runs before anything touches the network so local failures surface
    /// first.
    pub async fn prepare(remote: &str, destination: PathBuf) -> Result<Self, TransferError> {
        let file = File::create(&destination)
            .await
            .map_err(|e| TransferError::local_io(&destination, e))?;
        tracing::debug!("Created {}", destination.display());

        Ok(Self {
            job: TransferJob::new(TransferDirection::Download, destination, remote, None),
            file: Some(file),
        })
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    /// Request the file and write what arrives, in arrival order.
    ///
    /// On any failure the partial file is removed.
    pub async fn run(
        mut self,
        session: &mut ReadySession,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferJob, TransferError> {
        self.job.set_status(TransferStatus::Active);
        let result = self.receive(session, progress).await;

        match result {
            Ok(()) => {
                self.job.set_status(TransferStatus::Complete);
                progress.finish(&self.job);
                tracing::info!(
                    bytes = self.job.offset,
                    "Download complete: {}",
                    self.job.local_path.display()
                );
                Ok(self.job)
            }
            Err(e) => {
                self.job.set_status(TransferStatus::Failed);
                progress.finish(&self.job);
                self.discard().await;
                Err(e)
            }
        }
    }

    async fn receive(
        &mut self,
        session: &mut ReadySession,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), TransferError> {
        session
            .emit(ClientEvent::ScpDownload {
                path: self.job.remote_path.clone(),
            })
            .await
            .map_err(|e| TransferError::Socket(e.to_string()))?;
        tracing::debug!(path = %self.job.remote_path, "Download requested");

        loop {
            let event = session
                .next_event()
                .await
                .ok_or_else(|| TransferError::Socket("session closed".to_string()))?;

            if let Step::Done = self.handle(event, progress).await? {
                return self.flush().await;
            }
        }
    }

    async fn handle(
        &mut self,
        event: ServerEvent,
        progress: &mut dyn TransferProgress,
    ) -> Result<Step, TransferError> {
        match event {
            ServerEvent::DownloadResult(DownloadResult { error: Some(e), .. }) => {
                Err(TransferError::RemoteChunk(e))
            }
            ServerEvent::DownloadResult(DownloadResult { content, .. }) => {
                if let Some(content) = content {
                    self.write(&content).await?;
                    progress.update(self.job.offset, Some(self.job.offset));
                }
                Ok(Step::Done)
            }
            ServerEvent::DownloadChunk(DownloadChunk { error: Some(e), .. }) => {
                Err(TransferError::RemoteChunk(e))
            }
            ServerEvent::DownloadChunk(DownloadChunk { chunk, is_last, .. }) => {
                if let Some(chunk) = chunk {
                    self.write(&chunk).await?;
                    progress.update(self.job.offset, self.job.total_bytes);
                }
                Ok(if is_last { Step::Done } else { Step::Continue })
            }
            ServerEvent::DownloadProgress(DownloadProgress {
                total_size,
                downloaded,
            }) => {
                if let Some(total) = total_size.filter(|total| *total > 0) {
                    self.job.set_total(total);
                    progress.update(downloaded, self.job.total_bytes);
                }
                Ok(Step::Continue)
            }
            ServerEvent::Error { message } => {
                tracing::warn!("Server error during download: {}", message);
                Ok(Step::Continue)
            }
            ServerEvent::SessionEnd => Err(TransferError::Socket("session ended by server".to_string())),
            ServerEvent::Disconnect { reason } => {
                Err(TransferError::Socket(format!("disconnected: {}", reason)))
            }
            ServerEvent::ConnectError { message } => Err(TransferError::Socket(message)),
            other => {
                tracing::trace!("Ignoring {:?} during download", other);
                Ok(Step::Continue)
            }
        }
    }

    async fn write(&mut self, data: &Bytes) -> Result<(), TransferError> {
        let path = &self.job.local_path;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TransferError::Socket("download already finished".to_string()))?;
        file.write_all(data)
            .await
            .map_err(|e| TransferError::local_io(path, e))?;
        self.job.advance(data.len());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransferError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| TransferError::local_io(&self.job.local_path, e))?;
        }
        Ok(())
    }

    /// Give up before the transfer started, removing the created file
    pub async fn abandon(mut self) {
        self.job.set_status(TransferStatus::Failed);
        self.discard().await;
    }

    /// Close and remove the partial file
    async fn discard(&mut self) {
        self.file.take();
        match tokio::fs::remove_file(&self.job.local_path).await {
            Ok(()) => tracing::debug!("Removed partial {}", self.job.local_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove partial {}: {}",
                self.job.local_path.display(),
                e
            ),
        }
    }
}
