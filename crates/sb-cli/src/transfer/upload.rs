//! Local-to-remote transfer

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use sb_core::config::TransferConfig;
use sb_core::TransferError;
use sb_protocol::{ClientEvent, ServerEvent, UploadChunk};

use super::job::{TransferDirection, TransferJob, TransferStatus};
use super::progress::TransferProgress;
use crate::session::ReadySession;

/// Pacing of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// How long to keep the socket open after the final chunk
    pub settle_delay: Duration,
    /// Chunks allowed ahead of `upload-progress` acknowledgements
    pub max_in_flight: Option<usize>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl From<&TransferConfig> for UploadOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            max_in_flight: config.max_in_flight_chunks.filter(|n| *n > 0),
        }
    }
}

/// An upload whose source file is open
#[derive(Debug)]
pub struct UploadJob {
    job: TransferJob,
    file: File,
    acked: u64,
}

impl UploadJob {
    /// Open and size the source file.
    ///
    /// The remote name defaults to the local basename.
    pub async fn prepare(local: &Path, remote: Option<&str>) -> Result<Self, TransferError> {
        let file = File::open(local)
            .await
            .map_err(|e| TransferError::local_io(local, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| TransferError::local_io(local, e))?;
        if !metadata.is_file() {
            return Err(TransferError::local_io(
                local,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let target = match remote {
            Some(remote) if !remote.is_empty() => remote.to_string(),
            _ => local_basename(local),
        };

        Ok(Self {
            job: TransferJob::new(
                TransferDirection::Upload,
                local.to_path_buf(),
                target,
                Some(metadata.len()),
            ),
            file,
            acked: 0,
        })
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    /// Send the file in order, one chunk at a time.
    ///
    /// Between chunks control returns to the scheduler and any queued server
    /// events are handled; a server error or the end of the session aborts
    /// the upload. The source file is closed when this returns.
    pub async fn run(
        mut self,
        session: &mut ReadySession,
        options: UploadOptions,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferJob, TransferError> {
        self.job.set_status(TransferStatus::Active);
        let result = self.send(session, options, progress).await;

        match result {
            Ok(()) => {
                self.job.set_status(TransferStatus::Complete);
                progress.finish(&self.job);
                tracing::info!(bytes = self.job.offset, "Upload complete: {}", self.job.remote_path);
                Ok(self.job)
            }
            Err(e) => {
                self.job.set_status(TransferStatus::Failed);
                progress.finish(&self.job);
                Err(e)
            }
        }
    }

    async fn send(
        &mut self,
        session: &mut ReadySession,
        options: UploadOptions,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), TransferError> {
        let total = self.job.total_bytes.unwrap_or(0);
        if total == 0 {
            tracing::debug!("Empty file, nothing to send");
            return Ok(());
        }

        let mut buf = vec![0u8; self.job.chunk_size];
        let mut chunk_index: u64 = 0;

        while self.job.offset < total {
            if let Some(window) = options.max_in_flight {
                while chunk_index.saturating_sub(self.acked) >= window as u64 {
                    let event = session
                        .next_event()
                        .await
                        .ok_or_else(|| TransferError::Socket("session closed".to_string()))?;
                    self.handle(event)?;
                }
            }

            let offset = self.job.offset;
            let want = (total - offset).min(buf.len() as u64) as usize;
            let n = self.read_at(offset, &mut buf[..want]).await?;
            let is_last = offset + n as u64 >= total;

            session
                .emit(ClientEvent::ScpUploadChunk(UploadChunk {
                    file_name: self.job.remote_path.clone(),
                    chunk: Bytes::copy_from_slice(&buf[..n]),
                    offset,
                    is_last,
                    chunk_index,
                }))
                .await
                .map_err(|e| TransferError::Socket(e.to_string()))?;

            self.job.advance(n);
            chunk_index += 1;
            progress.update(self.job.offset, Some(total));
            tracing::trace!(chunk_index, offset, n, is_last, "Chunk sent");

            tokio::task::yield_now().await;
            while let Some(event) = session.try_next_event() {
                self.handle(event)?;
            }
        }

        self.settle(session, options.settle_delay).await
    }

    /// Fill `buf` from `offset`; short only at end of file
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, TransferError> {
        let path = &self.job.local_path;
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| TransferError::local_io(path, e))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|e| TransferError::local_io(path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Err(TransferError::local_io(
                path,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file shrank during upload"),
            ));
        }
        Ok(filled)
    }

    fn handle(&mut self, event: ServerEvent) -> Result<(), TransferError> {
        match event {
            ServerEvent::UploadProgress(_) => {
                self.acked += 1;
                Ok(())
            }
            ServerEvent::Error { message } => Err(TransferError::RemoteChunk(message)),
            ServerEvent::SessionEnd => Err(TransferError::Socket("session ended by server".to_string())),
            ServerEvent::Disconnect { reason } => {
                Err(TransferError::Socket(format!("disconnected: {}", reason)))
            }
            ServerEvent::ConnectError { message } => Err(TransferError::Socket(message)),
            other => {
                tracing::trace!("Ignoring {:?} during upload", other);
                Ok(())
            }
        }
    }

    /// Give the server time to write the final chunk
    async fn settle(&mut self, session: &mut ReadySession, delay: Duration) -> Result<(), TransferError> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                event = session.next_event() => match event {
                    Some(ServerEvent::Error { message }) => {
                        return Err(TransferError::RemoteChunk(message));
                    }
                    Some(event) if event.is_terminal() => {
                        tracing::debug!("Session ended while settling: {:?}", event);
                        return Ok(());
                    }
                    Some(_) => {}
                    None => return Ok(()),
                },
            }
        }
    }
}

fn local_basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ScriptedApi;
    use crate::session::{negotiator, server, session_created, ScriptedConnector};
    use crate::transfer::NoProgress;
    use sb_protocol::{TerminalGeometry, UploadProgress};
    use std::io::Write;
    use std::sync::Arc;

    async fn ready(script: Vec<ServerEvent>) -> (ReadySession, Arc<ScriptedConnector>) {
        let api = Arc::new(ScriptedApi::default());
        api.push_session(session_created("sess"));
        let connector = Arc::new(ScriptedConnector::new(script));
        let session = negotiator(api, connector.clone(), &[])
            .negotiate(&server("web"), TerminalGeometry::default())
            .await
            .unwrap();
        (session, connector)
    }

    fn quick() -> UploadOptions {
        UploadOptions {
            settle_delay: Duration::ZERO,
            max_in_flight: None,
        }
    }

    fn source(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    fn chunks(sent: &[ClientEvent]) -> Vec<UploadChunk> {
        sent.iter()
            .filter_map(|event| match event {
                ClientEvent::ScpUploadChunk(chunk) => Some(chunk.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_upload_splits_into_chunks() {
        let file = source(600_000);
        let (mut session, connector) = ready(vec![ServerEvent::Ready]).await;

        let job = UploadJob::prepare(file.path(), Some("/tmp/data.bin"))
            .await
            .unwrap()
            .run(&mut session, quick(), &mut NoProgress)
            .await
            .unwrap();
        session.close().await;

        let chunks = chunks(&connector.sent());
        let sizes: Vec<usize> = chunks.iter().map(|c| c.chunk.len()).collect();
        assert_eq!(sizes, vec![262_144, 262_144, 75_712]);
        assert_eq!(
            chunks.iter().map(|c| c.is_last).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(
            chunks.iter().map(|c| c.offset).collect::<Vec<_>>(),
            vec![0, 262_144, 524_288]
        );
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(chunks.iter().all(|c| c.file_name == "/tmp/data.bin"));

        let rebuilt: Vec<u8> = chunks.iter().flat_map(|c| c.chunk.to_vec()).collect();
        assert_eq!(rebuilt, std::fs::read(file.path()).unwrap());
        assert_eq!(job.offset, 600_000);
        assert_eq!(job.status, TransferStatus::Complete);
    }

    #[tokio::test]
    async fn test_exact_multiple_marks_only_last() {
        let file = source(2 * 262_144);
        let (mut session, connector) = ready(vec![ServerEvent::Ready]).await;

        UploadJob::prepare(file.path(), None)
            .await
            .unwrap()
            .run(&mut session, quick(), &mut NoProgress)
            .await
            .unwrap();
        session.close().await;

        let chunks = chunks(&connector.sent());
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].is_last);
        assert!(chunks[1].is_last);
    }

    #[tokio::test]
    async fn test_zero_byte_upload_sends_nothing() {
        let file = source(0);
        let (mut session, connector) = ready(vec![ServerEvent::Ready]).await;

        let job = UploadJob::prepare(file.path(), None)
            .await
            .unwrap()
            .run(&mut session, quick(), &mut NoProgress)
            .await
            .unwrap();
        session.close().await;

        assert_eq!(job.status, TransferStatus::Complete);
        assert!(chunks(&connector.sent()).is_empty());
    }

    #[tokio::test]
    async fn test_default_target_is_local_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b\n").unwrap();

        let job = UploadJob::prepare(&path, None).await.unwrap();
        assert_eq!(job.job().remote_path, "report.csv");
        assert_eq!(job.job().total_bytes, Some(4));
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_network() {
        let err = UploadJob::prepare(Path::new("/definitely/not/here"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::LocalIo { .. }));
    }

    #[tokio::test]
    async fn test_server_error_aborts_upload() {
        let file = source(600_000);
        let (mut session, connector) = ready(vec![
            ServerEvent::Ready,
            ServerEvent::Error {
                message: "No space left on device".to_string(),
            },
        ])
        .await;

        let err = UploadJob::prepare(file.path(), None)
            .await
            .unwrap()
            .run(&mut session, quick(), &mut NoProgress)
            .await
            .unwrap_err();
        session.close().await;

        assert!(matches!(err, TransferError::RemoteChunk(_)));
        assert_eq!(chunks(&connector.sent()).len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_window_waits_for_acks() {
        let file = source(600_000);
        let ack = ServerEvent::UploadProgress(UploadProgress {
            chunk_index: None,
            received: None,
        });
        let (mut session, connector) =
            ready(vec![ServerEvent::Ready, ack.clone(), ack.clone(), ack]).await;
        let options = UploadOptions {
            settle_delay: Duration::ZERO,
            max_in_flight: Some(1),
        };

        let job = UploadJob::prepare(file.path(), None)
            .await
            .unwrap()
            .run(&mut session, options, &mut NoProgress)
            .await
            .unwrap();
        session.close().await;

        assert_eq!(job.status, TransferStatus::Complete);
        assert_eq!(chunks(&connector.sent()).len(), 3);
    }

    #[test]
    fn test_options_from_config() {
        let config = TransferConfig {
            settle_delay: Duration::from_millis(250),
            max_in_flight_chunks: Some(0),
        };
        let options = UploadOptions::from(&config);
        assert_eq!(options.settle_delay, Duration::from_millis(250));
        assert_eq!(options.max_in_flight, None);
        assert_eq!(UploadOptions::default().settle_delay, Duration::from_millis(1000));
    }
}
