//! Transfer job bookkeeping

use std::fmt;
use std::path::PathBuf;

use sb_core::TRANSFER_CHUNK_SIZE;

/// Which way the bytes flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Lifecycle of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    Active,
    Complete,
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Active => "active",
            TransferStatus::Complete => "complete",
            TransferStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One file transfer over a ready session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub direction: TransferDirection,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub chunk_size: usize,
    /// Bytes transferred so far
    pub offset: u64,
    /// Total size; unknown for a download until the server reports it
    pub total_bytes: Option<u64>,
    pub status: TransferStatus,
}

impl TransferJob {
    pub fn new(
        direction: TransferDirection,
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
        total_bytes: Option<u64>,
    ) -> Self {
        Self {
            direction,
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            chunk_size: TRANSFER_CHUNK_SIZE,
            offset: 0,
            total_bytes,
            status: TransferStatus::Pending,
        }
    }

    /// Account for `n` more bytes.
    ///
    /// A reported total is advisory; the offset never runs past it because
    /// the total is raised to match.
    pub(crate) fn advance(&mut self, n: usize) {
        self.offset += n as u64;
        if matches!(self.total_bytes, Some(total) if total < self.offset) {
            self.total_bytes = Some(self.offset);
        }
    }

    /// Record a reported total, never below what already arrived
    pub(crate) fn set_total(&mut self, total: u64) {
        self.total_bytes = Some(total.max(self.offset));
    }

    /// Completed percentage, once the total is known
    pub fn percent(&self) -> Option<u64> {
        match self.total_bytes {
            Some(0) => Some(100),
            Some(total) => Some((self.offset.min(total) * 100) / total),
            None => None,
        }
    }

    pub(crate) fn set_status(&mut self, status: TransferStatus) {
        tracing::debug!(
            direction = ?self.direction,
            remote = %self.remote_path,
            "Transfer {} -> {}",
            self.status,
            status
        );
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = TransferJob::new(TransferDirection::Upload, "a.bin", "/tmp/a.bin", Some(10));
        assert_eq!(job.status, TransferStatus::Pending);
        assert_eq!(job.chunk_size, 262_144);
        assert_eq!(job.offset, 0);
    }

    #[test]
    fn test_percent() {
        let mut job = TransferJob::new(TransferDirection::Download, "x", "/x", None);
        assert_eq!(job.percent(), None);

        job.total_bytes = Some(200);
        job.advance(50);
        assert_eq!(job.percent(), Some(25));

        job.total_bytes = Some(0);
        assert_eq!(job.percent(), Some(100));
    }

    #[test]
    fn test_under_reported_total_is_raised() {
        let mut job = TransferJob::new(TransferDirection::Download, "x", "/x", None);
        job.set_total(10);
        job.advance(30);
        assert_eq!(job.offset, 30);
        assert_eq!(job.total_bytes, Some(30));

        job.set_total(20);
        assert_eq!(job.total_bytes, Some(30));
    }
}
