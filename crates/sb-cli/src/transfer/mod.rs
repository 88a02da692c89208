//! File transfer over a ready session
//!
//! Downloads accept both server modes: a single `scp-download-result`
//! carrying the whole file, or a stream of `scp-download-chunk` events.
//! Uploads are sent as fixed-size `scp-upload-chunk` events without
//! per-chunk acknowledgement unless an in-flight window is configured.

mod download;
mod job;
mod progress;
mod upload;

pub use download::{resolve_download_destination, DownloadJob};
pub use job::{TransferDirection, TransferJob, TransferStatus};
pub use progress::{ConsoleProgress, NoProgress, TransferProgress};
pub use upload::{UploadJob, UploadOptions};
