//! Transfer progress reporting

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::job::{TransferJob, TransferStatus};

/// Receives byte-counter updates while a transfer runs
pub trait TransferProgress: Send {
    /// `done` bytes so far, out of `total` when known
    fn update(&mut self, done: u64, total: Option<u64>);

    /// The job finished, successfully or not
    fn finish(&mut self, _job: &TransferJob) {}
}

/// Discards all updates
#[derive(Debug, Default)]
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn update(&mut self, _done: u64, _total: Option<u64>) {}
}

/// Progress bar on stderr.
///
/// Starts as a byte-count spinner and becomes a bar with a percentage once
/// the total size is known.
pub struct ConsoleProgress {
    bar: ProgressBar,
    sized: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(Self::counter_style());
        Self { bar, sized: false }
    }

    /// Same behaviour, drawing nothing
    #[cfg(test)]
    fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()))
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Downloaded: {bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {percent}% {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress for ConsoleProgress {
    fn update(&mut self, done: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                if !self.sized {
                    self.bar.set_style(Self::bar_style());
                    self.sized = true;
                }
                self.bar.set_length(total);
                self.bar.set_position(done.min(total));
            }
            _ => self.bar.set_position(done),
        }
    }

    fn finish(&mut self, job: &TransferJob) {
        match job.status {
            TransferStatus::Complete => self.bar.finish(),
            _ => self.bar.abandon(),
        }
    }
}
