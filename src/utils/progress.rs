//! Progress tracking for enrichment batches.
//!
//! # Usage
//!
//! ```ignore
//! use paper_enrich::utils::ProgressReporter;
//!
//! let reporter = ProgressReporter::new("Enriching rows", 100);
//! for i in 0..100 {
//!     reporter.set_message(format!("row {}", i + 1));
//!     reporter.inc();
//! }
//! reporter.finish();
//! ```

use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter with optional terminal output
///
/// Quiet reporters still count; they just never draw.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    pb: ProgressBar,
}

impl ProgressReporter {
    /// Create a reporter that draws a progress bar on stderr
    pub fn new(name: &str, total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{prefix}: {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
        pb.set_style(style);
        pb.set_prefix(name.to_string());

        Self { pb }
    }

    /// Create a quiet reporter that doesn't output anything
    pub fn quiet(total: usize) -> Self {
        let pb = ProgressBar::hidden();
        pb.set_length(total as u64);
        Self { pb }
    }

    /// Increment progress by one row
    pub fn inc(&self) {
        self.pb.inc(1);
    }

    /// Show what is being worked on
    pub fn set_message(&self, msg: impl Into<String>) {
        self.pb.set_message(msg.into());
    }

    /// Finish and leave the bar on screen
    pub fn finish(&self) {
        self.pb.finish();
    }
}
