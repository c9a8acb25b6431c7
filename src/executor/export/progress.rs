//! Progress tracking for export operations
//!
//! Shows how many of the planned hits have been fetched so far. Disabled by
//! default; the CLI turns it on for interactive exports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for the fetch phase
pub struct ProgressTracker {
    /// Number of hits fetched so far
    fetched: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Planned number of hits if known (None for a spinner)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: Option<u64>, enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| match total {
            Some(n) => {
                let bar = ProgressBar::new(n);
                if let Ok(style) =
                    ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {pos} hits {msg}") {
                    bar.set_style(style);
                }
                bar
            }
        });

        Self {
            fetched: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Disabled tracker
    pub fn hidden() -> Self {
        Self::new(None, false)
    }

    /// Update progress with the running total of fetched hits
    pub fn update(&self, count: u64) {
        self.fetched.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                bar.set_message(format!("({:.0} hits/sec)", count as f64 / elapsed));
            }
        }
    }

    /// Hits recorded by the last update
    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_with_total() {
        let tracker = ProgressTracker::new(Some(1000), false);
        tracker.update(500);
        assert_eq!(tracker.fetched(), 500);
        tracker.finish();
    }

    #[test]
    fn test_progress_tracker_hidden() {
        let tracker = ProgressTracker::hidden();
        tracker.update(7);
        assert_eq!(tracker.fetched(), 7);
    }
}
