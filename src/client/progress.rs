use crate::client::error::{ClientError, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over collected echoes, drawn on stderr.
///
/// Redraws only when an echo is recorded; no steady-tick thread.
pub struct ProgressTracker {
    pb: ProgressBar,
}

impl ProgressTracker {
    /// Create a visible progress tracker for `count` probes
    pub fn new(count: u32) -> Result<Self> {
        let pb = ProgressBar::with_draw_target(Some(u64::from(count)), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>7}/{len:7} echoes [{elapsed_precise}]")
                .map_err(|e| ClientError::Config(format!("Failed to create progress style: {}", e)))?
                .progress_chars("█░"),
        );
        Ok(Self { pb })
    }

    /// A tracker that draws nothing
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn record_echo(&self) {
        self.pb.inc(1);
    }

    /// Clear the bar so the report starts on a clean line
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_counts() {
        let tracker = ProgressTracker::hidden();
        tracker.record_echo();
        tracker.record_echo();
        assert_eq!(tracker.pb.position(), 2);
        tracker.finish();
    }

    #[test]
    fn test_visible_tracker_builds() {
        assert!(ProgressTracker::new(5).is_ok());
    }
}
