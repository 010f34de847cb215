use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::client::estimator::Estimate;
use hdrhistogram::Histogram;
use tracing::{debug, warn};

/// Aggregate view over a session's estimates, delays kept in an HDR histogram
pub struct Statistics {
    hist: Histogram<u64>,
    min_delay: f64,
    max_delay: f64,
    mean_offset: f64,
    clamped_count: usize,
}

impl Statistics {
    /// Create a new Statistics instance from session estimates
    pub fn new<'a>(estimates: impl IntoIterator<Item = &'a Estimate>) -> Result<Self> {
        let mut hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_US,
            HISTOGRAM_HIGH_BOUND_US,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| ClientError::Config(format!("Failed to create histogram: {}", e)))?;

        let mut min_delay = f64::INFINITY;
        let mut max_delay = f64::NEG_INFINITY;
        let mut offset_sum = 0.0;
        let mut count = 0usize;
        let mut clamped_count = 0;

        for estimate in estimates {
            let delay = estimate.round_trip_delay;
            min_delay = min_delay.min(delay);
            max_delay = max_delay.max(delay);
            offset_sum += estimate.offset;
            count += 1;

            // Negative delays appear when the wall clock steps backwards mid-session
            let micros = (delay * 1e6).round();
            let clamped = if micros < HISTOGRAM_LOW_BOUND_US as f64 {
                HISTOGRAM_LOW_BOUND_US
            } else if micros > HISTOGRAM_HIGH_BOUND_US as f64 {
                HISTOGRAM_HIGH_BOUND_US
            } else {
                micros as u64
            };
            if clamped as f64 != micros {
                clamped_count += 1;
            }

            hist.record(clamped).map_err(|e| {
                warn!(delay = delay, error = %e, "Failed to record delay");
                ClientError::Config(format!("Failed to record delay: {}", e))
            })?;
        }

        if clamped_count > 0 {
            warn!(
                clamped_count = clamped_count,
                total_count = count,
                "Some delays were clamped to histogram bounds"
            );
        }

        let stats = Self {
            hist,
            min_delay: if count == 0 { 0.0 } else { min_delay },
            max_delay: if count == 0 { 0.0 } else { max_delay },
            mean_offset: if count == 0 { 0.0 } else { offset_sum / count as f64 },
            clamped_count,
        };
        debug!(
            count = count,
            min_delay = stats.min_delay,
            max_delay = stats.max_delay,
            "Statistics calculated"
        );
        Ok(stats)
    }

    /// Number of estimates recorded
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    /// Mean delay in seconds
    pub fn mean_delay(&self) -> f64 {
        self.hist.mean() / 1e6
    }

    /// Delay at `quantile` in seconds
    pub fn delay_percentile(&self, quantile: f64) -> f64 {
        self.hist.value_at_quantile(quantile) as f64 / 1e6
    }

    /// Minimum delay in seconds (unclamped)
    pub fn min_delay(&self) -> f64 {
        self.min_delay
    }

    /// Maximum delay in seconds (unclamped)
    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn mean_offset(&self) -> f64 {
        self.mean_offset
    }

    /// Get the number of delays that were clamped
    pub fn clamped_count(&self) -> usize {
        self.clamped_count
    }
}
