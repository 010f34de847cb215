//! Constants used throughout the client application

/// Decimal places for offset and delay in report lines
pub const REPORT_PRECISION: usize = 4;

/// Histogram lower bound in microseconds
pub const HISTOGRAM_LOW_BOUND_US: u64 = 1;

/// Histogram upper bound in microseconds (one hour)
pub const HISTOGRAM_HIGH_BOUND_US: u64 = 3_600_000_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;

/// Excellent round-trip delay threshold in milliseconds
pub const EXCELLENT_DELAY_MS: f64 = 1.0;

/// Acceptable round-trip delay threshold in milliseconds
pub const ACCEPTABLE_DELAY_MS: f64 = 50.0;
