//! Dispatch loop counters

use std::time::{Duration, Instant};
use tracing::info;

/// Datagrams between periodic counter summaries
pub const COUNTER_LOG_INTERVAL: u64 = 10_000;

/// Running totals kept by the single-threaded dispatch loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerCounters {
    pub received: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub echoed: u64,
    pub reordered: u64,
    pub untracked: u64,
    pub send_errors: u64,
}

/// Owns the counters and logs a summary every `log_interval` datagrams
#[derive(Debug)]
pub struct ServerMonitor {
    counters: ServerCounters,
    log_interval: u64,
    start_time: Instant,
}

impl ServerMonitor {
    pub fn new(log_interval: u64) -> Self {
        Self {
            counters: ServerCounters::default(),
            log_interval,
            start_time: Instant::now(),
        }
    }

    pub fn counters(&self) -> ServerCounters {
        self.counters
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Counts one datagram and logs the summary when the interval is reached
    pub fn increment_received(&mut self) {
        self.counters.received += 1;
        if self.log_interval > 0 && self.counters.received % self.log_interval == 0 {
            self.log_summary();
        }
    }

    pub fn increment_malformed(&mut self) {
        self.counters.malformed += 1;
    }

    pub fn increment_dropped(&mut self) {
        self.counters.dropped += 1;
    }

    pub fn increment_echoed(&mut self) {
        self.counters.echoed += 1;
    }

    pub fn increment_reordered(&mut self) {
        self.counters.reordered += 1;
    }

    pub fn increment_untracked(&mut self) {
        self.counters.untracked += 1;
    }

    pub fn increment_send_error(&mut self) {
        self.counters.send_errors += 1;
    }

    pub fn log_summary(&self) {
        let c = &self.counters;
        info!(
            received = c.received,
            malformed = c.malformed,
            dropped = c.dropped,
            echoed = c.echoed,
            reordered = c.reordered,
            untracked = c.untracked,
            send_errors = c.send_errors,
            uptime_secs = self.uptime().as_secs(),
            "Dispatch counters"
        );
    }
}

impl Default for ServerMonitor {
    fn default() -> Self {
        Self::new(COUNTER_LOG_INTERVAL)
    }
}
