//! Clockprobe - UDP clock-offset and round-trip latency probe
//!
//! This library implements a minimal NTP-style exchange: a client sends a
//! numbered sequence of timestamped probes, a server echoes each one back with
//! its own timestamp, and the client estimates clock offset and round-trip
//! delay per probe.

pub mod client;
pub mod logging;
pub mod protocol;
pub mod server;
