//! Server module for the clockprobe echo server

pub mod config;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod tracker;

pub use config::ServerConfig;
pub use dispatch::{bind_socket, write_reorder, Disposition, Dispatcher};
pub use error::{Result, ServerError};
pub use monitor::{ServerCounters, ServerMonitor};
pub use tracker::{Observation, ReorderEvent, SenderSlot, SenderTable};
