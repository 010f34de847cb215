//! Probe client: sends the session's probes and turns echoes into offset/delay estimates

pub mod config;
pub mod constants;
pub mod error;
pub mod estimator;
pub mod progress;
pub mod reporter;
pub mod session;
pub mod socket;
pub mod statistics;

pub use config::{Config, SessionConfig};
pub use error::{ClientError, Result};
pub use estimator::{estimate, Estimate};
pub use progress::ProgressTracker;
pub use reporter::Reporter;
pub use session::{run_session, Delivery, Session, SessionEntry};
pub use socket::{ProbeTransport, UdpProbeSocket};
pub use statistics::Statistics;
