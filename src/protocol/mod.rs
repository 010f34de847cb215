//! Wire protocol shared by the probe client and echo server

pub mod error;
pub mod message;

pub use error::{ProtocolError, Result as ProtocolResult};
pub use message::{Echo, Encoding, Probe, Timestamp, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
