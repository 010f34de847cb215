use thiserror::Error;

/// Protocol-level errors for datagram encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Truncated datagram: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Unsupported protocol version: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Sequence {sequence} outside session range 1..={max}")]
    SequenceOutOfRange { sequence: u32, max: u32 },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
