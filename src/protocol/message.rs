use crate::protocol::error::{ProtocolError, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Fixed protocol version carried in every probe and echo
pub const PROTOCOL_VERSION: u32 = 7;

/// Receive buffer size; larger than any datagram either encoding produces
pub const MAX_DATAGRAM_SIZE: usize = 64;

/// On-wire layout shared by client and server.
///
/// Both peers must be configured with the same encoding; it is never
/// inferred from datagram size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Every field on a 32/64-bit boundary, 4-byte version field
    #[default]
    WordAligned,
    /// Packed fields, 2-byte version field
    Compact,
}

impl Encoding {
    /// Resolves the encoding from the CLI `--condensed` flag
    pub fn from_condensed(condensed: bool) -> Self {
        if condensed {
            Encoding::Compact
        } else {
            Encoding::WordAligned
        }
    }

    /// Width of the version field in bytes
    pub const fn version_len(self) -> usize {
        match self {
            Encoding::WordAligned => 4,
            Encoding::Compact => 2,
        }
    }

    /// Size of an encoded probe in bytes (24 or 22)
    pub const fn probe_len(self) -> usize {
        4 + self.version_len() + 16
    }

    /// Size of an encoded echo in bytes (40 or 38)
    pub const fn echo_len(self) -> usize {
        self.probe_len() + 16
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::WordAligned => "word-aligned",
            Encoding::Compact => "compact",
        }
    }
}

/// Wall-clock instant split into whole seconds and nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanoseconds: u64,
}

impl Timestamp {
    pub fn new(seconds: u64, nanoseconds: u64) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Reads the system wall clock. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs(),
            nanoseconds: u64::from(since_epoch.subsec_nanos()),
        }
    }

    /// Fractional seconds, `seconds + nanoseconds / 1e9` in double precision
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanoseconds as f64 / 1e9
    }
}

/// Client-to-server message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub sequence: u32,
    pub version: u32,
    pub sent: Timestamp,
}

impl Probe {
    pub fn new(sequence: u32, sent: Timestamp) -> Self {
        Self {
            sequence,
            version: PROTOCOL_VERSION,
            sent,
        }
    }

    pub fn encode(&self, encoding: Encoding) -> Vec<u8> {
        let mut buf = Vec::with_capacity(encoding.probe_len());
        self.write_fields(&mut buf, encoding);
        buf
    }

    /// Decodes a probe, rejecting short datagrams and foreign versions.
    /// Trailing bytes beyond the fixed size are ignored.
    pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self> {
        ensure_len(bytes, encoding.probe_len())?;
        let mut reader = FieldReader::new(bytes);
        let probe = Self::read_fields(&mut reader, encoding)?;
        trace!(sequence = probe.sequence, "Probe decoded");
        Ok(probe)
    }

    fn write_fields(&self, buf: &mut Vec<u8>, encoding: Encoding) {
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        match encoding {
            Encoding::WordAligned => buf.extend_from_slice(&self.version.to_be_bytes()),
            Encoding::Compact => buf.extend_from_slice(&(self.version as u16).to_be_bytes()),
        }
        buf.extend_from_slice(&self.sent.seconds.to_be_bytes());
        buf.extend_from_slice(&self.sent.nanoseconds.to_be_bytes());
    }

    fn read_fields(reader: &mut FieldReader<'_>, encoding: Encoding) -> Result<Self> {
        let sequence = reader.u32();
        let version = match encoding {
            Encoding::WordAligned => reader.u32(),
            Encoding::Compact => u32::from(reader.u16()),
        };
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }
        let sent = Timestamp::new(reader.u64(), reader.u64());
        Ok(Self {
            sequence,
            version,
            sent,
        })
    }
}

/// Server-to-client reply: the probe verbatim plus the server's processing time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    pub probe: Probe,
    pub server: Timestamp,
}

impl Echo {
    pub fn new(probe: Probe, server: Timestamp) -> Self {
        Self { probe, server }
    }

    pub fn sequence(&self) -> u32 {
        self.probe.sequence
    }

    pub fn encode(&self, encoding: Encoding) -> Vec<u8> {
        let mut buf = Vec::with_capacity(encoding.echo_len());
        self.probe.write_fields(&mut buf, encoding);
        buf.extend_from_slice(&self.server.seconds.to_be_bytes());
        buf.extend_from_slice(&self.server.nanoseconds.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self> {
        ensure_len(bytes, encoding.echo_len())?;
        let mut reader = FieldReader::new(bytes);
        let probe = Probe::read_fields(&mut reader, encoding)?;
        let server = Timestamp::new(reader.u64(), reader.u64());
        trace!(sequence = probe.sequence, "Echo decoded");
        Ok(Self { probe, server })
    }

    /// Decodes an echo for a session of `max_sequence` probes, additionally
    /// rejecting sequence numbers outside `1..=max_sequence`.
    pub fn decode_in_range(bytes: &[u8], encoding: Encoding, max_sequence: u32) -> Result<Self> {
        let echo = Self::decode(bytes, encoding)?;
        let sequence = echo.sequence();
        if sequence == 0 || sequence > max_sequence {
            return Err(ProtocolError::SequenceOutOfRange {
                sequence,
                max: max_sequence,
            });
        }
        Ok(echo)
    }
}

fn ensure_len(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Big-endian field cursor. Callers check the total length first.
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut field = [0u8; N];
        field.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        field
    }

    fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_encoding() -> impl Strategy<Value = Encoding> {
        prop_oneof![Just(Encoding::WordAligned), Just(Encoding::Compact)]
    }

    proptest! {
        #[test]
        fn test_probe_roundtrip_property(
            sequence in any::<u32>(),
            seconds in any::<u64>(),
            nanoseconds in any::<u64>(),
            encoding in any_encoding(),
        ) {
            let probe = Probe::new(sequence, Timestamp::new(seconds, nanoseconds));
            let decoded = Probe::decode(&probe.encode(encoding), encoding).unwrap();
            prop_assert_eq!(decoded, probe);
        }

        #[test]
        fn test_echo_roundtrip_property(
            sequence in any::<u32>(),
            client in (any::<u64>(), any::<u64>()),
            server in (any::<u64>(), any::<u64>()),
            encoding in any_encoding(),
        ) {
            let echo = Echo::new(
                Probe::new(sequence, Timestamp::new(client.0, client.1)),
                Timestamp::new(server.0, server.1),
            );
            let decoded = Echo::decode(&echo.encode(encoding), encoding).unwrap();
            prop_assert_eq!(decoded, echo);
        }

        #[test]
        fn test_short_buffers_rejected(len in 0usize..40, encoding in any_encoding()) {
            let buf = vec![0u8; len];
            if len < encoding.echo_len() {
                prop_assert!(Echo::decode(&buf, encoding).is_err());
            }
            if len < encoding.probe_len() {
                prop_assert!(Probe::decode(&buf, encoding).is_err());
            }
        }
    }
}
