//! Client session engine: send every probe, then collect echoes until all
//! are accounted for or the idle timeout fires.

use crate::client::config::SessionConfig;
use crate::client::error::{ClientError, Result};
use crate::client::estimator::{estimate, Estimate};
use crate::client::progress::ProgressTracker;
use crate::client::socket::ProbeTransport;
use crate::protocol::{Echo, Encoding, Probe, ProtocolError, Timestamp, MAX_DATAGRAM_SIZE};
use std::io::ErrorKind;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Per-sequence result, created at send time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionEntry {
    pub sent: Timestamp,
    /// Set once, from the first valid echo for this sequence
    pub estimate: Option<Estimate>,
}

impl SessionEntry {
    pub fn received(&self) -> bool {
        self.estimate.is_some()
    }
}

/// What became of one incoming datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Recorded(Estimate),
    Duplicate,
    Discarded(ProtocolError),
}

/// Result table for sequences `1..=count`
#[derive(Debug, Clone)]
pub struct Session {
    encoding: Encoding,
    entries: Vec<SessionEntry>,
    received: u32,
}

impl Session {
    pub fn new(count: u32, encoding: Encoding) -> Self {
        Self {
            encoding,
            entries: vec![SessionEntry::default(); count as usize],
            received: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.count()
    }

    /// Records the send time for `sequence` and returns the encoded probe.
    pub fn record_probe(&mut self, sequence: u32, sent: Timestamp) -> Vec<u8> {
        if let Some(entry) = self.entry_mut(sequence) {
            entry.sent = sent;
        }
        Probe::new(sequence, sent).encode(self.encoding)
    }

    /// Applies one incoming datagram received at `received_at`.
    ///
    /// Malformed and out-of-range echoes leave the table untouched, and so do
    /// repeats of an already received sequence.
    pub fn deliver(&mut self, datagram: &[u8], received_at: Timestamp) -> Delivery {
        let count = self.count();
        let echo = match Echo::decode_in_range(datagram, self.encoding, count) {
            Ok(echo) => echo,
            Err(e) => return Delivery::Discarded(e),
        };
        let Some(entry) = self.entry_mut(echo.sequence()) else {
            return Delivery::Discarded(ProtocolError::SequenceOutOfRange {
                sequence: echo.sequence(),
                max: count,
            });
        };
        if entry.received() {
            return Delivery::Duplicate;
        }

        let result = estimate(entry.sent, echo.server, received_at);
        entry.estimate = Some(result);
        self.received += 1;
        Delivery::Recorded(result)
    }

    /// Entries in sequence order, paired with their 1-based sequence number
    pub fn entries(&self) -> impl Iterator<Item = (u32, &SessionEntry)> {
        (1u32..).zip(self.entries.iter())
    }

    pub fn estimates(&self) -> impl Iterator<Item = &Estimate> {
        self.entries.iter().filter_map(|entry| entry.estimate.as_ref())
    }

    fn entry_mut(&mut self, sequence: u32) -> Option<&mut SessionEntry> {
        let index = (sequence as usize).checked_sub(1)?;
        self.entries.get_mut(index)
    }
}

/// Runs a complete session over `transport`.
///
/// The idle deadline is measured from the last valid echo and recomputed
/// against the wall clock after every wake-up.
pub fn run_session<T: ProbeTransport>(
    transport: &mut T,
    config: &SessionConfig,
    progress: &ProgressTracker,
) -> Result<Session> {
    let mut session = Session::new(config.count, config.encoding);

    for sequence in 1..=config.count {
        let datagram = session.record_probe(sequence, Timestamp::now());
        if let Err(e) = transport.send(&datagram) {
            warn!(sequence = sequence, error = %e, "Probe not sent");
        }
    }
    debug!(count = config.count, "Send phase complete");

    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let mut last_activity = Instant::now();

    while !session.is_complete() {
        let wait = match config.idle_timeout {
            Some(timeout) => {
                let idle = last_activity.elapsed();
                if idle >= timeout {
                    info!(
                        received = session.received(),
                        expected = session.count(),
                        "Idle timeout reached"
                    );
                    break;
                }
                Some(timeout - idle)
            }
            None => None,
        };

        let len = match transport.recv_timeout(&mut buf, wait) {
            Ok(Some(len)) => len,
            Ok(None) => continue,
            Err(ClientError::Io(e))
                if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::ConnectionRefused) =>
            {
                debug!(error = %e, "Transient receive error");
                continue;
            }
            Err(e) => return Err(e),
        };
        let received_at = Timestamp::now();

        match session.deliver(&buf[..len], received_at) {
            Delivery::Recorded(result) => {
                trace!(
                    offset = result.offset,
                    delay = result.round_trip_delay,
                    "Echo recorded"
                );
                progress.record_echo();
                last_activity = Instant::now();
            }
            Delivery::Duplicate => {
                trace!("Duplicate echo ignored");
                last_activity = Instant::now();
            }
            Delivery::Discarded(e) => {
                trace!(error = %e, bytes = len, "Datagram discarded");
            }
        }
    }

    debug!(
        received = session.received(),
        expected = session.count(),
        "Collect phase complete"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::socket::MockProbeTransport;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn echo_bytes(sequence: u32, encoding: Encoding, server: Timestamp) -> Vec<u8> {
        Echo::new(Probe::new(sequence, Timestamp::default()), server).encode(encoding)
    }

    fn config(count: u32, idle_timeout: Option<Duration>) -> SessionConfig {
        SessionConfig {
            count,
            idle_timeout,
            encoding: Encoding::WordAligned,
        }
    }

    /// Queues replies; once drained, each wait sleeps out its timeout.
    fn scripted_transport(replies: Vec<Vec<u8>>) -> MockProbeTransport {
        let mut transport = MockProbeTransport::new();
        transport.expect_send().returning(|datagram| Ok(datagram.len()));

        let queue = Arc::new(Mutex::new(replies.into_iter()));
        transport
            .expect_recv_timeout()
            .returning(move |buf: &mut [u8], timeout: Option<Duration>| {
                match queue.lock().unwrap().next() {
                    Some(reply) => {
                        buf[..reply.len()].copy_from_slice(&reply);
                        Ok(Some(reply.len()))
                    }
                    None => {
                        thread::sleep(timeout.expect("test waits must be bounded"));
                        Ok(None)
                    }
                }
            });
        transport
    }

    #[test]
    fn test_deliver_records_estimate() {
        let mut session = Session::new(2, Encoding::Compact);
        session.record_probe(1, Timestamp::new(100, 0));

        let delivery = session.deliver(
            &echo_bytes(1, Encoding::Compact, Timestamp::new(100, 500_000_000)),
            Timestamp::new(101, 0),
        );

        assert_eq!(
            delivery,
            Delivery::Recorded(Estimate {
                offset: 0.0,
                round_trip_delay: 1.0
            })
        );
        assert_eq!(session.received(), 1);
        assert!(!session.is_complete());
    }

    #[test]
    fn test_duplicate_echo_is_idempotent() {
        let mut session = Session::new(1, Encoding::WordAligned);
        session.record_probe(1, Timestamp::new(100, 0));
        let echo = echo_bytes(1, Encoding::WordAligned, Timestamp::new(100, 500_000_000));

        session.deliver(&echo, Timestamp::new(101, 0));
        let first = session.entries().next().unwrap().1.estimate;

        assert_eq!(
            session.deliver(&echo, Timestamp::new(105, 0)),
            Delivery::Duplicate
        );
        assert_eq!(session.entries().next().unwrap().1.estimate, first);
        assert_eq!(session.received(), 1);
    }

    #[test]
    fn test_out_of_range_sequences_never_counted() {
        let mut session = Session::new(3, Encoding::WordAligned);
        for sequence in [0, 4, u32::MAX] {
            let delivery = session.deliver(
                &echo_bytes(sequence, Encoding::WordAligned, Timestamp::default()),
                Timestamp::now(),
            );
            assert!(matches!(
                delivery,
                Delivery::Discarded(ProtocolError::SequenceOutOfRange { .. })
            ));
        }
        assert_eq!(session.received(), 0);
        assert!(session.entries().all(|(_, entry)| !entry.received()));
    }

    #[test]
    fn test_malformed_datagrams_discarded() {
        let mut session = Session::new(1, Encoding::WordAligned);
        // Compact echo is shorter than a word-aligned one
        let compact = echo_bytes(1, Encoding::Compact, Timestamp::default());
        assert!(matches!(
            session.deliver(&compact, Timestamp::now()),
            Delivery::Discarded(ProtocolError::Truncated { .. })
        ));
        assert_eq!(session.received(), 0);
    }

    #[test]
    fn test_run_session_collects_out_of_order() -> Result<()> {
        let server = Timestamp::now();
        let mut transport = scripted_transport(vec![
            echo_bytes(3, Encoding::WordAligned, server),
            echo_bytes(1, Encoding::WordAligned, server),
            echo_bytes(2, Encoding::WordAligned, server),
        ]);

        let session = run_session(&mut transport, &config(3, None), &ProgressTracker::hidden())?;

        assert!(session.is_complete());
        let sequences: Vec<u32> = session.entries().map(|(seq, _)| seq).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_run_session_sends_every_probe() -> Result<()> {
        let mut transport = MockProbeTransport::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sent);
        transport.expect_send().times(4).returning(move |datagram| {
            log.lock().unwrap().push(Probe::decode(datagram, Encoding::WordAligned).unwrap());
            Ok(datagram.len())
        });
        transport
            .expect_recv_timeout()
            .returning(|_: &mut [u8], timeout: Option<Duration>| {
                thread::sleep(timeout.unwrap());
                Ok(None)
            });

        run_session(
            &mut transport,
            &config(4, Some(Duration::from_millis(20))),
            &ProgressTracker::hidden(),
        )?;

        let sequences: Vec<u32> = sent.lock().unwrap().iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_run_session_idle_timeout_leaves_missing_entries() -> Result<()> {
        let server = Timestamp::now();
        let mut transport = scripted_transport(vec![
            echo_bytes(2, Encoding::WordAligned, server),
            echo_bytes(2, Encoding::WordAligned, server),
            vec![0u8; 5],
        ]);

        let started = Instant::now();
        let session = run_session(
            &mut transport,
            &config(3, Some(Duration::from_millis(50))),
            &ProgressTracker::hidden(),
        )?;

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(session.received(), 1);
        let received: Vec<bool> = session.entries().map(|(_, e)| e.received()).collect();
        assert_eq!(received, vec![false, true, false]);
        Ok(())
    }

    #[test]
    fn test_malformed_stream_does_not_extend_idle_deadline() -> Result<()> {
        let mut transport = MockProbeTransport::new();
        transport.expect_send().returning(|datagram| Ok(datagram.len()));

        // One valid echo, then a malformed datagram every 10ms for about 1s
        let calls = Arc::new(Mutex::new(0u32));
        let server = Timestamp::now();
        transport
            .expect_recv_timeout()
            .returning(move |buf: &mut [u8], timeout: Option<Duration>| {
                let timeout = timeout.expect("test waits must be bounded");
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    let reply = echo_bytes(1, Encoding::WordAligned, server);
                    buf[..reply.len()].copy_from_slice(&reply);
                    return Ok(Some(reply.len()));
                }
                if *calls <= 100 {
                    thread::sleep(timeout.min(Duration::from_millis(10)));
                    buf[..5].copy_from_slice(&[0u8; 5]);
                    return Ok(Some(5));
                }
                thread::sleep(timeout);
                Ok(None)
            });

        let started = Instant::now();
        let session = run_session(
            &mut transport,
            &config(2, Some(Duration::from_millis(100))),
            &ProgressTracker::hidden(),
        )?;
        let elapsed = started.elapsed();

        assert_eq!(session.received(), 1);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(
            elapsed < Duration::from_millis(500),
            "session ran {:?} with a 100ms idle timeout",
            elapsed
        );
        Ok(())
    }

    #[test]
    fn test_run_session_times_out_with_nothing_received() -> Result<()> {
        let mut transport = scripted_transport(Vec::new());
        let session = run_session(
            &mut transport,
            &config(2, Some(Duration::from_millis(30))),
            &ProgressTracker::hidden(),
        )?;
        assert_eq!(session.received(), 0);
        Ok(())
    }

    #[test]
    fn test_run_session_propagates_fatal_errors() {
        let mut transport = MockProbeTransport::new();
        transport.expect_send().returning(|datagram| Ok(datagram.len()));
        transport.expect_recv_timeout().times(1).returning(|_, _| {
            Err(ClientError::Io(std::io::Error::from(ErrorKind::PermissionDenied)))
        });

        let result = run_session(&mut transport, &config(1, None), &ProgressTracker::hidden());
        assert!(result.is_err());
    }
}
