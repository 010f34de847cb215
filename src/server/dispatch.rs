//! Server dispatch loop: decode each probe, simulate loss, track the sender
//! and answer with a timestamped echo.

use crate::protocol::{Echo, Encoding, Probe, ProtocolError, Timestamp, MAX_DATAGRAM_SIZE};
use crate::server::config::ServerConfig;
use crate::server::error::{Result, ServerError};
use crate::server::monitor::{ServerCounters, ServerMonitor};
use crate::server::tracker::{Observation, ReorderEvent, SenderTable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of handling one datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Malformed(ProtocolError),
    /// Discarded by loss simulation; no reply, no tracking
    Dropped,
    Reply {
        echo: Echo,
        reorder: Option<ReorderEvent>,
    },
}

/// Everything the dispatch loop owns: encoding, loss simulation, sender table
pub struct Dispatcher<R: Rng> {
    encoding: Encoding,
    drop_rate: u8,
    rng: R,
    senders: SenderTable,
    monitor: ServerMonitor,
}

impl Dispatcher<StdRng> {
    /// Builds the dispatcher for a validated config, seeding the RNG once
    pub fn from_config(config: &ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Dispatcher::new(config.encoding(), config.drop_rate, rng)
    }
}

impl<R: Rng> Dispatcher<R> {
    pub fn new(encoding: Encoding, drop_rate: u8, rng: R) -> Self {
        Self {
            encoding,
            drop_rate: drop_rate.min(100),
            rng,
            senders: SenderTable::default(),
            monitor: ServerMonitor::default(),
        }
    }

    /// Replaces the sender table, e.g. with a smaller capacity
    pub fn with_senders(mut self, senders: SenderTable) -> Self {
        self.senders = senders;
        self
    }

    pub fn senders(&self) -> &SenderTable {
        &self.senders
    }

    pub fn counters(&self) -> ServerCounters {
        self.monitor.counters()
    }

    /// Handles one datagram from `from`, observed at `now`.
    pub fn handle(&mut self, datagram: &[u8], from: SocketAddr, now: Instant) -> Disposition {
        self.monitor.increment_received();

        let probe = match Probe::decode(datagram, self.encoding) {
            Ok(probe) => probe,
            Err(e) => {
                debug!(peer = %from, error = %e, "Malformed probe discarded");
                self.monitor.increment_malformed();
                return Disposition::Malformed(e);
            }
        };

        if self.should_drop() {
            debug!(peer = %from, sequence = probe.sequence, "Probe dropped by loss simulation");
            self.monitor.increment_dropped();
            return Disposition::Dropped;
        }

        let observation = match from {
            SocketAddr::V4(peer) => self.senders.observe(peer, probe.sequence, now),
            SocketAddr::V6(_) => Observation::Untracked,
        };
        let reorder = match observation {
            Observation::Reordered(event) => {
                self.monitor.increment_reordered();
                Some(event)
            }
            Observation::Untracked => {
                self.monitor.increment_untracked();
                None
            }
            Observation::InOrder => None,
        };

        Disposition::Reply {
            echo: Echo::new(probe, Timestamp::now()),
            reorder,
        }
    }

    /// Serves `socket` until a fatal socket error.
    ///
    /// Reordering events are written to stdout, one line each, flushed.
    pub fn run(&mut self, socket: &UdpSocket) -> Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::ConnectionReset
                    ) =>
                {
                    debug!(error = %e, "Transient receive error");
                    continue;
                }
                Err(e) => {
                    self.monitor.log_summary();
                    return Err(ServerError::Io(e));
                }
            };

            let Disposition::Reply { echo, reorder } = self.handle(&buf[..len], from, Instant::now())
            else {
                continue;
            };

            if let Some(event) = reorder {
                if let Err(e) = write_reorder(&event, &mut io::stdout().lock()) {
                    warn!(error = %e, "Failed to write reordering event");
                }
            }

            match socket.send_to(&echo.encode(self.encoding), from) {
                Ok(_) => self.monitor.increment_echoed(),
                Err(e) => {
                    warn!(peer = %from, error = %e, "Failed to send echo");
                    self.monitor.increment_send_error();
                }
            }
        }
    }

    fn should_drop(&mut self) -> bool {
        self.rng.gen_range(0..100u8) < self.drop_rate
    }
}

/// Binds the server socket, reporting an occupied port distinctly
pub fn bind_socket(addr: &str) -> Result<UdpSocket> {
    debug!(addr = addr, "Binding UDP socket");
    UdpSocket::bind(addr).map_err(|e| {
        warn!(error = %e, "Failed to bind socket");
        if e.kind() == ErrorKind::AddrInUse {
            ServerError::Socket(format!(
                "Failed to bind to {}: Address already in use. Try a different port or ensure no other process is using it.",
                addr
            ))
        } else {
            ServerError::Socket(format!("Failed to bind to {}: {}", addr, e))
        }
    })
}

/// Writes one `ip:port seq max_seq` line and flushes so watchers see it at once
pub fn write_reorder<W: Write>(event: &ReorderEvent, out: &mut W) -> io::Result<()> {
    debug!(
        peer = %event.peer,
        sequence = event.sequence,
        max_sequence = event.max_sequence,
        "Reordering detected"
    );
    writeln!(out, "{}", event)?;
    out.flush()
}
