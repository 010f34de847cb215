use crate::client::error::{ClientError, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

/// Datagram transport used by the session engine
pub trait ProbeTransport {
    /// Send one datagram to the server
    fn send(&self, datagram: &[u8]) -> Result<usize>;

    /// Wait up to `timeout` for one datagram (`None` waits indefinitely).
    ///
    /// Returns `Ok(None)` when the wait elapses with nothing received.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>>;
}

/// UDP-based implementation of ProbeTransport
#[derive(Debug)]
pub struct UdpProbeSocket {
    socket: UdpSocket,
}

impl UdpProbeSocket {
    /// Bind to a local address
    pub fn bind(addr: &str) -> Result<Self> {
        debug!(addr = addr, "Binding UDP socket");
        let socket = UdpSocket::bind(addr).map_err(|e| {
            warn!(error = %e, "Failed to bind socket");
            ClientError::Socket(format!("Failed to bind to {}: {}", addr, e))
        })?;
        debug!("Socket bound successfully");
        Ok(Self { socket })
    }

    /// Connect to the server so only its datagrams are received
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        debug!(addr = %addr, "Connecting UDP socket");
        self.socket.connect(addr).map_err(|e| {
            warn!(error = %e, "Failed to connect socket");
            ClientError::Socket(format!("Failed to connect to {}: {}", addr, e))
        })?;
        debug!("Socket connected successfully");
        Ok(())
    }
}

impl ProbeTransport for UdpProbeSocket {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        let bytes_sent = self.socket.send(datagram).map_err(|e| {
            warn!(error = %e, "Failed to send datagram");
            ClientError::Io(e)
        })?;
        Ok(bytes_sent)
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>> {
        // A zero read timeout is rejected by the OS; treat it as already elapsed
        if timeout == Some(Duration::ZERO) {
            return Ok(None);
        }
        self.socket.set_read_timeout(timeout).map_err(|e| {
            warn!(error = %e, "Failed to set timeout");
            ClientError::Socket(format!("Failed to set timeout: {}", e))
        })?;

        match self.socket.recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                debug!("Receive wait elapsed");
                Ok(None)
            }
            Err(e) => Err(ClientError::Io(e)),
        }
    }
}


#[cfg(test)]
pub use tests::MockProbeTransport;
