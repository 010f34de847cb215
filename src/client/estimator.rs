//! Clock-offset and round-trip delay estimation from a single echo

use crate::protocol::Timestamp;

/// Offset and delay derived from one probe/echo exchange, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Estimated server clock minus client clock
    pub offset: f64,
    /// Client-side elapsed time from send to receipt, not halved
    pub round_trip_delay: f64,
}

/// Estimates offset and delay from client send time `t0`, server processing
/// time `t1` and client receive time `t2`, all in fractional seconds.
///
/// Assumes symmetric path delay; with one server timestamp there is no
/// separate server receive/transmit split to correct for.
pub fn estimate_secs(t0: f64, t1: f64, t2: f64) -> Estimate {
    Estimate {
        offset: ((t1 - t0) + (t1 - t2)) / 2.0,
        round_trip_delay: t2 - t0,
    }
}

pub fn estimate(sent: Timestamp, server: Timestamp, received: Timestamp) -> Estimate {
    estimate_secs(
        sent.as_secs_f64(),
        server.as_secs_f64(),
        received.as_secs_f64(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_exchange() {
        let e = estimate_secs(100.0, 100.5, 101.0);
        assert_eq!(e.offset, 0.0);
        assert_eq!(e.round_trip_delay, 1.0);
    }

    #[test]
    fn test_server_ahead() {
        let e = estimate(
            Timestamp::new(100, 0),
            Timestamp::new(110, 250_000_000),
            Timestamp::new(100, 500_000_000),
        );
        assert_eq!(e.offset, 10.0);
        assert_eq!(e.round_trip_delay, 0.5);
    }

    #[test]
    fn test_server_behind() {
        let e = estimate_secs(50.0, 45.0, 52.0);
        assert_eq!(e.offset, -6.0);
        assert_eq!(e.round_trip_delay, 2.0);
    }

    #[test]
    fn test_reproducible() {
        let sent = Timestamp::new(1_700_000_000, 123_456_789);
        let server = Timestamp::new(1_700_000_000, 223_456_789);
        let received = Timestamp::new(1_700_000_000, 323_456_789);
        assert_eq!(
            estimate(sent, server, received),
            estimate(sent, server, received)
        );
    }
}
