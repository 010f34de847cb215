//! Per-sender sequence tracking for reordering detection.
//!
//! A fixed number of slots, each bound to one `(address, port)` pair and
//! found by linear scan. A sender that cannot get a slot is still answered
//! by the dispatch loop, only without tracking.

use std::fmt;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Slots available before new senders go untracked
pub const DEFAULT_CAPACITY: usize = 256;

/// Inactivity after which a sender's sequence state is forgotten
pub const EXPIRY_WINDOW: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderSlot {
    pub peer: SocketAddrV4,
    pub max_sequence: u32,
    pub last_activity: Instant,
}

impl SenderSlot {
    fn new(peer: SocketAddrV4, now: Instant) -> Self {
        Self {
            peer,
            max_sequence: 0,
            last_activity: now,
        }
    }

    fn is_expired(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > expiry
    }
}

/// A probe arrived with a lower sequence than already seen from its sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderEvent {
    pub peer: SocketAddrV4,
    pub sequence: u32,
    pub max_sequence: u32,
}

/// Renders as `ip:port seq max_seq`
impl fmt::Display for ReorderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {}",
            self.peer.ip(),
            self.peer.port(),
            self.sequence,
            self.max_sequence
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Table full, sender has no slot
    Untracked,
    InOrder,
    Reordered(ReorderEvent),
}

#[derive(Debug)]
pub struct SenderTable {
    slots: Vec<Option<SenderSlot>>,
    expiry: Duration,
}

impl SenderTable {
    pub fn new(capacity: usize) -> Self {
        Self::with_expiry(capacity, EXPIRY_WINDOW)
    }

    pub fn with_expiry(capacity: usize, expiry: Duration) -> Self {
        Self {
            slots: vec![None; capacity],
            expiry,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn get(&self, peer: SocketAddrV4) -> Option<&SenderSlot> {
        self.slots.iter().flatten().find(|slot| slot.peer == peer)
    }

    /// Finds or claims the slot for `peer`. An expired slot has its
    /// sequence state cleared before being returned.
    pub fn resolve(&mut self, peer: SocketAddrV4, now: Instant) -> Option<&mut SenderSlot> {
        let index = match self.position(peer) {
            Some(index) => index,
            None => {
                let free = self.slots.iter().position(Option::is_none)?;
                self.slots[free] = Some(SenderSlot::new(peer, now));
                debug!(peer = %peer, slot = free, "Tracking new sender");
                free
            }
        };

        let slot = self.slots[index].as_mut()?;
        if slot.is_expired(now, self.expiry) {
            trace!(peer = %peer, "Sender state expired");
            slot.max_sequence = 0;
        }
        Some(slot)
    }

    /// Records `sequence` from `peer` and reports whether it arrived out of order.
    ///
    /// Detection is passive: the caller answers the probe either way.
    pub fn observe(&mut self, peer: SocketAddrV4, sequence: u32, now: Instant) -> Observation {
        let Some(slot) = self.resolve(peer, now) else {
            trace!(peer = %peer, "Sender table full, probe untracked");
            return Observation::Untracked;
        };

        let observation = if slot.max_sequence != 0 && sequence < slot.max_sequence {
            Observation::Reordered(ReorderEvent {
                peer,
                sequence,
                max_sequence: slot.max_sequence,
            })
        } else {
            Observation::InOrder
        };

        if sequence > slot.max_sequence {
            slot.max_sequence = sequence;
            slot.last_activity = now;
        }
        observation
    }

    fn position(&self, peer: SocketAddrV4) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(slot) if slot.peer == peer))
    }
}

impl Default for SenderTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
