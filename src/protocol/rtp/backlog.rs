//! Resend backlog: the most recently transmitted audio datagrams

use std::collections::VecDeque;

use bytes::Bytes;

/// One stored datagram, exactly as it went out on the audio socket
#[derive(Debug, Clone)]
pub struct BacklogSlot {
    /// Sequence number of the packet
    pub sequence: u16,
    /// RTP timestamp of the packet
    pub timestamp: u32,
    /// Complete wire datagram, header included
    pub datagram: Bytes,
}

/// Bounded FIFO of transmitted packets keyed by sequence number.
///
/// At the default capacity of 1000 this holds about 8 seconds of audio,
/// which bounds the useful resend window.
#[derive(Debug)]
pub struct PacketBacklog {
    capacity: usize,
    slots: VecDeque<BacklogSlot>,
}

impl PacketBacklog {
    /// Create a backlog holding at most `capacity` packets
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    /// Store a transmitted datagram, evicting the oldest when full
    pub fn store(&mut self, sequence: u16, timestamp: u32, datagram: Bytes) {
        if self.slots.len() >= self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(BacklogSlot {
            sequence,
            timestamp,
            datagram,
        });
    }

    /// Look up a stored datagram by sequence number
    #[must_use]
    pub fn fetch(&self, sequence: u16) -> Option<&BacklogSlot> {
        // Newest packets are the likeliest resend targets
        self.slots.iter().rev().find(|s| s.sequence == sequence)
    }

    /// Drop all stored packets
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of stored packets
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the backlog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Oldest and newest stored sequence numbers
    #[must_use]
    pub fn sequence_span(&self) -> Option<(u16, u16)> {
        Some((self.slots.front()?.sequence, self.slots.back()?.sequence))
    }
}
