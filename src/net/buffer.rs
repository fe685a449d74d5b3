//! The store-and-forward buffer.
//!
//! Packets that currently have no worthwhile next hop wait here. The buffer is a byte-accounted
//! LIFO with drop-oldest overflow: pushes go on top, and when space runs out, entries are evicted
//! from the bottom until the newcomer fits. In a DTN the newest traffic is the most likely to
//! still be topical — the oldest buffered packet has already waited through every topology update
//! without finding a route, and is the least valuable to preserve.

use alloc::collections::VecDeque;

use crate::net::packet::{Packet, PACKET_HEADER_SIZE};

/// Capacity of the store-and-forward buffer in accounted bytes.
pub const NETWORK_BUFF_SIZE: usize = 1_000_000;

/// Accounted overhead per buffered entry, standing in for the bookkeeping that used to be a list
/// node.
const ENTRY_OVERHEAD: usize = 32;

/// Byte-accounted LIFO of packets awaiting a route.
pub struct PacketBuffer {
    /// Bottom (oldest) at the front, top at the back.
    entries: VecDeque<Packet>,
    free_bytes: usize,
    capacity: usize,
}

impl PacketBuffer {
    /// Creates a buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(NETWORK_BUFF_SIZE)
    }

    /// Creates a buffer with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        PacketBuffer {
            entries: VecDeque::new(),
            free_bytes: capacity,
            capacity,
        }
    }

    fn cost(packet: &Packet) -> usize {
        ENTRY_OVERHEAD + PACKET_HEADER_SIZE + packet.payload.len()
    }

    /// Pushes `packet` on top, evicting from the bottom until it fits.
    ///
    /// A packet too large for the whole buffer is dropped.
    pub fn push(&mut self, packet: Packet) {
        let cost = Self::cost(&packet);
        if cost > self.capacity {
            warn!("net: packet for {} outsizes the buffer, dropped", packet.dest);
            return;
        }
        while self.free_bytes < cost {
            match self.entries.pop_front() {
                Some(evicted) => {
                    self.free_bytes += Self::cost(&evicted);
                    debug!("net: shedding oldest packet (for {})", evicted.dest);
                }
                None => break,
            }
        }
        self.free_bytes -= cost;
        self.entries.push_back(packet);
    }

    /// Removes and returns the most recently pushed packet.
    pub fn pop(&mut self) -> Option<Packet> {
        let packet = self.entries.pop_back()?;
        self.free_bytes += Self::cost(&packet);
        Some(packet)
    }

    /// Unaccounted bytes remaining.
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Number of buffered packets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
