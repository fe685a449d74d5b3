//! Network layer: opportunistic forwarding.
//!
//! Every packet — freshly originated or in transit — gets the same treatment: ask the oracle for
//! a neighbour worth handing it to, send it there if one exists, buffer it otherwise. Whenever
//! the oracle learns something new about the topology, the whole buffer gets another chance to
//! leave through [`NetworkLayer::flush_buffered`].
//!
//! Routing is non-flooding: a packet travels over exactly one next hop at a time, and a node
//! never forwards to a neighbour that has not advertised enough free buffer space to hold it.

pub mod buffer;
pub mod packet;

pub use self::buffer::{PacketBuffer, NETWORK_BUFF_SIZE};
pub use self::packet::{Packet, MAX_DATAGRAM_SIZE, PACKET_HEADER_SIZE};

use alloc::vec::Vec;

use crate::addr::NodeAddr;
use crate::geo::Point;
use crate::link::{LinkLayer, MAX_PACKET_SIZE};
use crate::oracle::Oracle;
use crate::time::Instant;
use crate::Error;

/// A packet that reached its destination, peeled and ready for the transport layer.
#[derive(Debug)]
pub struct Delivery {
    /// The node that originated the packet.
    pub source: NodeAddr,
    pub payload: Vec<u8>,
}

/// The network layer of one node.
pub struct NetworkLayer {
    addr: NodeAddr,
    buffer: PacketBuffer,
}

impl NetworkLayer {
    /// Creates a network layer for the node with address `addr`.
    pub fn new(addr: NodeAddr) -> Self {
        NetworkLayer {
            addr,
            buffer: PacketBuffer::new(),
        }
    }

    /// Free buffer bytes advertised to peers in this node's beacons.
    pub fn public_free_bytes(&self) -> u32 {
        self.buffer.free_bytes() as u32
    }

    /// Number of packets currently waiting for a route.
    pub fn buffered_packets(&self) -> usize {
        self.buffer.len()
    }

    /// Originates a new packet for `dest`.
    ///
    /// Fails only when the payload cannot fit a single packet.
    pub fn send(
        &mut self,
        payload: &[u8],
        dest: NodeAddr,
        link: &mut LinkLayer,
        oracle: &Oracle,
        now: Instant,
        here: Point,
    ) -> Result<(), Error> {
        if PACKET_HEADER_SIZE + payload.len() > MAX_PACKET_SIZE {
            return Err(Error::InvalidLength);
        }
        let packet = Packet::new(self.addr, dest, payload.to_vec());
        self.try_send(packet, link, oracle, now, here);
        Ok(())
    }

    /// Handles a DATA frame's payload arriving from the link layer.
    ///
    /// Packets addressed to this node are returned for the transport layer; everything else is a
    /// transit packet and gets forwarded or buffered. Malformed payloads are dropped silently.
    pub fn recv(
        &mut self,
        bytes: &[u8],
        link: &mut LinkLayer,
        oracle: &Oracle,
        now: Instant,
        here: Point,
    ) -> Option<Delivery> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("net: dropping malformed packet: {}", e);
                return None;
            }
        };

        if packet.dest == self.addr {
            return Some(Delivery {
                source: packet.source,
                payload: packet.payload,
            });
        }

        self.try_send(packet, link, oracle, now, here);
        None
    }

    /// Gives every buffered packet a fresh routing attempt.
    ///
    /// Called after each beacon updates the topology estimate. Packets are popped into a
    /// temporary stack; those still unroutable are pushed back with their relative order intact.
    pub fn flush_buffered(
        &mut self,
        link: &mut LinkLayer,
        oracle: &Oracle,
        now: Instant,
        here: Point,
    ) {
        let mut unroutable: Vec<Packet> = Vec::new();
        while let Some(packet) = self.buffer.pop() {
            match oracle.nth_best(0, packet.dest, packet.wire_size(), now, here) {
                Some(hop) => {
                    debug!("net: buffered packet for {} leaves via {}", packet.dest, hop);
                    link.send_data(&packet.encode(), hop);
                }
                None => unroutable.push(packet),
            }
        }
        for packet in unroutable.into_iter().rev() {
            self.buffer.push(packet);
        }
    }

    /// Removes and returns the newest buffered packet, bypassing routing.
    #[cfg(test)]
    pub(crate) fn pop_buffered(&mut self) -> Option<Packet> {
        self.buffer.pop()
    }

    /// Forwards `packet` to the oracle's pick, or buffers it when there is none.
    fn try_send(
        &mut self,
        packet: Packet,
        link: &mut LinkLayer,
        oracle: &Oracle,
        now: Instant,
        here: Point,
    ) {
        match oracle.nth_best(0, packet.dest, packet.wire_size(), now, here) {
            Some(hop) => {
                debug!("net: packet for {} goes via {}", packet.dest, hop);
                link.send_data(&packet.encode(), hop);
            }
            None => {
                trace!("net: no hop towards {}, buffering", packet.dest);
                self.buffer.push(packet);
            }
        }
    }
}
