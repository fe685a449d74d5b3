//! Transport layer: fragmentation and reassembly.
//!
//! Application messages can be far larger than what fits a single packet, so the transport layer
//! cuts them into datagrams of at most [`MAX_FRAGMENT_SIZE`] payload bytes, checksums each one,
//! and hands them to the network layer individually. The receiving side verifies, collects, and
//! reassembles — and only a complete, fully verified message ever reaches the application.
//!
//! There is no end-to-end acknowledgement and no retransmission: a message missing even one
//! fragment is eventually evicted and silently lost. Best effort is the contract.

pub mod datagram;
pub mod reassembly;

pub use self::datagram::{Datagram, DATAGRAM_HEADER_SIZE, MAX_FRAGMENT_SIZE};
pub use self::reassembly::{ReassemblyTable, TRANSPORT_BUFF_SIZE};

use crate::addr::NodeAddr;
use crate::config::Application;
use crate::geo::Point;
use crate::link::LinkLayer;
use crate::net::NetworkLayer;
use crate::oracle::Oracle;
use crate::time::Instant;
use crate::Error;

/// The transport layer of one node.
pub struct Transport {
    addr: NodeAddr,
    next_msg_num: i32,
    reassembly: ReassemblyTable,
}

impl Transport {
    /// Creates a transport layer for the node with address `addr`.
    pub fn new(addr: NodeAddr) -> Self {
        Transport {
            addr,
            next_msg_num: 0,
            reassembly: ReassemblyTable::new(),
        }
    }

    /// Fragments `message` and sends the datagrams towards `dest`.
    ///
    /// An empty message still produces one (empty) fragment, so that even zero-length sends
    /// surface at the receiver.
    pub fn send(
        &mut self,
        message: &[u8],
        dest: NodeAddr,
        network: &mut NetworkLayer,
        link: &mut LinkLayer,
        oracle: &Oracle,
        now: Instant,
        here: Point,
    ) -> Result<(), Error> {
        let nfrags = if message.is_empty() {
            1
        } else {
            (message.len() + MAX_FRAGMENT_SIZE - 1) / MAX_FRAGMENT_SIZE
        };
        let msg_num = self.next_msg_num;
        self.next_msg_num = self.next_msg_num.wrapping_add(1);

        debug!(
            "transport: message {} to {}: {} bytes in {} fragments",
            msg_num,
            dest,
            message.len(),
            nfrags
        );

        for i in 0..nfrags {
            let fragment = if message.is_empty() {
                &[][..]
            } else {
                let start = i * MAX_FRAGMENT_SIZE;
                let end = (start + MAX_FRAGMENT_SIZE).min(message.len());
                &message[start..end]
            };
            let datagram = Datagram {
                source: self.addr,
                msg_num,
                frag_num: i as i32,
                frag_count: nfrags as i32,
                payload: fragment.to_vec(),
            };
            network.send(&datagram.encode(), dest, link, oracle, now, here)?;
        }
        Ok(())
    }

    /// Handles a packet payload that arrived for this node.
    ///
    /// Single-fragment messages are delivered on the spot; everything else goes through the
    /// reassembly table. Corrupt or malformed datagrams are dropped silently.
    pub fn recv<A: Application>(&mut self, payload: &[u8], app: &mut A) {
        let datagram = match Datagram::decode(payload) {
            Ok(datagram) => datagram,
            Err(e) => {
                trace!("transport: dropping datagram: {}", e);
                return;
            }
        };

        if datagram.frag_count == 1 {
            app.deliver(datagram.source, &datagram.payload);
            return;
        }

        if let Some((source, message)) = self.reassembly.insert(datagram) {
            debug!(
                "transport: message from {} complete, {} bytes",
                source,
                message.len()
            );
            app.deliver(source, &message);
        }
    }
}
