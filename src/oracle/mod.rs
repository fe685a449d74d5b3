//! The oracle: a geographic topology estimate and the routing decisions built on it.
//!
//! Every node broadcasts a beacon on a fixed period, carrying its own position and everything it
//! has heard about everyone else. Listening to those beacons yields an address-sorted table of
//! [`NodeLocation`]s — a rumour mill, not a routing table: entries may be stale, relayed third
//! hand, or describe nodes that left the map long ago. Two rules keep it honest:
//!
//! * A position is only overwritten by a report with a *strictly newer* timestamp from the same
//!   observer chain, so stale gossip never clobbers fresh knowledge.
//! * Only neighbours heard *directly* within [`ORACLE_WAIT`] count as live, and only live
//!   neighbours are ever picked as next hops.
//!
//! The best-hop query is deliberately first-improving rather than best: the table scan stops at
//! the first live neighbour that is meaningfully closer to the destination than we are. Picking
//! the true minimum would scan the whole table on every packet for little routing gain.

pub mod beacon;

pub use self::beacon::{BeaconPdu, NodeLocation, MAX_BEACON_LOCATIONS};

use alloc::vec::Vec;

use crate::addr::NodeAddr;
use crate::geo::{improves, Point};
use crate::link::LinkLayer;
use crate::time::{Duration, Instant};

/// Period of the beacon broadcast.
pub const ORACLE_INTERVAL: Duration = Duration::from_micros(3_000_000);

/// How long a directly heard neighbour stays live after its last beacon.
pub const ORACLE_WAIT: Duration = Duration::from_micros(2 * 3_000_000);

/// Minimum improvement, in map units, a neighbour must offer over our own distance to the
/// destination before it is worth a transmission.
pub const MIN_DIST: i32 = 2;

/// What the oracle knows about one other node.
struct Neighbour {
    loc: NodeLocation,
    /// Free public buffer bytes the node advertised in its last direct beacon.
    free_buffer: u32,
    /// Local time of the last beacon heard directly from this node, `None` if we only know it
    /// from gossip.
    last_direct: Option<Instant>,
}

impl Neighbour {
    fn is_live(&self, now: Instant) -> bool {
        match self.last_direct {
            Some(at) => now.duration_since(at) <= ORACLE_WAIT,
            None => false,
        }
    }
}

/// The topology oracle of one node.
pub struct Oracle {
    addr: NodeAddr,
    /// Sorted by address for binary-search lookup.
    table: Vec<Neighbour>,
}

impl Oracle {
    /// Creates an oracle for the node with address `addr`.
    pub fn new(addr: NodeAddr) -> Self {
        Oracle {
            addr,
            table: Vec::new(),
        }
    }

    fn lookup(&self, addr: NodeAddr) -> Result<usize, usize> {
        self.table.binary_search_by_key(&addr, |n| n.loc.addr)
    }

    /// Inserts a gossiped location, or updates the stored one when the report is strictly newer.
    fn save_position(&mut self, loc: NodeLocation) {
        match self.lookup(loc.addr) {
            Ok(i) => {
                let stored = &mut self.table[i];
                if loc.timestamp > stored.loc.timestamp {
                    stored.loc.pos = loc.pos;
                    stored.loc.timestamp = loc.timestamp;
                }
            }
            Err(i) => {
                self.table.insert(
                    i,
                    Neighbour {
                        loc,
                        free_buffer: 0,
                        last_direct: None,
                    },
                );
            }
        }
    }

    /// Processes a received beacon payload.
    ///
    /// Returns `true` when the beacon was valid and the topology estimate changed; the caller
    /// then gives buffered packets another chance to leave.
    pub fn ingest(&mut self, payload: &[u8], now: Instant) -> bool {
        let pdu = match BeaconPdu::decode(payload) {
            Ok(pdu) => pdu,
            Err(e) => {
                trace!("oracle: dropping beacon: {}", e);
                return false;
            }
        };
        if pdu.sender.addr == self.addr {
            return false;
        }

        for loc in &pdu.locations {
            if loc.addr != self.addr {
                self.save_position(*loc);
            }
        }

        // The sender's word about itself is always the freshest there is.
        let i = match self.lookup(pdu.sender.addr) {
            Ok(i) => {
                self.table[i].loc = pdu.sender;
                i
            }
            Err(i) => {
                self.table.insert(
                    i,
                    Neighbour {
                        loc: pdu.sender,
                        free_buffer: 0,
                        last_direct: None,
                    },
                );
                i
            }
        };
        self.table[i].last_direct = Some(now);
        self.table[i].free_buffer = pdu.free_buffer;

        debug!(
            "oracle: beacon from {}, {} locations, table now {} entries",
            pdu.sender.addr,
            pdu.locations.len(),
            self.table.len()
        );
        true
    }

    /// Builds and hands off this node's periodic beacon.
    ///
    /// `free_bytes` is the network layer's advertised buffer space, `here` the node's current
    /// position. When the table has outgrown a single packet, the entries that have gone longest
    /// without a direct beacon are pruned — from the table itself, keeping it bounded.
    pub fn emit_beacon(&mut self, free_bytes: u32, here: Point, now: Instant, link: &mut LinkLayer) {
        while self.table.len() > MAX_BEACON_LOCATIONS {
            self.prune_oldest();
        }

        let pdu = BeaconPdu {
            sender: NodeLocation {
                addr: self.addr,
                pos: here,
                timestamp: now.whole_secs() as u32,
            },
            free_buffer: free_bytes,
            locations: self.table.iter().map(|n| n.loc).collect(),
        };
        trace!("oracle: beaconing {} locations", pdu.locations.len());
        link.send_info(&pdu.encode());
    }

    fn prune_oldest(&mut self) {
        let mut oldest = 0;
        for (i, n) in self.table.iter().enumerate() {
            let candidate = (n.last_direct, self.table[oldest].last_direct);
            if let (Some(a), Some(b)) = candidate {
                if a < b {
                    oldest = i;
                }
            } else if candidate.0.is_none() && candidate.1.is_some() {
                oldest = i;
            }
        }
        let gone = self.table.remove(oldest);
        debug!("oracle: pruned {} from the table", gone.loc.addr);
    }

    /// Picks the `n`th-best next hop for a message of `needed_bytes` towards `dest`.
    ///
    /// Only `n == 0` is meaningful; greater ranks always answer `None`. A candidate must be live,
    /// advertise at least `needed_bytes` of buffer, and either *be* the destination or improve on
    /// our own distance to it by more than [`MIN_DIST`]. The scan settles for the first such
    /// neighbour and never returns this node itself.
    pub fn nth_best(
        &self,
        n: usize,
        dest: NodeAddr,
        needed_bytes: usize,
        now: Instant,
        here: Point,
    ) -> Option<NodeAddr> {
        if n != 0 {
            return None;
        }
        let dest_pos = self.position_of(dest)?;

        for nb in &self.table {
            if !nb.is_live(now) {
                continue;
            }
            if (nb.free_buffer as usize) < needed_bytes {
                continue;
            }
            if nb.loc.addr == self.addr {
                continue;
            }
            if nb.loc.addr == dest {
                return Some(dest);
            }
            if improves(here, nb.loc.pos, dest_pos, MIN_DIST) {
                return Some(nb.loc.addr);
            }
        }
        None
    }

    /// Last known position of `addr`, if any report about it was ever heard.
    pub fn position_of(&self, addr: NodeAddr) -> Option<Point> {
        self.lookup(addr).ok().map(|i| self.table[i].loc.pos)
    }

    /// Number of nodes the oracle has heard about.
    pub fn known_nodes(&self) -> usize {
        self.table.len()
    }
}
