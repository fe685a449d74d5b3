//! Per-message fragment buffers.
//!
//! Fragments of the same message can arrive far apart in time (and, over multiple paths, out of
//! order), so each in-progress message owns a slot array sized to its fragment count, keyed by
//! `(source, msg_num)`. A companion insertion-order queue drives eviction: when a new message
//! does not fit the byte budget, the entries that have been waiting longest go first — a message
//! that old is unlikely to ever complete.
//!
//! Completion is judged by counting *occupied slots*, not received datagrams, so a duplicated
//! fragment can neither finish a message early nor make it overshoot.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;

use crate::addr::NodeAddr;
use crate::transport::datagram::{Datagram, MAX_FRAGMENT_SIZE};

/// Capacity of the reassembly table in accounted bytes.
pub const TRANSPORT_BUFF_SIZE: usize = 1_000_000;

/// Accounted overhead per in-progress message.
const ENTRY_OVERHEAD: usize = 64;

type MessageKey = (NodeAddr, i32);

struct Entry {
    /// Slot per fragment, indexed by fragment number.
    slots: Vec<Option<Vec<u8>>>,
    /// How many slots are occupied.
    filled: usize,
    /// Accounted bytes, fixed at creation.
    cost: usize,
}

/// Keyed fragment store with insertion-order eviction.
pub struct ReassemblyTable {
    entries: BTreeMap<MessageKey, Entry>,
    /// Keys in insertion order; front is evicted first.
    order: VecDeque<MessageKey>,
    free_bytes: usize,
    capacity: usize,
}

impl ReassemblyTable {
    /// Creates a table with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(TRANSPORT_BUFF_SIZE)
    }

    /// Creates a table with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        ReassemblyTable {
            entries: BTreeMap::new(),
            order: VecDeque::new(),
            free_bytes: capacity,
            capacity,
        }
    }

    /// Files `datagram` under its message; returns the reassembled message once the last missing
    /// fragment arrived.
    ///
    /// The caller has already verified the datagram. Fragments of a message whose advertised
    /// fragment count disagrees with the existing entry are dropped, as are fragments of messages
    /// too large for the whole table.
    pub fn insert(&mut self, datagram: Datagram) -> Option<(NodeAddr, Vec<u8>)> {
        let key = (datagram.source, datagram.msg_num);
        let frag_count = datagram.frag_count as usize;

        if !self.entries.contains_key(&key) {
            // Entries are accounted at their worst case up front; a message can then never
            // outgrow the budget halfway through reassembly.
            let cost = ENTRY_OVERHEAD + frag_count * MAX_FRAGMENT_SIZE;
            if cost > self.capacity {
                warn!(
                    "transport: message {}/{} outsizes the reassembly table, dropped",
                    datagram.source, datagram.msg_num
                );
                return None;
            }
            while self.free_bytes < cost {
                match self.order.pop_front() {
                    Some(old) => {
                        if let Some(entry) = self.entries.remove(&old) {
                            self.free_bytes += entry.cost;
                            debug!(
                                "transport: evicting stale message {}/{} ({}/{} fragments)",
                                old.0,
                                old.1,
                                entry.filled,
                                entry.slots.len()
                            );
                        }
                    }
                    None => break,
                }
            }
            self.free_bytes -= cost;
            self.entries.insert(
                key,
                Entry {
                    slots: vec![None; frag_count],
                    filled: 0,
                    cost,
                },
            );
            self.order.push_back(key);
        }

        let complete = {
            let entry = self.entries.get_mut(&key)?;
            if entry.slots.len() != frag_count {
                trace!(
                    "transport: fragment count mismatch for {}/{}, dropping fragment",
                    key.0,
                    key.1
                );
                return None;
            }
            let slot = &mut entry.slots[datagram.frag_num as usize];
            if slot.is_none() {
                entry.filled += 1;
            }
            *slot = Some(datagram.payload);
            entry.filled == entry.slots.len()
        };

        if !complete {
            return None;
        }

        let entry = self.entries.remove(&key)?;
        self.order.retain(|k| *k != key);
        self.free_bytes += entry.cost;

        let mut message = Vec::new();
        for slot in entry.slots {
            if let Some(fragment) = slot {
                message.extend_from_slice(&fragment);
            }
        }
        Some((key.0, message))
    }

    /// Unaccounted bytes remaining.
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Number of messages currently in reassembly.
    pub fn in_progress(&self) -> usize {
        self.entries.len()
    }
}
