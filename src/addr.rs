//! Node addressing.

use core::fmt;

/// Address of a node in the mesh.
///
/// Addresses are small integers assigned by the host environment (the simulator's node number).
/// They are encoded as little-endian `i32` in every PDU that carries one.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddr(pub i32);

impl NodeAddr {
    /// The destination of link-layer broadcasts.
    ///
    /// Only beacon frames may be addressed to this sentinel; they are picked up by every station
    /// in range.
    pub const BROADCAST: Self = NodeAddr(-1);

    /// Returns whether this is the broadcast sentinel.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            f.write_str("NodeAddr(*)")
        } else {
            write!(f, "NodeAddr({})", self.0)
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            f.write_str("*")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
