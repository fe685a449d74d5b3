//! Stack configuration trait.

use crate::addr::NodeAddr;
use crate::geo::PositionSource;
use crate::phy::Radio;
use crate::time::Clock;
use crate::timer::TimerService;
use rand_core::RngCore;

/// Trait for DTN stack configurations.
///
/// This trait bundles the services a host environment supplies to the stack: the wireless channel,
/// timekeeping, timers, randomness, the node's own position, and the consumer of delivered
/// messages.
///
/// Every host must define a type implementing this trait and supply the service instances to
/// [`DtnNode::new`].
///
/// [`DtnNode::new`]: ../node/struct.DtnNode.html#method.new
pub trait Config {
    /// A monotonic time source with microsecond resolution.
    type Clock: Clock;

    /// The wireless channel interface (transmit + carrier sense).
    type Radio: Radio;

    /// Cancellable one-shot timers.
    type Timers: TimerService;

    /// Randomness for medium-access jitter, backoff draws, and the initial beacon offset.
    type Rng: RngCore;

    /// This node's (possibly moving) position on the map.
    type Position: PositionSource;

    /// Consumer of reassembled application messages.
    type App: Application;
}

/// Receives messages that completed reassembly at this node.
///
/// The stack provides best-effort delivery only: messages may never arrive, but a delivered
/// message is complete and has passed every checksum on the way.
pub trait Application {
    /// Called once per reassembled message addressed to this node.
    ///
    /// `source` is the address of the node that originated the message.
    fn deliver(&mut self, source: NodeAddr, message: &[u8]);
}
