//! A store-and-forward protocol stack for delay-tolerant wireless meshes.
//!
//! In a delay-tolerant network (DTN) there is no guarantee that a route to a destination exists at
//! the moment a message is sent. Nodes are mobile, share one lossy wireless channel, and may be
//! partitioned from each other for long stretches of time. Instead of dropping traffic it cannot
//! route, a node carries it and hands it on whenever a neighbour turns up that brings it closer to
//! its destination.
//!
//! This crate implements the four layers that make up one node of such a mesh:
//!
//! * [`link`] — medium access: CSMA/CA with binary exponential backoff and an RTS/CTS/DATA/ACK
//!   handshake for unicast traffic.
//! * [`oracle`] — a geographic topology estimate fed by periodic position beacons, answering
//!   best-next-hop queries for the network layer.
//! * [`net`] — opportunistic forwarding with a byte-accounted store-and-forward buffer and
//!   drop-oldest load shedding.
//! * [`transport`] — fragmentation, checksumming, and reassembly of application messages.
//!
//! # Using the stack
//!
//! The crate is runtime- and hardware-agnostic: it is driven entirely by the host environment
//! (typically a discrete-event wireless simulator), which must provide a handful of services by
//! implementing the traits collected in [`config::Config`]:
//!
//! * a microsecond-resolution monotonic [`Clock`],
//! * a [`Radio`] that transmits encoded frames and senses the carrier,
//! * a [`TimerService`] with cancellable one-shot timers,
//! * a random number source implementing [`RngCore`],
//! * a [`PositionSource`] reporting the node's own map position,
//! * an [`Application`] consuming reassembled messages.
//!
//! [`node::DtnNode`] wires the layers together and exposes one entry point per host event:
//! timer expiry, frame arrival, collision, and application send.
//!
//! [`Clock`]: time/trait.Clock.html
//! [`Radio`]: phy/trait.Radio.html
//! [`TimerService`]: timer/trait.TimerService.html
//! [`RngCore`]: https://docs.rs/rand_core
//! [`PositionSource`]: geo/trait.PositionSource.html
//! [`Application`]: config/trait.Application.html

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod log;
#[macro_use]
mod utils;
pub mod addr;
pub mod bytes;
pub mod config;
mod crc;
mod error;
pub mod geo;
pub mod link;
pub mod net;
pub mod node;
pub mod oracle;
pub mod phy;
pub mod time;
pub mod timer;
pub mod transport;

pub use self::addr::NodeAddr;
pub use self::error::Error;
pub use self::node::DtnNode;
