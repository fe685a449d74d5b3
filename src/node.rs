//! Wiring of the four layers into one node.
//!
//! [`DtnNode`] owns the layer state machines and the host services, and maps the host's events
//! onto them:
//!
//! | Host event | Entry point |
//! |---|---|
//! | a timer fired | [`DtnNode::on_timer`] |
//! | a frame arrived from the channel | [`DtnNode::on_frame`] |
//! | the channel reported a collision | [`DtnNode::on_collision`] |
//! | the application wants to send | [`DtnNode::send_message`] |
//!
//! Handlers run to completion; nothing here blocks, suspends, or re-enters. All waiting is done
//! through the host's timer service, so a node is entirely passive between events — exactly what
//! a discrete-event simulator wants from its protocol code.

use rand_core::RngCore;

use crate::addr::NodeAddr;
use crate::config::Config;
use crate::geo::PositionSource;
use crate::link::{LinkLayer, Upcall};
use crate::net::NetworkLayer;
use crate::oracle::{Oracle, ORACLE_INTERVAL};
use crate::time::{Clock, Duration};
use crate::timer::{TimerKind, TimerService};
use crate::transport::Transport;
use crate::Error;

/// One complete DTN node: four protocol layers plus the host services driving them.
pub struct DtnNode<C: Config> {
    addr: NodeAddr,
    link: LinkLayer,
    transport: Transport,
    network: NetworkLayer,
    oracle: Oracle,
    clock: C::Clock,
    radio: C::Radio,
    timers: C::Timers,
    rng: C::Rng,
    position: C::Position,
    app: C::App,
}

impl<C: Config> DtnNode<C> {
    /// Creates a node with address `addr` on top of the given host services.
    ///
    /// The node is inert until [`start`] is called.
    ///
    /// [`start`]: #method.start
    pub fn new(
        addr: NodeAddr,
        clock: C::Clock,
        radio: C::Radio,
        timers: C::Timers,
        rng: C::Rng,
        position: C::Position,
        app: C::App,
    ) -> Self {
        DtnNode {
            addr,
            link: LinkLayer::new(addr),
            transport: Transport::new(addr),
            network: NetworkLayer::new(addr),
            oracle: Oracle::new(addr),
            clock,
            radio,
            timers,
            rng,
            position,
            app,
        }
    }

    /// Brings the node up: arms the media timer and schedules the first beacon.
    ///
    /// The first beacon goes out after a random fraction of the beacon period, so that nodes
    /// booted together do not thunder onto the channel in lockstep.
    pub fn start(&mut self) {
        self.link.start(&mut self.timers, &mut self.rng);
        let offset = Duration::from_micros(self.rng.next_u64() % ORACLE_INTERVAL.as_micros());
        self.timers.start(TimerKind::Beacon, offset);
    }

    /// Handles the expiry of the timer identified by `kind`.
    pub fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Media => {
                self.link
                    .on_media_timer(&mut self.radio, &mut self.timers, &mut self.rng)
            }
            TimerKind::Handshake => self.link.on_handshake_timeout(&mut self.timers, &mut self.rng),
            TimerKind::Beacon => {
                let free = self.network.public_free_bytes();
                let here = self.position.position();
                let now = self.clock.now();
                self.oracle.emit_beacon(free, here, now, &mut self.link);
                self.timers.start(TimerKind::Beacon, ORACLE_INTERVAL);
            }
        }
    }

    /// Handles one frame received from the wireless channel.
    pub fn on_frame(&mut self, bytes: &[u8]) {
        let upcall = match self
            .link
            .handle_frame(bytes, &mut self.radio, &mut self.timers, &mut self.rng)
        {
            Some(upcall) => upcall,
            None => return,
        };

        let now = self.clock.now();
        let here = self.position.position();
        match upcall {
            Upcall::Data { src: _, payload } => {
                if let Some(delivery) =
                    self.network
                        .recv(&payload, &mut self.link, &self.oracle, now, here)
                {
                    self.transport.recv(&delivery.payload, &mut self.app);
                }
            }
            Upcall::Beacon { src: _, payload } => {
                if self.oracle.ingest(&payload, now) {
                    self.network
                        .flush_buffered(&mut self.link, &self.oracle, now, here);
                }
            }
        }
    }

    /// Handles a collision event reported by the channel.
    pub fn on_collision(&mut self) {
        self.link.on_collision(&mut self.timers, &mut self.rng);
    }

    /// Accepts one application message for `dest`, fragmenting and dispatching it.
    pub fn send_message(&mut self, dest: NodeAddr, message: &[u8]) -> Result<(), Error> {
        let now = self.clock.now();
        let here = self.position.position();
        self.transport.send(
            message,
            dest,
            &mut self.network,
            &mut self.link,
            &self.oracle,
            now,
            here,
        )
    }

    /// This node's address.
    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    /// The application sink, for hosts that need to poll delivered messages back out.
    pub fn app(&self) -> &C::App {
        &self.app
    }

    /// Mutable access to the application sink.
    pub fn app_mut(&mut self) -> &mut C::App {
        &mut self.app
    }

    /// Number of packets waiting in the store-and-forward buffer.
    pub fn buffered_packets(&self) -> usize {
        self.network.buffered_packets()
    }

    /// Number of nodes the oracle currently knows about.
    pub fn known_nodes(&self) -> usize {
        self.oracle.known_nodes()
    }
}
