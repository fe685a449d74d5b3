//! A deterministic in-process mesh for end-to-end tests.
//!
//! Stands in for the discrete-event simulator: a shared clock, per-node one-shot timers, and a
//! wireless medium that delivers every transmission to all stations within range. Transmissions
//! have zero duration, but timers due at the same microsecond fire in the same delivery round,
//! so stations armed in lockstep really do transmit on top of each other: a station inside the
//! overlap of two or more transmissions hears none of them, and every sender involved gets a
//! collision event, the way the channel hardware would report it. Carrier sense likewise reports
//! any in-flight transmission from a station in range. Propagation delay is not modelled.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use mulenet::config::{Application, Config};
use mulenet::geo::{Point, PositionSource};
use mulenet::link::Frame;
use mulenet::phy::Radio;
use mulenet::time::{Clock, Duration, Instant};
use mulenet::timer::{TimerKind, TimerService};
use mulenet::{DtnNode, NodeAddr};

use rand_core::RngCore;

/// State shared between every node's host services.
struct World {
    now_us: u64,
    positions: Vec<Point>,
    range: i64,
    /// Transmissions staged by radios, waiting for the driver to deliver them.
    staged: Vec<(usize, Vec<u8>)>,
    /// Armed one-shot timers: (node, kind, fire time).
    timers: Vec<(usize, TimerKind, u64)>,
    /// Every transmission ever made, for scenario assertions.
    pub log: Vec<(usize, Vec<u8>)>,
    /// Collision events reported to each node so far.
    collision_counts: Vec<usize>,
}

type Shared = Rc<RefCell<World>>;

pub struct SimClock {
    world: Shared,
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_raw_micros(self.world.borrow().now_us)
    }
}

pub struct SimRadio {
    world: Shared,
    index: usize,
}

impl Radio for SimRadio {
    fn transmit(&mut self, frame: &[u8]) {
        let mut world = self.world.borrow_mut();
        world.staged.push((self.index, frame.to_vec()));
        world.log.push((self.index, frame.to_vec()));
    }

    fn carrier_sense(&self) -> bool {
        let world = self.world.borrow();
        let here = world.positions[self.index];
        world
            .staged
            .iter()
            .any(|(src, _)| *src != self.index && in_range(world.positions[*src], here, world.range))
    }
}

pub struct SimTimers {
    world: Shared,
    index: usize,
}

impl TimerService for SimTimers {
    fn start(&mut self, kind: TimerKind, delay: Duration) {
        let mut world = self.world.borrow_mut();
        let at = world.now_us + delay.as_micros();
        world
            .timers
            .retain(|(node, k, _)| !(*node == self.index && *k == kind));
        world.timers.push((self.index, kind, at));
    }

    fn stop(&mut self, kind: TimerKind) {
        let mut world = self.world.borrow_mut();
        world
            .timers
            .retain(|(node, k, _)| !(*node == self.index && *k == kind));
    }
}

pub struct SimPosition {
    world: Shared,
    index: usize,
}

impl PositionSource for SimPosition {
    fn position(&self) -> Point {
        self.world.borrow().positions[self.index]
    }
}

/// Deterministic xorshift generator, seeded per node.
pub struct SimRng(u64);

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for b in dest {
            *b = self.next_u64() as u8;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Application sink that keeps every delivered message.
#[derive(Default)]
pub struct Inbox {
    pub received: Vec<(NodeAddr, Vec<u8>)>,
}

impl Application for Inbox {
    fn deliver(&mut self, source: NodeAddr, message: &[u8]) {
        self.received.push((source, message.to_vec()));
    }
}

pub struct SimConfig;

impl Config for SimConfig {
    type Clock = SimClock;
    type Radio = SimRadio;
    type Timers = SimTimers;
    type Rng = SimRng;
    type Position = SimPosition;
    type App = Inbox;
}

/// The mesh under test: a handful of started nodes over one shared medium.
pub struct Mesh {
    world: Shared,
    pub nodes: Vec<DtnNode<SimConfig>>,
}

impl Mesh {
    /// Builds and starts one node per position. Node `i` gets address `i`.
    pub fn new(positions: &[Point], range: i64) -> Mesh {
        let world: Shared = Rc::new(RefCell::new(World {
            now_us: 0,
            positions: positions.to_vec(),
            range,
            staged: Vec::new(),
            timers: Vec::new(),
            log: Vec::new(),
            collision_counts: vec![0; positions.len()],
        }));

        let mut nodes = Vec::new();
        for index in 0..positions.len() {
            let mut node = DtnNode::new(
                NodeAddr(index as i32),
                SimClock {
                    world: world.clone(),
                },
                SimRadio {
                    world: world.clone(),
                    index,
                },
                SimTimers {
                    world: world.clone(),
                    index,
                },
                SimRng(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(index as u64 + 1)),
                SimPosition {
                    world: world.clone(),
                    index,
                },
                Inbox::default(),
            );
            node.start();
            nodes.push(node);
        }

        Mesh { world, nodes }
    }

    /// Hands an application message to node `from`.
    pub fn send(&mut self, from: usize, to: NodeAddr, message: &[u8]) {
        self.nodes[from]
            .send_message(to, message)
            .expect("send_message failed");
        self.deliver_frames();
    }

    /// Runs the event loop until simulated time reaches `deadline_us`.
    ///
    /// All timers due at the earliest pending microsecond fire in one round, before anything they
    /// transmitted is delivered — simultaneous senders stay simultaneous.
    pub fn run_until(&mut self, deadline_us: u64) {
        loop {
            self.deliver_frames();

            let due: Vec<(usize, TimerKind)> = {
                let mut world = self.world.borrow_mut();
                let next_at = world
                    .timers
                    .iter()
                    .filter(|(_, _, at)| *at <= deadline_us)
                    .map(|(_, _, at)| *at)
                    .min();
                match next_at {
                    Some(at) => {
                        world.now_us = at;
                        let mut due: Vec<(usize, TimerKind)> = world
                            .timers
                            .iter()
                            .filter(|(_, _, t)| *t == at)
                            .map(|(node, kind, _)| (*node, *kind))
                            .collect();
                        due.sort_by_key(|(node, _)| *node);
                        world.timers.retain(|(_, _, t)| *t != at);
                        due
                    }
                    None => {
                        world.now_us = deadline_us;
                        break;
                    }
                }
            };

            for (node, kind) in due {
                self.nodes[node].on_timer(kind);
            }
        }
        self.deliver_frames();
    }

    /// Collision events the channel has reported to `node` so far.
    pub fn collision_count(&self, node: usize) -> usize {
        self.world.borrow().collision_counts[node]
    }

    /// Re-arms the media timers of `nodes` to fire at the same instant, putting the stations in
    /// the lockstep a worst-case channel race produces.
    pub fn align_media_timers(&mut self, nodes: &[usize], at_us: u64) {
        let mut world = self.world.borrow_mut();
        for &node in nodes {
            world
                .timers
                .retain(|(n, k, _)| !(*n == node && *k == TimerKind::Media));
            world.timers.push((node, TimerKind::Media, at_us));
        }
    }

    /// Decoded copies of every frame transmitted so far.
    pub fn transmitted_frames(&self) -> Vec<(usize, Frame)> {
        self.world
            .borrow()
            .log
            .iter()
            .map(|(src, bytes)| (*src, Frame::decode(bytes).expect("undecodable frame on the air")))
            .collect()
    }

    /// Delivers staged transmissions to every station in range, repeating until the air is
    /// quiet (responses can stage further frames).
    ///
    /// A station that can hear exactly one of a round's transmissions receives it. A station
    /// inside the overlap of two or more hears only garbage, and every sender whose frame was
    /// part of an overlap somewhere gets a collision event.
    fn deliver_frames(&mut self) {
        loop {
            let staged = mem::replace(&mut self.world.borrow_mut().staged, Vec::new());
            if staged.is_empty() {
                return;
            }

            let (audible, colliders) = {
                let world = self.world.borrow();
                let stations = world.positions.len();
                let mut audible: Vec<Vec<usize>> = vec![Vec::new(); stations];
                for (i, (src, _)) in staged.iter().enumerate() {
                    for station in 0..stations {
                        if station != *src
                            && in_range(world.positions[*src], world.positions[station], world.range)
                        {
                            audible[station].push(i);
                        }
                    }
                }
                let mut colliders: Vec<usize> = audible
                    .iter()
                    .filter(|heard| heard.len() >= 2)
                    .flat_map(|heard| heard.iter().map(|&i| staged[i].0))
                    .collect();
                colliders.sort();
                colliders.dedup();
                (audible, colliders)
            };

            for (station, heard) in audible.iter().enumerate() {
                if heard.len() == 1 {
                    self.nodes[station].on_frame(&staged[heard[0]].1);
                }
            }
            for src in colliders {
                self.world.borrow_mut().collision_counts[src] += 1;
                self.nodes[src].on_collision();
            }
        }
    }
}

fn in_range(a: Point, b: Point, range: i64) -> bool {
    let dx = i64::from(a.x) - i64::from(b.x);
    let dy = i64::from(a.y) - i64::from(b.y);
    dx * dx + dy * dy <= range * range
}
