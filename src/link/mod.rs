//! Link layer: medium access and the unicast handshake.
//!
//! The wireless channel is shared and prone to hidden-terminal collisions, so the link layer
//! never just transmits:
//!
//! * A **media timer** periodically tries to acquire the channel — at a lazy rate while there is
//!   nothing to send, at a busy rate while there is. Every attempt starts with carrier sense; if
//!   another station is audible, the attempt is abandoned and rescheduled.
//! * Unicast DATA frames go through an **RTS/CTS/DATA/ACK** exchange. Each step is bounded by a
//!   handshake timer; a head frame whose RTS goes unanswered three times is dropped.
//! * **Collision events** reported by the host trigger binary exponential backoff: the media
//!   timer is pushed out by a random number of slots drawn from a window that doubles with every
//!   consecutive collision.
//!
//! Beacons skip the handshake entirely — they are broadcast fire-and-forget whenever the channel
//! is idle, and a lost beacon simply ages out of the neighbours' tables.
//!
//! Received frames are checksummed and dispatched: DATA payloads go up to the network layer,
//! BEACON payloads to the oracle. Both travel via [`Upcall`] so the caller can route them without
//! holding a borrow of the link layer.

pub mod frame;
pub mod queue;

pub use self::frame::{Frame, FrameKind, FRAME_HEADER_SIZE, MAX_FRAME_SIZE, MAX_PACKET_SIZE};
pub use self::queue::{FrameQueue, MAX_QUEUED_FRAMES};

use alloc::vec::Vec;
use rand_core::RngCore;

use crate::addr::NodeAddr;
use crate::phy::Radio;
use crate::time::Duration;
use crate::timer::{TimerKind, TimerService};
use crate::utils::HexSlice;

/// Media timer period while the queue is empty and no beacon is pending.
pub const IDLE_FREQ: Duration = Duration::from_micros(1_000_000);

/// Media timer period while there is work to transmit.
pub const ACTIVE_FREQ: Duration = Duration::from_micros(50_000);

/// Deadline for each step of the RTS/CTS/DATA/ACK exchange.
pub const WAITING_TIME: Duration = Duration::from_micros(50_000);

/// Width of one backoff slot.
pub const SLOT_TIME: Duration = Duration::from_micros(10_000);

/// Cap on the backoff exponent; the contention window stops growing here.
pub const BACKOFF_LIMIT: u32 = 8;

/// How many handshake timeouts a head frame survives before it is dropped.
pub const HANDSHAKE_ATTEMPTS: u8 = 3;

/// Progress of the unicast handshake, from this station's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Handshake {
    /// No exchange in progress.
    Idle,

    /// We sent an RTS to `peer` and are waiting for its CTS.
    RtsSent { peer: NodeAddr },

    /// We answered `peer`'s RTS with a CTS and are waiting for its DATA.
    CtsSent { peer: NodeAddr },

    /// We sent the DATA frame and are waiting for `peer`'s ACK.
    AwaitAck { peer: NodeAddr },
}

/// Payload handed up after a valid DATA or BEACON frame arrived for this station.
#[derive(Debug)]
pub enum Upcall {
    /// A DATA frame's payload, destined for the network layer.
    Data { src: NodeAddr, payload: Vec<u8> },

    /// A BEACON frame's payload, destined for the oracle.
    Beacon { src: NodeAddr, payload: Vec<u8> },
}

/// The link layer of one station.
pub struct LinkLayer {
    addr: NodeAddr,
    queue: FrameQueue,
    handshake: Handshake,
    backoff: u32,
    timeouts: u8,
}

impl LinkLayer {
    /// Creates a link layer for the station with address `addr`.
    pub fn new(addr: NodeAddr) -> Self {
        LinkLayer {
            addr,
            queue: FrameQueue::new(),
            handshake: Handshake::Idle,
            backoff: 0,
            timeouts: 0,
        }
    }

    /// Arms the media timer for the first time.
    pub fn start<T: TimerService, R: RngCore>(&mut self, timers: &mut T, rng: &mut R) {
        self.reschedule_media(timers, rng);
    }

    /// Enqueues a DATA frame for `dest`. Non-blocking.
    ///
    /// Oversized payloads are dropped silently, as are frames that do not fit the queue.
    pub fn send_data(&mut self, payload: &[u8], dest: NodeAddr) {
        if payload.len() > MAX_PACKET_SIZE {
            warn!(
                "link: dropping oversized payload for {} ({} bytes)",
                dest,
                payload.len()
            );
            return;
        }
        if !self.queue.enqueue(Frame::data(dest, self.addr, payload.to_vec())) {
            debug!("link: outbound queue full, dropping frame for {}", dest);
        }
    }

    /// Installs `payload` as the pending broadcast beacon, replacing any unsent one.
    pub fn send_info(&mut self, payload: &[u8]) {
        if payload.len() > MAX_PACKET_SIZE {
            warn!("link: dropping oversized beacon ({} bytes)", payload.len());
            return;
        }
        self.queue.set_beacon(Frame::beacon(self.addr, payload.to_vec()));
    }

    /// Media timer expired: try to acquire the channel and transmit.
    pub fn on_media_timer<P: Radio, T: TimerService, R: RngCore>(
        &mut self,
        radio: &mut P,
        timers: &mut T,
        rng: &mut R,
    ) {
        if radio.carrier_sense() {
            self.backoff = 0;
            timers.start(TimerKind::Media, jitter(rng, ACTIVE_FREQ));
            return;
        }

        if let Some(beacon) = self.queue.take_beacon() {
            trace!("link: broadcasting beacon, {} bytes", beacon.payload.len());
            radio.transmit(&beacon.encode());
        } else if self.handshake == Handshake::Idle {
            if let Some(head) = self.queue.head() {
                let peer = head.dest;
                self.handshake = Handshake::RtsSent { peer };
                timers.start(TimerKind::Handshake, WAITING_TIME);
                radio.transmit(&Frame::control(FrameKind::Rts, peer, self.addr).encode());
            }
        }

        self.reschedule_media(timers, rng);
    }

    /// Handshake timer expired: the current exchange step got no answer.
    pub fn on_handshake_timeout<T: TimerService, R: RngCore>(
        &mut self,
        timers: &mut T,
        rng: &mut R,
    ) {
        match self.handshake {
            Handshake::RtsSent { peer } => {
                self.timeouts += 1;
                if self.timeouts >= HANDSHAKE_ATTEMPTS {
                    debug!("link: {} stayed silent, dropping head frame", peer);
                    self.queue.drop_head();
                    self.timeouts = 0;
                }
            }
            Handshake::AwaitAck { peer } => {
                // The frame already left the queue when the CTS arrived; the next head is a
                // fresh attempt.
                debug!("link: no ACK from {}", peer);
                self.timeouts = 0;
            }
            Handshake::CtsSent { .. } | Handshake::Idle => {}
        }
        self.handshake = Handshake::Idle;
        self.reschedule_media(timers, rng);
    }

    /// The host reported a collision on the channel: back off exponentially.
    pub fn on_collision<T: TimerService, R: RngCore>(&mut self, timers: &mut T, rng: &mut R) {
        timers.stop(TimerKind::Media);
        let window = 1u32 << self.backoff.min(BACKOFF_LIMIT);
        let slots = rng.next_u32() % window;
        let delay = Duration::from_micros(SLOT_TIME.as_micros() * u64::from(slots));
        trace!("link: collision, backing off {} ({} slots)", delay, slots);
        timers.start(TimerKind::Media, delay);
        self.backoff = self.backoff.saturating_add(1);
    }

    /// Processes one frame received from the channel.
    ///
    /// Corrupted and foreign frames are dropped silently. DATA and BEACON payloads for this
    /// station are returned as an [`Upcall`] for the caller to dispatch.
    pub fn handle_frame<P: Radio, T: TimerService, R: RngCore>(
        &mut self,
        bytes: &[u8],
        radio: &mut P,
        timers: &mut T,
        rng: &mut R,
    ) -> Option<Upcall> {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("link: dropping frame ({}): {:?}", e, HexSlice(bytes));
                return None;
            }
        };
        trace!("link<- {:?}", frame);

        if frame.kind == FrameKind::Beacon {
            return Some(Upcall::Beacon {
                src: frame.src,
                payload: frame.payload,
            });
        }
        if frame.dest != self.addr {
            return None;
        }

        match frame.kind {
            FrameKind::Rts => {
                match self.handshake {
                    Handshake::Idle | Handshake::CtsSent { .. } => {
                        self.handshake = Handshake::CtsSent { peer: frame.src };
                        timers.start(TimerKind::Handshake, WAITING_TIME);
                        radio.transmit(
                            &Frame::control(FrameKind::Cts, frame.src, self.addr).encode(),
                        );
                    }
                    // Mid-exchange on our own account; the sender will time out and retry.
                    _ => {}
                }
                None
            }
            FrameKind::Cts => {
                if self.handshake == (Handshake::RtsSent { peer: frame.src }) {
                    timers.stop(TimerKind::Handshake);
                    match self.queue.dequeue() {
                        Some(data) => {
                            self.timeouts = 0;
                            self.handshake = Handshake::AwaitAck { peer: frame.src };
                            timers.start(TimerKind::Handshake, WAITING_TIME);
                            radio.transmit(&data.encode());
                        }
                        None => self.handshake = Handshake::Idle,
                    }
                }
                None
            }
            FrameKind::Data => {
                if self.handshake == (Handshake::CtsSent { peer: frame.src }) {
                    timers.stop(TimerKind::Handshake);
                    self.handshake = Handshake::Idle;
                }
                radio.transmit(&Frame::control(FrameKind::Ack, frame.src, self.addr).encode());
                Some(Upcall::Data {
                    src: frame.src,
                    payload: frame.payload,
                })
            }
            FrameKind::Ack => {
                if self.handshake == (Handshake::AwaitAck { peer: frame.src }) {
                    timers.stop(TimerKind::Handshake);
                    self.handshake = Handshake::Idle;
                    self.timeouts = 0;
                    self.reschedule_media(timers, rng);
                }
                None
            }
            FrameKind::Beacon | FrameKind::Unknown(_) => None,
        }
    }

    /// Number of DATA frames waiting for the medium.
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// Removes and returns the head of the outbound queue, bypassing the handshake.
    #[cfg(test)]
    pub(crate) fn take_queued(&mut self) -> Option<Frame> {
        self.queue.dequeue()
    }

    fn reschedule_media<T: TimerService, R: RngCore>(&mut self, timers: &mut T, rng: &mut R) {
        let freq = if self.queue.has_work() {
            ACTIVE_FREQ
        } else {
            IDLE_FREQ
        };
        timers.start(TimerKind::Media, jitter(rng, freq));
    }
}

/// Draws a uniform delay in `1..=freq` microseconds.
fn jitter<R: RngCore>(rng: &mut R, freq: Duration) -> Duration {
    Duration::from_micros(1 + rng.next_u64() % freq.as_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;
    use alloc::vec;
    use std::vec::Vec;

    /// Radio that records every transmitted frame and has a scriptable carrier.
    struct MockRadio {
        sent: Vec<Frame>,
        busy: bool,
    }

    impl MockRadio {
        fn new() -> Self {
            MockRadio {
                sent: Vec::new(),
                busy: false,
            }
        }

        fn take(&mut self) -> Vec<Frame> {
            core::mem::replace(&mut self.sent, Vec::new())
        }
    }

    impl Radio for MockRadio {
        fn transmit(&mut self, frame: &[u8]) {
            self.sent.push(Frame::decode(frame).expect("transmitted garbage"));
        }

        fn carrier_sense(&self) -> bool {
            self.busy
        }
    }

    /// Timer service that records the currently armed delays.
    struct MockTimers {
        armed: Vec<(TimerKind, Duration)>,
    }

    impl MockTimers {
        fn new() -> Self {
            MockTimers { armed: Vec::new() }
        }

        fn armed_delay(&self, kind: TimerKind) -> Option<Duration> {
            self.armed
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, d)| *d)
        }
    }

    impl TimerService for MockTimers {
        fn start(&mut self, kind: TimerKind, delay: Duration) {
            self.stop(kind);
            self.armed.push((kind, delay));
        }

        fn stop(&mut self, kind: TimerKind) {
            self.armed.retain(|(k, _)| *k != kind);
        }
    }

    /// Deterministic xorshift RNG; no host entropy in tests.
    struct MockRng(u64);

    impl RngCore for MockRng {
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

    fn fixture() -> (LinkLayer, MockRadio, MockTimers, MockRng) {
        (
            LinkLayer::new(NodeAddr(1)),
            MockRadio::new(),
            MockTimers::new(),
            MockRng(0x1234_5678_9abc_def0),
        )
    }

    #[test]
    fn media_timer_sends_rts_for_queued_data() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        link.send_data(&[1, 2, 3], NodeAddr(2));
        link.on_media_timer(&mut radio, &mut timers, &mut rng);

        let sent = radio.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, FrameKind::Rts);
        assert_eq!(sent[0].dest, NodeAddr(2));
        // Head stays queued until the CTS arrives.
        assert_eq!(link.queued_frames(), 1);
        assert!(timers.armed_delay(TimerKind::Handshake).is_some());
        assert!(timers.armed_delay(TimerKind::Media).is_some());
    }

    #[test]
    fn busy_carrier_defers() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        radio.busy = true;
        link.send_data(&[1], NodeAddr(2));
        link.on_media_timer(&mut radio, &mut timers, &mut rng);

        assert!(radio.take().is_empty());
        assert!(timers.armed_delay(TimerKind::Handshake).is_none());
        assert!(timers.armed_delay(TimerKind::Media).unwrap() <= ACTIVE_FREQ);
    }

    #[test]
    fn pending_beacon_outranks_data() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        link.send_data(&[1], NodeAddr(2));
        link.send_info(&[42; 32]);
        link.on_media_timer(&mut radio, &mut timers, &mut rng);

        let sent = radio.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, FrameKind::Beacon);
        assert!(sent[0].dest.is_broadcast());

        // Next firing proceeds with the RTS.
        link.on_media_timer(&mut radio, &mut timers, &mut rng);
        assert_eq!(radio.take()[0].kind, FrameKind::Rts);
    }

    #[test]
    fn full_initiator_handshake() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        link.send_data(&[7; 10], NodeAddr(2));
        link.on_media_timer(&mut radio, &mut timers, &mut rng);
        radio.take();

        let cts = Frame::control(FrameKind::Cts, NodeAddr(1), NodeAddr(2)).encode();
        assert!(link
            .handle_frame(&cts, &mut radio, &mut timers, &mut rng)
            .is_none());
        let sent = radio.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, FrameKind::Data);
        assert_eq!(sent[0].payload, vec![7; 10]);
        assert_eq!(link.queued_frames(), 0);

        let ack = Frame::control(FrameKind::Ack, NodeAddr(1), NodeAddr(2)).encode();
        link.handle_frame(&ack, &mut radio, &mut timers, &mut rng);
        assert!(timers.armed_delay(TimerKind::Handshake).is_none());
    }

    #[test]
    fn responder_answers_rts_and_acks_data() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();

        let rts = Frame::control(FrameKind::Rts, NodeAddr(1), NodeAddr(3)).encode();
        link.handle_frame(&rts, &mut radio, &mut timers, &mut rng);
        let sent = radio.take();
        assert_eq!(sent[0].kind, FrameKind::Cts);
        assert_eq!(sent[0].dest, NodeAddr(3));

        let data = Frame::data(NodeAddr(1), NodeAddr(3), vec![5, 6]).encode();
        let upcall = link.handle_frame(&data, &mut radio, &mut timers, &mut rng);
        match upcall {
            Some(Upcall::Data { src, payload }) => {
                assert_eq!(src, NodeAddr(3));
                assert_eq!(payload, vec![5, 6]);
            }
            other => panic!("expected data upcall, got {:?}", other),
        }
        assert_eq!(radio.take()[0].kind, FrameKind::Ack);
        assert!(timers.armed_delay(TimerKind::Handshake).is_none());
    }

    #[test]
    fn frames_for_other_stations_are_ignored() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();

        let rts = Frame::control(FrameKind::Rts, NodeAddr(9), NodeAddr(3)).encode();
        assert!(link
            .handle_frame(&rts, &mut radio, &mut timers, &mut rng)
            .is_none());
        let data = Frame::data(NodeAddr(9), NodeAddr(3), vec![1]).encode();
        assert!(link
            .handle_frame(&data, &mut radio, &mut timers, &mut rng)
            .is_none());
        assert!(radio.take().is_empty());
    }

    #[test]
    fn beacons_are_dispatched_regardless_of_handshake() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        let beacon = Frame::beacon(NodeAddr(3), vec![1, 2, 3]).encode();
        match link.handle_frame(&beacon, &mut radio, &mut timers, &mut rng) {
            Some(Upcall::Beacon { src, payload }) => {
                assert_eq!(src, NodeAddr(3));
                assert_eq!(payload, vec![1, 2, 3]);
            }
            other => panic!("expected beacon upcall, got {:?}", other),
        }
    }

    #[test]
    fn corrupted_frames_are_dropped_silently() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        let mut data = Frame::data(NodeAddr(1), NodeAddr(3), vec![5, 6]).encode();
        data[FRAME_HEADER_SIZE] ^= 0x01;
        assert!(link
            .handle_frame(&data, &mut radio, &mut timers, &mut rng)
            .is_none());
        assert!(radio.take().is_empty());
    }

    #[test]
    fn head_frame_dropped_after_three_timeouts() {
        let (mut link, mut radio, mut timers, mut rng) = fixture();
        link.send_data(&[1], NodeAddr(2));
        link.send_data(&[2], NodeAddr(3));

        for round in 0..3 {
            link.on_media_timer(&mut radio, &mut timers, &mut rng);
            let sent = radio.take();
            assert_eq!(sent[0].kind, FrameKind::Rts);
            assert_eq!(sent[0].dest, NodeAddr(2), "round {}", round);
            assert_eq!(link.queued_frames(), 2);
            link.on_handshake_timeout(&mut timers, &mut rng);
        }

        // Third expiry dropped the head; the next attempt serves the second frame.
        assert_eq!(link.queued_frames(), 1);
        link.on_media_timer(&mut radio, &mut timers, &mut rng);
        assert_eq!(radio.take()[0].dest, NodeAddr(3));
    }

    #[test]
    fn collision_backoff_widths_double() {
        let (mut link, _radio, mut timers, _rng) = fixture();

        // Max out every draw to observe the window width itself.
        struct MaxRng;
        impl RngCore for MaxRng {
            fn next_u32(&mut self) -> u32 {
                u32::MAX
            }
            fn next_u64(&mut self) -> u64 {
                u64::MAX
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                for b in dest {
                    *b = 0xFF;
                }
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
                self.fill_bytes(dest);
                Ok(())
            }
        }
        let mut rng = MaxRng;

        let mut widths = Vec::new();
        for _ in 0..4 {
            link.on_collision(&mut timers, &mut rng);
            widths.push(timers.armed_delay(TimerKind::Media).unwrap());
        }

        // First window is a single slot (delay 0), then the maximum delay doubles each time.
        assert_eq!(widths[0], Duration::from_micros(0));
        assert_eq!(widths[1], Duration::from_micros(SLOT_TIME.as_micros() * 1));
        assert_eq!(widths[2], Duration::from_micros(SLOT_TIME.as_micros() * 3));
        assert_eq!(widths[3], Duration::from_micros(SLOT_TIME.as_micros() * 7));
    }

    #[test]
    fn oversized_payload_dropped_silently() {
        let (mut link, _radio, _timers, _rng) = fixture();
        link.send_data(&vec![0; MAX_PACKET_SIZE + 1], NodeAddr(2));
        assert_eq!(link.queued_frames(), 0);
        link.send_data(&vec![0; MAX_PACKET_SIZE], NodeAddr(2));
        assert_eq!(link.queued_frames(), 1);
    }
}
