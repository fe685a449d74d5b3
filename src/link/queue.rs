//! The outbound frame queue.
//!
//! DATA frames wait here in FIFO order for their turn on the medium; each one leaves through an
//! RTS/CTS exchange. Beacons do not queue: a single pending slot holds the latest unsent beacon
//! and a newer one replaces it, because stale topology is worse than lost topology.

use alloc::collections::VecDeque;

use crate::link::frame::Frame;

/// Upper bound on queued DATA frames. Enqueueing onto a full queue drops the new frame.
pub const MAX_QUEUED_FRAMES: usize = 64;

pub struct FrameQueue {
    frames: VecDeque<Frame>,
    beacon: Option<Frame>,
}

impl FrameQueue {
    /// Creates an empty queue with no pending beacon.
    pub fn new() -> Self {
        FrameQueue {
            frames: VecDeque::new(),
            beacon: None,
        }
    }

    /// Appends a DATA frame; returns `false` if the queue was full and the frame was dropped.
    pub fn enqueue(&mut self, frame: Frame) -> bool {
        if self.frames.len() >= MAX_QUEUED_FRAMES {
            return false;
        }
        self.frames.push_back(frame);
        true
    }

    /// The frame that will be transmitted next, if any.
    pub fn head(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Removes and returns the head frame.
    pub fn dequeue(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Discards the head frame after its handshake failed for good.
    pub fn drop_head(&mut self) {
        self.frames.pop_front();
    }

    /// Installs `frame` as the pending beacon, replacing any unsent one.
    pub fn set_beacon(&mut self, frame: Frame) {
        self.beacon = Some(frame);
    }

    /// Removes and returns the pending beacon, if one is armed.
    pub fn take_beacon(&mut self) -> Option<Frame> {
        self.beacon.take()
    }

    /// Number of queued DATA frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether anything — beacon or DATA — is waiting for the medium.
    pub fn has_work(&self) -> bool {
        self.beacon.is_some() || !self.frames.is_empty()
    }
}
