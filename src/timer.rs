//! One-shot timers supplied by the host environment.
//!
//! All waiting in the stack is expressed through cancellable one-shot timers: the media-access
//! schedule, the per-step handshake deadline, and the beacon period. The host arms them through
//! the [`TimerService`] it implements and calls [`DtnNode::on_timer`] with the matching
//! [`TimerKind`] when one fires.
//!
//! [`DtnNode::on_timer`]: ../node/struct.DtnNode.html#method.on_timer

use crate::time::Duration;

/// Identifies one of the timers a node uses.
///
/// Each kind has at most one outstanding timer. Starting a kind that is already pending replaces
/// the earlier schedule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Periodic attempts of the link layer to acquire the medium and transmit.
    Media,

    /// Bounds each step of the RTS/CTS/DATA/ACK exchange.
    Handshake,

    /// Schedules the next oracle beacon broadcast.
    Beacon,
}

/// Cancellable one-shot timers bound to [`TimerKind`] tags.
///
/// Implementations arrange for the node's timer handler to be invoked once `delay` has elapsed. A
/// stopped timer must be treated as never firing: the stack relies on cancellation taking effect
/// immediately and never compensates for stale expirations.
pub trait TimerService {
    /// Arms the timer identified by `kind` to fire once after `delay`.
    ///
    /// A previously armed timer of the same kind is replaced.
    fn start(&mut self, kind: TimerKind, delay: Duration);

    /// Cancels the timer identified by `kind`, if armed.
    fn stop(&mut self, kind: TimerKind);
}
