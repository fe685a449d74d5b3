//! Physical layer interactions.
//!
//! Don't expect to see much code here: the wireless channel itself — attenuation, propagation,
//! collisions — belongs to the host environment. The stack only needs to hand encoded frames to
//! the channel and to listen before it talks. Collision notifications travel the other way, as a
//! host event delivered to [`DtnNode::on_collision`].
//!
//! [`DtnNode::on_collision`]: ../node/struct.DtnNode.html#method.on_collision

/// Trait for the wireless channel interface.
///
/// The host environment has to provide an implementation of `Radio` to the stack.
pub trait Radio {
    /// Hands one encoded frame to the wireless channel.
    ///
    /// Transmission is fire-and-forget: there is no completion notification, and delivery is not
    /// guaranteed. The frame is at most [`MAX_FRAME_SIZE`] bytes long.
    ///
    /// [`MAX_FRAME_SIZE`]: ../link/constant.MAX_FRAME_SIZE.html
    fn transmit(&mut self, frame: &[u8]);

    /// Returns whether another station is currently audible on the channel.
    ///
    /// Non-blocking. The link layer senses the carrier before every transmission attempt and
    /// defers while this returns `true`.
    fn carrier_sense(&self) -> bool;
}
