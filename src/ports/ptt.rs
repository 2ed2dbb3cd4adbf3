//! Push-to-talk port trait

use crate::domain::PttResult;

/// Anything that can key a transmitter.
///
/// `on()`/`off()` never fail from the caller's point of view: a failed line
/// write is logged and the next `off()` is still attempted. Only `connect()`
/// surfaces errors.
pub trait PushToTalk: Send {
    /// Take ownership of (or a reference to) the port and key up
    fn connect(&mut self) -> PttResult<()>;

    /// Give the port back. Always ends disconnected.
    fn disconnect(&mut self);

    /// Engage PTT (start transmitting) after the configured delay
    fn on(&mut self);

    /// Release PTT (stop transmitting)
    fn off(&mut self);

    /// Check the port is bound and still open
    fn is_connected(&self) -> bool;

    /// Check if PTT is currently engaged
    fn is_transmitting(&self) -> bool;
}
