//! CW (Morse) keying over a serial control line.
//!
//! Useful when one cable carries CAT, PTT and the key line: the keyer can
//! borrow the radio's port through the shared registry just like the PTT.

pub mod cw;
pub mod morse;
pub mod timing;

pub use cw::{CwKeyer, QUEUE_SIZE};
pub use timing::CwTiming;
