//! Port traits (interfaces)
//!
//! These traits define the boundaries between the core domain and external I/O.
//! Adapters implement these traits to connect to real hardware.

pub mod ptt;
pub mod serial;

pub use ptt::*;
pub use serial::*;
