//! Serial PTT and CW keying
//!
//! Keys a transmitter by toggling a serial port's DTR or RTS line, either on
//! a port of its own or on the same port the radio-control (CAT/CI-V) link
//! already uses.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, no I/O dependencies
//! - `ports/` - Trait definitions (interfaces) for external dependencies
//! - `adapters/` - Implementations of ports (serialport, in-memory mock)
//! - `share/` - Reference-counted sharing of one open port between clients
//! - `ptt/` - Push-to-talk state machine and line selection
//! - `keyer/` - CW keying over the same control lines
//! - `profiles` - Saved PTT profiles on disk

// Core domain (pure, no I/O)
pub mod domain;
pub mod ports;

// Adapters (external I/O)
pub mod adapters;

// Port ownership and the clients built on it
pub mod keyer;
pub mod ptt;
pub mod share;

pub mod profiles;

pub use domain::{PttConfig, PttError, PttResult};
pub use ptt::{build_ptt, LineSelector, PttController};
pub use share::{PortHandle, SharedPortRegistry};
