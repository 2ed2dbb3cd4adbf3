//! Sharing one physical serial port between several in-process clients
//! (PTT, CW keyer, CAT/CI-V radio control).

pub mod handle;
pub mod registry;

pub use handle::PortHandle;
pub use registry::SharedPortRegistry;
