//! Adapters: implementations of the port traits
//!
//! - `serial_port` — real hardware through the `serialport` crate
//! - `mock_serial` — in-memory devices for tests and `--mock` runs

pub mod mock_serial;
pub mod serial_port;

pub use mock_serial::MockSerial;
pub use serial_port::SerialPortFactory;
