//! Serial port traits
//!
//! Split into two traits:
//! - `SerialFactory` — lists and opens ports
//! - `SerialConnection` — one open port: control lines plus raw bytes
//!
//! The factory takes `&self` so a registry or controller can hold any
//! transport behind an `Arc<dyn SerialFactory>` (real hardware or the
//! in-memory mock).

use crate::domain::{ControlLine, PortId, SerialPortInfo, TransportError};

/// Factory for creating serial connections.
pub trait SerialFactory: Send + Sync {
    /// List available serial ports on the system
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>, TransportError>;

    /// Open the named port, returning a boxed connection
    fn open(&self, port: &PortId) -> Result<Box<dyn SerialConnection>, TransportError>;
}

/// Trait for an open serial port connection.
/// Only requires `Send` (not `Sync`) — always accessed behind a Mutex.
pub trait SerialConnection: Send {
    /// Drive DTR or RTS high (`active`) or low
    fn set_control_line(&mut self, line: ControlLine, active: bool) -> Result<(), TransportError>;

    /// Close the connection. Closing twice reports `AlreadyClosed`.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Live transport state; false once closed or unplugged
    fn is_open(&self) -> bool;

    /// Name the port was opened under
    fn port_name(&self) -> PortId;

    /// Write bytes to the port (CAT/CI-V traffic sharing the connection)
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read bytes from the port (with timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;
}
