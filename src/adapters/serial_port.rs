//! Serial port adapter using the `serialport` crate
//!
//! Implements `SerialFactory` and `SerialConnection` traits.
//! `SerialPortFactory` has no instance data; it exists so the transport can
//! be handed around as `Arc<dyn SerialFactory>`.

use std::io;
use std::time::Duration;

use crate::domain::{ControlLine, PortId, SerialPortInfo, TransportError};
use crate::ports::{SerialConnection, SerialFactory};

/// Line speed used when opening a port. PTT only toggles DTR/RTS, and a
/// co-resident CAT client reconfigures the speed it needs.
const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout for CAT traffic passing through the shared connection
const READ_TIMEOUT_MS: u64 = 100;

/// Zero-sized factory for creating serial port connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortFactory;

impl SerialFactory for SerialPortFactory {
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Io(format!("Failed to list ports: {e}")))?;

        Ok(ports
            .into_iter()
            .map(|p| {
                let port_type = match &p.port_type {
                    serialport::SerialPortType::UsbPort(info) => {
                        format!("USB ({:04X}:{:04X})", info.vid, info.pid)
                    }
                    serialport::SerialPortType::PciPort => "PCI".to_string(),
                    serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                    serialport::SerialPortType::Unknown => "Native".to_string(),
                };
                SerialPortInfo {
                    name: p.port_name,
                    port_type,
                }
            })
            .collect())
    }

    fn open(&self, port: &PortId) -> Result<Box<dyn SerialConnection>, TransportError> {
        let serial = serialport::new(port.as_str(), DEFAULT_BAUD_RATE)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .map_err(map_open_error)?;

        log::debug!("Opened serial port {port}");
        Ok(Box::new(SerialPortConnection {
            name: port.clone(),
            port: Some(serial),
        }))
    }
}

/// Translate a `serialport` open failure into the transport vocabulary.
fn map_open_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::NotFound,
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => TransportError::NotFound,
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied
        }
        _ if e.description.to_ascii_lowercase().contains("busy") => TransportError::Busy,
        _ => TransportError::Io(e.description),
    }
}

/// An open serial port connection wrapping the `serialport` crate.
///
/// The port is dropped (and so closed by the OS) on `close()`.
pub struct SerialPortConnection {
    name: PortId,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialPortConnection {
    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::AlreadyClosed)
    }
}

impl SerialConnection for SerialPortConnection {
    fn set_control_line(&mut self, line: ControlLine, active: bool) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        let result = match line {
            ControlLine::Dtr => port.write_data_terminal_ready(active),
            ControlLine::Rts => port.write_request_to_send(active),
        };
        result.map_err(|e| TransportError::Io(format!("{line} write failed: {e}")))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.port.take() {
            Some(_) => {
                log::debug!("Closed serial port {}", self.name);
                Ok(())
            }
            None => Err(TransportError::AlreadyClosed),
        }
    }

    fn is_open(&self) -> bool {
        // An unplugged USB adapter keeps its descriptor but fails every ioctl.
        self.port
            .as_ref()
            .is_some_and(|port| port.bytes_to_read().is_ok())
    }

    fn port_name(&self) -> PortId {
        self.name.clone()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        use std::io::Write;
        self.port_mut()?
            .write(data)
            .map_err(|e| TransportError::Io(format!("Write failed: {e}")))
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        use std::io::Read;
        self.port_mut()?
            .read(buffer)
            .map_err(|e| TransportError::Io(format!("Read failed: {e}")))
    }
}
