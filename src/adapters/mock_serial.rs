//! In-memory serial transport for development and testing without hardware.
//!
//! Activate from the CLI by setting MOCK_SERIAL=1 (or passing `--mock`):
//!
//!   MOCK_SERIAL=1 RUST_LOG=pttlink_lib=debug pttlink key --port COM3
//!
//! Every control-line write is logged at INFO level and recorded with a
//! timestamp, so tests can check exactly what the PTT would have done to a
//! real DTR/RTS pin. Like the OS, a port can only be open once at a time;
//! a second open reports `Busy`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::{ControlLine, PortId, SerialPortInfo, TransportError};
use crate::ports::{SerialConnection, SerialFactory};

/// One recorded control-line write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub line: ControlLine,
    pub active: bool,
    pub at: Instant,
}

#[derive(Default)]
struct MockPort {
    open: bool,
    /// Bumped on every open and unplug so stale connections notice
    generation: u64,
    opens: usize,
    closes: usize,
    dtr: bool,
    rts: bool,
    events: Vec<LineEvent>,
    fail_open: Option<TransportError>,
    fail_lines: bool,
    written: Vec<u8>,
    rx: VecDeque<u8>,
}

#[derive(Default)]
struct MockState {
    ports: BTreeMap<PortId, MockPort>,
    open_delay: Duration,
}

/// Cloneable handle onto a set of fake serial devices.
#[derive(Clone, Default)]
pub struct MockSerial {
    state: Arc<Mutex<MockState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with the given devices plugged in.
    pub fn with_ports<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PortId>,
    {
        let mock = Self::new();
        for name in names {
            mock.add_port(name);
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_port<T>(&self, name: &str, f: impl FnOnce(&mut MockPort) -> T) -> Option<T> {
        self.lock().ports.get_mut(&PortId::new(name)).map(f)
    }

    /// Plug in a device
    pub fn add_port(&self, name: impl Into<PortId>) {
        self.lock().ports.entry(name.into()).or_default();
    }

    /// Make every subsequent open of `name` fail with `err`
    pub fn fail_open(&self, name: &str, err: TransportError) {
        self.with_port(name, |p| p.fail_open = Some(err));
    }

    /// Make DTR/RTS writes on `name` fail (or succeed again)
    pub fn fail_line_writes(&self, name: &str, fail: bool) {
        self.with_port(name, |p| p.fail_lines = fail);
    }

    /// Slow every open down, to widen race windows in concurrency tests
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    /// Simulate the USB adapter being pulled: open connections go dead.
    pub fn unplug(&self, name: &str) {
        self.with_port(name, |p| {
            if p.open {
                log::info!("[MOCK SERIAL] {name} unplugged");
            }
            p.open = false;
            p.generation += 1;
        });
    }

    /// Queue bytes for the next `read()` on `name`
    pub fn queue_response(&self, name: &str, bytes: &[u8]) {
        self.with_port(name, |p| p.rx.extend(bytes.iter().copied()));
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.with_port(name, |p| p.open).unwrap_or(false)
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.with_port(name, |p| p.opens).unwrap_or(0)
    }

    pub fn close_count(&self, name: &str) -> usize {
        self.with_port(name, |p| p.closes).unwrap_or(0)
    }

    /// Current level of a control line
    pub fn line_state(&self, name: &str, line: ControlLine) -> bool {
        self.with_port(name, |p| match line {
            ControlLine::Dtr => p.dtr,
            ControlLine::Rts => p.rts,
        })
        .unwrap_or(false)
    }

    /// Every control-line write on `name`, oldest first
    pub fn line_events(&self, name: &str) -> Vec<LineEvent> {
        self.with_port(name, |p| p.events.clone()).unwrap_or_default()
    }

    /// Everything written to `name` through `SerialConnection::write`
    pub fn written(&self, name: &str) -> Vec<u8> {
        self.with_port(name, |p| p.written.clone()).unwrap_or_default()
    }
}

impl SerialFactory for MockSerial {
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>, TransportError> {
        Ok(self
            .lock()
            .ports
            .keys()
            .map(|id| SerialPortInfo {
                name: id.to_string(),
                port_type: "Mock".to_string(),
            })
            .collect())
    }

    fn open(&self, port: &PortId) -> Result<Box<dyn SerialConnection>, TransportError> {
        let delay = self.lock().open_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.lock();
        let entry = state.ports.get_mut(port).ok_or(TransportError::NotFound)?;
        if let Some(err) = &entry.fail_open {
            return Err(err.clone());
        }
        if entry.open {
            return Err(TransportError::Busy);
        }
        entry.open = true;
        entry.generation += 1;
        entry.opens += 1;
        log::info!("[MOCK SERIAL] OPEN  {port}");

        Ok(Box::new(MockConnection {
            mock: self.clone(),
            name: port.clone(),
            generation: entry.generation,
            closed: false,
        }))
    }
}

/// One open connection onto a `MockSerial` device.
struct MockConnection {
    mock: MockSerial,
    name: PortId,
    generation: u64,
    closed: bool,
}

impl MockConnection {
    /// Run `f` against the device if this connection is still live.
    fn live<T>(
        &self,
        f: impl FnOnce(&mut MockPort) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        if self.closed {
            return Err(TransportError::AlreadyClosed);
        }
        let mut state = self.mock.lock();
        match state.ports.get_mut(&self.name) {
            Some(port) if port.open && port.generation == self.generation => f(port),
            _ => Err(TransportError::Io("device disconnected".to_string())),
        }
    }
}

impl SerialConnection for MockConnection {
    fn set_control_line(&mut self, line: ControlLine, active: bool) -> Result<(), TransportError> {
        let name = self.name.clone();
        self.live(|port| {
            if port.fail_lines {
                return Err(TransportError::Io(format!("{line} write failed")));
            }
            match line {
                ControlLine::Dtr => port.dtr = active,
                ControlLine::Rts => port.rts = active,
            }
            port.events.push(LineEvent {
                line,
                active,
                at: Instant::now(),
            });
            log::info!("[MOCK SERIAL] {name} {line}={}", if active { "ON " } else { "OFF" });
            Ok(())
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::AlreadyClosed);
        }
        self.closed = true;
        let mut state = self.mock.lock();
        if let Some(port) = state.ports.get_mut(&self.name) {
            port.closes += 1;
            if port.generation == self.generation {
                port.open = false;
                port.dtr = false;
                port.rts = false;
            }
        }
        log::info!("[MOCK SERIAL] CLOSE {}", self.name);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.live(|_| Ok(())).is_ok()
    }

    fn port_name(&self) -> PortId {
        self.name.clone()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.live(|port| {
            port.written.extend_from_slice(data);
            Ok(data.len())
        })
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        self.live(|port| {
            let n = port.rx.len().min(buffer.len());
            for (slot, byte) in buffer.iter_mut().zip(port.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_unknown_port_is_not_found() {
        let mock = MockSerial::new();
        assert_eq!(
            mock.open(&PortId::new("COM9")).err(),
            Some(TransportError::NotFound)
        );
    }

    #[test]
    fn second_open_reports_busy() {
        let mock = MockSerial::with_ports(["COM3"]);
        let _first = mock.open(&PortId::new("COM3")).unwrap();
        assert_eq!(mock.open(&PortId::new("COM3")).err(), Some(TransportError::Busy));
        assert_eq!(mock.open_count("COM3"), 1);
    }

    #[test]
    fn close_twice_reports_already_closed() {
        let mock = MockSerial::with_ports(["COM3"]);
        let mut conn = mock.open(&PortId::new("COM3")).unwrap();
        assert!(conn.close().is_ok());
        assert_eq!(conn.close(), Err(TransportError::AlreadyClosed));
        assert_eq!(mock.close_count("COM3"), 1);
        assert!(!mock.is_open("COM3"));
    }

    #[test]
    fn line_writes_are_recorded() {
        let mock = MockSerial::with_ports(["COM3"]);
        let mut conn = mock.open(&PortId::new("COM3")).unwrap();
        conn.set_control_line(ControlLine::Rts, true).unwrap();
        assert!(mock.line_state("COM3", ControlLine::Rts));
        assert!(!mock.line_state("COM3", ControlLine::Dtr));
        let events = mock.line_events("COM3");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line, ControlLine::Rts);
        assert!(events[0].active);
    }

    #[test]
    fn unplug_kills_live_connection() {
        let mock = MockSerial::with_ports(["COM3"]);
        let mut conn = mock.open(&PortId::new("COM3")).unwrap();
        assert!(conn.is_open());
        mock.unplug("COM3");
        assert!(!conn.is_open());
        assert!(conn.set_control_line(ControlLine::Dtr, true).is_err());
    }

    #[test]
    fn cat_bytes_round_trip_through_connection() {
        let mock = MockSerial::with_ports(["COM3"]);
        let mut conn = mock.open(&PortId::new("COM3")).unwrap();
        conn.write(b"FA;").unwrap();
        mock.queue_response("COM3", b"FA00014070000;");
        let mut buf = [0u8; 32];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"FA00014070000;");
        assert_eq!(mock.written("COM3"), b"FA;");
    }
}
