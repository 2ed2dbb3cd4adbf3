//! PortHandle: one open serial connection that several owners can hold.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ControlLine, PortId, PttError, PttResult, TransportError};
use crate::ports::{SerialConnection, SerialFactory};

struct HandleInner {
    id: PortId,
    conn: Mutex<Box<dyn SerialConnection>>,
    /// Set once the registry has closed this connection for good
    retired: AtomicBool,
}

/// Cloneable reference to an open serial connection.
///
/// Clones refer to the same connection; `same_as` compares identity, not the
/// port name, so a handle from before a close/reopen cycle is never mistaken
/// for the current one.
#[derive(Clone)]
pub struct PortHandle {
    inner: Arc<HandleInner>,
}

impl PortHandle {
    /// Open `id` directly on the transport. Failures become `PortUnavailable`.
    pub fn open(factory: &dyn SerialFactory, id: &PortId) -> PttResult<Self> {
        let conn = factory.open(id).map_err(|source| PttError::PortUnavailable {
            port: id.to_string(),
            source,
        })?;
        Ok(Self::from_connection(id.clone(), conn))
    }

    /// Wrap a connection that is already open.
    pub fn from_connection(id: PortId, conn: Box<dyn SerialConnection>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                conn: Mutex::new(conn),
                retired: AtomicBool::new(false),
            }),
        }
    }

    // A panic while holding the lock leaves the connection itself intact.
    fn conn(&self) -> MutexGuard<'_, Box<dyn SerialConnection>> {
        self.inner.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier the handle was opened (and is tracked) under
    pub fn id(&self) -> &PortId {
        &self.inner.id
    }

    /// Name reported by the transport
    pub fn port_name(&self) -> PortId {
        self.conn().port_name()
    }

    /// Live transport state, not a cached flag
    pub fn is_open(&self) -> bool {
        self.conn().is_open()
    }

    pub fn set_control_line(&self, line: ControlLine, active: bool) -> PttResult<()> {
        self.conn()
            .set_control_line(line, active)
            .map_err(|source| PttError::LineControlFailed {
                port: self.inner.id.to_string(),
                line,
                source,
            })
    }

    /// Close the underlying connection.
    ///
    /// Owners of a registry handle must go through
    /// `SharedPortRegistry::release` instead.
    pub fn close(&self) -> Result<(), TransportError> {
        self.conn().close()
    }

    /// Write raw bytes (CAT/CI-V commands) through the shared connection
    pub fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        self.conn().write(data)
    }

    /// Read raw bytes from the shared connection
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        self.conn().read(buffer)
    }

    /// True if both handles refer to the same open connection
    pub fn same_as(&self, other: &PortHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortHandle")
            .field("id", &self.inner.id)
            .field("retired", &self.is_retired())
            .finish()
    }
}
