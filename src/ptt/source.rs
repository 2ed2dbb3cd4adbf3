//! Where a PTT or keyer gets its port from.
//!
//! Exclusive sources open and close the port themselves. Shared sources
//! take a reference on a handle some other client (usually radio control)
//! already holds through the registry, and only ever give that reference
//! back; the registry decides when the port really closes.

use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{PortId, PttError, PttResult, TransportError};
use crate::ports::SerialFactory;
use crate::share::{PortHandle, SharedPortRegistry};

/// Supplies the already-open handle a shared-mode client should use.
pub trait SharedHandleProvider: Send + Sync {
    fn shared_handle(&self) -> Option<PortHandle>;
}

impl SharedHandleProvider for PortHandle {
    fn shared_handle(&self) -> Option<PortHandle> {
        Some(self.clone())
    }
}

impl SharedHandleProvider for Option<PortHandle> {
    fn shared_handle(&self) -> Option<PortHandle> {
        self.clone()
    }
}

/// A slot the radio-control side fills in once its port is open.
impl SharedHandleProvider for Mutex<Option<PortHandle>> {
    fn shared_handle(&self) -> Option<PortHandle> {
        self.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl<T: SharedHandleProvider + ?Sized> SharedHandleProvider for Arc<T> {
    fn shared_handle(&self) -> Option<PortHandle> {
        (**self).shared_handle()
    }
}

/// Ownership mode of a PTT or keyer port
#[derive(Clone)]
pub enum PortSource {
    /// Open `port` privately on connect, close it on disconnect
    Exclusive {
        port: PortId,
        factory: Arc<dyn SerialFactory>,
    },
    /// Borrow a registry-tracked handle from `provider`
    Shared {
        registry: Arc<SharedPortRegistry>,
        provider: Arc<dyn SharedHandleProvider>,
    },
}

impl PortSource {
    pub fn exclusive(port: impl Into<PortId>, factory: Arc<dyn SerialFactory>) -> Self {
        PortSource::Exclusive {
            port: port.into(),
            factory,
        }
    }

    pub fn shared(
        registry: Arc<SharedPortRegistry>,
        provider: impl SharedHandleProvider + 'static,
    ) -> Self {
        PortSource::Shared {
            registry,
            provider: Arc::new(provider),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, PortSource::Shared { .. })
    }

    /// Get a usable handle: opened (exclusive) or retained (shared).
    pub(crate) fn bind(&self) -> PttResult<PortHandle> {
        match self {
            PortSource::Exclusive { port, factory } => PortHandle::open(factory.as_ref(), port),
            PortSource::Shared { registry, provider } => {
                let handle = provider.shared_handle().ok_or_else(|| {
                    PttError::InvalidSharedHandle("no shared port has been supplied".to_string())
                })?;
                if !handle.is_open() {
                    return Err(PttError::InvalidSharedHandle(format!(
                        "{} is not open",
                        handle.id()
                    )));
                }
                registry
                    .retain(&handle)
                    .map_err(|e| PttError::InvalidSharedHandle(format!("{}: {e}", handle.id())))?;
                Ok(handle)
            }
        }
    }

    /// Give a bound handle back. Failures are logged, never returned.
    pub(crate) fn unbind(&self, handle: &PortHandle) {
        match self {
            PortSource::Exclusive { .. } => match handle.close() {
                Ok(()) => {}
                Err(TransportError::AlreadyClosed) => {
                    log::warn!("Port {} was already closed", handle.id());
                }
                Err(e) => log::error!("Closing port {} failed: {e}", handle.id()),
            },
            PortSource::Shared { registry, .. } => {
                if let Err(e) = registry.release(handle) {
                    log::error!("Returning shared port {} failed: {e}", handle.id());
                }
            }
        }
    }
}
