//! SharedPortRegistry: reference-counted ownership of open serial ports.
//!
//! Locking is two-level. The table lock only guards the map from port name
//! to slot and is never held across I/O. Each slot has its own lock, held
//! while that port is opened or closed, so two acquires of the same port
//! cannot both open it while acquires of different ports run in parallel.
//!
//! Lock order is slot then table, never the reverse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::adapters::SerialPortFactory;
use crate::domain::{PortId, PttError, PttResult};
use crate::ports::SerialFactory;

use super::PortHandle;

#[derive(Default)]
struct SlotState {
    handle: Option<PortHandle>,
    refcount: usize,
    /// Removed from the table; whoever still holds this slot must look again
    retired: bool,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide table of shared serial ports.
pub struct SharedPortRegistry {
    factory: Arc<dyn SerialFactory>,
    table: Mutex<HashMap<PortId, Arc<Slot>>>,
}

static GLOBAL: OnceLock<Arc<SharedPortRegistry>> = OnceLock::new();

impl SharedPortRegistry {
    pub fn new(factory: Arc<dyn SerialFactory>) -> Self {
        Self {
            factory,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// The registry every component in this process shares, backed by real
    /// serial hardware.
    pub fn global() -> Arc<SharedPortRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(SharedPortRegistry::new(Arc::new(SerialPortFactory))))
            .clone()
    }

    /// Transport used to open ports
    pub fn factory(&self) -> Arc<dyn SerialFactory> {
        Arc::clone(&self.factory)
    }

    fn slot_for(&self, id: &PortId) -> Arc<Slot> {
        let mut table = lock(&self.table);
        Arc::clone(table.entry(id.clone()).or_default())
    }

    fn existing_slot(&self, id: &PortId) -> Option<Arc<Slot>> {
        lock(&self.table).get(id).cloned()
    }

    fn remove_slot(&self, id: &PortId, slot: &Arc<Slot>) {
        let mut table = lock(&self.table);
        if table.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            table.remove(id);
        }
    }

    /// Get an open handle for `id`, opening the port on first use.
    ///
    /// Every successful call must be paired with one `release`.
    pub fn acquire(&self, id: impl Into<PortId>) -> PttResult<PortHandle> {
        let id = id.into();
        loop {
            let slot = self.slot_for(&id);
            let mut guard = lock(&slot.state);
            let entry = &mut *guard;
            if entry.retired {
                continue;
            }

            if let Some(handle) = &entry.handle {
                entry.refcount += 1;
                log::debug!("Shared port {id} acquired (refcount {})", entry.refcount);
                return Ok(handle.clone());
            }

            return match PortHandle::open(self.factory.as_ref(), &id) {
                Ok(handle) => {
                    entry.handle = Some(handle.clone());
                    entry.refcount = 1;
                    log::info!("Shared port {id} opened");
                    Ok(handle)
                }
                Err(e) => {
                    entry.retired = true;
                    self.remove_slot(&id, &slot);
                    log::warn!("Shared port {id} could not be opened: {e}");
                    Err(e)
                }
            };
        }
    }

    /// Add a reference to a handle this registry already tracks.
    pub fn retain(&self, handle: &PortHandle) -> PttResult<()> {
        let id = handle.id();
        let slot = self
            .existing_slot(id)
            .ok_or_else(|| Self::untracked(handle))?;
        let mut guard = lock(&slot.state);
        let entry = &mut *guard;
        if !entry.handle.as_ref().is_some_and(|h| h.same_as(handle)) {
            return Err(Self::untracked(handle));
        }
        if entry.refcount == 0 {
            return Err(PttError::AlreadyReleased(id.to_string()));
        }
        entry.refcount += 1;
        log::debug!("Shared port {id} retained (refcount {})", entry.refcount);
        Ok(())
    }

    /// Drop one reference. The last release closes the port.
    ///
    /// Releasing a handle this registry never handed out is `UnknownHandle`;
    /// releasing one it has already closed is `AlreadyReleased`. Neither
    /// touches any tracked entry.
    pub fn release(&self, handle: &PortHandle) -> PttResult<()> {
        let id = handle.id();
        let slot = self
            .existing_slot(id)
            .ok_or_else(|| Self::untracked(handle))?;
        let mut guard = lock(&slot.state);
        let entry = &mut *guard;
        if !entry.handle.as_ref().is_some_and(|h| h.same_as(handle)) {
            return Err(Self::untracked(handle));
        }

        match entry.refcount {
            0 => Err(PttError::AlreadyReleased(id.to_string())),
            1 => {
                if let Err(e) = handle.close() {
                    log::warn!("Shared port {id} close reported: {e}");
                }
                handle.retire();
                entry.refcount = 0;
                entry.handle = None;
                entry.retired = true;
                self.remove_slot(id, &slot);
                log::info!("Shared port {id} closed");
                Ok(())
            }
            n => {
                entry.refcount = n - 1;
                log::debug!("Shared port {id} released (refcount {})", entry.refcount);
                Ok(())
            }
        }
    }

    fn untracked(handle: &PortHandle) -> PttError {
        if handle.is_retired() {
            PttError::AlreadyReleased(handle.id().to_string())
        } else {
            PttError::UnknownHandle(handle.id().to_string())
        }
    }

    /// Number of owners currently holding `id` (0 if untracked)
    pub fn refcount(&self, id: &PortId) -> usize {
        self.existing_slot(id)
            .map(|slot| lock(&slot.state).refcount)
            .unwrap_or(0)
    }

    pub fn is_tracked(&self, id: &PortId) -> bool {
        self.refcount(id) > 0
    }

    /// Ports currently held open, sorted by name
    pub fn tracked_ports(&self) -> Vec<PortId> {
        let mut ports: Vec<PortId> = lock(&self.table).keys().cloned().collect();
        ports.retain(|id| self.is_tracked(id));
        ports.sort();
        ports
    }
}
