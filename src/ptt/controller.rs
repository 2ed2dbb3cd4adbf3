//! PttController: keys a transmitter through DTR or RTS.
//!
//! Error policy:
//! - `connect()` returns every failure; nothing is retried.
//! - `disconnect()`, `on()` and `off()` log failures and return normally, so
//!   a caller can always try again to de-key the radio.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{PortId, PttError, PttResult};
use crate::ports::{PushToTalk, SerialFactory};
use crate::share::{PortHandle, SharedPortRegistry};

use super::pin::{self, LineSelector};
use super::source::{PortSource, SharedHandleProvider};

/// Default key-down settle time
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Connection lifecycle of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttState {
    Disconnected,
    Connecting,
    Connected,
}

/// DTR/RTS push-to-talk on an exclusive or shared serial port.
///
/// Not `Sync`: wrap in a `Mutex` to drive it from several threads.
pub struct PttController {
    source: PortSource,
    selector: LineSelector,
    delay: Duration,
    tail: Duration,
    state: PttState,
    bound: Option<PortHandle>,
    transmitting: bool,
}

impl PttController {
    pub fn new(source: PortSource, selector: LineSelector, delay_ms: u64) -> Self {
        Self {
            source,
            selector,
            delay: Duration::from_millis(delay_ms),
            tail: Duration::ZERO,
            state: PttState::Disconnected,
            bound: None,
            transmitting: false,
        }
    }

    /// PTT that opens `port` itself
    pub fn exclusive(
        port: impl Into<PortId>,
        factory: Arc<dyn SerialFactory>,
        selector: LineSelector,
        delay_ms: u64,
    ) -> Self {
        Self::new(PortSource::exclusive(port, factory), selector, delay_ms)
    }

    /// PTT riding on a port another client opened through `registry`
    pub fn shared(
        registry: Arc<SharedPortRegistry>,
        provider: impl SharedHandleProvider + 'static,
        selector: LineSelector,
        delay_ms: u64,
    ) -> Self {
        Self::new(PortSource::shared(registry, provider), selector, delay_ms)
    }

    /// Hold the line for `tail_ms` before `off()` drops it
    pub fn with_tail(mut self, tail_ms: u64) -> Self {
        self.tail = Duration::from_millis(tail_ms);
        self
    }

    pub fn state(&self) -> PttState {
        self.state
    }

    pub fn selector(&self) -> LineSelector {
        self.selector
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_shared(&self) -> bool {
        self.source.is_shared()
    }

    /// Handle currently bound, if connected
    pub fn handle(&self) -> Option<&PortHandle> {
        self.bound.as_ref()
    }

    pub fn connect(&mut self) -> PttResult<()> {
        if let Some(handle) = &self.bound {
            if handle.is_open() {
                return Err(PttError::AlreadyConnected(handle.id().to_string()));
            }
            log::warn!("PTT port {} went away, reconnecting", handle.id());
            self.drop_binding();
        }

        self.state = PttState::Connecting;
        let handle = match self.source.bind() {
            Ok(handle) => handle,
            Err(e) => {
                self.state = PttState::Disconnected;
                return Err(e);
            }
        };

        // Key up before anyone can key down
        if let Err(e) = pin::resolve(self.selector, &handle, false) {
            self.source.unbind(&handle);
            self.state = PttState::Disconnected;
            return Err(e);
        }

        log::info!(
            "PTT connected on {} ({}, {})",
            handle.id(),
            self.selector.line(),
            if self.source.is_shared() { "shared" } else { "exclusive" }
        );
        self.bound = Some(handle);
        self.transmitting = false;
        self.state = PttState::Connected;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.bound.is_none() {
            log::warn!("PTT already disconnected");
            self.state = PttState::Disconnected;
            return;
        }
        self.drop_binding();
        self.state = PttState::Disconnected;
    }

    /// De-key (if the port still answers) and hand the port back.
    fn drop_binding(&mut self) {
        let Some(handle) = self.bound.take() else {
            return;
        };
        if handle.is_open() {
            if let Err(e) = pin::resolve(self.selector, &handle, false) {
                log::error!("PTT OFF failed while disconnecting: {e}; transmitter may still be keyed");
            }
        }
        self.transmitting = false;
        self.source.unbind(&handle);
        log::info!("PTT disconnected from {}", handle.id());
    }

    /// Wait the settle delay, then key the transmitter.
    ///
    /// The delay is paid on every call, even if the line is already active.
    pub fn on(&mut self) {
        let Some(handle) = self.bound.clone() else {
            log::warn!("PTT ON ignored: not connected");
            return;
        };
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match pin::resolve(self.selector, &handle, true) {
            Ok(()) => {
                self.transmitting = true;
                log::debug!("ptt.ON {}", handle.id());
            }
            Err(e) => log::warn!("PTT ON failed: {e}"),
        }
    }

    /// De-key the transmitter (after the tail, if one is configured).
    pub fn off(&mut self) {
        let Some(handle) = self.bound.clone() else {
            log::warn!("PTT OFF ignored: not connected");
            return;
        };
        if !self.tail.is_zero() {
            std::thread::sleep(self.tail);
        }
        match pin::resolve(self.selector, &handle, false) {
            Ok(()) => {
                self.transmitting = false;
                log::debug!("ptt.OFF {}", handle.id());
            }
            Err(e) => log::error!("PTT OFF failed: {e}; transmitter may still be keyed"),
        }
    }

    /// Bound and the transport still reports the port open.
    pub fn is_connected(&self) -> bool {
        self.bound.as_ref().is_some_and(PortHandle::is_open)
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }
}

impl PushToTalk for PttController {
    fn connect(&mut self) -> PttResult<()> {
        PttController::connect(self)
    }

    fn disconnect(&mut self) {
        PttController::disconnect(self)
    }

    fn on(&mut self) {
        PttController::on(self)
    }

    fn off(&mut self) {
        PttController::off(self)
    }

    fn is_connected(&self) -> bool {
        PttController::is_connected(self)
    }

    fn is_transmitting(&self) -> bool {
        PttController::is_transmitting(self)
    }
}

/// Safety: release PTT if the controller is dropped while transmitting.
/// Retries with increasing delays in case the adapter is momentarily busy,
/// then gives the port back.
impl Drop for PttController {
    fn drop(&mut self) {
        if self.transmitting {
            if let Some(handle) = &self.bound {
                for delay_ms in [0, 10, 50] {
                    if delay_ms > 0 {
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                    if pin::resolve(self.selector, handle, false).is_ok() {
                        self.transmitting = false;
                        break;
                    }
                }
                if self.transmitting {
                    log::error!(
                        "CRITICAL: Failed to release PTT on {}. Radio may still be transmitting!",
                        handle.id()
                    );
                }
            }
        }
        if self.bound.is_some() {
            self.drop_binding();
        }
    }
}
