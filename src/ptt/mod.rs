//! Push-to-talk over serial control lines.
//!
//! - `pin`: Primary/Secondary selector → DTR/RTS
//! - `source`: exclusive vs. shared port ownership
//! - `controller`: the connect/on/off state machine

pub mod controller;
pub mod pin;
pub mod source;

use std::sync::Arc;

pub use controller::{PttController, PttState, DEFAULT_DELAY_MS};
pub use pin::LineSelector;
pub use source::{PortSource, SharedHandleProvider};

use crate::domain::{PttConfig, PttResult};
use crate::ports::PushToTalk;
use crate::share::{PortHandle, SharedPortRegistry};

/// PTT for stations without a hardware key line (VOX, or none at all).
#[derive(Debug, Default)]
pub struct NoPtt {
    connected: bool,
    transmitting: bool,
}

impl PushToTalk for NoPtt {
    fn connect(&mut self) -> PttResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.transmitting = false;
    }

    fn on(&mut self) {
        log::debug!("ptt.ON (no hardware PTT)");
        self.transmitting = self.connected;
    }

    fn off(&mut self) {
        log::debug!("ptt.OFF (no hardware PTT)");
        self.transmitting = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_transmitting(&self) -> bool {
        self.transmitting
    }
}

/// Build the PTT a profile asks for.
///
/// Shared profiles key through `shared`, the handle the radio-control side
/// holds; exclusive profiles open their own port on `registry`'s transport.
/// Nothing is opened until `connect()`.
pub fn build_ptt(
    config: &PttConfig,
    registry: &Arc<SharedPortRegistry>,
    shared: Option<PortHandle>,
) -> PttResult<Box<dyn PushToTalk>> {
    config.validate()?;
    let Some(selector) = LineSelector::for_ptt_type(config.ptt_type) else {
        return Ok(Box::new(NoPtt::default()));
    };

    let controller = if config.share_port {
        PttController::shared(Arc::clone(registry), shared, selector, config.delay_ms)
    } else {
        // validate() guarantees a port for exclusive hardware PTT
        let port = config.port.clone().unwrap_or_default();
        PttController::exclusive(port, registry.factory(), selector, config.delay_ms)
    };
    Ok(Box::new(controller.with_tail(config.tail_ms)))
}
