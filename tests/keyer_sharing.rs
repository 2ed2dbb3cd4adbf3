//! Integration tests: one cable for CAT, PTT and CW
//!
//! The radio-control side opens the port through the registry; the PTT and
//! the CW keyer borrow it on different control lines.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pttlink_lib::adapters::MockSerial;
use pttlink_lib::domain::ControlLine;
use pttlink_lib::keyer::CwKeyer;
use pttlink_lib::{LineSelector, PttController, SharedPortRegistry};

fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn ptt_and_keyer_share_the_radio_port() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let radio = registry.acquire("COM3").unwrap();

    let mut ptt =
        PttController::shared(Arc::clone(&registry), radio.clone(), LineSelector::Secondary, 0);
    let mut keyer =
        CwKeyer::shared(Arc::clone(&registry), radio.clone(), LineSelector::Primary, 60).unwrap();
    ptt.connect().unwrap();
    keyer.connect().unwrap();
    assert_eq!(registry.refcount(radio.id()), 3);

    ptt.on();
    keyer.send("T").unwrap();
    assert!(wait_for(
        || mock.line_events("COM3").iter().any(|e| e.line == ControlLine::Dtr && e.active),
        Duration::from_secs(2)
    ));
    assert!(mock.line_state("COM3", ControlLine::Rts));

    ptt.off();
    ptt.disconnect();
    keyer.disconnect();
    assert_eq!(registry.refcount(radio.id()), 1);
    assert!(mock.is_open("COM3"));

    registry.release(&radio).unwrap();
    assert!(!mock.is_open("COM3"));
    assert_eq!(mock.open_count("COM3"), 1);
}
