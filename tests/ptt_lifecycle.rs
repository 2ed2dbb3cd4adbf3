//! Integration tests: PttController lifecycle in exclusive and shared mode
//!
//! These tests verify the full path from a PTT profile or controller down
//! to the DTR/RTS pin without real hardware, using `MockSerial` to record
//! every line change with a timestamp.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pttlink_lib::adapters::MockSerial;
use pttlink_lib::domain::{ControlLine, PortId, PttConfig, PttError, PttType, TransportError};
use pttlink_lib::ptt::{PttState, DEFAULT_DELAY_MS};
use pttlink_lib::{build_ptt, LineSelector, PortHandle, PttController, SharedPortRegistry};

fn exclusive_ptt(mock: &MockSerial, port: &str, delay_ms: u64) -> PttController {
    PttController::exclusive(port, Arc::new(mock.clone()), LineSelector::Primary, delay_ms)
}

/// connect() then is_connected() is true when the open succeeds.
#[test]
fn exclusive_connect_reports_connected() {
    let mock = MockSerial::with_ports(["COM3"]);
    let mut ptt = exclusive_ptt(&mock, "COM3", DEFAULT_DELAY_MS);
    assert!(!ptt.is_connected());
    ptt.connect().unwrap();
    assert!(ptt.is_connected());
    assert!(!mock.line_state("COM3", ControlLine::Dtr));
}

/// A failing open surfaces PortUnavailable and leaks nothing.
#[test]
fn exclusive_connect_failure_leaks_nothing() {
    let mock = MockSerial::with_ports(["COM3"]);
    mock.fail_open("COM3", TransportError::PermissionDenied);
    let mut ptt = exclusive_ptt(&mock, "COM3", 0);

    assert!(matches!(
        ptt.connect(),
        Err(PttError::PortUnavailable {
            source: TransportError::PermissionDenied,
            ..
        })
    ));
    assert!(!ptt.is_connected());
    assert!(ptt.handle().is_none());
    assert!(!mock.is_open("COM3"));
}

/// connect → disconnect → connect reopens the port.
#[test]
fn reconnect_after_disconnect_reopens() {
    let mock = MockSerial::with_ports(["COM3"]);
    let mut ptt = exclusive_ptt(&mock, "COM3", 0);
    ptt.connect().unwrap();
    ptt.disconnect();
    assert!(!ptt.is_connected());
    assert!(!mock.is_open("COM3"));

    ptt.connect().unwrap();
    assert!(ptt.is_connected());
    assert_eq!(mock.open_count("COM3"), 2);
    assert_eq!(mock.close_count("COM3"), 1);
}

/// on() asserts only after the delay; off() asserts at once.
#[test]
fn on_waits_for_delay_off_is_immediate() {
    let mock = MockSerial::with_ports(["COM3"]);
    let mut ptt = exclusive_ptt(&mock, "COM3", 80);
    ptt.connect().unwrap();

    let called = Instant::now();
    ptt.on();
    let keyed = mock.line_events("COM3").last().copied().unwrap();
    assert!(keyed.active);
    assert!(keyed.at.duration_since(called) >= Duration::from_millis(80));

    let called = Instant::now();
    ptt.off();
    let released = mock.line_events("COM3").last().copied().unwrap();
    assert!(!released.active);
    assert!(released.at.duration_since(called) < Duration::from_millis(40));
}

/// Every on() pays the full delay, even when already keyed.
#[test]
fn repeated_on_pays_delay_each_time() {
    let mock = MockSerial::with_ports(["COM3"]);
    let mut ptt = exclusive_ptt(&mock, "COM3", 40);
    ptt.connect().unwrap();
    ptt.on();
    let start = Instant::now();
    ptt.on();
    assert!(start.elapsed() >= Duration::from_millis(40));
    ptt.off();
}

/// Two shared controllers on one handle: the port lives until the last one
/// lets go.
#[test]
fn two_shared_controllers_on_com3() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let opened = registry.acquire("COM3").unwrap();

    let mut a = PttController::shared(
        Arc::clone(&registry),
        opened.clone(),
        LineSelector::Primary,
        0,
    );
    let mut b = PttController::shared(
        Arc::clone(&registry),
        opened.clone(),
        LineSelector::Secondary,
        0,
    );
    a.connect().unwrap();
    b.connect().unwrap();
    assert_eq!(a.state(), PttState::Connected);
    assert_eq!(b.state(), PttState::Connected);

    // The opener hands the port over to the two PTTs
    registry.release(&opened).unwrap();
    assert!(mock.is_open("COM3"));

    a.disconnect();
    assert!(mock.is_open("COM3"));
    assert!(b.is_connected());

    b.disconnect();
    assert!(!mock.is_open("COM3"));
    assert_eq!(mock.open_count("COM3"), 1);
    assert_eq!(mock.close_count("COM3"), 1);
}

/// One controller waiting out its delay does not hold up the other owners
/// of the same port.
#[test]
fn on_delay_does_not_block_other_owners() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let radio = registry.acquire("COM3").unwrap();

    let mut slow =
        PttController::shared(Arc::clone(&registry), radio.clone(), LineSelector::Primary, 400);
    let mut fast =
        PttController::shared(Arc::clone(&registry), radio.clone(), LineSelector::Secondary, 0);
    slow.connect().unwrap();
    fast.connect().unwrap();

    let slow_thread = std::thread::spawn(move || {
        slow.on();
        slow
    });
    std::thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    fast.on();
    radio.write(b"FA;").unwrap();
    let extra = registry.acquire("COM3").unwrap();
    registry.release(&extra).unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));
    assert!(mock.line_state("COM3", ControlLine::Rts));
    assert!(!mock.line_state("COM3", ControlLine::Dtr));

    let mut slow = slow_thread.join().unwrap();
    assert!(mock.line_state("COM3", ControlLine::Dtr));

    slow.off();
    fast.off();
    slow.disconnect();
    fast.disconnect();
    registry.release(&radio).unwrap();
    assert!(!mock.is_open("COM3"));
}

/// Shared mode with no handle, or a closed one, is InvalidSharedHandle.
#[test]
fn shared_mode_rejects_missing_or_closed_handle() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));

    let mut none = PttController::shared(
        Arc::clone(&registry),
        None::<PortHandle>,
        LineSelector::Primary,
        0,
    );
    assert!(matches!(none.connect(), Err(PttError::InvalidSharedHandle(_))));

    let handle = registry.acquire("COM3").unwrap();
    registry.release(&handle).unwrap();
    let mut closed =
        PttController::shared(Arc::clone(&registry), handle, LineSelector::Primary, 0);
    assert!(matches!(closed.connect(), Err(PttError::InvalidSharedHandle(_))));
}

/// A shared port opened outside the registry cannot be borrowed.
#[test]
fn shared_mode_rejects_untracked_handle() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let foreign = PortHandle::open(&mock, &PortId::new("COM3")).unwrap();
    let mut ptt = PttController::shared(registry, foreign.clone(), LineSelector::Primary, 0);
    assert!(matches!(ptt.connect(), Err(PttError::InvalidSharedHandle(_))));
    assert!(foreign.is_open());
}

/// Line failure during a shared connect does not close the radio's port.
#[test]
fn shared_line_failure_keeps_port_open() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let radio = registry.acquire("COM3").unwrap();
    mock.fail_line_writes("COM3", true);

    let mut ptt =
        PttController::shared(Arc::clone(&registry), radio.clone(), LineSelector::Primary, 0);
    assert!(matches!(ptt.connect(), Err(PttError::LineControlFailed { .. })));
    assert!(mock.is_open("COM3"));
    assert_eq!(registry.refcount(radio.id()), 1);
    assert_eq!(mock.close_count("COM3"), 0);
}

/// The radio side can attach its port after the PTT was configured.
#[test]
fn shared_ptt_reads_provider_slot_on_connect() {
    let mock = MockSerial::with_ports(["COM3"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let radio_slot: Arc<Mutex<Option<PortHandle>>> = Arc::new(Mutex::new(None));
    let mut ptt = PttController::shared(
        Arc::clone(&registry),
        Arc::clone(&radio_slot),
        LineSelector::Primary,
        0,
    );
    assert!(ptt.connect().is_err());

    *radio_slot.lock().unwrap() = Some(registry.acquire("COM3").unwrap());
    ptt.connect().unwrap();
    ptt.on();
    assert!(mock.line_state("COM3", ControlLine::Dtr));
    ptt.off();
    ptt.disconnect();
    assert!(mock.is_open("COM3"));
}

/// PTT driven from several threads through a Mutex, as an app would hold it.
#[test]
fn controller_behind_mutex_serves_several_threads() {
    let mock = MockSerial::with_ports(["COM3"]);
    let ptt = Arc::new(Mutex::new(exclusive_ptt(&mock, "COM3", 0)));
    ptt.lock().unwrap().connect().unwrap();

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let ptt = Arc::clone(&ptt);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let mut guard = ptt.lock().unwrap();
                    guard.on();
                    guard.off();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert!(!mock.line_state("COM3", ControlLine::Dtr));
    assert!(!ptt.lock().unwrap().is_transmitting());
}

/// A profile loaded from disk drives the right line with its timing.
#[test]
fn profile_builds_working_ptt() {
    let mock = MockSerial::with_ports(["/dev/ttyUSB0"]);
    let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
    let config: PttConfig = serde_json::from_str(
        r#"{"name":"Field","ptt_type":"RTS","port":"/dev/ttyUSB0","delay_ms":0}"#,
    )
    .unwrap();
    assert_eq!(config.ptt_type, PttType::Rts);

    let mut ptt = build_ptt(&config, &registry, None).unwrap();
    ptt.connect().unwrap();
    ptt.on();
    assert!(ptt.is_transmitting());
    assert!(mock.line_state("/dev/ttyUSB0", ControlLine::Rts));
    ptt.off();
    ptt.disconnect();
    assert!(!ptt.is_connected());
    assert!(!mock.is_open("/dev/ttyUSB0"));
}
