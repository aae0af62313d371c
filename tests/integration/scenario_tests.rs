//! End-to-end mission scenarios driven through the event bus.

use biotag::app::events::AppEvent;
use biotag::app::ports::Peripheral;
use biotag::events::Signal;
use biotag::fsm::Mode;
use biotag::lifecycle::LifecycleState;

use crate::mock_tasks::{CAPTURE, Call, Harness};

// ── Scenario 1: zone exit, then recovery by USB ───────────────

#[test]
fn geofence_exit_then_usb_ends_in_offload() {
    let mut h = Harness::started();
    assert_eq!(h.controller.mode(), Mode::DataCapture);
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Running);
    }

    h.tx.signal(Signal::GeofenceExit);
    h.pump();
    assert_eq!(h.controller.mode(), Mode::Recovery);
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Terminated);
    }
    assert_eq!(h.state_of("aprs"), LifecycleState::Running);
    assert_eq!(h.starts_of("aprs"), 1);
    // The unselected beacon is never touched.
    assert_eq!(h.state_of("fishtracker"), LifecycleState::Dormant);

    h.tx.signal(Signal::UsbConnected);
    h.pump();
    assert_eq!(h.controller.mode(), Mode::Offload);
    assert_eq!(h.state_of("aprs"), LifecycleState::Terminated);
    let ctx = h.controller.context();
    assert_eq!(ctx.storage_clock_div, ctx.config.offload_sd_clk_div);

    assert_eq!(
        h.sink.events,
        vec![
            AppEvent::Started(Mode::DataCapture),
            AppEvent::ModeChanged {
                from: Mode::DataCapture,
                to: Mode::Recovery,
                signal: Signal::GeofenceExit,
            },
            AppEvent::ModeChanged {
                from: Mode::Recovery,
                to: Mode::Offload,
                signal: Signal::UsbConnected,
            },
        ]
    );
}

#[test]
fn capture_is_terminated_before_beacon_starts() {
    let mut h = Harness::started();
    h.clear_calls();

    h.tx.signal(Signal::GeofenceExit);
    h.pump();

    let beacon_start = h.position(Call::Start("aprs"));
    assert!(h.position(Call::RequestStop("audio")) < beacon_start);
    assert!(h.position(Call::RequestStop("imu")) < beacon_start);
    assert!(h.position(Call::Kill("gps")) < beacon_start);
}

#[test]
fn forced_stop_is_followed_by_peripheral_quiesce() {
    let mut h = Harness::started();
    h.clear_calls();

    h.tx.signal(Signal::GeofenceExit);
    h.pump();

    let calls = h.calls();
    let kill = h.position(Call::Kill("gps"));
    assert_eq!(calls[kill + 1], Call::Quiesce(Peripheral::GpsUart));
    // Cooperative tasks release their own peripherals.
    assert!(!calls.contains(&Call::Quiesce(Peripheral::AudioSai)));
    assert!(!calls.contains(&Call::Kill("audio")));
}

// ── Scenario 2: USB during capture ────────────────────────────

#[test]
fn usb_in_capture_pauses_then_geofence_is_ignored() {
    let mut h = Harness::started();
    h.clear_calls();

    h.tx.signal(Signal::UsbConnected);
    h.pump();
    assert_eq!(h.controller.mode(), Mode::Offload);
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Suspended);
    }
    assert_eq!(
        h.calls(),
        vec![
            Call::Suspend("audio"),
            Call::Suspend("imu"),
            Call::Suspend("gps"),
            Call::StorageClock(8),
        ]
    );

    h.clear_calls();
    h.tx.signal(Signal::GeofenceExit);
    h.pump();
    assert_eq!(h.controller.mode(), Mode::Offload);
    assert!(h.calls().is_empty());
    assert_eq!(
        h.sink.events.last(),
        Some(&AppEvent::Ignored {
            signal: Signal::GeofenceExit,
            mode: Mode::Offload,
        })
    );
}

#[test]
fn paused_capture_resumes_without_restarting() {
    let mut h = Harness::started();
    h.tx.signal(Signal::UsbConnected);
    h.pump();

    h.controller
        .force_transition(Mode::DataCapture, &mut h.sink)
        .unwrap();
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Running);
        assert_eq!(h.starts_of(name), 1);
    }
    let ctx = h.controller.context();
    assert_eq!(ctx.storage_clock_div, ctx.config.normal_sd_clk_div);
}

// ── Boundary: both signals in one wake ────────────────────────

#[test]
fn geofence_and_usb_in_one_wake_pass_through_recovery() {
    let mut h = Harness::started();
    h.tx.signal(Signal::UsbConnected);
    h.tx.signal(Signal::GeofenceExit);
    h.pump();

    assert_eq!(h.controller.wakes(), 1);
    assert_eq!(h.controller.mode(), Mode::Offload);
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Terminated);
    }
    assert_eq!(h.starts_of("aprs"), 1);
    assert_eq!(h.state_of("aprs"), LifecycleState::Terminated);
    assert_eq!(h.controller.transitions(), 2);
}

// ── Recovery re-entry ─────────────────────────────────────────

#[test]
fn every_recovery_entry_starts_the_beacon_afresh() {
    let mut h = Harness::started();
    h.tx.signal(Signal::GeofenceExit);
    h.pump();
    assert_eq!(h.starts_of("aprs"), 1);

    // Leave and come back through the bench path.
    h.controller
        .force_transition(Mode::DataCapture, &mut h.sink)
        .unwrap();
    assert_eq!(h.state_of("aprs"), LifecycleState::Terminated);
    // Terminated capture tasks stay terminated.
    for name in CAPTURE {
        assert_eq!(h.state_of(name), LifecycleState::Terminated);
        assert_eq!(h.starts_of(name), 1);
    }

    h.controller
        .force_transition(Mode::Recovery, &mut h.sink)
        .unwrap();
    assert_eq!(h.state_of("aprs"), LifecycleState::Running);
    assert_eq!(h.starts_of("aprs"), 2);
}
