//! Fuzz target: mode controller signal sequences
//!
//! Each input byte is one wake's worth of drained flags (undefined bits
//! are masked off).  A byte with the top bit set is instead a forced
//! transition to `byte % 3`.  Verifies:
//! - No panics and no lifecycle errors for any sequence
//! - Mode is never Simulating on the reactive path
//! - Capture tasks are never started more than once
//!
//! cargo fuzz run fuzz_signal_sequence

#![no_main]

use biotag::app::events::AppEvent;
use biotag::app::ports::{BoardPort, EventSink, Peripheral};
use biotag::app::service::ModeController;
use biotag::config::SystemConfig;
use biotag::events::{self, EventFlags};
use biotag::fsm::Mode;
use biotag::lifecycle::{
    LifecycleError, StopPolicy, TaskControl, TaskRegistry, TaskRole, TaskSpec,
};
use libfuzzer_sys::fuzz_target;

struct NullTask;

impl TaskControl for NullTask {
    fn start(&mut self) -> Result<(), LifecycleError> {
        Ok(())
    }
    fn suspend(&mut self) {}
    fn resume(&mut self) {}
    fn request_stop(&mut self) {}
    fn kill(&mut self) {}
}

struct NullBoard;

impl BoardPort for NullBoard {
    fn set_storage_clock_div(&mut self, _div: u8) {}
    fn quiesce(&mut self, _peripheral: Peripheral) {}
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut registry = TaskRegistry::new();
    for (name, role, stop_policy) in [
        ("audio", TaskRole::Capture, StopPolicy::Cooperative),
        ("gps", TaskRole::Capture, StopPolicy::Forced),
        ("aprs", TaskRole::Beacon, StopPolicy::Cooperative),
    ] {
        let spec = TaskSpec {
            name,
            role,
            stop_policy,
            resource: Some(Peripheral::GpsUart),
        };
        registry.register(spec, Box::new(NullTask)).unwrap();
    }
    let (_tx, rx) = events::channel();
    let mut c =
        ModeController::new(SystemConfig::default(), registry, Box::new(NullBoard), rx).unwrap();
    let mut sink = NullSink;
    c.start(&mut sink).unwrap();

    for &byte in data {
        if byte & 0x80 != 0 {
            let target = Mode::from_index(usize::from(byte % 3));
            c.force_transition(target, &mut sink).unwrap();
        } else {
            c.handle_wake(EventFlags::from_bits(byte), &mut sink).unwrap();
        }
        assert_ne!(c.mode(), Mode::Simulating);
    }

    for name in ["audio", "gps"] {
        let id = c.registry().find(name).unwrap();
        assert!(c.registry().start_count(id) <= 1);
    }
});
