//! Mock task controls, board and event sink for integration tests.
//!
//! Every mock appends to one shared call log, so tests can assert on the
//! relative order of lifecycle calls and board operations.

use std::sync::{Arc, Mutex};

use biotag::app::events::AppEvent;
use biotag::app::ports::{BoardPort, EventSink, Peripheral};
use biotag::app::service::ModeController;
use biotag::config::SystemConfig;
use biotag::events::{self, EventSender};
use biotag::lifecycle::{
    LifecycleError, StopPolicy, TaskControl, TaskRegistry, TaskRole, TaskSpec,
};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start(&'static str),
    Suspend(&'static str),
    Resume(&'static str),
    RequestStop(&'static str),
    Kill(&'static str),
    StorageClock(u8),
    Quiesce(Peripheral),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

// ── RecordingTask ─────────────────────────────────────────────

pub struct RecordingTask {
    name: &'static str,
    log: CallLog,
}

impl TaskControl for RecordingTask {
    fn start(&mut self) -> Result<(), LifecycleError> {
        self.log.lock().unwrap().push(Call::Start(self.name));
        Ok(())
    }

    fn suspend(&mut self) {
        self.log.lock().unwrap().push(Call::Suspend(self.name));
    }

    fn resume(&mut self) {
        self.log.lock().unwrap().push(Call::Resume(self.name));
    }

    fn request_stop(&mut self) {
        self.log.lock().unwrap().push(Call::RequestStop(self.name));
    }

    fn kill(&mut self) {
        self.log.lock().unwrap().push(Call::Kill(self.name));
    }
}

// ── RecordingBoard ────────────────────────────────────────────

pub struct RecordingBoard {
    log: CallLog,
}

impl BoardPort for RecordingBoard {
    fn set_storage_clock_div(&mut self, div: u8) {
        self.log.lock().unwrap().push(Call::StorageClock(div));
    }

    fn quiesce(&mut self, peripheral: Peripheral) {
        self.log.lock().unwrap().push(Call::Quiesce(peripheral));
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

/// A sink that can be read from one thread while the controller emits
/// into it from another.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct SharedSink {
    pub events: Arc<Mutex<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl SharedSink {
    pub fn snapshot(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for SharedSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub const CAPTURE: [&str; 3] = ["audio", "imu", "gps"];

fn spec(
    name: &'static str,
    role: TaskRole,
    stop_policy: StopPolicy,
    resource: Option<Peripheral>,
) -> TaskSpec {
    TaskSpec {
        name,
        role,
        stop_policy,
        resource,
    }
}

/// A controller over audio, imu, gps (force-stopped) and both beacons.
pub struct Harness {
    pub controller: ModeController,
    pub tx: EventSender,
    pub log: CallLog,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        for s in [
            spec("audio", TaskRole::Capture, StopPolicy::Cooperative, Some(Peripheral::AudioSai)),
            spec("imu", TaskRole::Capture, StopPolicy::Cooperative, Some(Peripheral::ImuSpi)),
            spec("gps", TaskRole::Capture, StopPolicy::Forced, Some(Peripheral::GpsUart)),
            spec("aprs", TaskRole::Beacon, StopPolicy::Cooperative, Some(Peripheral::BeaconDac)),
            spec(
                "fishtracker",
                TaskRole::Beacon,
                StopPolicy::Cooperative,
                Some(Peripheral::BeaconDac),
            ),
        ] {
            registry
                .register(
                    s,
                    Box::new(RecordingTask {
                        name: s.name,
                        log: Arc::clone(&log),
                    }),
                )
                .unwrap();
        }

        let (tx, rx) = events::channel();
        let board = Box::new(RecordingBoard {
            log: Arc::clone(&log),
        });
        let controller = ModeController::new(config, registry, board, rx).unwrap();
        Self {
            controller,
            tx,
            log,
            sink: RecordingSink::default(),
        }
    }

    /// Construct and run the initial entry action.
    pub fn started() -> Self {
        let mut h = Self::new();
        h.controller.start(&mut h.sink).unwrap();
        h
    }

    /// Handle everything the test has signalled so far, in one wake.
    pub fn pump(&mut self) {
        self.controller.poll(&mut self.sink).unwrap();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn state_of(&self, name: &str) -> biotag::lifecycle::LifecycleState {
        let reg = self.controller.registry();
        reg.state(reg.find(name).unwrap()).unwrap()
    }

    pub fn starts_of(&self, name: &str) -> u32 {
        let reg = self.controller.registry();
        reg.start_count(reg.find(name).unwrap())
    }

    pub fn position(&self, call: Call) -> usize {
        self.calls()
            .iter()
            .position(|c| *c == call)
            .unwrap_or_else(|| panic!("{call:?} not in call log"))
    }
}
