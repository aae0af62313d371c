//! Host stand-ins for the tag's managed tasks.
//!
//! The capture workers sample at a fixed period and count what they
//! produce; the beacon workers alternate a transmit window with a silent
//! one.  Neither touches real hardware: they exist so the bench binary
//! exercises the full lifecycle with live threads.
//!
//! | Task          | Role    | Stop policy | Owned peripheral |
//! |---------------|---------|-------------|------------------|
//! | `audio`       | Capture | Cooperative | SAI              |
//! | `imu`         | Capture | Cooperative | SPI              |
//! | `ecg`         | Capture | Cooperative | ADC              |
//! | `gps`         | Capture | Forced      | UART             |
//! | `aprs`        | Beacon  | Cooperative | DAC              |
//! | `fishtracker` | Beacon  | Cooperative | DAC              |

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_time::Timer;
use futures_lite::future::block_on;
use log::{debug, info};

use crate::app::ports::Peripheral;
use crate::config::{BeaconKind, SystemConfig};
use crate::lifecycle::runtime::{Step, StopToken, TaskBody, ThreadTask};
use crate::lifecycle::{LifecycleError, StopPolicy, TaskId, TaskRegistry, TaskRole, TaskSpec};

const WORKER_STACK_KB: usize = 64;

/// Registry name of the beacon task for `kind`.
pub const fn beacon_task_name(kind: BeaconKind) -> &'static str {
    match kind {
        BeaconKind::Aprs => "aprs",
        BeaconKind::FishTracker => "fishtracker",
    }
}

// ---------------------------------------------------------------------------
// Shared counters
// ---------------------------------------------------------------------------

/// Progress counters shared between a worker's runs and the bench.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Runs begun at the entry point.
    pub runs: AtomicU32,
    /// Samples taken (capture) or transmit windows completed (beacon).
    pub work: AtomicU32,
    /// Cooperative exits that released their resources.
    pub cleanups: AtomicU32,
}

impl WorkerStats {
    pub fn snapshot(&self) -> (u32, u32, u32) {
        (
            self.runs.load(Ordering::Relaxed),
            self.work.load(Ordering::Relaxed),
            self.cleanups.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// Capture worker
// ---------------------------------------------------------------------------

struct CaptureWorker {
    name: &'static str,
    period_ms: u64,
    stats: Arc<WorkerStats>,
    /// Samples in the current run; reset on every start.
    taken: u32,
}

impl TaskBody for CaptureWorker {
    fn on_start(&mut self) {
        self.taken = 0;
        self.stats.runs.fetch_add(1, Ordering::Relaxed);
        info!("{}: capture started", self.name);
    }

    fn step(&mut self, stop: &StopToken<'_>) -> Step {
        if stop.is_requested() {
            // Flush and close the current capture file.
            self.stats.cleanups.fetch_add(1, Ordering::Relaxed);
            info!("{}: stop requested, closed after {} samples", self.name, self.taken);
            return Step::Exit;
        }
        block_on(Timer::after_millis(self.period_ms));
        self.taken += 1;
        self.stats.work.fetch_add(1, Ordering::Relaxed);
        Step::Continue
    }
}

// ---------------------------------------------------------------------------
// Beacon worker
// ---------------------------------------------------------------------------

struct BeaconWorker {
    kind: BeaconKind,
    on_ms: u64,
    off_ms: u64,
    stats: Arc<WorkerStats>,
}

impl TaskBody for BeaconWorker {
    fn on_start(&mut self) {
        self.stats.runs.fetch_add(1, Ordering::Relaxed);
        info!("{}: beacon cycle started", beacon_task_name(self.kind));
    }

    fn step(&mut self, stop: &StopToken<'_>) -> Step {
        if stop.is_requested() {
            // Key the transmitter off before releasing the DAC.
            self.stats.cleanups.fetch_add(1, Ordering::Relaxed);
            info!("{}: transmitter keyed off", beacon_task_name(self.kind));
            return Step::Exit;
        }
        match self.kind {
            BeaconKind::Aprs => debug!("aprs: position packet"),
            BeaconKind::FishTracker => debug!("fishtracker: tone burst"),
        }
        block_on(Timer::after_millis(self.on_ms));
        self.stats.work.fetch_add(1, Ordering::Relaxed);
        block_on(Timer::after_millis(self.off_ms));
        Step::Continue
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// Specs of the tag's fixed task population, in registration order.
pub const TASK_SPECS: [TaskSpec; 6] = [
    capture("audio", StopPolicy::Cooperative, Peripheral::AudioSai),
    capture("imu", StopPolicy::Cooperative, Peripheral::ImuSpi),
    capture("ecg", StopPolicy::Cooperative, Peripheral::EcgAdc),
    capture("gps", StopPolicy::Forced, Peripheral::GpsUart),
    beacon(BeaconKind::Aprs),
    beacon(BeaconKind::FishTracker),
];

const fn capture(name: &'static str, stop_policy: StopPolicy, resource: Peripheral) -> TaskSpec {
    TaskSpec {
        name,
        role: TaskRole::Capture,
        stop_policy,
        resource: Some(resource),
    }
}

const fn beacon(kind: BeaconKind) -> TaskSpec {
    TaskSpec {
        name: beacon_task_name(kind),
        role: TaskRole::Beacon,
        stop_policy: StopPolicy::Cooperative,
        resource: Some(Peripheral::BeaconDac),
    }
}

/// Handles onto the counters of every registered worker.
pub struct Workers {
    entries: Vec<(TaskId, &'static str, Arc<WorkerStats>)>,
}

impl Workers {
    pub fn stats(&self, name: &str) -> Option<&WorkerStats> {
        self.entries
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(_, _, s)| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &'static str, &WorkerStats)> {
        self.entries.iter().map(|(id, n, s)| (*id, *n, s.as_ref()))
    }
}

/// Register the full thread-backed population with `registry`.
pub fn register_all(
    registry: &mut TaskRegistry,
    config: &SystemConfig,
) -> Result<Workers, LifecycleError> {
    let mut entries = Vec::with_capacity(TASK_SPECS.len());

    for spec in TASK_SPECS {
        let stats = Arc::new(WorkerStats::default());
        let shared = Arc::clone(&stats);
        let name = spec.name;

        let task = match spec.role {
            TaskRole::Capture => {
                let period_ms = u64::from(config.capture_period_ms);
                ThreadTask::new(
                    name,
                    WORKER_STACK_KB,
                    Box::new(move || -> Box<dyn TaskBody> {
                        Box::new(CaptureWorker {
                            name,
                            period_ms,
                            stats: Arc::clone(&shared),
                            taken: 0,
                        })
                    }),
                )
            }
            TaskRole::Beacon => {
                let kind = if name == beacon_task_name(BeaconKind::Aprs) {
                    BeaconKind::Aprs
                } else {
                    BeaconKind::FishTracker
                };
                let on_ms = u64::from(config.beacon_on_ms);
                let off_ms = u64::from(config.beacon_off_ms);
                ThreadTask::new(
                    name,
                    WORKER_STACK_KB,
                    Box::new(move || -> Box<dyn TaskBody> {
                        Box::new(BeaconWorker {
                            kind,
                            on_ms,
                            off_ms,
                            stats: Arc::clone(&shared),
                        })
                    }),
                )
            }
        };

        let id = registry.register(spec, Box::new(task))?;
        entries.push((id, name, stats));
    }

    Ok(Workers { entries })
}
