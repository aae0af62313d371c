//! The controller driving the real thread-backed worker population.
//!
//! Progress is observed through the workers' shared counters, so every
//! assertion that depends on another thread waits with a deadline.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use biotag::adapters::board::SimulatedBoard;
use biotag::app::events::AppEvent;
use biotag::app::service::ModeController;
use biotag::config::SystemConfig;
use biotag::events::{self, EventSender, Signal};
use biotag::fsm::Mode;
use biotag::lifecycle::{LifecycleState, TaskRegistry};
use biotag::workers::{self, WorkerStats, Workers};

use crate::mock_tasks::{RecordingSink, SharedSink};

const CAPTURE: [&str; 4] = ["audio", "imu", "ecg", "gps"];

fn fast_config() -> SystemConfig {
    SystemConfig {
        capture_period_ms: 1,
        beacon_on_ms: 1,
        beacon_off_ms: 1,
        ..SystemConfig::default()
    }
}

fn build() -> (ModeController, EventSender, Workers) {
    let config = fast_config();
    let mut registry = TaskRegistry::new();
    let population = workers::register_all(&mut registry, &config).unwrap();
    let (tx, rx) = events::channel();
    let board = Box::new(SimulatedBoard::new(config.normal_sd_clk_div));
    let controller = ModeController::new(config, registry, board, rx).unwrap();
    (controller, tx, population)
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn work(stats: &WorkerStats) -> u32 {
    stats.work.load(Ordering::Relaxed)
}

fn stats<'a>(population: &'a Workers, name: &str) -> &'a WorkerStats {
    population.stats(name).unwrap()
}

#[test]
fn mission_lifecycle_on_live_threads() {
    let (mut controller, tx, population) = build();
    let mut sink = RecordingSink::default();
    controller.start(&mut sink).unwrap();

    let audio = stats(&population, "audio");
    assert!(wait_until(|| work(audio) > 3));

    // Offload pauses capture: the sample count stops moving.
    tx.signal(Signal::UsbConnected);
    assert!(controller.poll(&mut sink).unwrap());
    assert_eq!(controller.mode(), Mode::Offload);
    thread::sleep(Duration::from_millis(30));
    let paused_at = work(audio);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(work(audio), paused_at);

    // Back to capture: the same run continues.
    controller
        .force_transition(Mode::DataCapture, &mut sink)
        .unwrap();
    assert!(wait_until(|| work(audio) > paused_at));
    assert_eq!(audio.runs.load(Ordering::Relaxed), 1);

    // Leaving the zone ends capture and keys up the beacon.
    tx.signal(Signal::GeofenceExit);
    assert!(controller.poll(&mut sink).unwrap());
    assert_eq!(controller.mode(), Mode::Recovery);
    for name in ["audio", "imu", "ecg"] {
        let s = stats(&population, name);
        assert!(
            wait_until(|| s.cleanups.load(Ordering::Relaxed) == 1),
            "{name} did not clean up"
        );
    }
    // Force-stopped: no cooperative exit ran.
    assert_eq!(stats(&population, "gps").cleanups.load(Ordering::Relaxed), 0);
    for name in CAPTURE {
        let reg = controller.registry();
        assert_eq!(
            reg.state(reg.find(name).unwrap()),
            Some(LifecycleState::Terminated)
        );
    }

    let aprs = stats(&population, "aprs");
    assert!(wait_until(|| work(aprs) > 0));
    assert_eq!(aprs.runs.load(Ordering::Relaxed), 1);
    assert_eq!(stats(&population, "fishtracker").runs.load(Ordering::Relaxed), 0);

    // Picked up: the beacon keys off.
    tx.signal(Signal::UsbConnected);
    assert!(controller.poll(&mut sink).unwrap());
    assert_eq!(controller.mode(), Mode::Offload);
    assert!(wait_until(|| aprs.cleanups.load(Ordering::Relaxed) == 1));
}

#[test]
fn run_serves_signals_from_another_thread() {
    let (mut controller, tx, population) = build();
    let sink = SharedSink::default();
    let mut loop_sink = sink.clone();

    // Never returns on success; the thread is left blocked on the bus.
    thread::spawn(move || controller.run(&mut loop_sink));

    let audio = stats(&population, "audio");
    assert!(wait_until(|| work(audio) > 0));

    let producer = thread::spawn(move || {
        tx.signal(Signal::GeofenceExit);
        thread::sleep(Duration::from_millis(20));
        tx.signal(Signal::UsbConnected);
    });
    producer.join().unwrap();

    assert!(wait_until(|| {
        sink.snapshot().contains(&AppEvent::ModeChanged {
            from: Mode::Recovery,
            to: Mode::Offload,
            signal: Signal::UsbConnected,
        })
    }));
    let events = sink.snapshot();
    assert_eq!(events[0], AppEvent::Started(Mode::DataCapture));
    assert!(events.contains(&AppEvent::ModeChanged {
        from: Mode::DataCapture,
        to: Mode::Recovery,
        signal: Signal::GeofenceExit,
    }));

    let aprs = stats(&population, "aprs");
    assert!(wait_until(|| aprs.cleanups.load(Ordering::Relaxed) == 1));
    assert_eq!(aprs.runs.load(Ordering::Relaxed), 1);
}
