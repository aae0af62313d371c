//! biotag bench, host entry point.
//!
//! Runs the real mode controller against thread-backed workers and a
//! scripted stimulus that plays the part of the GPS receiver, the fuel
//! gauge and the USB VBUS line.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                       │
//! │   SimulatedBoard     LogEventSink     JsonFileConfig         │
//! │   (BoardPort)        (EventSink)      (ConfigPort)           │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐      │
//! │  │   ModeController  ·  ModeMachine  ·  TaskRegistry  │      │
//! │  └────────────────────────────────────────────────────┘      │
//! │          ▲                                  │                │
//! │     EventSender                        ThreadTask × 6        │
//! │  (stimulus thread: geofence, battery, USB, timer)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use biotag::adapters::board::SimulatedBoard;
use biotag::adapters::config_file::{JsonFileConfig, CONFIG_ENV};
use biotag::adapters::log_sink::LogEventSink;
use biotag::app::ports::{ConfigError, ConfigPort};
use biotag::app::service::ModeController;
use biotag::config::SystemConfig;
use biotag::events::{self, EventSender};
use biotag::lifecycle::TaskRegistry;
use biotag::sources::{
    BatteryMonitor, BurnwireMonitor, GeofenceMonitor, GpsFix, MissionTimer, UsbDetector,
};
use biotag::workers::{self, Workers};

// ── Config ────────────────────────────────────────────────────

fn load_config() -> SystemConfig {
    let Some(port) = JsonFileConfig::from_env() else {
        info!("{} not set, using default configuration", CONFIG_ENV);
        return SystemConfig::default();
    };
    match port.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound) => {
            warn!("Config file not found, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

// ── Stimulus ──────────────────────────────────────────────────

/// Scripted deployment: a few fixes inside the fence, a battery dip,
/// the animal leaving the zone, then the tag being picked up and
/// plugged in.
fn run_stimulus(config: &SystemConfig, tx: &EventSender, workers: &Workers) {
    let mut geofence = GeofenceMonitor::new(config.geofence, tx.clone());
    let mut battery = BatteryMonitor::from_config(config, tx.clone());
    let mut usb = UsbDetector::new(tx.clone());
    let mut burnwire = BurnwireMonitor::new(tx.clone());
    let mut timer = MissionTimer::new(config.mission_timeout_secs, tx.clone());

    let fence = config.geofence;
    let mid_lat = (fence.lat_min + fence.lat_max) / 2.0;
    let mid_lon = (fence.lon_min + fence.lon_max) / 2.0;
    let started = Instant::now();
    let tick = Duration::from_millis(250);

    for i in 0..8u32 {
        geofence.on_fix(GpsFix {
            lat: mid_lat + f64::from(i) * 0.01,
            lon: mid_lon,
            valid: true,
        });
        battery.on_sample(3_900 - (i as u16) * 10);
        timer.on_elapsed(started.elapsed());
        thread::sleep(tick);
    }

    // Brown-out while the animal dives; LowBattery is reserved.
    battery.on_sample(config.critical_cell_mv.saturating_sub(50));
    thread::sleep(tick);

    info!("Stimulus: animal leaves the permitted zone");
    geofence.on_fix(GpsFix {
        lat: fence.lat_max + 0.5,
        lon: mid_lon,
        valid: true,
    });
    thread::sleep(tick * 8);

    burnwire.on_release_sense(true);
    thread::sleep(tick * 4);

    info!("Stimulus: tag recovered, USB attached");
    usb.on_vbus(true);
    thread::sleep(tick * 4);

    for (_, name, stats) in workers.iter() {
        let (runs, work, cleanups) = stats.snapshot();
        info!(
            "Worker '{}': runs={} work={} cleanups={}",
            name, runs, work, cleanups
        );
    }
    info!("Stimulus: script complete");
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("biotag bench v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config();

    let mut registry = TaskRegistry::new();
    let population =
        workers::register_all(&mut registry, &config).context("registering managed tasks")?;

    let (tx, rx) = events::channel();
    let board = Box::new(SimulatedBoard::new(config.normal_sd_clk_div));
    let mut controller = ModeController::new(config.clone(), registry, board, rx)
        .context("building mode controller")?;

    if config.simulate.is_none() {
        thread::Builder::new()
            .name("stimulus".into())
            .spawn(move || run_stimulus(&config, &tx, &population))
            .context("spawning stimulus thread")?;
    }

    let mut sink = LogEventSink::new();
    controller.run(&mut sink).context("mode controller")?;

    // Simulated path: the mission's tasks keep running on their own
    // threads with nothing left for the controller to do.
    info!("Simulation running; press Ctrl-C to exit");
    loop {
        thread::park();
    }
}
