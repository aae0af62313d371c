//! System configuration parameters
//!
//! All tunable parameters for the tag's mission controller.
//! Values can be overridden from a JSON file on the bench
//! (see [`crate::adapters::config_file`]).

use serde::{Deserialize, Serialize};

use crate::fsm::Mode;

/// Which homing beacon the Recovery mission runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeaconKind {
    /// APRS position packets over VHF.
    Aprs,
    /// Continuous-wave tone bursts for a hand-held fish-tracker receiver.
    FishTracker,
}

/// Permitted area, as a lat/lon rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Geofence {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Startup ---
    /// When set, boot straight into this mission's entry action and skip
    /// the reactive loop entirely.
    pub simulate: Option<Mode>,

    // --- Recovery ---
    /// Beacon started on every Recovery entry.
    pub beacon: BeaconKind,
    /// Beacon transmit window per cycle (milliseconds)
    pub beacon_on_ms: u32,
    /// Beacon silent window per cycle (milliseconds)
    pub beacon_off_ms: u32,

    // --- Storage bus ---
    /// SD clock divider during capture and recovery
    pub normal_sd_clk_div: u8,
    /// SD clock divider while sharing the bus with a USB session
    pub offload_sd_clk_div: u8,

    // --- Event sources ---
    /// Permitted deployment area.
    pub geofence: Geofence,
    /// Cell voltage (mV) below which LowBattery is raised
    pub critical_cell_mv: u16,
    /// Recovery margin (mV) above the critical level before re-arming
    pub battery_hysteresis_mv: u16,
    /// Mission length (seconds) after which Timeout is raised; 0 = never
    pub mission_timeout_secs: u32,

    // --- Timing ---
    /// Capture worker sample period (milliseconds)
    pub capture_period_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            simulate: None,

            // Recovery
            beacon: BeaconKind::Aprs,
            beacon_on_ms: 1_000,
            beacon_off_ms: 4_000,

            // Storage bus
            normal_sd_clk_div: 2,
            offload_sd_clk_div: 8,

            // Event sources: box around the deployment island
            geofence: Geofence {
                lat_min: 14.8,
                lat_max: 16.0,
                lon_min: -62.0,
                lon_max: -60.8,
            },
            critical_cell_mv: 3_300,
            battery_hysteresis_mv: 100,
            mission_timeout_secs: 0,

            // Timing
            capture_period_ms: 10, // 100 Hz
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Returns the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.simulate == Some(Mode::Simulating) {
            return Err("simulate: must name a mission mode");
        }
        if self.normal_sd_clk_div == 0 || self.offload_sd_clk_div == 0 {
            return Err("sd_clk_div: must be non-zero");
        }
        if self.offload_sd_clk_div <= self.normal_sd_clk_div {
            return Err("offload_sd_clk_div: must be slower than normal");
        }
        let g = &self.geofence;
        if !(g.lat_min < g.lat_max && g.lon_min < g.lon_max) {
            return Err("geofence: min must be below max");
        }
        if self.capture_period_ms == 0 || self.beacon_on_ms == 0 {
            return Err("timing: periods must be non-zero");
        }
        Ok(())
    }
}
