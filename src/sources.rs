//! External event sources.
//!
//! Each source turns a raw observation (a GPS fix, a cell voltage, the
//! VBUS level) into at most one bus signal per edge.  Sources hold no
//! reference to the controller: the [`EventSender`] is their only way
//! out.

use core::time::Duration;

use log::{info, warn};

use crate::config::{Geofence, SystemConfig};
use crate::events::{EventSender, Signal};

// ═══════════════════════════════════════════════════════════════
//  Geofence
// ═══════════════════════════════════════════════════════════════

/// One position report from the GPS receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    /// False until the receiver has a position lock.
    pub valid: bool,
}

/// Signals `GeofenceExit` on the first valid fix outside the fence.
pub struct GeofenceMonitor {
    fence: Geofence,
    tx: EventSender,
    outside: bool,
}

impl GeofenceMonitor {
    pub fn new(fence: Geofence, tx: EventSender) -> Self {
        Self {
            fence,
            tx,
            outside: false,
        }
    }

    /// Evaluate a fix.  Returns true if a signal was raised.
    pub fn on_fix(&mut self, fix: GpsFix) -> bool {
        if !fix.valid {
            return false;
        }
        let inside = self.fence.contains(fix.lat, fix.lon);
        let crossed = !inside && !self.outside;
        self.outside = !inside;
        if crossed {
            warn!(
                "Geofence: fix {:.4},{:.4} outside permitted zone",
                fix.lat, fix.lon
            );
            self.tx.signal(Signal::GeofenceExit);
        }
        crossed
    }
}

// ═══════════════════════════════════════════════════════════════
//  Battery
// ═══════════════════════════════════════════════════════════════

/// Signals `LowBattery` when the cell first drops below the critical
/// level; re-arms once it recovers past critical + hysteresis.
pub struct BatteryMonitor {
    critical_mv: u16,
    rearm_mv: u16,
    tx: EventSender,
    armed: bool,
}

impl BatteryMonitor {
    pub fn new(critical_mv: u16, hysteresis_mv: u16, tx: EventSender) -> Self {
        Self {
            critical_mv,
            rearm_mv: critical_mv.saturating_add(hysteresis_mv),
            tx,
            armed: true,
        }
    }

    pub fn from_config(config: &SystemConfig, tx: EventSender) -> Self {
        Self::new(config.critical_cell_mv, config.battery_hysteresis_mv, tx)
    }

    pub fn on_sample(&mut self, cell_mv: u16) -> bool {
        if self.armed && cell_mv < self.critical_mv {
            self.armed = false;
            warn!("Battery: {} mV below critical {} mV", cell_mv, self.critical_mv);
            self.tx.signal(Signal::LowBattery);
            return true;
        }
        if !self.armed && cell_mv >= self.rearm_mv {
            self.armed = true;
            info!("Battery: recovered to {} mV, re-armed", cell_mv);
        }
        false
    }
}

// ═══════════════════════════════════════════════════════════════
//  USB attach
// ═══════════════════════════════════════════════════════════════

/// Signals `UsbConnected` on every VBUS rising edge.
pub struct UsbDetector {
    tx: EventSender,
    vbus: bool,
}

impl UsbDetector {
    pub fn new(tx: EventSender) -> Self {
        Self { tx, vbus: false }
    }

    pub fn on_vbus(&mut self, present: bool) -> bool {
        let rising = present && !self.vbus;
        self.vbus = present;
        if rising {
            info!("USB: host attached");
            self.tx.signal(Signal::UsbConnected);
        }
        rising
    }
}

// ═══════════════════════════════════════════════════════════════
//  One-shot sources
// ═══════════════════════════════════════════════════════════════

/// Signals `TagReleased` once, when the burn-wire release is sensed.
pub struct BurnwireMonitor {
    tx: EventSender,
    fired: bool,
}

impl BurnwireMonitor {
    pub fn new(tx: EventSender) -> Self {
        Self { tx, fired: false }
    }

    pub fn on_release_sense(&mut self, released: bool) -> bool {
        if !released || self.fired {
            return false;
        }
        self.fired = true;
        info!("Burn-wire: tag released");
        self.tx.signal(Signal::TagReleased);
        true
    }
}

/// Signals `Timeout` once when the mission time elapses.
pub struct MissionTimer {
    /// `None` disables the timer.
    limit: Option<Duration>,
    tx: EventSender,
    fired: bool,
}

impl MissionTimer {
    pub fn new(timeout_secs: u32, tx: EventSender) -> Self {
        Self {
            limit: (timeout_secs != 0).then(|| Duration::from_secs(u64::from(timeout_secs))),
            tx,
            fired: false,
        }
    }

    /// Feed the elapsed mission time.
    pub fn on_elapsed(&mut self, elapsed: Duration) -> bool {
        match self.limit {
            Some(limit) if !self.fired && elapsed >= limit => {
                self.fired = true;
                info!("Mission timer: {}s elapsed", limit.as_secs());
                self.tx.signal(Signal::Timeout);
                true
            }
            _ => false,
        }
    }
}
