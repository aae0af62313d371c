//! Port traits: the hexagonal boundary between mission logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModeController (domain)
//! ```
//!
//! Driven adapters (board peripherals, event sinks, configuration
//! storage) implement these traits.  The mode handlers reach hardware
//! only through [`BoardPort`], so the whole controller runs on the host
//! against recording mocks.

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Peripherals owned by managed tasks
// ───────────────────────────────────────────────────────────────

/// Hardware blocks a managed task may hold across its loop.
///
/// When a task is force-stopped its in-flight DMA or timer keeps
/// running; the caller quiesces the block named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peripheral {
    /// Audio ADC serial port + DMA.
    AudioSai,
    /// Inertial sensor SPI bus.
    ImuSpi,
    /// Biosignal (ECG) ADC.
    EcgAdc,
    /// GPS receiver UART + DMA.
    GpsUart,
    /// Beacon tone DAC + trigger timer.
    BeaconDac,
}

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the few board operations the mode handlers own.
pub trait BoardPort {
    /// Re-initialise the shared storage (SD) bus with a new clock divider.
    fn set_storage_clock_div(&mut self, div: u8);

    /// Stop a peripheral's DMA / timer regardless of which task owned it.
    fn quiesce(&mut self, peripheral: Peripheral);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads system configuration.
///
/// Implementations MUST run [`SystemConfig::validate`] before handing a
/// stored configuration to the controller.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
