//! Unified error type for the tag firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! controller loop propagates everything with `?`.  All variants are
//! `Copy`.

use core::fmt;

use crate::fsm::Mode;
use crate::lifecycle::LifecycleError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A lifecycle operation was attempted from an illegal state, or
    /// with a handle that no longer names the task's current run.
    Lifecycle(LifecycleError),
    /// Configuration is invalid.
    Config(&'static str),
    /// The controller has not taken the startup path this call needs.
    Init(&'static str),
    /// A forced transition touching `Simulating`.
    Forbidden { from: Mode, to: Mode },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(e) => write!(f, "lifecycle: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Forbidden { from, to } => {
                write!(f, "forced transition {from:?} -> {to:?} not allowed")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<LifecycleError> for Error {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
