//! Outbound application events.
//!
//! The [`ModeController`](super::service::ModeController) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, append to
//! the on-tag event log, and so on.

use crate::events::Signal;
use crate::fsm::Mode;

/// Structured events emitted by the mode controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller ran its initial entry action and is entering the
    /// reactive loop.
    Started(Mode),

    /// The controller ran the entry action of a simulated mission and
    /// will not enter the reactive loop.
    Simulated(Mode),

    /// A signal moved the controller between modes.
    ModeChanged {
        from: Mode,
        to: Mode,
        signal: Signal,
    },

    /// A bench/debug forced transition.
    Forced { from: Mode, to: Mode },

    /// A signal had no transition defined for the current mode.
    Ignored { signal: Signal, mode: Mode },
}
