//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing mode-controller events to the
//! `log` facade (stderr on the bench, the debug UART on the tag).

use log::{debug, info};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(mode) => {
                info!("START | initial_mode={:?}", mode);
            }
            AppEvent::Simulated(mode) => {
                info!("START | simulating {:?}, no reactive loop", mode);
            }
            AppEvent::ModeChanged { from, to, signal } => {
                info!("MODE  | {:?} -> {:?} on {}", from, to, signal.name());
            }
            AppEvent::Forced { from, to } => {
                info!("MODE  | {:?} -> {:?} (forced)", from, to);
            }
            AppEvent::Ignored { signal, mode } => {
                debug!("IGNORE| {} in {:?}", signal.name(), mode);
            }
        }
    }
}
