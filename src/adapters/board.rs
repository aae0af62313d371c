//! Simulated board adapter.
//!
//! Implements [`BoardPort`] on the host: storage-bus reconfiguration and
//! peripheral quiesce are logged and remembered so the bench can report
//! them.

use log::info;

use crate::app::ports::{BoardPort, Peripheral};

#[derive(Debug)]
pub struct SimulatedBoard {
    storage_clock_div: u8,
    quiesced: Vec<Peripheral>,
}

impl SimulatedBoard {
    pub fn new(initial_div: u8) -> Self {
        Self {
            storage_clock_div: initial_div,
            quiesced: Vec::new(),
        }
    }

    pub fn storage_clock_div(&self) -> u8 {
        self.storage_clock_div
    }

    /// Peripherals quiesced so far, oldest first.
    pub fn quiesced(&self) -> &[Peripheral] {
        &self.quiesced
    }
}

impl BoardPort for SimulatedBoard {
    fn set_storage_clock_div(&mut self, div: u8) {
        info!(
            "Board: SD bus re-init, clock divider {} -> {}",
            self.storage_clock_div, div
        );
        self.storage_clock_div = div;
    }

    fn quiesce(&mut self, peripheral: Peripheral) {
        info!("Board: {:?} DMA/timer stopped", peripheral);
        self.quiesced.push(peripheral);
    }
}
