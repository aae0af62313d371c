//! Context threaded through every mode action.
//!
//! `ModeContext` replaces the free-standing globals a C firmware would
//! keep (task table, current handles, bus clock): the controller owns
//! one and hands it to each entry/exit action by `&mut`.

use heapless::Vec;

use crate::app::ports::BoardPort;
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{TaskHandle, TaskId, TaskRegistry, TaskRole, MAX_TASKS};

// ---------------------------------------------------------------------------
// Mission task slot
// ---------------------------------------------------------------------------

/// A registered task plus the handle for its current run, if any.
///
/// `run` is `None` before the first start and again after the task is
/// stopped: the stop operations consume the handle.
#[derive(Debug)]
pub struct MissionTask {
    pub id: TaskId,
    pub run: Option<TaskHandle>,
}

impl MissionTask {
    fn new(id: TaskId) -> Self {
        Self { id, run: None }
    }
}

// ---------------------------------------------------------------------------
// ModeContext
// ---------------------------------------------------------------------------

pub struct ModeContext {
    /// Every managed task on the tag.
    pub registry: TaskRegistry,
    /// The data-capture task set, in registration order.
    pub capture: Vec<MissionTask, MAX_TASKS>,
    /// The homing beacon selected for Recovery.
    pub beacon: MissionTask,
    /// Board peripherals the handlers reconfigure directly.
    pub board: Box<dyn BoardPort + Send>,
    pub config: SystemConfig,
    /// Storage bus clock divider last applied.
    pub storage_clock_div: u8,
}

impl ModeContext {
    /// Sort the registry's tasks into mission sets.
    ///
    /// The beacon is the one named after `config.beacon`, falling back
    /// to the first registered beacon task.
    pub fn new(
        config: SystemConfig,
        registry: TaskRegistry,
        board: Box<dyn BoardPort + Send>,
    ) -> Result<Self> {
        let mut capture = Vec::new();
        let mut beacon = None;
        let wanted = crate::workers::beacon_task_name(config.beacon);

        for (id, spec, _) in registry.iter() {
            match spec.role {
                TaskRole::Capture => {
                    // Registry and capture set share the same capacity.
                    let _ = capture.push(MissionTask::new(id));
                }
                TaskRole::Beacon => {
                    if beacon.is_none() || spec.name == wanted {
                        beacon = Some(id);
                    }
                }
            }
        }

        let beacon = beacon.ok_or(Error::Init("no beacon task registered"))?;
        if capture.is_empty() {
            return Err(Error::Init("no capture tasks registered"));
        }

        Ok(Self {
            registry,
            capture,
            beacon: MissionTask::new(beacon),
            board,
            storage_clock_div: config.normal_sd_clk_div,
            config,
        })
    }
}
