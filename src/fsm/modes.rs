//! Mode entry/exit actions and the transition table.
//!
//! ```text
//!  DATA_CAPTURE ──[GeofenceExit / hard exit]──▶ RECOVERY
//!       │                                          │
//!  [UsbConnected / pause]              [UsbConnected / stop beacon]
//!       │                                          │
//!       └──────────────▶ OFFLOAD ◀─────────────────┘
//!
//!  Timeout, LowBattery, TagReleased: reserved, no transition anywhere.
//! ```
//!
//! Each action turns a mode change into registry calls and board
//! reconfiguration.  Nothing here waits for a task to react.

use log::{info, warn};

use super::context::{MissionTask, ModeContext};
use super::{Mode, ModeDescriptor, TransitionRule};
use crate::app::ports::BoardPort;
use crate::error::Result;
use crate::events::Signal;
use crate::lifecycle::{LifecycleState, StopPolicy, TaskRegistry};

// ═══════════════════════════════════════════════════════════════════════════
//  Tables
// ═══════════════════════════════════════════════════════════════════════════

/// Every valid (mode, signal) pairing.  Anything absent is a no-op.
pub static TRANSITIONS: [TransitionRule; 3] = [
    TransitionRule {
        from: Mode::DataCapture,
        signal: Signal::GeofenceExit,
        exit: hard_exit_data_capture,
        to: Mode::Recovery,
    },
    TransitionRule {
        from: Mode::DataCapture,
        signal: Signal::UsbConnected,
        exit: soft_exit_data_capture,
        to: Mode::Offload,
    },
    TransitionRule {
        from: Mode::Recovery,
        signal: Signal::UsbConnected,
        exit: exit_recovery,
        to: Mode::Offload,
    },
];

/// Build the mode table.  Called once at startup.
pub fn build_mode_table() -> [ModeDescriptor; Mode::COUNT] {
    [
        // Index 0: DataCapture
        ModeDescriptor {
            mode: Mode::DataCapture,
            name: "DataCapture",
            on_enter: Some(enter_data_capture),
            on_exit: Some(soft_exit_data_capture),
        },
        // Index 1: Recovery
        ModeDescriptor {
            mode: Mode::Recovery,
            name: "Recovery",
            on_enter: Some(enter_recovery),
            on_exit: Some(exit_recovery),
        },
        // Index 2: Offload
        ModeDescriptor {
            mode: Mode::Offload,
            name: "Offload",
            on_enter: Some(enter_offload),
            on_exit: Some(exit_offload),
        },
        // Index 3: Simulating
        ModeDescriptor {
            mode: Mode::Simulating,
            name: "Simulating",
            on_enter: None,
            on_exit: None,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  DATA CAPTURE
// ═══════════════════════════════════════════════════════════════════════════

/// Start never-run capture tasks and resume paused ones.  Running tasks
/// are left alone; terminated ones stay terminated.
fn enter_data_capture(ctx: &mut ModeContext) -> Result<()> {
    let ModeContext {
        registry, capture, ..
    } = ctx;

    for task in capture.iter_mut() {
        match registry.state(task.id) {
            Some(LifecycleState::Dormant) => {
                task.run = Some(registry.reset_and_start(task.id)?);
            }
            Some(LifecycleState::Suspended) => {
                if let Some(handle) = &task.run {
                    registry.resume(handle)?;
                }
            }
            Some(LifecycleState::Terminated) => {
                warn!("DATA_CAPTURE: task #{} was terminated, not restarting", task.id.index());
            }
            Some(LifecycleState::Running) | None => {}
        }
    }
    info!("DATA_CAPTURE: capture tasks running");
    Ok(())
}

/// Pause the capture set.  Nothing is released, so capture picks up
/// where it left off if DataCapture is entered again.
fn soft_exit_data_capture(ctx: &mut ModeContext) -> Result<()> {
    let ModeContext {
        registry, capture, ..
    } = ctx;

    for task in capture.iter() {
        if let Some(handle) = &task.run {
            if registry.state(task.id) == Some(LifecycleState::Running) {
                registry.pause(handle)?;
            }
        }
    }
    info!("DATA_CAPTURE: capture tasks paused");
    Ok(())
}

/// Terminate the capture set for the rest of the mission.  The zone has
/// been left, capture is not expected to resume.
fn hard_exit_data_capture(ctx: &mut ModeContext) -> Result<()> {
    let ModeContext {
        registry,
        capture,
        board,
        ..
    } = ctx;

    for task in capture.iter_mut() {
        stop_task(registry, &mut **board, task)?;
    }
    info!("DATA_CAPTURE: capture tasks terminated");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECOVERY (homing beacon)
// ═══════════════════════════════════════════════════════════════════════════

/// Start the beacon from its entry point.  The beacon protocol is never
/// resumed mid-cycle.
fn enter_recovery(ctx: &mut ModeContext) -> Result<()> {
    let handle = ctx.registry.reset_and_start(ctx.beacon.id)?;
    ctx.beacon.run = Some(handle);
    info!(
        "RECOVERY: beacon started (run {})",
        ctx.registry.start_count(ctx.beacon.id)
    );
    Ok(())
}

fn exit_recovery(ctx: &mut ModeContext) -> Result<()> {
    let ModeContext {
        registry,
        beacon,
        board,
        ..
    } = ctx;

    stop_task(registry, &mut **board, beacon)?;
    info!("RECOVERY: beacon stopped");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFFLOAD (USB host shares the storage bus)
// ═══════════════════════════════════════════════════════════════════════════

/// The offload service runs in every mode; only the storage bus clock
/// changes while a USB session shares it.
fn enter_offload(ctx: &mut ModeContext) -> Result<()> {
    let div = ctx.config.offload_sd_clk_div;
    ctx.board.set_storage_clock_div(div);
    ctx.storage_clock_div = div;
    info!("OFFLOAD: storage clock divider {}", div);
    Ok(())
}

fn exit_offload(ctx: &mut ModeContext) -> Result<()> {
    let div = ctx.config.normal_sd_clk_div;
    ctx.board.set_storage_clock_div(div);
    ctx.storage_clock_div = div;
    info!("OFFLOAD: storage clock divider restored to {}", div);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Terminate the task's current run according to its stop policy.
/// A task with no current run is left as is.
fn stop_task(
    registry: &mut TaskRegistry,
    board: &mut (dyn BoardPort + Send),
    task: &mut MissionTask,
) -> Result<()> {
    let Some(handle) = task.run.take() else {
        return Ok(());
    };
    let Some(spec) = registry.spec(task.id).copied() else {
        return Ok(());
    };

    match spec.stop_policy {
        StopPolicy::Cooperative => registry.cooperative_stop(handle)?,
        StopPolicy::Forced => {
            registry.force_stop(handle)?;
            // The halted task's DMA / timer may still be running.
            if let Some(peripheral) = spec.resource {
                board.quiesce(peripheral);
            }
        }
    }
    Ok(())
}
