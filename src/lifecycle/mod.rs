//! Thread lifecycle registry.
//!
//! A fixed table of managed tasks, populated once at boot.  Each entry
//! pairs a static [`TaskSpec`] with a [`TaskControl`] backend and the
//! task's current [`LifecycleState`].  The registry is the only place
//! lifecycle state changes, and it only changes through the five
//! operations below:
//!
//! ```text
//!                reset_and_start
//!   Dormant ─────────────────────────▶ Running ◀──── resume ────┐
//!                                       │   │                   │
//!                 cooperative_stop /    │   └──── pause ──▶ Suspended
//!                 force_stop            ▼
//!   Terminated ◀────────────────────────┘
//!        │
//!        └──────── reset_and_start ──────▶ Running (fresh run)
//! ```
//!
//! Every other (operation, state) pair is rejected with
//! [`LifecycleError::IllegalTransition`].
//!
//! ## Handles
//!
//! [`TaskId`] names a task for as long as the registry lives.
//! [`TaskHandle`] is the capability for one *run* of that task: it is
//! issued by [`TaskRegistry::reset_and_start`], borrowed by `pause` and
//! `resume`, and consumed by both stop operations.  A handle cannot be
//! cloned, and the generation it carries makes any handle from an older
//! run useless after a reset.

pub mod runtime;

use core::fmt;

use heapless::Vec;
use log::info;

use crate::app::ports::Peripheral;

/// Maximum number of managed tasks on the tag.
pub const MAX_TASKS: usize = 8;

// ---------------------------------------------------------------------------
// Task description
// ---------------------------------------------------------------------------

/// What a task is for.  The mode handlers select task sets by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    /// Part of the data-capture set (audio, inertial, biosignal, GPS).
    Capture,
    /// The recovery homing beacon.
    Beacon,
}

/// How a running task is terminated when its mission ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// The task must close files or release peripherals itself; ask it
    /// to stop through its private stop group.
    Cooperative,
    /// The task has no in-task cleanup; halt it immediately and quiesce
    /// its peripheral from the caller.
    Forced,
}

/// Static description of a managed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub role: TaskRole,
    pub stop_policy: StopPolicy,
    /// Peripheral the caller must quiesce after a force-stop.
    pub resource: Option<Peripheral>,
}

/// Lifecycle state of a managed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Registered, never started.
    Dormant,
    Running,
    Suspended,
    Terminated,
}

/// The five lifecycle operations, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Pause,
    Resume,
    CooperativeStop,
    ForceStop,
    ResetAndStart,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::CooperativeStop => write!(f, "cooperative-stop"),
            Self::ForceStop => write!(f, "force-stop"),
            Self::ResetAndStart => write!(f, "reset-and-start"),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Scheduler-level control over one task.
///
/// The registry guarantees each call is made only from a legal state, so
/// implementations do not re-validate.  All calls are fire-and-forget:
/// they return without waiting for the task to react.
pub trait TaskControl: Send {
    /// Begin a fresh run at the task's entry point, abandoning any
    /// previous run.
    fn start(&mut self) -> Result<(), LifecycleError>;

    /// Park the task without running any more of its code.
    fn suspend(&mut self);

    /// Un-park a suspended task.
    fn resume(&mut self);

    /// Raise the task's private stop bit.
    fn request_stop(&mut self);

    /// Halt the task without giving it a chance to clean up.
    fn kill(&mut self);
}

// ---------------------------------------------------------------------------
// Identity and capability
// ---------------------------------------------------------------------------

/// Stable identity of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u8);

impl TaskId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Capability to pause, resume or stop the current run of a task.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskHandle {
    id: TaskId,
    generation: u32,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The operation is not legal from the task's current state.
    IllegalTransition {
        task: &'static str,
        op: LifecycleOp,
        from: LifecycleState,
    },
    /// The handle belongs to an earlier run of the task.
    StaleHandle { task: &'static str },
    /// No task with this id was registered.
    UnknownTask(TaskId),
    /// The fixed task table has no free slot.
    RegistryFull,
    /// The backend could not create the task's execution context.
    SpawnFailed { task: &'static str },
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalTransition { task, op, from } => {
                write!(f, "{op} is illegal for '{task}' in state {from:?}")
            }
            Self::StaleHandle { task } => write!(f, "stale handle for '{task}'"),
            Self::UnknownTask(id) => write!(f, "unknown task #{}", id.0),
            Self::RegistryFull => write!(f, "task registry full"),
            Self::SpawnFailed { task } => write!(f, "could not spawn '{task}'"),
        }
    }
}

impl std::error::Error for LifecycleError {}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Slot {
    spec: TaskSpec,
    state: LifecycleState,
    /// Bumped on every start; a handle is valid only for the generation
    /// it was issued with.
    generation: u32,
    /// Number of times the task has begun at its entry point.
    starts: u32,
    control: Box<dyn TaskControl>,
}

/// Fixed-population table of managed tasks.
pub struct TaskRegistry {
    slots: Vec<Slot, MAX_TASKS>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Add a task in the [`Dormant`](LifecycleState::Dormant) state.
    /// Boot-time only; there is no deregistration.
    pub fn register(
        &mut self,
        spec: TaskSpec,
        control: Box<dyn TaskControl>,
    ) -> Result<TaskId, LifecycleError> {
        let id = TaskId(self.slots.len() as u8);
        self.slots
            .push(Slot {
                spec,
                state: LifecycleState::Dormant,
                generation: 0,
                starts: 0,
                control,
            })
            .map_err(|_| LifecycleError::RegistryFull)?;
        info!("Registry: '{}' registered as #{} ({:?})", spec.name, id.0, spec.role);
        Ok(id)
    }

    // ── Lifecycle operations ──────────────────────────────────

    /// Park a running task.
    pub fn pause(&mut self, handle: &TaskHandle) -> Result<(), LifecycleError> {
        let slot = self.checked(handle, LifecycleOp::Pause, &[LifecycleState::Running])?;
        slot.control.suspend();
        slot.state = LifecycleState::Suspended;
        info!("Registry: '{}' paused", slot.spec.name);
        Ok(())
    }

    /// Un-park a paused task; it continues where it left off.
    pub fn resume(&mut self, handle: &TaskHandle) -> Result<(), LifecycleError> {
        let slot = self.checked(handle, LifecycleOp::Resume, &[LifecycleState::Suspended])?;
        slot.control.resume();
        slot.state = LifecycleState::Running;
        info!("Registry: '{}' resumed", slot.spec.name);
        Ok(())
    }

    /// Ask a running task to clean up and exit.  The handle is consumed.
    pub fn cooperative_stop(&mut self, handle: TaskHandle) -> Result<(), LifecycleError> {
        let slot = self.checked(
            &handle,
            LifecycleOp::CooperativeStop,
            &[LifecycleState::Running],
        )?;
        slot.control.request_stop();
        slot.state = LifecycleState::Terminated;
        info!("Registry: '{}' asked to stop", slot.spec.name);
        Ok(())
    }

    /// Halt a running task immediately.  The handle is consumed; the
    /// caller owns quiescing the task's peripheral.
    pub fn force_stop(&mut self, handle: TaskHandle) -> Result<(), LifecycleError> {
        let slot = self.checked(&handle, LifecycleOp::ForceStop, &[LifecycleState::Running])?;
        slot.control.kill();
        slot.state = LifecycleState::Terminated;
        info!("Registry: '{}' force-stopped", slot.spec.name);
        Ok(())
    }

    /// Start the task from its entry point and issue a handle for the
    /// new run.  Legal only from `Dormant` or `Terminated`.
    pub fn reset_and_start(&mut self, id: TaskId) -> Result<TaskHandle, LifecycleError> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(LifecycleError::UnknownTask(id))?;
        if !matches!(
            slot.state,
            LifecycleState::Dormant | LifecycleState::Terminated
        ) {
            return Err(LifecycleError::IllegalTransition {
                task: slot.spec.name,
                op: LifecycleOp::ResetAndStart,
                from: slot.state,
            });
        }

        slot.control.start()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.starts += 1;
        slot.state = LifecycleState::Running;
        info!("Registry: '{}' started (run {})", slot.spec.name, slot.starts);

        Ok(TaskHandle {
            id,
            generation: slot.generation,
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self, id: TaskId) -> Option<LifecycleState> {
        self.slots.get(id.index()).map(|s| s.state)
    }

    pub fn spec(&self, id: TaskId) -> Option<&TaskSpec> {
        self.slots.get(id.index()).map(|s| &s.spec)
    }

    /// How many times the task has been started at its entry point.
    pub fn start_count(&self, id: TaskId) -> u32 {
        self.slots.get(id.index()).map_or(0, |s| s.starts)
    }

    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.slots
            .iter()
            .position(|s| s.spec.name == name)
            .map(|i| TaskId(i as u8))
    }

    /// Every registered task, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskSpec, LifecycleState)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (TaskId(i as u8), &s.spec, s.state))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // ── Internal ──────────────────────────────────────────────

    fn checked(
        &mut self,
        handle: &TaskHandle,
        op: LifecycleOp,
        legal_from: &[LifecycleState],
    ) -> Result<&mut Slot, LifecycleError> {
        let slot = self
            .slots
            .get_mut(handle.id.index())
            .ok_or(LifecycleError::UnknownTask(handle.id))?;
        if slot.generation != handle.generation {
            return Err(LifecycleError::StaleHandle {
                task: slot.spec.name,
            });
        }
        if !legal_from.contains(&slot.state) {
            return Err(LifecycleError::IllegalTransition {
                task: slot.spec.name,
                op,
                from: slot.state,
            });
        }
        Ok(slot)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
