//! Native-thread backend for [`TaskControl`].
//!
//! Each run of a task is one OS thread executing a [`TaskBody`] step by
//! step.  Between steps the thread consults its run directive:
//!
//! ```text
//!   RUN  ──▶ execute one step
//!   PARK ──▶ sleep on the wake signal, re-check
//!   KILL ──▶ return immediately, no cleanup
//! ```
//!
//! Suspension therefore takes effect at the next step boundary and
//! never runs body code while parked.  A kill likewise cannot interrupt
//! a step already in flight, which is why force-stop callers quiesce
//! the peripheral themselves.
//!
//! Restarting abandons the previous run (it receives KILL) and spawns a
//! new thread around a freshly built body, so no progress carries over.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future::block_on;
use log::{error, info};

use super::{LifecycleError, TaskControl};
use crate::events::FlagGroup;

/// The single bit of a task's private stop group.
pub const STOP_REQUEST: u8 = 0b0000_0001;

const DIRECTIVE_RUN: u8 = 0;
const DIRECTIVE_PARK: u8 = 1;
const DIRECTIVE_KILL: u8 = 2;

// ═══════════════════════════════════════════════════════════════
//  Task body
// ═══════════════════════════════════════════════════════════════

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Exit,
}

/// Read-only view of a task's private stop group.
pub struct StopToken<'a> {
    group: &'a FlagGroup,
}

impl<'a> StopToken<'a> {
    pub fn new(group: &'a FlagGroup) -> Self {
        Self { group }
    }

    /// True once the controller has asked this run to stop.
    pub fn is_requested(&self) -> bool {
        self.group.peek() & STOP_REQUEST != 0
    }
}

/// The code of a managed task.
///
/// `step` is one iteration of the task's main loop.  Cooperative tasks
/// check the stop token at the top of `step`, release whatever they
/// hold and return [`Step::Exit`].
pub trait TaskBody: Send {
    /// Runs once at the entry point of every run.
    fn on_start(&mut self) {}

    fn step(&mut self, stop: &StopToken<'_>) -> Step;
}

/// Builds a fresh body for each run.
pub type BodyFactory = Box<dyn Fn() -> Box<dyn TaskBody> + Send>;

// ═══════════════════════════════════════════════════════════════
//  Per-run control block
// ═══════════════════════════════════════════════════════════════

struct RunControl {
    directive: AtomicU8,
    wake: Signal<CriticalSectionRawMutex, ()>,
    stop: FlagGroup,
}

impl RunControl {
    fn new() -> Self {
        Self {
            directive: AtomicU8::new(DIRECTIVE_RUN),
            wake: Signal::new(),
            stop: FlagGroup::new(),
        }
    }

    /// Set the directive unless the run was already killed.  KILL is
    /// final for a run.
    fn set_directive(&self, directive: u8) {
        let _ = self
            .directive
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != DIRECTIVE_KILL).then_some(directive)
            });
    }

    fn direct(&self, directive: u8) {
        self.set_directive(directive);
        self.wake.signal(());
    }
}

fn run_loop(name: &'static str, ctrl: &RunControl, mut body: Box<dyn TaskBody>) {
    body.on_start();
    loop {
        match ctrl.directive.load(Ordering::Acquire) {
            DIRECTIVE_KILL => {
                info!("Task '{}': halted", name);
                return;
            }
            DIRECTIVE_PARK => {
                block_on(ctrl.wake.wait());
                continue;
            }
            _ => {}
        }

        let token = StopToken::new(&ctrl.stop);
        if body.step(&token) == Step::Exit {
            info!("Task '{}': exited", name);
            return;
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ThreadTask
// ═══════════════════════════════════════════════════════════════

/// A managed task backed by one native thread per run.
pub struct ThreadTask {
    name: &'static str,
    stack_kb: usize,
    factory: BodyFactory,
    run: Option<Arc<RunControl>>,
}

impl ThreadTask {
    pub fn new(name: &'static str, stack_kb: usize, factory: BodyFactory) -> Self {
        Self {
            name,
            stack_kb,
            factory,
            run: None,
        }
    }

    fn current(&self) -> Option<&RunControl> {
        self.run.as_deref()
    }
}

impl TaskControl for ThreadTask {
    fn start(&mut self) -> Result<(), LifecycleError> {
        if let Some(old) = self.run.take() {
            old.direct(DIRECTIVE_KILL);
        }

        let ctrl = Arc::new(RunControl::new());
        let body = (self.factory)();
        let name = self.name;
        let thread_ctrl = Arc::clone(&ctrl);

        info!("Spawning '{}' (stack={}KB)", name, self.stack_kb);
        std::thread::Builder::new()
            .name(name.into())
            .stack_size(self.stack_kb * 1024)
            .spawn(move || run_loop(name, &thread_ctrl, body))
            .map_err(|e| {
                error!("Task '{}': spawn failed: {}", name, e);
                LifecycleError::SpawnFailed { task: name }
            })?;

        self.run = Some(ctrl);
        Ok(())
    }

    fn suspend(&mut self) {
        if let Some(ctrl) = self.current() {
            ctrl.set_directive(DIRECTIVE_PARK);
        }
    }

    fn resume(&mut self) {
        if let Some(ctrl) = self.current() {
            ctrl.direct(DIRECTIVE_RUN);
        }
    }

    fn request_stop(&mut self) {
        if let Some(ctrl) = self.current() {
            ctrl.stop.set(STOP_REQUEST);
        }
    }

    fn kill(&mut self) {
        if let Some(ctrl) = self.current() {
            ctrl.direct(DIRECTIVE_KILL);
        }
    }
}
