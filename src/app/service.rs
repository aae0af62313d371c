//! Application service: the mode controller.
//!
//! [`ModeController`] owns the mode machine, the context the handlers
//! act on, and the receiving end of the event bus.  It is the only
//! consumer of the bus and the only writer of the current mode.
//!
//! ```text
//!  sources ──▶ EventSender ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                              │      ModeController      │
//!                              │  ModeMachine · Context   │ ──▶ BoardPort
//!                              └──────────────────────────┘
//!                                           │
//!                                    TaskRegistry ──▶ managed tasks
//! ```

use log::{error, info};

use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::events::{EventFlags, EventReceiver};
use crate::fsm::context::ModeContext;
use crate::fsm::modes::{build_mode_table, TRANSITIONS};
use crate::fsm::{Mode, ModeMachine, Outcome};
use crate::lifecycle::TaskRegistry;

use super::events::AppEvent;
use super::ports::{BoardPort, EventSink};

/// Which of the two top-level paths startup took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPath {
    /// Initial entry action ran; the reactive loop follows.
    Reactive,
    /// The simulated mission's entry action ran; there is no loop.
    Simulated(Mode),
}

// ───────────────────────────────────────────────────────────────
// ModeController
// ───────────────────────────────────────────────────────────────

pub struct ModeController {
    machine: ModeMachine,
    ctx: ModeContext,
    rx: EventReceiver,
    started: Option<StartupPath>,
    wakes: u64,
}

impl ModeController {
    /// Assemble the controller.  No task is touched until [`start`].
    ///
    /// [`start`]: Self::start
    pub fn new(
        config: SystemConfig,
        registry: TaskRegistry,
        board: Box<dyn BoardPort + Send>,
        rx: EventReceiver,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let ctx = ModeContext::new(config, registry, board)?;
        let machine = ModeMachine::new(build_mode_table(), &TRANSITIONS, Mode::DataCapture);
        Ok(Self {
            machine,
            ctx,
            rx,
            started: None,
            wakes: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run the initial entry action, or the simulated mission's entry
    /// when the configuration selects one.  Callable once.
    pub fn start(&mut self, sink: &mut impl EventSink) -> Result<StartupPath> {
        if self.started.is_some() {
            return Err(Error::Init("controller already started"));
        }

        let path = match self.ctx.config.simulate {
            Some(mission) => {
                self.machine.simulate(mission, &mut self.ctx)?;
                sink.emit(&AppEvent::Simulated(mission));
                StartupPath::Simulated(mission)
            }
            None => {
                self.machine.start(&mut self.ctx)?;
                sink.emit(&AppEvent::Started(self.machine.current()));
                StartupPath::Reactive
            }
        };
        self.started = Some(path);
        Ok(path)
    }

    /// Start, then serve the bus forever.
    ///
    /// Returns `Ok(())` only on the simulated path, straight after the
    /// mission's entry action.  On the reactive path it returns only if
    /// a handler fails.
    pub fn run(&mut self, sink: &mut impl EventSink) -> Result<()> {
        if let StartupPath::Simulated(mission) = self.start(sink)? {
            info!("Simulated {:?}; reactive loop skipped", mission);
            return Ok(());
        }

        loop {
            let flags = self.rx.wait();
            if let Err(e) = self.handle_wake(flags, sink) {
                error!("Mode controller halted: {}", e);
                return Err(e);
            }
        }
    }

    // ── Event handling ────────────────────────────────────────

    /// Evaluate one drained flag set against the current mode.
    pub fn handle_wake(&mut self, flags: EventFlags, sink: &mut impl EventSink) -> Result<()> {
        if self.started != Some(StartupPath::Reactive) {
            return Err(Error::Init("reactive loop not started"));
        }
        self.wakes += 1;

        // Each outcome is reported once its signal is handled, so a
        // failure later in the same wake still leaves the earlier
        // transitions visible to the sink.
        self.machine
            .dispatch_with(flags, &mut self.ctx, |outcome| sink.emit(&event_for(outcome)))
    }

    /// Drain and handle whatever is pending without blocking.
    /// Returns false if nothing was pending.
    pub fn poll(&mut self, sink: &mut impl EventSink) -> Result<bool> {
        let flags = self.rx.try_take();
        if flags.is_empty() {
            return Ok(false);
        }
        self.handle_wake(flags, sink)?;
        Ok(true)
    }

    /// Jump straight to `target` (bench / debug only).  Only valid
    /// once the reactive path has started.
    pub fn force_transition(&mut self, target: Mode, sink: &mut impl EventSink) -> Result<()> {
        if self.started != Some(StartupPath::Reactive) {
            return Err(Error::Init("reactive loop not started"));
        }
        let from = self.machine.current();
        self.machine.force_transition(target, &mut self.ctx)?;
        if self.machine.current() != from {
            sink.emit(&AppEvent::Forced { from, to: target });
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.machine.current()
    }

    pub fn context(&self) -> &ModeContext {
        &self.ctx
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.ctx.registry
    }

    /// Wakes handled since startup.
    pub fn wakes(&self) -> u64 {
        self.wakes
    }

    /// Completed mode transitions since startup.
    pub fn transitions(&self) -> u64 {
        self.machine.transitions()
    }
}

fn event_for(outcome: Outcome) -> AppEvent {
    match outcome.to {
        Some(to) => AppEvent::ModeChanged {
            from: outcome.from,
            to,
            signal: outcome.signal,
        },
        None => AppEvent::Ignored {
            signal: outcome.signal,
            mode: outcome.from,
        },
    }
}
