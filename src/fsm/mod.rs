//! Function-pointer mode machine.
//!
//! Classic embedded FSM pattern, driven by signals instead of ticks:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ModeTable                                               │
//! │  ┌─────────────┬───────────┬──────────────────────────┐  │
//! │  │ Mode        │ on_enter  │ on_exit (default exit)   │  │
//! │  ├─────────────┼───────────┼──────────────────────────┤  │
//! │  │ DataCapture │ fn(ctx)   │ fn(ctx)  pause capture   │  │
//! │  │ Recovery    │ fn(ctx)   │ fn(ctx)  stop beacon     │  │
//! │  │ Offload     │ fn(ctx)   │ fn(ctx)  restore clock   │  │
//! │  │ Simulating  │ none      │ none                     │  │
//! │  └─────────────┴───────────┴──────────────────────────┘  │
//! │                                                          │
//! │  TransitionRules  (from, signal) ──exit──▶ to            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! On each wake the engine walks the drained signals in priority order.
//! For every signal that has a rule for the **current** mode it runs the
//! rule's exit action, then the target's `on_enter`, and only then
//! updates the current mode.  A later signal in the same wake is judged
//! against the mode the earlier one produced.  Signals without a rule
//! are no-ops.
//!
//! All actions receive `&mut ModeContext`, which owns the task registry,
//! the mission task sets, the board port and the configuration.

pub mod context;
pub mod modes;

use heapless::Vec;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::{EventFlags, Signal};
use context::ModeContext;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Top-level mission phase.  Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    DataCapture = 0,
    Recovery = 1,
    Offload = 2,
    /// Startup-only bypass of the reactive loop.
    Simulating = 3,
}

impl Mode {
    /// Total number of modes, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `Mode`.  Panics on out-of-range in
    /// debug builds; returns `DataCapture` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::DataCapture,
            1 => Self::Recovery,
            2 => Self::Offload,
            3 => Self::Simulating,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::DataCapture
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for entry and exit actions.
pub type ModeActionFn = fn(&mut ModeContext) -> Result<()>;

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// Static descriptor for a single mode.
pub struct ModeDescriptor {
    pub mode: Mode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    /// Exit used by forced transitions.  Signal-driven transitions use
    /// the exit named by their [`TransitionRule`].
    pub on_exit: Option<ModeActionFn>,
}

/// One valid (mode, signal) pairing.
pub struct TransitionRule {
    pub from: Mode,
    pub signal: Signal,
    pub exit: ModeActionFn,
    pub to: Mode,
}

/// What one signal did during a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub signal: Signal,
    pub from: Mode,
    /// `None` when the signal had no rule for `from`.
    pub to: Option<Mode>,
}

// ---------------------------------------------------------------------------
// Mode machine
// ---------------------------------------------------------------------------

/// The mode machine engine.  Sole writer of the current mode.
pub struct ModeMachine {
    table: [ModeDescriptor; Mode::COUNT],
    rules: &'static [TransitionRule],
    current: Mode,
    /// Number of completed transitions (signal-driven or forced).
    transitions: u64,
}

impl ModeMachine {
    /// Construct the machine starting in `initial`.  No action runs
    /// until [`start`](Self::start) or [`simulate`](Self::simulate).
    pub fn new(
        table: [ModeDescriptor; Mode::COUNT],
        rules: &'static [TransitionRule],
        initial: Mode,
    ) -> Self {
        debug_assert!(
            table
                .iter()
                .enumerate()
                .all(|(i, d)| Mode::from_index(i) == d.mode),
            "mode table out of order"
        );
        Self {
            table,
            rules,
            current: initial,
            transitions: 0,
        }
    }

    /// Run the initial mode's entry action.  Call once before the first
    /// [`dispatch`](Self::dispatch).
    pub fn start(&mut self, ctx: &mut ModeContext) -> Result<()> {
        info!("Mode machine starting in {}", self.descriptor(self.current).name);
        if let Some(enter) = self.descriptor(self.current).on_enter {
            enter(ctx)?;
        }
        Ok(())
    }

    /// One-shot simulated boot: the machine sits in `Simulating` and
    /// runs `mission`'s entry action once.  No rule leaves `Simulating`.
    pub fn simulate(&mut self, mission: Mode, ctx: &mut ModeContext) -> Result<()> {
        info!("Mode machine simulating {}", self.descriptor(mission).name);
        self.current = Mode::Simulating;
        if let Some(enter) = self.descriptor(mission).on_enter {
            enter(ctx)?;
        }
        Ok(())
    }

    /// Evaluate every drained signal against the current mode, in
    /// priority order, running exit → entry for each valid pairing.
    pub fn dispatch(
        &mut self,
        flags: EventFlags,
        ctx: &mut ModeContext,
    ) -> Result<Vec<Outcome, 5>> {
        let mut outcomes = Vec::new();
        // Capacity equals the number of distinct signals.
        self.dispatch_with(flags, ctx, |o| {
            let _ = outcomes.push(o);
        })?;
        Ok(outcomes)
    }

    /// Like [`dispatch`](Self::dispatch), but hands each outcome to
    /// `observe` as soon as its signal has been handled.  If a later
    /// signal's action fails, the earlier outcomes have already been
    /// observed.
    pub fn dispatch_with(
        &mut self,
        flags: EventFlags,
        ctx: &mut ModeContext,
        mut observe: impl FnMut(Outcome),
    ) -> Result<()> {
        for signal in flags.iter() {
            let from = self.current;
            let to = match self.rule_for(from, signal) {
                Some(rule) => {
                    info!(
                        "Mode transition on {}: {} -> {}",
                        signal.name(),
                        self.descriptor(from).name,
                        self.descriptor(rule.to).name
                    );
                    (rule.exit)(ctx)?;
                    self.enter(rule.to, ctx)?;
                    Some(rule.to)
                }
                None => {
                    debug!(
                        "{} ignored in {}",
                        signal.name(),
                        self.descriptor(from).name
                    );
                    None
                }
            };
            observe(Outcome { signal, from, to });
        }
        Ok(())
    }

    /// Jump to `next` regardless of signals (bench / debug only): runs
    /// the current mode's default exit, then `next`'s entry.
    ///
    /// `Simulating` is neither a legal target nor a mode that can be
    /// left.
    pub fn force_transition(&mut self, next: Mode, ctx: &mut ModeContext) -> Result<()> {
        if self.current == Mode::Simulating || next == Mode::Simulating {
            return Err(Error::Forbidden {
                from: self.current,
                to: next,
            });
        }
        if next == self.current {
            return Ok(());
        }
        info!(
            "Forced transition: {} -> {}",
            self.descriptor(self.current).name,
            self.descriptor(next).name
        );
        if let Some(exit) = self.descriptor(self.current).on_exit {
            exit(ctx)?;
        }
        self.enter(next, ctx)
    }

    /// The currently active mode.
    pub fn current(&self) -> Mode {
        self.current
    }

    /// Completed transitions since construction.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn descriptor(&self, mode: Mode) -> &ModeDescriptor {
        &self.table[mode as usize]
    }

    fn rule_for(&self, from: Mode, signal: Signal) -> Option<&'static TransitionRule> {
        let rules: &'static [TransitionRule] = self.rules;
        rules.iter().find(|r| r.from == from && r.signal == signal)
    }

    /// Entry action first, then the pointer update.
    fn enter(&mut self, next: Mode, ctx: &mut ModeContext) -> Result<()> {
        if let Some(enter) = self.descriptor(next).on_enter {
            enter(ctx)?;
        }
        self.current = next;
        self.transitions += 1;
        Ok(())
    }
}
