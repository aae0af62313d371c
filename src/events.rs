//! Coalescing event-flag bus.
//!
//! Events are produced by:
//! - The geofence evaluator (GPS fix outside the permitted zone)
//! - The battery monitor (critical cell voltage)
//! - The USB attach detector (VBUS rising edge)
//! - The burn-wire detector (tag released)
//! - The mission timer (timeout)
//!
//! and consumed by exactly one task, the mode controller, which drains
//! every pending bit at once and evaluates them in priority order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Geofence    │────▶│              │     │                │
//! │ Battery     │────▶│  FlagGroup   │────▶│ ModeController │
//! │ USB attach  │────▶│  (OR, clear) │     │  (consumer)    │
//! │ Burn-wire   │────▶│              │     │                │
//! └─────────────┘     └──────────────┘     └────────────────┘
//! ```
//!
//! Setting a bit that is already pending is a no-op: the consumer sees
//! one occurrence no matter how many producers raised it.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal as WakeSignal;
use futures_lite::future::block_on;

// ═══════════════════════════════════════════════════════════════
//  Signal identity
// ═══════════════════════════════════════════════════════════════

/// Named bits of the controller's input group.
///
/// Declaration order is evaluation order: when several bits are drained
/// in one wake the controller handles them front to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signal {
    /// Mission timer expired.  Reserved.
    Timeout = 0b0000_0001,
    /// GPS fix outside the permitted zone.
    GeofenceExit = 0b0000_0010,
    /// Battery below the critical level.  Reserved.
    LowBattery = 0b0000_0100,
    /// USB host attached.
    UsbConnected = 0b0000_1000,
    /// Burn-wire release completed.  Reserved.
    TagReleased = 0b0001_0000,
}

impl Signal {
    /// Every signal, in evaluation priority order.
    pub const PRIORITY: [Signal; 5] = [
        Signal::Timeout,
        Signal::GeofenceExit,
        Signal::LowBattery,
        Signal::UsbConnected,
        Signal::TagReleased,
    ];

    /// Union of all defined bits.
    pub const ALL: u8 = 0b0001_1111;

    /// Return the bitmask for this signal.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::GeofenceExit => "GeofenceExit",
            Self::LowBattery => "LowBattery",
            Self::UsbConnected => "UsbConnected",
            Self::TagReleased => "TagReleased",
        }
    }
}

/// A set of pending [`Signal`]s as drained in one wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits.  Undefined bits are discarded.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Signal::ALL)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & signal.mask() != 0
    }

    pub fn insert(&mut self, signal: Signal) {
        self.0 |= signal.mask();
    }

    /// Pending signals in evaluation priority order.
    pub fn iter(self) -> impl Iterator<Item = Signal> {
        Signal::PRIORITY
            .into_iter()
            .filter(move |s| self.contains(*s))
    }
}

impl From<Signal> for EventFlags {
    fn from(signal: Signal) -> Self {
        Self(signal.mask())
    }
}

impl FromIterator<Signal> for EventFlags {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut flags = Self::empty();
        for s in iter {
            flags.insert(s);
        }
        flags
    }
}

// ═══════════════════════════════════════════════════════════════
//  Flag group
// ═══════════════════════════════════════════════════════════════

/// An 8-bit OR-then-clear flag group with a single waiter.
///
/// Producers OR bits in and raise the wake signal; the waiter swaps
/// the word to zero.  A wake that races with a drain is harmless: the
/// waiter re-checks the word and goes back to sleep if it is empty.
pub struct FlagGroup {
    bits: AtomicU8,
    wake: WakeSignal<CriticalSectionRawMutex, ()>,
}

impl FlagGroup {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
            wake: WakeSignal::new(),
        }
    }

    /// OR `mask` into the group and wake the waiter.  Never blocks.
    pub fn set(&self, mask: u8) {
        self.bits.fetch_or(mask, Ordering::AcqRel);
        self.wake.signal(());
    }

    /// Drain every pending bit without waiting.
    pub fn take(&self) -> u8 {
        self.bits.swap(0, Ordering::AcqRel)
    }

    /// Pending bits, without clearing them.
    pub fn peek(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }

    /// Wait until at least one bit is set, then drain them all.
    pub async fn drained(&self) -> u8 {
        loop {
            let bits = self.take();
            if bits != 0 {
                return bits;
            }
            self.wake.wait().await;
        }
    }

    /// Blocking form of [`drained`](Self::drained).
    pub fn wait(&self) -> u8 {
        block_on(self.drained())
    }
}

impl Default for FlagGroup {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Controller input channel
// ═══════════════════════════════════════════════════════════════

/// Create the controller's input group.
///
/// The sender half is cloneable and handed to every event source; the
/// receiver is not, so only one task can ever consume the group.
pub fn channel() -> (EventSender, EventReceiver) {
    let group = Arc::new(FlagGroup::new());
    (
        EventSender {
            group: Arc::clone(&group),
        },
        EventReceiver { group },
    )
}

/// Producer side of the controller's input group.
#[derive(Clone)]
pub struct EventSender {
    group: Arc<FlagGroup>,
}

impl EventSender {
    /// Raise `signal`.  Safe from any thread; never blocks.
    pub fn signal(&self, signal: Signal) {
        log::debug!("bus: {} raised", signal.name());
        self.group.set(signal.mask());
    }
}

/// Consumer side of the controller's input group.
pub struct EventReceiver {
    group: Arc<FlagGroup>,
}

impl EventReceiver {
    /// Block until something is pending, then drain everything.
    pub fn wait(&self) -> EventFlags {
        EventFlags::from_bits(self.group.wait())
    }

    /// Drain without blocking.  Empty if nothing was pending.
    pub fn try_take(&self) -> EventFlags {
        EventFlags::from_bits(self.group.take())
    }

    /// Signals currently pending, left in place.
    pub fn pending(&self) -> EventFlags {
        EventFlags::from_bits(self.group.peek())
    }
}
