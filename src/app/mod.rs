//! Application core: mission logic behind port traits.
//!
//! The mode controller lives here together with the events it emits and
//! the ports it drives.  Board access happens only through the traits
//! in [`ports`], so the whole controller runs on the host.

pub mod events;
pub mod ports;
pub mod service;
