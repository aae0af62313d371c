//! biotag firmware library.
//!
//! Mission-mode controller for an animal-borne recording tag: a
//! coalescing event bus, a registry of lifecycle-managed tasks, and the
//! mode machine that arbitrates between data capture, recovery beacon
//! and USB offload.  Exposed as a library for integration testing and
//! the host bench binary.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod lifecycle;
pub mod sources;
pub mod workers;

pub use error::{Error, Result};
