//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the mode controller.
//! Most run against recording mock tasks and a recording board;
//! `thread_tests` drives the thread-backed workers on the host.

mod mock_tasks;
mod scenario_tests;
mod thread_tests;
