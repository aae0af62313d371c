//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements | Connects to                 |
//! |---------------|------------|-----------------------------|
//! | `board`       | BoardPort  | Simulated SD bus and DMA    |
//! | `config_file` | ConfigPort | JSON file on the bench host |
//! | `log_sink`    | EventSink  | `log` facade                |

pub mod board;
pub mod config_file;
pub mod log_sink;
