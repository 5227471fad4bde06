//! # Logging
//!
//! Installs the global `tracing` subscriber used by every quakewatch binary:
//! a human-readable stdout layer and a JSON file layer rolling daily under the
//! configured log directory.

/// Subscriber setup and log file housekeeping.
pub mod setup;

pub use setup::{cleanup_old_logs, setup_logging, LOG_FILES_KEPT};
