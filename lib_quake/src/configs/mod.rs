//! # Configuration Modules
//!
//! Layered configuration for the quakewatch binaries: built-in defaults, an
//! optional JSON config file, then environment variables (including `.env`)
//! and command-line flags.

/// Raw and resolved service configuration.
pub mod config_quake;

pub use config_quake::{
    load_config, load_from, ConfigError, IngestSource, QuakeConfig, Settings, StoreBackend,
};
