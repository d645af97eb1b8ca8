//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory (or an explicit path) and falls back to the
//! stock demo settings when no file exists yet.

pub mod config;
