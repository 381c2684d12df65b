//! Tagbot binary library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Settings, backend wiring and command implementations

pub mod cli;
pub mod commands;

pub use cli::{BackendArg, Cli, Commands};
pub use commands::{init_logging, load_settings, load_schema, open_backend, App, Overrides};
