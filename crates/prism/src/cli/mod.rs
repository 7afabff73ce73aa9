//! Subcommand implementations.

pub mod config;
pub mod filters;
pub mod process;
