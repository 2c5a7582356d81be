//! Library half of the `wx-ingest` binary: configuration, seed loading and
//! the subcommands, kept here so they can be tested without a process.

pub mod commands;
pub mod config;
pub mod config_loader;
pub mod logging;

pub use config::IngesterConfig;
