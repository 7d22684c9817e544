//! Modelmart - command-line client for the model marketplace.

pub mod cli;
pub mod config;

pub use config::{ConfigError, ModelmartConfig};
