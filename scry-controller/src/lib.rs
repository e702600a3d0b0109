//! scry controller library.
//!
//! The binary in `main.rs` is a thin CLI wrapper around
//! [`controller::Controller`] and the interactive prompt parser.

pub mod config;
pub mod controller;

pub use config::ControllerConfig;
pub use controller::{CliCommand, Controller, parse_line};
