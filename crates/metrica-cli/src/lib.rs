#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Metrica CLI
//!
//! Configuration loading and operator output for the `metrica` binary.

pub mod config;
pub mod output;

pub use config::{AppConfig, Overrides};
