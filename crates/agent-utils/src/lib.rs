//! Shared utilities for the financial analysis orchestrator
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and configuration file helpers.

pub mod config;
pub mod logging;

pub use config::{env_var, load_toml, parse_toml};
pub use logging::{LogFormat, init_tracing_with};
