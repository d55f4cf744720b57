//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`run`] - Drive a local job manager over stdin/stdout

pub mod config;
pub mod run;
