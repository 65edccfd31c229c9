//! kpipe library - expose modules for testing
//!
//! The binary in `main.rs` only parses arguments and dispatches to the
//! command handlers defined here.

pub mod commands;
pub mod common;
pub mod errors;
pub mod pipeline_config;

pub use common::GlobalOpts;
