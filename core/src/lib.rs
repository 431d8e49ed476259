//! # passgraph core
//!
//! Shared utilities for the passgraph workspace.
//!
//! - [`config`] - Generic key/value configuration records and the validating
//!   reader that turns them into strongly typed per-pass settings.

pub mod config;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("passgraph core v{} initialized", VERSION);
}
