//! Structured logging initialization (spec.md "Ambient stack").
//!
//! This crate never prints: every component emits `tracing` events at
//! its boundaries (connection open/close, migration steps, rollback)
//! and leaves presentation to the caller. `init_logging` is an opt-in
//! convenience for binaries embedding this crate directly; library
//! code never calls it on its own behalf.

use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Install a global `tracing` subscriber honoring `RUST_LOG`, falling
/// back to `default_filter(verbosity)` when unset.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbosity)))
        .map_err(|e| crate::error::BeadsError::Other(anyhow::anyhow!(e)))?;

    let subscriber = fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_file(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions))
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(env_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| crate::error::BeadsError::Other(anyhow::anyhow!(e)))?;

    Ok(())
}

fn default_filter(verbosity: u8) -> String {
    match verbosity {
        0 => {
            if cfg!(debug_assertions) {
                "bead_store=debug".to_string()
            } else {
                "bead_store=info".to_string()
            }
        }
        1 => "bead_store=debug".to_string(),
        2 => "bead_store=debug,rusqlite=debug".to_string(),
        _ => "bead_store=trace".to_string(),
    }
}

/// Initialize logging for tests, using the test writer so output is
/// captured alongside `cargo test` output. Safe to call from many
/// tests: the actual installation happens once per process.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("bead_store=debug,test=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}
