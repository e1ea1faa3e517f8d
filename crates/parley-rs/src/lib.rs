//! Public SDK surface for Parley.
//!
//! This crate re-exports the engine building blocks and provides a small
//! initialization helper to keep consumer setup consistent.

pub mod console;

/// Re-export for convenience.
pub use parley_rs_config as config;
pub use parley_rs_core as core;
/// Re-export for convenience.
pub use parley_rs_memory as memory;
/// Re-export for convenience.
pub use parley_rs_protocol as protocol;

pub use console::ConsoleGateway;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries should call it
/// before building the assistant so startup warnings are visible.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
