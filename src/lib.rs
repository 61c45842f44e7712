//! List USB devices attached to the system as a tree following the
//! physical bus/port topology, together with the Linux device nodes
//! and network interfaces udev created for them.
//!
//! Segment/mapping configuration files overlay human-friendly labels
//! onto bus positions, and labelled device nodes can be exported as
//! stably-ordered `NAME=value` environment bindings for scripting
//! against hardware whose enumeration order is not predictable - with
//! an optional wait loop that retries the snapshot until a required
//! set of bindings exists.
#![warn(missing_docs)]
use simple_logger::SimpleLogger;

pub mod config;
pub mod display;
pub mod env;
pub mod error;
pub mod filter;
pub mod labels;
pub mod path;
pub mod profiler;
pub mod tree;
pub mod wait;

/// Set lsudt module and binary log level
pub fn set_log_level(debug: u8) -> crate::error::Result<()> {
    match debug {
        // just use env if not passed
        0 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Error.to_level_filter())
            .env(),
        1 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Info.to_level_filter()),
        2 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Debug.to_level_filter()),
        _ => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Trace.to_level_filter()),
    }
    .init()
    .map_err(|e| {
        crate::error::Error::new(
            crate::error::ErrorKind::Other("simple_logger"),
            &format!("Failed to set log level: {e}"),
        )
    })?;

    Ok(())
}
