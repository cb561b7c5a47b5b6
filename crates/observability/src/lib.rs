//! Tracing/logging setup shared by the binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, LogFormatError};

/// Initialize process-wide logging with the format from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init(LogFormat::from_env());
}
