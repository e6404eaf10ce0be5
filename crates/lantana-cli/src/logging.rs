//! Logging setup and report markers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Accepted `--log-level` values.
pub const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Initialize tracing on stderr with a default filter.
///
/// An explicit `RUST_LOG` takes precedence over `default_filter`.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Markers shared by log lines and printed reports.
pub mod prefix {
    /// Anchoring operations
    pub const ANCHOR: &str = "⚓";
    /// Passed check
    pub const OK: &str = "✓";
    /// Failed check
    pub const FAIL: &str = "✗";
}
