//! Logging setup.
//!
//! Everything goes to **stderr**: the engine reads the handshake port from
//! the plugin's stdout.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter, e.g. `info` or `pulumi_resource_buddy=debug`.
//!   Defaults to `info`.
//!
//! ```bash
//! # Log every Buddy API request and diff verdict
//! RUST_LOG=pulumi_resource_buddy=debug pulumi up
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the stderr subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`] with a different default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to install the subscriber, returning `false` if one is already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
