//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding an explicit filter, e.g.
/// `PLAGIARIZED_CODE_LOG=plagiarized_code::tracker=trace,warn`.
pub const LOG_ENV: &str = "PLAGIARIZED_CODE_LOG";

static INIT: Once = Once::new();

/// Filter for a `-v` count: warn, info, debug, then trace.
pub fn verbosity_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the stderr subscriber.
///
/// `PLAGIARIZED_CODE_LOG` wins over the verbosity when it holds a valid
/// filter. Calling this more than once is a no-op.
pub fn init_tracing(verbosity: u8) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| verbosity_filter(verbosity));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 2),
            )
            .with(filter)
            .init();
    });
}
