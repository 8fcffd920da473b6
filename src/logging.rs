//! Console logging for the chartset binary
//!
//! Events go to stderr so `chartset run` can print its JSON report on stdout.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives for `level`: chartset events at `level`, dependencies at warn
pub fn directives(level: &str) -> String {
    format!("warn,chartset={}", level)
}

/// Install the stderr subscriber. A set `RUST_LOG` replaces [`directives`].
///
/// Only the first call installs anything.
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directives(level))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}
