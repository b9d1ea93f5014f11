//! Tracing setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the level from the
/// config file or `--log-level`; an unparseable level falls back to `info`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}
