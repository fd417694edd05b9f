//! Logging configuration using tracing.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Multi-field format with targets
    Pretty,
    /// One line per event
    #[default]
    Compact,
}

/// Level used when `RUST_LOG` is unset.
pub fn default_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// Later calls are no-ops, so the CLI can be driven repeatedly in one process.
pub fn init_logging(format: LogFormat, default_level: Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_level(0, false), Level::WARN);
        assert_eq!(default_level(1, false), Level::INFO);
        assert_eq!(default_level(2, false), Level::DEBUG);
        assert_eq!(default_level(5, false), Level::TRACE);
        assert_eq!(default_level(3, true), Level::ERROR);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(LogFormat::Compact, Level::WARN);
        init_logging(LogFormat::Pretty, Level::INFO);
    }
}
