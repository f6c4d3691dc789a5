use crate::config::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Level after `-v` flags are applied on top of the configured one.
pub fn effective_level(config: &LoggingConfig, verbose: u8, quiet: bool) -> LogLevel {
    if quiet {
        return LogLevel::Error;
    }

    match verbose {
        0 => config.level,
        1 => most_verbose(config.level, LogLevel::Info),
        2 => most_verbose(config.level, LogLevel::Debug),
        _ => LogLevel::Trace,
    }
}

fn most_verbose(a: LogLevel, b: LogLevel) -> LogLevel {
    let rank = |level: LogLevel| match level {
        LogLevel::Trace => 0,
        LogLevel::Debug => 1,
        LogLevel::Info => 2,
        LogLevel::Warn => 3,
        LogLevel::Error => 4,
    };
    if rank(a) <= rank(b) {
        a
    } else {
        b
    }
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: LogLevel) -> String {
    format!("warn,idsift={}", level)
}

/// Install the global subscriber. Diagnostics go to stderr so stdout stays
/// reserved for the formatter. Calling this twice is harmless.
pub fn init(config: &LoggingConfig, verbose: u8, quiet: bool) {
    let level = effective_level(config, verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: LogLevel) -> LoggingConfig {
        LoggingConfig {
            format: LogFormat::Text,
            level,
        }
    }

    #[test]
    fn test_verbosity_raises_level() {
        let config = logging(LogLevel::Warn);
        assert_eq!(effective_level(&config, 0, false), LogLevel::Warn);
        assert_eq!(effective_level(&config, 1, false), LogLevel::Info);
        assert_eq!(effective_level(&config, 2, false), LogLevel::Debug);
        assert_eq!(effective_level(&config, 5, false), LogLevel::Trace);
    }

    #[test]
    fn test_verbosity_never_lowers_level() {
        let config = logging(LogLevel::Debug);
        assert_eq!(effective_level(&config, 1, false), LogLevel::Debug);
    }

    #[test]
    fn test_quiet_wins() {
        let config = logging(LogLevel::Trace);
        assert_eq!(effective_level(&config, 3, true), LogLevel::Error);
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(LogLevel::Info), "warn,idsift=info");
    }

    #[test]
    fn test_init_twice() {
        let config = logging(LogLevel::Warn);
        init(&config, 0, false);
        init(&config, 0, false);
    }
}
