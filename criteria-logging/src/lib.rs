//! Logging setup shared by binaries and tests that embed the criteria query compiler.

use std::str::FromStr;

use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// Corresponds to [`tracing_subscriber::fmt::format::Compact`]
    Compact,

    /// Corresponds to [`tracing_subscriber::fmt::format::Full`]
    Full,

    /// Corresponds to [`tracing_subscriber::fmt::format::Pretty`]
    Pretty,

    /// Corresponds to [`tracing_subscriber::fmt::format::Json`]
    Json,
}

/// Error type for the [`FromStr`] implementation for [`LogFormat`]
#[derive(Debug, Error)]
#[error("Invalid log format '{0}', expected one of 'compact', 'full', 'pretty', or 'json'")]
pub struct InvalidLogFormat(String);

impl FromStr for LogFormat {
    type Err = InvalidLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(InvalidLogFormat(s.to_owned())),
        }
    }
}

pub fn warn_if_debug_build() {
    if cfg!(debug_assertions) {
        warn!("Running a debug build")
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Options {
    /// Format to use when emitting log events.
    #[arg(long, env = "LOG_FORMAT", default_value = "full")]
    log_format: LogFormat,

    /// Log level filter for spans and events. The log level filter string is a comma separated
    /// list of directives.
    /// See [`tracing_subscriber::EnvFilter`] for full documentation on the directive syntax.
    ///
    /// Examples:
    ///
    /// Log at DEBUG level for the compiler and INFO for everything else.
    /// ```bash
    /// LOG_LEVEL=info,criteria_query=debug
    /// ```
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Full,
            log_level: "info".to_owned(),
        }
    }
}

impl Options {
    pub fn init(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_new(&self.log_level)?;
        let s = tracing_subscriber::fmt().with_env_filter(filter);

        match self.log_format {
            LogFormat::Compact => s.compact().try_init(),
            LogFormat::Full => s.try_init(),
            LogFormat::Pretty => s.pretty().try_init(),
            LogFormat::Json => s.json().with_current_span(true).try_init(),
        }
        .map_err(|e| anyhow::anyhow!(e))?;

        warn_if_debug_build();

        Ok(())
    }
}

/// Configure the global tracing subscriber for logging inside of tests
pub fn init_test_logging() {
    // Errors out if a subscriber was already installed in this process, which is expected when
    // several tests call it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("LOG_LEVEL"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_format() {
        let err = "yaml".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("'yaml'"));
    }

    #[test]
    fn options_from_args() {
        let opts = Options::try_parse_from([
            "criteria",
            "--log-format",
            "pretty",
            "--log-level",
            "criteria_query=trace",
        ])
        .unwrap();
        assert_eq!(opts.log_format, LogFormat::Pretty);
        assert_eq!(opts.log_level, "criteria_query=trace");
    }

    #[test]
    fn init_installs_the_global_subscriber_once() {
        let opts = Options::try_parse_from(["criteria", "--log-format", "compact"]).unwrap();
        opts.init().unwrap();
        // A global subscriber is already set
        assert!(opts.init().is_err());
    }

    #[test]
    fn init_rejects_invalid_filters() {
        let opts = Options {
            log_level: "criteria_query=notalevel".to_owned(),
            ..Options::default()
        };
        assert!(opts.init().is_err());
    }
}
