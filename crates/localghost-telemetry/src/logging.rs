//! Logging setup over `tracing-subscriber`.

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{TelemetryError, TelemetryResult};

/// Output formatting for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output. The default for local
    /// development.
    #[default]
    Pretty,
    /// Single-line human-readable output.
    Compact,
    /// Newline-delimited JSON, for log aggregators.
    Json,
}

/// Where log output is written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard error (the default).
    Stderr,
    /// A rolling file under the given directory, with the given
    /// filename prefix.
    File {
        /// Directory to write log files into.
        directory: PathBuf,
        /// Filename prefix; `tracing-appender` appends a date suffix.
        prefix: String,
    },
}

impl Default for LogTarget {
    fn default() -> Self {
        Self::Stderr
    }
}

/// Builder for the kernel's logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    extra_directives: Vec<String>,
}

impl LogConfig {
    /// Start a configuration at the given base level (e.g. `"info"`,
    /// `"debug"`).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            extra_directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Write logs to a rolling file instead of stderr.
    #[must_use]
    pub fn with_file(mut self, directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.target = LogTarget::File { directory: directory.into(), prefix: prefix.into() };
        self
    }

    /// Add an extra per-target directive (e.g. `"localghost_consent=trace"`)
    /// on top of the base level.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.extra_directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;
        for directive in &self.extra_directives {
            let directive = directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| TelemetryError::ConfigError(e.to_string()))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install the global tracing subscriber from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] if the level or a directive
/// cannot be parsed, and [`TelemetryError::InitError`] if a subscriber is
/// already installed for this process.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    match &config.target {
        LogTarget::Stderr => {
            let fmt_layer = build_fmt_layer(config.format, std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::InitError(e.to_string()))
        }
        LogTarget::File { directory, prefix } => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, prefix);
            // Leaking the guard is deliberate: the kernel's logging is
            // installed once for the lifetime of the process, so there is
            // no later point at which dropping it would be meaningful.
            let (writer, guard) = tracing_appender::non_blocking(appender);
            std::mem::forget(guard);
            let fmt_layer = build_fmt_layer(config.format, move || writer.clone());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::InitError(e.to_string()))
        }
    }
}

fn build_fmt_layer<W>(
    format: LogFormat,
    writer: W,
) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().with_writer(writer).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().with_writer(writer).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_writer(writer).boxed(),
    }
}

/// Install logging with sensible defaults (`info` level, pretty format,
/// stderr), reading `RUST_LOG` if set.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    setup_logging(&LogConfig::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_directives() {
        let config = LogConfig::new("info")
            .with_format(LogFormat::Json)
            .with_directive("localghost_consent=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.extra_directives, vec!["localghost_consent=trace".to_string()]);
    }

    #[test]
    fn invalid_level_is_a_config_error() {
        let config = LogConfig::new("not-a-real-level===");
        assert!(matches!(config.build_filter(), Err(TelemetryError::ConfigError(_))));
    }

    #[test]
    fn file_target_defaults_to_stderr_otherwise() {
        assert!(matches!(LogConfig::new("info").target, LogTarget::Stderr));
        let with_file = LogConfig::new("info").with_file("/tmp/localghost-logs", "kernel");
        assert!(matches!(with_file.target, LogTarget::File { .. }));
    }
}
