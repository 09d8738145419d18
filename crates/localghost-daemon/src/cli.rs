//! Command-line flags layered over [`localghost_core::Settings`].
//!
//! This is the minimal CLI surface needed to run the daemon in the
//! foreground for development and tests — a full multi-command CLI
//! (`start`/`stop`/`status`, service installers) is out of scope for this
//! workspace.

use std::path::PathBuf;

use clap::Parser;

use localghost_core::Settings;
use localghost_telemetry::LogFormat;

/// The LocalGhost authorization broker daemon.
#[derive(Debug, Parser)]
#[command(name = "localghost-daemon", author, version, about)]
pub struct Cli {
    /// Interface to bind the HTTP server to. Overrides `LOCALGHOST_HOST`.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP server to. Overrides `LOCALGHOST_PORT`.
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding the permission database, secret key, and port
    /// file. Overrides `LOCALGHOST_DATA_DIR`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Base log level (e.g. `info`, `debug`, `trace`). Overrides
    /// `LOCALGHOST_LOG_LEVEL`.
    #[arg(long, env = "LOCALGHOST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format. Overrides `LOCALGHOST_LOG_FORMAT`.
    #[arg(long, value_enum, env = "LOCALGHOST_LOG_FORMAT", default_value = "pretty")]
    pub log_format: CliLogFormat,

    /// Disable interactive consent prompting: protected requests without
    /// an existing token or grant are denied outright instead of invoking
    /// a native dialog.
    #[arg(long)]
    pub no_consent_prompt: bool,
}

/// CLI-facing mirror of [`LogFormat`] (clap's `value_enum` needs a type it
/// owns; the telemetry crate's own enum has no `clap::ValueEnum` impl).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable, multi-line output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Resolve [`Settings`] by reading the environment and then applying
    /// any explicit flag on top — flag beats environment beats default.
    ///
    /// # Errors
    ///
    /// Returns [`localghost_core::CoreError`] if an environment variable
    /// is present but fails to parse.
    pub fn resolve_settings(&self) -> Result<Settings, localghost_core::CoreError> {
        let mut settings = Settings::from_env()?;
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = data_dir.clone();
        }
        Ok(settings)
    }
}
