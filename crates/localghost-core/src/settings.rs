//! Environment-driven runtime settings.
//!
//! Unlike `astrid-config`'s layered `defaults -> system -> user -> workspace`
//! precedence chain, the broker has exactly one user and no workspace
//! concept, so settings are read once, at startup, from environment
//! variables under the `LOCALGHOST_` prefix. Every field has a documented
//! default so a bare `Settings::from_env()` is always usable.

use std::env;
use std::path::PathBuf;

use crate::error::{CoreError, CoreResult};

const ENV_PREFIX: &str = "LOCALGHOST_";

/// Resolved runtime configuration for the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Interface to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Hours a freshly-minted bearer token remains valid, absent an
    /// explicit grant-kind override.
    pub token_expiry_hours: f64,
    /// How long the consent prompt waits for a user response before it is
    /// treated as denied.
    pub consent_timeout_seconds: u64,
    /// Default lifetime of a `TIMED` grant.
    pub default_grant_duration_hours: f64,
    /// Directory holding the permission database, secret key, and port file.
    pub data_dir: PathBuf,
    /// File name of the permission database within `data_dir`.
    pub db_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8473,
            token_expiry_hours: 24.0,
            consent_timeout_seconds: 60,
            default_grant_duration_hours: 8.0,
            data_dir: default_data_dir(),
            db_name: "localghost.db".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment, falling back to
    /// documented defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSetting`] if a variable is present but
    /// fails to parse as its expected type.
    pub fn from_env() -> CoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: env_parsed("PORT", defaults.port)?,
            token_expiry_hours: env_parsed("TOKEN_EXPIRY_HOURS", defaults.token_expiry_hours)?,
            consent_timeout_seconds: env_parsed(
                "CONSENT_TIMEOUT_SECONDS",
                defaults.consent_timeout_seconds,
            )?,
            default_grant_duration_hours: env_parsed(
                "DEFAULT_GRANT_DURATION_HOURS",
                defaults.default_grant_duration_hours,
            )?,
            data_dir: env::var(format!("{ENV_PREFIX}DATA_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            db_name: env_or("DB_NAME", defaults.db_name),
        })
    }

    /// Full path to the permission database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    /// Full path to the persisted token-encryption secret.
    #[must_use]
    pub fn secret_path(&self) -> PathBuf {
        self.data_dir.join(".secret")
    }

    /// Full path to the advisory port file.
    #[must_use]
    pub fn port_file_path(&self) -> PathBuf {
        self.data_dir.join(".port")
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "localghost", "localghost")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".localghost"))
}

fn env_or(suffix: &str, default: String) -> String {
    env::var(format!("{ENV_PREFIX}{suffix}")).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(suffix: &str, default: T) -> CoreResult<T> {
    match env::var(format!("{ENV_PREFIX}{suffix}")) {
        Ok(raw) => raw.parse().map_err(|_| CoreError::InvalidSetting {
            name: format!("{ENV_PREFIX}{suffix}"),
            reason: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
