//! Configuration types for the SMTP connector.
//!
//! The connector is configured once per process, from the environment:
//! - `M8FLOW_CONNECTOR_SMTP_ATTACHMENTS_FOLDER`: root directory for path attachments
//! - `M8FLOW_CONNECTOR_SMTP_ATTACHMENTS_LIMIT_IN_MB`: per-attachment size limit
//! - `M8FLOW_CONNECTOR_SMTP_TIMEOUT_SECONDS`: SMTP socket timeout, per command
//!
//! The resulting [`ConnectorConfig`] is immutable for the process lifetime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ConnectorError, ConnectorResult};

/// Environment variable holding the attachments root directory.
pub const ATTACHMENTS_FOLDER_ENV: &str = "M8FLOW_CONNECTOR_SMTP_ATTACHMENTS_FOLDER";

/// Environment variable holding the attachment size limit in megabytes.
pub const ATTACHMENTS_LIMIT_ENV: &str = "M8FLOW_CONNECTOR_SMTP_ATTACHMENTS_LIMIT_IN_MB";

/// Environment variable holding the SMTP timeout in seconds.
pub const SMTP_TIMEOUT_ENV: &str = "M8FLOW_CONNECTOR_SMTP_TIMEOUT_SECONDS";

/// Upper bound for the attachment limit, whatever the environment says.
pub const HARD_ATTACHMENTS_LIMIT_MB: u64 = 100;

/// Attachment limit used when none (or garbage) is configured.
pub const DEFAULT_ATTACHMENTS_LIMIT_MB: u64 = 100;

/// SMTP timeout used when none (or garbage) is configured.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Directory path attachments may be read from. `None` disables path attachments.
    #[serde(default)]
    pub attachments_root: Option<PathBuf>,
    /// Per-attachment size limit in bytes.
    #[serde(default = "default_attachments_limit_bytes")]
    pub attachments_limit_bytes: u64,
    /// SMTP socket timeout, applied to each command.
    #[serde(default = "default_smtp_timeout", with = "humantime_serde")]
    pub smtp_timeout: Duration,
}

fn default_attachments_limit_bytes() -> u64 {
    DEFAULT_ATTACHMENTS_LIMIT_MB * BYTES_PER_MB
}

fn default_smtp_timeout() -> Duration {
    DEFAULT_SMTP_TIMEOUT
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            attachments_root: None,
            attachments_limit_bytes: default_attachments_limit_bytes(),
            smtp_timeout: default_smtp_timeout(),
        }
    }
}

impl ConnectorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }

    /// Reads the configuration from the process environment.
    ///
    /// Never fails: a missing attachments folder only matters once a path
    /// attachment is used, and bad numeric values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let attachments_root = lookup(ATTACHMENTS_FOLDER_ENV)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let limit_mb = parse_positive(lookup(ATTACHMENTS_LIMIT_ENV).as_deref())
            .unwrap_or(DEFAULT_ATTACHMENTS_LIMIT_MB);

        let timeout = parse_positive(lookup(SMTP_TIMEOUT_ENV).as_deref())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SMTP_TIMEOUT);

        let config = Self {
            attachments_root,
            attachments_limit_bytes: clamp_limit_mb(limit_mb) * BYTES_PER_MB,
            smtp_timeout: timeout,
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            attachments_root = ?config.attachments_root,
            attachments_limit_bytes = config.attachments_limit_bytes,
            smtp_timeout = %humantime::format_duration(config.smtp_timeout),
            "Loaded connector configuration from environment"
        );

        config
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.attachments_limit_bytes == 0 {
            return Err(ConnectorError::configuration(
                "attachments_limit_bytes must be positive",
            ));
        }

        if self.attachments_limit_bytes > HARD_ATTACHMENTS_LIMIT_MB * BYTES_PER_MB {
            return Err(ConnectorError::configuration(format!(
                "attachments_limit_bytes cannot exceed {} MB",
                HARD_ATTACHMENTS_LIMIT_MB
            )));
        }

        if self.smtp_timeout == Duration::ZERO {
            return Err(ConnectorError::configuration("smtp_timeout must be non-zero"));
        }

        if let Some(root) = &self.attachments_root {
            if !root.is_absolute() {
                return Err(ConnectorError::configuration(format!(
                    "{} must be an absolute path, got {:?}",
                    ATTACHMENTS_FOLDER_ENV, root
                )));
            }
        }

        Ok(())
    }

    /// Returns the attachment limit in (fractional) megabytes, for log lines.
    pub fn attachments_limit_mb(&self) -> f64 {
        self.attachments_limit_bytes as f64 / BYTES_PER_MB as f64
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    let value: i64 = raw.parse().ok()?;
    if value <= 0 {
        None
    } else {
        Some(value as u64)
    }
}

fn clamp_limit_mb(requested: u64) -> u64 {
    requested.clamp(1, HARD_ATTACHMENTS_LIMIT_MB)
}

/// Builder for connector configuration.
#[derive(Debug, Default)]
pub struct ConnectorConfigBuilder {
    attachments_root: Option<PathBuf>,
    attachments_limit_bytes: u64,
    smtp_timeout: Duration,
}

impl ConnectorConfigBuilder {
    /// Sets the attachments root directory.
    pub fn attachments_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.attachments_root = Some(root.into());
        self
    }

    /// Sets the attachment limit in megabytes (clamped to the hard maximum).
    pub fn attachments_limit_mb(mut self, mb: u64) -> Self {
        self.attachments_limit_bytes = clamp_limit_mb(mb) * BYTES_PER_MB;
        self
    }

    /// Sets the attachment limit in bytes.
    pub fn attachments_limit_bytes(mut self, bytes: u64) -> Self {
        self.attachments_limit_bytes = bytes;
        self
    }

    /// Sets the SMTP timeout.
    pub fn smtp_timeout(mut self, timeout: Duration) -> Self {
        self.smtp_timeout = timeout;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ConnectorResult<ConnectorConfig> {
        let config = ConnectorConfig {
            attachments_root: self.attachments_root,
            attachments_limit_bytes: if self.attachments_limit_bytes == 0 {
                default_attachments_limit_bytes()
            } else {
                self.attachments_limit_bytes
            },
            smtp_timeout: if self.smtp_timeout == Duration::ZERO {
                DEFAULT_SMTP_TIMEOUT
            } else {
                self.smtp_timeout
            },
        };

        config.validate()?;
        Ok(config)
    }
}

// Humantime serde support
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
