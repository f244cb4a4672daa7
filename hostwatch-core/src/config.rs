//! Logging settings shared by hostwatch binaries.

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{Error, Result};

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for journald or a log shipper.
    Json,
}

/// The `logging` section of a hostwatch configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: `trace`, `debug`, `info`, `warn` or `error`.
    /// `RUST_LOG` overrides it at startup.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// The configured level, rejecting anything `tracing` does not know.
    pub fn level(&self) -> Result<Level> {
        self.level
            .parse::<Level>()
            .map_err(|_| Error::Config(format!("Unknown log level '{}'", self.level)))
    }
}
