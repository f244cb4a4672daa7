//! Configuration for the hostwatch agent.

use std::path::Path;
use std::time::Duration;

use hostwatch_core::LoggingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Which collectors run on each scrape.
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Network interface selection.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Block device selection.
    #[serde(default)]
    pub disk: DiskConfig,

    /// Filesystem probing and quarantine.
    #[serde(default)]
    pub filesystem: FilesystemConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on (default: "0.0.0.0:9100").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Per-collector enable flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default = "default_true")]
    pub cpu: bool,
    #[serde(default = "default_true")]
    pub memory: bool,
    #[serde(default = "default_true")]
    pub network: bool,
    #[serde(default = "default_true")]
    pub disk: bool,
    #[serde(default = "default_true")]
    pub filesystem: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
            network: true,
            disk: true,
            filesystem: true,
        }
    }
}

impl CollectorsConfig {
    fn any_enabled(&self) -> bool {
        self.cpu || self.memory || self.network || self.disk || self.filesystem
    }
}

/// Network interface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Glob patterns for devices to include (empty = all).
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns for devices to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Directory holding per-device attributes (default: "/sys/class/net").
    #[serde(default = "default_sysfs_net")]
    pub sysfs_path: String,
}

fn default_sysfs_net() -> String {
    "/sys/class/net".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            sysfs_path: default_sysfs_net(),
        }
    }
}

/// Block device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Glob patterns for devices to exclude (default: loop and ram disks).
    #[serde(default = "default_disk_exclude")]
    pub exclude: Vec<String>,
}

fn default_disk_exclude() -> Vec<String> {
    vec!["loop*".to_string(), "ram*".to_string()]
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            exclude: default_disk_exclude(),
        }
    }
}

/// Filesystem collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Deadline for one `statvfs` call (default: 5).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Concurrent probe workers per scrape (default: 4).
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,

    /// How long a mount that timed out is skipped (default: 300).
    #[serde(default = "default_quarantine")]
    pub quarantine_secs: u64,

    /// Glob patterns for mount points to skip.
    #[serde(default)]
    pub mount_points_exclude: Vec<String>,

    /// Filesystem types to skip (default: pseudo filesystems).
    #[serde(default = "default_fs_types_exclude")]
    pub fs_types_exclude: Vec<String>,
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_probe_workers() -> usize {
    4
}

fn default_quarantine() -> u64 {
    300 // 5 minutes
}

fn default_fs_types_exclude() -> Vec<String> {
    [
        "autofs",
        "binfmt_misc",
        "bpf",
        "cgroup",
        "cgroup2",
        "configfs",
        "debugfs",
        "devpts",
        "devtmpfs",
        "fusectl",
        "hugetlbfs",
        "mqueue",
        "nsfs",
        "overlay",
        "proc",
        "procfs",
        "pstore",
        "rpc_pipefs",
        "securityfs",
        "selinuxfs",
        "squashfs",
        "sysfs",
        "tracefs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout(),
            probe_workers: default_probe_workers(),
            quarantine_secs: default_quarantine(),
            mount_points_exclude: Vec::new(),
            fs_types_exclude: default_fs_types_exclude(),
        }
    }
}

impl FilesystemConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn quarantine(&self) -> Duration {
        Duration::from_secs(self.quarantine_secs)
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.web.listen
            )));
        }

        if !self.web.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        // Anything else could be read as a route capture or wildcard
        if let Some(c) = self
            .web
            .path
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~')))
        {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} contains unsupported character '{}'",
                self.web.path, c
            )));
        }

        if self.web.path == "/" || self.web.path == "/health" {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.web.path
            )));
        }

        if !self.collectors.any_enabled() {
            return Err(ConfigError::Validation(
                "At least one collector must be enabled".to_string(),
            ));
        }

        if self.filesystem.probe_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "probe_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.filesystem.probe_workers == 0 {
            return Err(ConfigError::Validation(
                "probe_workers must be > 0".to_string(),
            ));
        }

        if self.filesystem.quarantine_secs == 0 {
            return Err(ConfigError::Validation(
                "quarantine_secs must be > 0".to_string(),
            ));
        }

        let patterns = self
            .network
            .include
            .iter()
            .chain(&self.network.exclude)
            .chain(&self.disk.exclude)
            .chain(&self.filesystem.mount_points_exclude);
        for pattern in patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        }

        self.logging
            .level()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }
}
