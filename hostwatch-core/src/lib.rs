//! hostwatch core library
//!
//! The sampling engine shared by every hostwatch collector:
//!
//! - [`metric`] - Series identity and sample model (`MetricKey`, `Sample`, `MetricFamily`)
//! - [`guard`] - Counter monotonicity guard (`MonotonicGuard`)
//! - [`probe`] - Deadline-bounded blocking probes (`ProbeExecutor`)
//! - [`quarantine`] - Cool-down registry for resources that hang (`QuarantineRegistry`)
//! - [`config`] - Logging settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod guard;
pub mod metric;
pub mod probe;
pub mod quarantine;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use guard::MonotonicGuard;
pub use metric::{FamilySet, MetricFamily, MetricKey, MetricType, Observation, Sample};
pub use probe::{Probe, ProbeError, ProbeExecutor, ProbeResult, ProbeTarget};
pub use quarantine::QuarantineRegistry;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Fails if the
/// level is unknown or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = config.level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
    };

    installed.map_err(|e| Error::Tracing(e.to_string()))
}
