//! Host metric collectors.
//!
//! Each collector reads one kernel table through a [`HostSource`] and turns
//! it into metric families. Counter collectors pass their readings through a
//! [`hostwatch_core::MonotonicGuard`]; the filesystem collector probes mounts
//! through a [`hostwatch_core::ProbeExecutor`] and a
//! [`hostwatch_core::QuarantineRegistry`].
//!
//! Collectors are built once at startup and keep their guard or registry for
//! the life of the process. They take `&self` and may be scraped
//! concurrently.
//!
//! [`HostSource`]: crate::source::HostSource

pub mod cpu;
pub mod disk;
pub mod filesystem;
pub mod memory;
pub mod network;

use async_trait::async_trait;
use hostwatch_core::MetricFamily;

use crate::error::CollectError;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use filesystem::FilesystemCollector;
pub use memory::MemoryCollector;
pub use network::NetworkCollector;

#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs and in the `collector` label.
    fn name(&self) -> &'static str;

    /// Produce this scrape's families, or fail the collector as a whole.
    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError>;
}
