//! Host metrics agent.
//!
//! Reads kernel counters for CPU, memory, network interfaces, block devices
//! and filesystems on every scrape and serves them over HTTP in the
//! Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  /proc, /sys,   │────>│   Collectors    │────>│   HTTP Server   │
//! │    statvfs      │     │ (guard, probes) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Counter collectors run their readings through a
//! [`hostwatch_core::MonotonicGuard`]. The filesystem collector stats each
//! mount under a deadline and quarantines mounts that hang, so one stuck NFS
//! export shows up as `node_filesystem_device_error 1` instead of a stalled
//! scrape.
//!
//! # Usage
//!
//! ```bash
//! hostwatch --config hostwatch.json5
//! ```
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collectors;
pub mod config;
pub mod error;
pub mod exposition;
pub mod filter;
pub mod http;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod mapping;
pub mod node;
pub mod source;

pub use collectors::Collector;
pub use config::ExporterConfig;
pub use error::CollectError;
pub use http::HttpServer;
#[cfg(target_os = "linux")]
pub use linux::{ProcfsSource, StatvfsProbe};
pub use node::{NodeExporter, SharedExporter};
pub use source::HostSource;
