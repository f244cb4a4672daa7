//! Scrape orchestration across collectors.

use std::sync::Arc;
use std::time::Instant;

use hostwatch_core::{FamilySet, MetricFamily, MetricKey, MetricType, Probe};
use tracing::{debug, warn};

use crate::collectors::{
    Collector, CpuCollector, DiskCollector, FilesystemCollector, MemoryCollector, NetworkCollector,
};
use crate::config::ExporterConfig;
use crate::exposition;
use crate::filter::NameFilter;
use crate::source::{FsStats, HostSource};

const SCRAPE_DURATION: &str = "node_scrape_collector_duration_seconds";
const SCRAPE_SUCCESS: &str = "node_scrape_collector_success";
const BUILD_INFO: &str = "hostwatch_build_info";

/// Thread-safe reference to the exporter.
pub type SharedExporter = Arc<NodeExporter>;

/// Runs every enabled collector on each scrape.
///
/// A collector whose kernel table cannot be read is left out of the scrape
/// and reported with `node_scrape_collector_success 0`; the other
/// collectors are unaffected.
#[derive(Default)]
pub struct NodeExporter {
    collectors: Vec<Box<dyn Collector>>,
}

impl NodeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the collectors enabled in `config`.
    pub fn from_config<P>(config: &ExporterConfig, source: Arc<dyn HostSource>, probe: P) -> Self
    where
        P: Probe<Output = FsStats>,
    {
        let enabled = &config.collectors;
        let mut exporter = Self::new();

        if enabled.cpu {
            exporter.register(CpuCollector::new(Arc::clone(&source)));
        }
        if enabled.memory {
            exporter.register(MemoryCollector::new(Arc::clone(&source)));
        }
        if enabled.network {
            let filter = NameFilter::new(&config.network.include, &config.network.exclude);
            exporter.register(NetworkCollector::new(Arc::clone(&source), filter));
        }
        if enabled.disk {
            let filter = NameFilter::exclude_only(&config.disk.exclude);
            exporter.register(DiskCollector::new(Arc::clone(&source), filter));
        }
        if enabled.filesystem {
            exporter.register(FilesystemCollector::from_config(
                source,
                probe,
                &config.filesystem,
            ));
        }

        exporter
    }

    pub fn register(&mut self, collector: impl Collector + 'static) {
        self.collectors.push(Box::new(collector));
    }

    pub fn with_collector(mut self, collector: impl Collector + 'static) -> Self {
        self.register(collector);
        self
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run all collectors in registration order.
    pub async fn scrape(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        let mut meta = FamilySet::new();
        meta.declare(
            SCRAPE_DURATION,
            "Duration of a collector scrape.",
            MetricType::Gauge,
        );
        meta.declare(
            SCRAPE_SUCCESS,
            "Whether a collector succeeded.",
            MetricType::Gauge,
        );
        meta.declare(
            BUILD_INFO,
            "A metric with a constant '1' value labeled by the hostwatch version.",
            MetricType::Gauge,
        );

        for collector in &self.collectors {
            let name = collector.name();
            let started = Instant::now();
            let result = collector.collect().await;
            let elapsed = started.elapsed();

            let success = match result {
                Ok(collected) => {
                    debug!(
                        collector = name,
                        families = collected.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Collector finished"
                    );
                    families.extend(collected);
                    1.0
                }
                Err(e) => {
                    warn!(collector = name, error = %e, "Collector failed");
                    0.0
                }
            };

            meta.add(
                MetricKey::new(SCRAPE_DURATION).with_label("collector", name),
                elapsed.as_secs_f64(),
            );
            meta.add(
                MetricKey::new(SCRAPE_SUCCESS).with_label("collector", name),
                success,
            );
        }

        meta.add(
            MetricKey::new(BUILD_INFO).with_label("version", env!("CARGO_PKG_VERSION")),
            1.0,
        );

        families.extend(meta.into_families());
        families
    }

    /// Scrape and render in the text exposition format.
    pub async fn render(&self) -> String {
        exposition::render(&self.scrape().await)
    }
}
