//! Block device I/O statistics.

use std::sync::Arc;

use async_trait::async_trait;
use hostwatch_core::{FamilySet, MetricFamily, MetricKey, MetricType, MonotonicGuard, Sample};

use super::Collector;
use crate::error::CollectError;
use crate::filter::NameFilter;
use crate::source::{DiskStats, HostSource};

/// `/proc/diskstats` counts sectors in 512-byte units regardless of the
/// device's real sector size.
const SECTOR_SIZE: f64 = 512.0;

const IO_NOW: &str = "node_disk_io_now";

/// Counter families: name, help, and how to read the value from a row.
const COUNTERS: [(&str, &str, fn(&DiskStats) -> f64); 10] = [
    (
        "node_disk_reads_completed_total",
        "The total number of reads completed successfully.",
        |d| d.reads_completed as f64,
    ),
    (
        "node_disk_reads_merged_total",
        "The total number of reads merged.",
        |d| d.reads_merged as f64,
    ),
    (
        "node_disk_read_bytes_total",
        "The total number of bytes read successfully.",
        |d| d.sectors_read as f64 * SECTOR_SIZE,
    ),
    (
        "node_disk_read_time_seconds_total",
        "The total number of seconds spent by all reads.",
        |d| d.read_time_ms as f64 / 1000.0,
    ),
    (
        "node_disk_writes_completed_total",
        "The total number of writes completed successfully.",
        |d| d.writes_completed as f64,
    ),
    (
        "node_disk_writes_merged_total",
        "The number of writes merged.",
        |d| d.writes_merged as f64,
    ),
    (
        "node_disk_written_bytes_total",
        "The total number of bytes written successfully.",
        |d| d.sectors_written as f64 * SECTOR_SIZE,
    ),
    (
        "node_disk_write_time_seconds_total",
        "This is the total number of seconds spent by all writes.",
        |d| d.write_time_ms as f64 / 1000.0,
    ),
    (
        "node_disk_io_time_seconds_total",
        "Total seconds spent doing I/Os.",
        |d| d.io_time_ms as f64 / 1000.0,
    ),
    (
        "node_disk_io_time_weighted_seconds_total",
        "The weighted number of seconds spent doing I/Os.",
        |d| d.weighted_io_time_ms as f64 / 1000.0,
    ),
];

/// Exposes per-device I/O counters and the in-flight gauge.
pub struct DiskCollector {
    source: Arc<dyn HostSource>,
    filter: NameFilter,
    guard: MonotonicGuard,
}

impl DiskCollector {
    pub fn new(source: Arc<dyn HostSource>, filter: NameFilter) -> Self {
        Self {
            source,
            filter,
            guard: MonotonicGuard::new(),
        }
    }
}

#[async_trait]
impl Collector for DiskCollector {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let disks: Vec<DiskStats> = self
            .source
            .disk_stats()?
            .into_iter()
            .filter(|d| self.filter.should_include(&d.device))
            .collect();

        let sample: Sample = disks
            .iter()
            .flat_map(|disk| {
                COUNTERS.into_iter().map(move |(name, _, read)| {
                    (
                        MetricKey::new(name).with_label("device", disk.device.as_str()),
                        read(disk),
                    )
                })
            })
            .collect();

        let mut families = FamilySet::new();
        for (name, help, _) in &COUNTERS {
            families.declare(name, help, MetricType::Counter);
        }
        families.declare(
            IO_NOW,
            "The number of I/Os currently in progress.",
            MetricType::Gauge,
        );

        for (key, value) in self.guard.apply(sample) {
            families.add(key, value);
        }
        for disk in &disks {
            families.add(
                MetricKey::new(IO_NOW).with_label("device", disk.device.as_str()),
                disk.io_in_progress as f64,
            );
        }

        Ok(families.into_families())
    }
}
