//! Filesystem space and inode gauges.
//!
//! Every mount is stat'ed through the probe executor, so a hung NFS or FUSE
//! mount costs at most one probe timeout. A mount whose probe timed out is
//! quarantined: for the cool-down period it is not probed again and is
//! reported with `node_filesystem_device_error 1` straight away.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hostwatch_core::{
    FamilySet, MetricFamily, MetricKey, MetricType, Probe, ProbeExecutor, ProbeResult, ProbeTarget,
    QuarantineRegistry,
};
use tracing::debug;

use super::Collector;
use crate::config::FilesystemConfig;
use crate::error::CollectError;
use crate::filter::NameFilter;
use crate::source::{FsStats, HostSource};

const SIZE: &str = "node_filesystem_size_bytes";
const FREE: &str = "node_filesystem_free_bytes";
const AVAIL: &str = "node_filesystem_avail_bytes";
const FILES: &str = "node_filesystem_files";
const FILES_FREE: &str = "node_filesystem_files_free";
const READONLY: &str = "node_filesystem_readonly";
const DEVICE_ERROR: &str = "node_filesystem_device_error";

/// Exposes `statvfs` results per mount point.
pub struct FilesystemCollector<P: Probe<Output = FsStats>> {
    source: Arc<dyn HostSource>,
    executor: ProbeExecutor<P>,
    registry: QuarantineRegistry,
    mount_points: NameFilter,
    fs_types_exclude: HashSet<String>,
}

impl<P: Probe<Output = FsStats>> FilesystemCollector<P> {
    /// Build the collector with its executor and registry sized from config.
    pub fn from_config(source: Arc<dyn HostSource>, probe: P, config: &FilesystemConfig) -> Self {
        Self::new(
            source,
            ProbeExecutor::new(probe, config.probe_workers, config.probe_timeout()),
            QuarantineRegistry::new(config.quarantine()),
        )
        .with_exclusions(&config.mount_points_exclude, &config.fs_types_exclude)
    }

    pub fn new(
        source: Arc<dyn HostSource>,
        executor: ProbeExecutor<P>,
        registry: QuarantineRegistry,
    ) -> Self {
        Self {
            source,
            executor,
            registry,
            mount_points: NameFilter::default(),
            fs_types_exclude: HashSet::new(),
        }
    }

    /// Skip mount points matching `mount_points` globs and the listed types.
    pub fn with_exclusions(mut self, mount_points: &[String], fs_types: &[String]) -> Self {
        self.mount_points = NameFilter::exclude_only(mount_points);
        self.fs_types_exclude = fs_types.iter().cloned().collect();
        self
    }

    pub fn registry(&self) -> &QuarantineRegistry {
        &self.registry
    }

    /// Drop excluded mounts and repeated mount points (first entry wins).
    fn select(&self, mounts: Vec<ProbeTarget>) -> Vec<ProbeTarget> {
        let mut seen = HashSet::new();
        mounts
            .into_iter()
            .filter(|m| !self.fs_types_exclude.contains(&m.fs_type))
            .filter(|m| self.mount_points.should_include(&m.mount_point))
            .filter(|m| seen.insert(m.mount_point.clone()))
            .collect()
    }
}

fn series(name: &str, target: &ProbeTarget) -> MetricKey {
    MetricKey::new(name)
        .with_label("device", target.device.as_str())
        .with_label("mountpoint", target.mount_point.as_str())
        .with_label("fstype", target.fs_type.as_str())
}

fn declare(families: &mut FamilySet) {
    let gauges = [
        (SIZE, "Filesystem size in bytes."),
        (FREE, "Filesystem free space in bytes."),
        (AVAIL, "Filesystem space available to non-root users in bytes."),
        (FILES, "Filesystem total file nodes."),
        (FILES_FREE, "Filesystem total free file nodes."),
        (READONLY, "Filesystem read-only status."),
        (
            DEVICE_ERROR,
            "Whether an error occurred while getting statistics for the given device.",
        ),
    ];
    for (name, help) in gauges {
        families.declare(name, help, MetricType::Gauge);
    }
}

#[async_trait]
impl<P: Probe<Output = FsStats>> Collector for FilesystemCollector<P> {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let mounts = self.select(self.source.mounts()?);
        let (quarantined, eligible) = self.registry.partition(mounts, Instant::now());

        let mut families = FamilySet::new();
        declare(&mut families);

        for target in &quarantined {
            debug!(mount = %target.mount_point, "Mount quarantined, skipping probe");
            families.add(series(DEVICE_ERROR, target), 1.0);
        }

        for (target, result) in self.executor.run(eligible).await {
            match result {
                ProbeResult::Success(stats) => {
                    let readonly = if target.is_read_only() { 1.0 } else { 0.0 };
                    families.add(series(SIZE, &target), stats.size as f64);
                    families.add(series(FREE, &target), stats.free as f64);
                    families.add(series(AVAIL, &target), stats.avail as f64);
                    families.add(series(FILES, &target), stats.files as f64);
                    families.add(series(FILES_FREE, &target), stats.files_free as f64);
                    families.add(series(READONLY, &target), readonly);
                    families.add(series(DEVICE_ERROR, &target), 0.0);
                }
                ProbeResult::Timeout => {
                    self.registry.record_failure(target.id(), Instant::now());
                    families.add(series(DEVICE_ERROR, &target), 1.0);
                }
                // Never ran, so nothing is known about the mount itself.
                ProbeResult::Skipped | ProbeResult::Error(_) => {
                    families.add(series(DEVICE_ERROR, &target), 1.0);
                }
            }
        }

        debug!(
            quarantined = self.registry.quarantined_count(Instant::now()),
            "Filesystem probes finished"
        );

        Ok(families.into_families())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::FakeSource;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    /// Holds hung probes until dropped.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        cvar: Condvar,
    }

    impl Gate {
        fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cvar.wait(open).unwrap();
            }
        }

        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cvar.notify_all();
        }
    }

    struct OpenOnDrop(Arc<Gate>);

    impl Drop for OpenOnDrop {
        fn drop(&mut self) {
            self.0.open();
        }
    }

    struct FakeStatvfs {
        hung: HashSet<String>,
        failing: HashSet<String>,
        gate: Arc<Gate>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
    }

    impl FakeStatvfs {
        fn new(hung: &[&str], failing: &[&str]) -> (Arc<Self>, OpenOnDrop) {
            let gate = Arc::new(Gate::default());
            let probe = Arc::new(Self {
                hung: hung.iter().map(|s| s.to_string()).collect(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                gate: Arc::clone(&gate),
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
            });
            (probe, OpenOnDrop(gate))
        }

        fn calls_for(&self, mount: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|m| *m == mount).count()
        }
    }

    impl Probe for FakeStatvfs {
        type Output = FsStats;

        fn probe(&self, target: &ProbeTarget) -> io::Result<FsStats> {
            self.calls.lock().unwrap().push(target.mount_point.clone());
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let result = if self.hung.contains(&target.mount_point) {
                self.gate.wait();
                Err(io::Error::other("released"))
            } else if self.failing.contains(&target.mount_point) {
                Err(io::Error::from_raw_os_error(libc::EACCES))
            } else {
                Ok(FsStats {
                    size: 1_000_000,
                    free: 400_000,
                    avail: 300_000,
                    files: 1000,
                    files_free: 900,
                })
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn mounts() -> Vec<ProbeTarget> {
        vec![
            ProbeTarget::new("/dev/sda1", "/", "ext4").with_options(["rw", "relatime"]),
            ProbeTarget::new("/dev/sdb1", "/data", "xfs").with_options(["ro"]),
            ProbeTarget::new("nas:/slow", "/mnt/slow", "nfs4").with_options(["rw"]),
        ]
    }

    fn collector(
        probe: &Arc<FakeStatvfs>,
        timeout: Duration,
        cool_down: Duration,
    ) -> (Arc<FakeSource>, FilesystemCollector<FakeStatvfs>) {
        let source = Arc::new(FakeSource::default());
        *source.mounts.lock() = Some(mounts());
        let collector = FilesystemCollector::new(
            source.clone(),
            ProbeExecutor::from_shared(Arc::clone(probe), 4, timeout),
            QuarantineRegistry::new(cool_down),
        );
        (source, collector)
    }

    fn value(families: &[MetricFamily], name: &str, mount: &str) -> Option<f64> {
        families
            .iter()
            .find(|f| f.name == name)?
            .value_for(&[("mountpoint", mount)])
    }

    #[tokio::test]
    async fn test_stuck_mount_flagged_then_quarantined() {
        let (probe, _gate) = FakeStatvfs::new(&["/mnt/slow"], &[]);
        let timeout = Duration::from_millis(300);
        let (_source, collector) = collector(&probe, timeout, Duration::from_secs(300));

        let started = Instant::now();
        let families = collector.collect().await.unwrap();
        assert!(started.elapsed() < timeout + Duration::from_millis(700));

        assert_eq!(value(&families, DEVICE_ERROR, "/"), Some(0.0));
        assert_eq!(value(&families, DEVICE_ERROR, "/data"), Some(0.0));
        assert_eq!(value(&families, DEVICE_ERROR, "/mnt/slow"), Some(1.0));
        assert_eq!(value(&families, SIZE, "/"), Some(1_000_000.0));
        assert_eq!(value(&families, AVAIL, "/data"), Some(300_000.0));
        assert_eq!(value(&families, SIZE, "/mnt/slow"), None);
        assert!(collector.registry().is_quarantined("/mnt/slow", Instant::now()));

        // Second scrape inside the cool-down: no probe, immediate flag.
        let started = Instant::now();
        let families = collector.collect().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(value(&families, DEVICE_ERROR, "/mnt/slow"), Some(1.0));
        assert_eq!(value(&families, DEVICE_ERROR, "/"), Some(0.0));
        assert_eq!(probe.calls_for("/mnt/slow"), 1);
        assert_eq!(probe.calls_for("/"), 2);
    }

    #[tokio::test]
    async fn test_healthy_mount_behind_hung_workers_not_quarantined() {
        let (probe, _gate) = FakeStatvfs::new(&["/mnt/nfs1", "/mnt/nfs2"], &[]);
        let source = Arc::new(FakeSource::default());
        *source.mounts.lock() = Some(vec![
            ProbeTarget::new("nas:/one", "/mnt/nfs1", "nfs4"),
            ProbeTarget::new("nas:/two", "/mnt/nfs2", "nfs4"),
            ProbeTarget::new("/dev/sda1", "/", "ext4"),
        ]);
        let collector = FilesystemCollector::new(
            source,
            ProbeExecutor::from_shared(Arc::clone(&probe), 2, Duration::from_millis(300)),
            QuarantineRegistry::new(Duration::from_secs(300)),
        );

        let families = collector.collect().await.unwrap();

        assert_eq!(value(&families, DEVICE_ERROR, "/"), Some(1.0));
        assert_eq!(value(&families, DEVICE_ERROR, "/mnt/nfs1"), Some(1.0));
        assert_eq!(probe.calls_for("/"), 0);
        let now = Instant::now();
        assert!(!collector.registry().is_quarantined("/", now));
        assert!(collector.registry().is_quarantined("/mnt/nfs1", now));
        assert!(collector.registry().is_quarantined("/mnt/nfs2", now));

        // With both NFS mounts quarantined, the root mount gets a worker.
        let families = collector.collect().await.unwrap();
        assert_eq!(value(&families, DEVICE_ERROR, "/"), Some(0.0));
        assert_eq!(value(&families, SIZE, "/"), Some(1_000_000.0));
        assert_eq!(probe.calls_for("/"), 1);
    }

    #[tokio::test]
    async fn test_labels_and_readonly() {
        let (probe, _gate) = FakeStatvfs::new(&[], &[]);
        let (_source, collector) =
            collector(&probe, Duration::from_secs(5), Duration::from_secs(300));

        let families = collector.collect().await.unwrap();

        assert_eq!(families.len(), 7);
        let size = families.iter().find(|f| f.name == SIZE).unwrap();
        assert_eq!(
            size.value_for(&[("device", "/dev/sda1"), ("mountpoint", "/"), ("fstype", "ext4")]),
            Some(1_000_000.0)
        );
        assert_eq!(value(&families, READONLY, "/"), Some(0.0));
        assert_eq!(value(&families, READONLY, "/data"), Some(1.0));
        assert_eq!(value(&families, FILES_FREE, "/mnt/slow"), Some(900.0));
    }

    #[tokio::test]
    async fn test_probe_error_is_not_quarantined() {
        let (probe, _gate) = FakeStatvfs::new(&[], &["/data"]);
        let (_source, collector) =
            collector(&probe, Duration::from_secs(5), Duration::from_secs(300));

        for _ in 0..2 {
            let families = collector.collect().await.unwrap();
            assert_eq!(value(&families, DEVICE_ERROR, "/data"), Some(1.0));
            assert_eq!(value(&families, SIZE, "/data"), None);
        }

        assert!(!collector.registry().is_quarantined("/data", Instant::now()));
        assert_eq!(probe.calls_for("/data"), 2);
    }

    #[tokio::test]
    async fn test_probed_again_after_cool_down() {
        let (probe, _gate) = FakeStatvfs::new(&["/mnt/slow"], &[]);
        let (_source, collector) =
            collector(&probe, Duration::from_millis(100), Duration::from_millis(250));

        collector.collect().await.unwrap();
        assert_eq!(probe.calls_for("/mnt/slow"), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let families = collector.collect().await.unwrap();

        assert_eq!(probe.calls_for("/mnt/slow"), 2);
        assert_eq!(value(&families, DEVICE_ERROR, "/mnt/slow"), Some(1.0));
        assert!(collector.registry().is_quarantined("/mnt/slow", Instant::now()));
    }

    #[tokio::test]
    async fn test_exclusions_and_duplicate_mount_points() {
        let (probe, _gate) = FakeStatvfs::new(&[], &[]);
        let (source, collector) =
            collector(&probe, Duration::from_secs(5), Duration::from_secs(300));
        let collector = collector.with_exclusions(&["/mnt/*".to_string()], &["proc".to_string()]);

        let mut table = mounts();
        table.push(ProbeTarget::new("proc", "/proc", "proc"));
        table.push(ProbeTarget::new("/dev/sdc1", "/", "ext4"));
        *source.mounts.lock() = Some(table);

        let families = collector.collect().await.unwrap();
        let errors = families.iter().find(|f| f.name == DEVICE_ERROR).unwrap();

        assert_eq!(errors.observations.len(), 2);
        assert_eq!(value(&families, DEVICE_ERROR, "/proc"), None);
        assert_eq!(value(&families, DEVICE_ERROR, "/mnt/slow"), None);
        let size = families.iter().find(|f| f.name == SIZE).unwrap();
        assert_eq!(size.value_for(&[("device", "/dev/sdc1")]), None);
        assert_eq!(probe.calls_for("/proc"), 0);
    }

    #[tokio::test]
    async fn test_unreadable_mount_table() {
        let (probe, _gate) = FakeStatvfs::new(&[], &[]);
        let (source, collector) =
            collector(&probe, Duration::from_secs(5), Duration::from_secs(300));
        *source.mounts.lock() = None;

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectError::SourceUnreadable { .. }));
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
    }
}
