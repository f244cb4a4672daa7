//! Linux implementation of the host sources, backed by procfs and sysfs.

use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};

use hostwatch_core::{Probe, ProbeTarget};
use procfs::net::DeviceStatus;
use procfs::process::{MountInfo, Process};
use procfs::{FromBufReadSI, KernelStats};
use tracing::trace;

use crate::error::CollectError;
use crate::source::{
    CpuTimes, DiskStats, FsStats, HostSource, MemField, NetAttributes, NetDevStats, parse_meminfo,
};

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_NET_DEV: &str = "/proc/net/dev";
const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Reads the live kernel tables.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    sysfs_net: PathBuf,
    ticks_per_second: f64,
}

impl ProcfsSource {
    /// Create a source reading device attributes below `sysfs_net`.
    pub fn new(sysfs_net: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_net: sysfs_net.into(),
            ticks_per_second: clock_ticks(),
        }
    }
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

impl HostSource for ProcfsSource {
    fn cpu_times(&self) -> Result<Vec<CpuTimes>, CollectError> {
        let content =
            std::fs::read_to_string(PROC_STAT).map_err(|e| CollectError::unreadable(PROC_STAT, e))?;
        parse_stat(&content, self.ticks_per_second)
    }

    fn meminfo(&self) -> Result<Vec<MemField>, CollectError> {
        let content = std::fs::read_to_string(PROC_MEMINFO)
            .map_err(|e| CollectError::unreadable(PROC_MEMINFO, e))?;
        let fields = parse_meminfo(&content);
        if fields.is_empty() {
            return Err(CollectError::unreadable(PROC_MEMINFO, "no fields"));
        }
        Ok(fields)
    }

    fn net_dev(&self) -> Result<Vec<NetDevStats>, CollectError> {
        let devices =
            procfs::net::dev_status().map_err(|e| CollectError::unreadable(PROC_NET_DEV, e))?;

        let mut stats: Vec<NetDevStats> = devices.into_values().map(net_dev_stats).collect();
        stats.sort_by(|a, b| a.device.cmp(&b.device));
        Ok(stats)
    }

    fn net_attributes(&self, device: &str) -> NetAttributes {
        let dir = self.sysfs_net.join(device);
        NetAttributes {
            operstate: read_attribute(&dir, "operstate"),
            address: read_attribute(&dir, "address"),
            ifalias: read_attribute(&dir, "ifalias"),
        }
    }

    fn disk_stats(&self) -> Result<Vec<DiskStats>, CollectError> {
        let disks = procfs::diskstats().map_err(|e| CollectError::unreadable("/proc/diskstats", e))?;

        Ok(disks
            .into_iter()
            .map(|d| DiskStats {
                device: d.name,
                reads_completed: d.reads,
                reads_merged: d.merged,
                sectors_read: d.sectors_read,
                read_time_ms: d.time_reading,
                writes_completed: d.writes,
                writes_merged: d.writes_merged,
                sectors_written: d.sectors_written,
                write_time_ms: d.time_writing,
                io_in_progress: d.in_progress,
                io_time_ms: d.time_in_progress,
                weighted_io_time_ms: d.weighted_time_in_progress,
            })
            .collect())
    }

    fn mounts(&self) -> Result<Vec<ProbeTarget>, CollectError> {
        let mounts = Process::myself()
            .and_then(|p| p.mountinfo())
            .map_err(|e| CollectError::unreadable(PROC_MOUNTINFO, e))?;

        Ok(mounts.into_iter().map(probe_target).collect())
    }
}

/// Per-CPU times from `/proc/stat` text.
///
/// The kernel leaves offline CPUs out of the table, so the index is taken
/// from each `cpuN` line rather than from the row position.
fn parse_stat(content: &str, ticks_per_second: f64) -> Result<Vec<CpuTimes>, CollectError> {
    let stat = KernelStats::from_buf_read(content.as_bytes(), procfs::current_system_info())
        .map_err(|e| CollectError::unreadable(PROC_STAT, e))?;

    let indices: Vec<usize> = content
        .lines()
        .filter_map(|line| line.split_whitespace().next()?.strip_prefix("cpu")?.parse().ok())
        .collect();
    if indices.len() != stat.cpu_time.len() {
        return Err(CollectError::unreadable(
            PROC_STAT,
            format!(
                "{} cpu lines but {} per-cpu rows",
                indices.len(),
                stat.cpu_time.len()
            ),
        ));
    }

    let secs = |ticks: u64| ticks as f64 / ticks_per_second;
    let opt = |ticks: Option<u64>| secs(ticks.unwrap_or(0));

    Ok(indices
        .into_iter()
        .zip(stat.cpu_time)
        .map(|(cpu, t)| CpuTimes {
            cpu,
            user: secs(t.user),
            nice: secs(t.nice),
            system: secs(t.system),
            idle: secs(t.idle),
            iowait: opt(t.iowait),
            irq: opt(t.irq),
            softirq: opt(t.softirq),
            steal: opt(t.steal),
            guest: opt(t.guest),
            guest_nice: opt(t.guest_nice),
        })
        .collect())
}

fn net_dev_stats(d: DeviceStatus) -> NetDevStats {
    NetDevStats {
        counters: [
            d.recv_bytes,
            d.recv_packets,
            d.recv_errs,
            d.recv_drop,
            d.recv_fifo,
            d.recv_frame,
            d.recv_compressed,
            d.recv_multicast,
            d.sent_bytes,
            d.sent_packets,
            d.sent_errs,
            d.sent_drop,
            d.sent_fifo,
            d.sent_colls,
            d.sent_carrier,
            d.sent_compressed,
        ],
        device: d.name,
    }
}

fn probe_target(m: MountInfo) -> ProbeTarget {
    let mut options: Vec<String> = m
        .mount_options
        .into_iter()
        .map(|(name, value)| match value {
            Some(value) => format!("{}={}", name, value),
            None => name,
        })
        .collect();
    options.sort();

    ProbeTarget::new(
        m.mount_source.unwrap_or_else(|| "none".to_string()),
        m.mount_point.to_string_lossy(),
        m.fs_type,
    )
    .with_options(options)
}

/// Read a single-line sysfs attribute; absent or empty files yield `None`.
fn read_attribute(dir: &Path, name: &str) -> Option<String> {
    match std::fs::read_to_string(dir.join(name)) {
        Ok(value) => {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Err(e) => {
            trace!(dir = %dir.display(), attribute = name, error = %e, "sysfs attribute unavailable");
            None
        }
    }
}

fn clock_ticks() -> f64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as f64 } else { 100.0 }
}

/// Filesystem statistics via `statvfs(2)`. Blocks for as long as the
/// filesystem does.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl Probe for StatvfsProbe {
    type Output = FsStats;

    fn probe(&self, target: &ProbeTarget) -> io::Result<FsStats> {
        statvfs(&target.mount_point)
    }
}

fn statvfs(path: &str) -> io::Result<FsStats> {
    let c_path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs is plain old data and is fully written on success.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    let block_size = stat.f_frsize as u64;
    Ok(FsStats {
        size: stat.f_blocks as u64 * block_size,
        free: stat.f_bfree as u64 * block_size,
        avail: stat.f_bavail as u64 * block_size,
        files: stat.f_files as u64,
        files_free: stat.f_ffree as u64,
    })
}
