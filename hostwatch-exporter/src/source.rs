//! Host data sources.
//!
//! Collectors never touch `/proc` or `/sys` directly; they read parsed
//! records through [`HostSource`]. [`crate::linux::ProcfsSource`] is the
//! production implementation, tests substitute in-memory fakes.

use hostwatch_core::ProbeTarget;

use crate::error::CollectError;

/// Cumulative CPU time for one logical CPU, in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTimes {
    pub cpu: usize,
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTimes {
    /// Mode name and seconds, in `/proc/stat` column order.
    pub fn modes(&self) -> [(&'static str, f64); 10] {
        [
            ("user", self.user),
            ("nice", self.nice),
            ("system", self.system),
            ("idle", self.idle),
            ("iowait", self.iowait),
            ("irq", self.irq),
            ("softirq", self.softirq),
            ("steal", self.steal),
            ("guest", self.guest),
            ("guest_nice", self.guest_nice),
        ]
    }
}

/// One `/proc/meminfo` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemField {
    /// Field name as printed by the kernel (e.g. `Active(anon)`).
    pub name: String,
    /// Value, converted to bytes when the kernel reports `kB`.
    pub value: u64,
    /// Whether the value is a byte quantity (as opposed to a page count).
    pub bytes: bool,
}

/// Column names of `/proc/net/dev`, in file order.
pub const NET_DEV_FIELDS: [&str; 16] = [
    "receive_bytes",
    "receive_packets",
    "receive_errs",
    "receive_drop",
    "receive_fifo",
    "receive_frame",
    "receive_compressed",
    "receive_multicast",
    "transmit_bytes",
    "transmit_packets",
    "transmit_errs",
    "transmit_drop",
    "transmit_fifo",
    "transmit_colls",
    "transmit_carrier",
    "transmit_compressed",
];

/// Counters of one network device, aligned with [`NET_DEV_FIELDS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetDevStats {
    pub device: String,
    pub counters: [u64; 16],
}

impl NetDevStats {
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        NET_DEV_FIELDS.iter().copied().zip(self.counters.iter().copied())
    }
}

/// Optional sysfs attributes of a network device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetAttributes {
    pub operstate: Option<String>,
    pub address: Option<String>,
    pub ifalias: Option<String>,
}

/// One `/proc/diskstats` row. Times are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub device: String,
    pub reads_completed: u64,
    pub reads_merged: u64,
    pub sectors_read: u64,
    pub read_time_ms: u64,
    pub writes_completed: u64,
    pub writes_merged: u64,
    pub sectors_written: u64,
    pub write_time_ms: u64,
    pub io_in_progress: u64,
    pub io_time_ms: u64,
    pub weighted_io_time_ms: u64,
}

/// Result of a successful `statvfs` probe. Sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStats {
    pub size: u64,
    pub free: u64,
    pub avail: u64,
    pub files: u64,
    pub files_free: u64,
}

/// Parsed view of the kernel tables the collectors read.
///
/// Every call reads the table afresh. Calls are cheap and never block on a
/// remote filesystem; the blocking `statvfs` lives behind
/// [`hostwatch_core::Probe`] instead.
pub trait HostSource: Send + Sync {
    /// Per-CPU times from `/proc/stat`, aggregate line excluded.
    fn cpu_times(&self) -> Result<Vec<CpuTimes>, CollectError>;

    /// `/proc/meminfo` fields in file order.
    fn meminfo(&self) -> Result<Vec<MemField>, CollectError>;

    /// `/proc/net/dev` counters per device.
    fn net_dev(&self) -> Result<Vec<NetDevStats>, CollectError>;

    /// sysfs attributes of one device. Missing entries are `None`.
    fn net_attributes(&self, device: &str) -> NetAttributes;

    /// `/proc/diskstats` rows.
    fn disk_stats(&self) -> Result<Vec<DiskStats>, CollectError>;

    /// Mount table from `/proc/self/mountinfo`.
    fn mounts(&self) -> Result<Vec<ProbeTarget>, CollectError>;
}

/// Parse `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Vec<MemField> {
    content
        .lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let mut parts = rest.split_whitespace();
            let value: u64 = parts.next()?.parse().ok()?;
            let bytes = parts.next() == Some("kB");
            Some(MemField {
                name: name.trim().to_string(),
                value: if bytes { value * 1024 } else { value },
                bytes,
            })
        })
        .collect()
}
