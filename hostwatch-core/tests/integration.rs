//! Integration tests for the hostwatch-core sampling engine.
//!
//! These drive the guard, executor and quarantine registry together the way a
//! collector does across several scrapes.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use hostwatch_core::{
    MetricKey, MonotonicGuard, Probe, ProbeExecutor, ProbeResult, ProbeTarget,
    QuarantineRegistry, Sample,
};

/// Blocks hung probes until the test finishes.
#[derive(Clone, Default)]
struct Release(Arc<(Mutex<bool>, Condvar)>);

impl Release {
    fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut released = lock.lock().unwrap();
        while !*released {
            released = cvar.wait(released).unwrap();
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        // Only the test's own handle opens the gate.
        if Arc::strong_count(&self.0) == 2 {
            let (lock, cvar) = &*self.0;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
    }
}

struct MountProbe {
    hung: HashSet<String>,
    release: Release,
    calls: Mutex<Vec<String>>,
}

impl Probe for MountProbe {
    type Output = (u64, u64);

    fn probe(&self, target: &ProbeTarget) -> io::Result<(u64, u64)> {
        self.calls.lock().unwrap().push(target.mount_point.clone());
        if self.hung.contains(&target.mount_point) {
            self.release.wait();
            return Err(io::Error::other("stale"));
        }
        Ok((1_000_000, 250_000))
    }
}

fn mounts() -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new("/dev/sda1", "/", "ext4"),
        ProbeTarget::new("/dev/sdb1", "/data", "xfs"),
        ProbeTarget::new("nas:/slow", "/mnt/slow", "nfs4"),
    ]
}

/// One filesystem scrape: partition, probe, record timeouts. Returns the
/// device-error flag per mount.
async fn scrape(
    registry: &QuarantineRegistry,
    executor: &ProbeExecutor<MountProbe>,
    now: Instant,
) -> Vec<(String, u8)> {
    let (quarantined, eligible) = registry.partition(mounts(), now);
    let mut flags: Vec<(String, u8)> = quarantined
        .into_iter()
        .map(|t| (t.mount_point, 1))
        .collect();

    for (target, result) in executor.run(eligible).await {
        let flag = match result {
            ProbeResult::Success(_) => 0,
            ProbeResult::Timeout => {
                registry.record_failure(target.id(), Instant::now());
                1
            }
            ProbeResult::Skipped | ProbeResult::Error(_) => 1,
        };
        flags.push((target.mount_point, flag));
    }

    flags.sort();
    flags
}

#[tokio::test]
async fn test_stuck_mount_is_flagged_then_skipped() {
    let release = Release::default();
    let probe = Arc::new(MountProbe {
        hung: HashSet::from(["/mnt/slow".to_string()]),
        release: release.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let timeout = Duration::from_millis(250);
    let executor = ProbeExecutor::from_shared(Arc::clone(&probe), 4, timeout);
    let registry = QuarantineRegistry::new(Duration::from_secs(300));

    let started = Instant::now();
    let first = scrape(&registry, &executor, Instant::now()).await;
    assert!(started.elapsed() < timeout + Duration::from_millis(750));
    assert_eq!(
        first,
        vec![
            ("/".to_string(), 0),
            ("/data".to_string(), 0),
            ("/mnt/slow".to_string(), 1),
        ]
    );

    let started = Instant::now();
    let second = scrape(&registry, &executor, Instant::now()).await;
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(second, first);

    let slow_calls = probe
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.as_str() == "/mnt/slow")
        .count();
    assert_eq!(slow_calls, 1, "quarantined mount must not be probed again");
}

#[tokio::test]
async fn test_quarantine_expires_and_renews() {
    let release = Release::default();
    let probe = Arc::new(MountProbe {
        hung: HashSet::from(["/mnt/slow".to_string()]),
        release: release.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let executor = ProbeExecutor::from_shared(Arc::clone(&probe), 4, Duration::from_millis(100));
    let registry = QuarantineRegistry::new(Duration::from_millis(300));

    scrape(&registry, &executor, Instant::now()).await;
    assert!(registry.is_quarantined("/mnt/slow", Instant::now()));

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!registry.is_quarantined("/mnt/slow", Instant::now()));

    // Eligible again: probed, times out, quarantined from the new failure time.
    let flags = scrape(&registry, &executor, Instant::now()).await;
    assert!(flags.contains(&("/mnt/slow".to_string(), 1)));
    assert!(registry.is_quarantined("/mnt/slow", Instant::now()));

    let slow_calls = probe
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.as_str() == "/mnt/slow")
        .count();
    assert_eq!(slow_calls, 2);
}

#[test]
fn test_counter_guard_scenario() {
    let guard = MonotonicGuard::new();
    let key = MetricKey::new("node_cpu_seconds_total")
        .with_label("cpu", "0")
        .with_label("mode", "user");

    let published: Vec<f64> = [1000.0, 1000.0, 990.0, 1050.0]
        .into_iter()
        .map(|raw| {
            let sample: Sample = [(key.clone(), raw)].into_iter().collect();
            guard.apply(sample)[0].1
        })
        .collect();

    assert_eq!(published, vec![1000.0, 1000.0, 1000.0, 1050.0]);
}

#[test]
fn test_guard_shared_across_threads() {
    let guard = Arc::new(MonotonicGuard::new());
    let applied = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = ["eth0", "eth1", "wlan0"]
        .into_iter()
        .map(|device| {
            let guard = Arc::clone(&guard);
            let applied = Arc::clone(&applied);
            std::thread::spawn(move || {
                let key = MetricKey::new("node_network_receive_bytes_total")
                    .with_label("device", device);
                let mut last = 0.0;
                for raw in [10.0, 20.0, 5.0, 30.0, 29.0] {
                    let sample: Sample = [(key.clone(), raw)].into_iter().collect();
                    let published = guard.apply(sample)[0].1;
                    assert!(published >= last);
                    last = published;
                    applied.fetch_add(1, Ordering::SeqCst);
                }
                last
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 30.0);
    }
    assert_eq!(applied.load(Ordering::SeqCst), 15);
    assert_eq!(guard.tracked_series(), 3);
}
