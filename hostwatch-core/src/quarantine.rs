//! Cool-down registry for resources whose probes hang.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::probe::ProbeTarget;

/// Default cool-down before a quarantined resource is probed again.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(300);

/// Records the last probe timeout per resource and keeps the resource out of
/// the probe pool until its cool-down has elapsed.
///
/// Only timeouts quarantine a resource. Probe errors are immediate,
/// non-recurring failures and are retried on the next scrape. An expired
/// entry is dropped the next time [`partition`](Self::partition) releases
/// its resource back into the probe pool.
#[derive(Debug)]
pub struct QuarantineRegistry {
    cool_down: Duration,
    failures: Mutex<HashMap<String, Instant>>,
}

impl Default for QuarantineRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_COOL_DOWN)
    }
}

impl QuarantineRegistry {
    pub fn new(cool_down: Duration) -> Self {
        Self {
            cool_down,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }

    /// True while `now` is less than one cool-down after the last recorded
    /// failure of `resource`.
    pub fn is_quarantined(&self, resource: &str, now: Instant) -> bool {
        let failures = self.failures.lock();
        self.within_cool_down(failures.get(resource), now)
    }

    /// Record (or overwrite) the failure time of `resource`.
    pub fn record_failure(&self, resource: &str, now: Instant) {
        let previous = self.failures.lock().insert(resource.to_string(), now);
        if previous.is_some() {
            warn!(
                resource,
                cool_down_secs = self.cool_down.as_secs(),
                "Resource timed out again, restarting quarantine"
            );
        } else {
            warn!(
                resource,
                cool_down_secs = self.cool_down.as_secs(),
                "Resource quarantined after timeout"
            );
        }
    }

    /// Split targets into `(quarantined, eligible)` under a single lock.
    pub fn partition(
        &self,
        targets: Vec<ProbeTarget>,
        now: Instant,
    ) -> (Vec<ProbeTarget>, Vec<ProbeTarget>) {
        let mut failures = self.failures.lock();
        let (quarantined, eligible): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|t| self.within_cool_down(failures.get(t.id()), now));

        for target in &eligible {
            if failures.remove(target.id()).is_some() {
                info!(resource = %target.id(), "Quarantine expired, probing again");
            }
        }

        (quarantined, eligible)
    }

    /// Number of resources quarantined at `now`.
    pub fn quarantined_count(&self, now: Instant) -> usize {
        let failures = self.failures.lock();
        failures
            .values()
            .filter(|failed_at| self.within_cool_down(Some(*failed_at), now))
            .count()
    }

    fn within_cool_down(&self, failed_at: Option<&Instant>, now: Instant) -> bool {
        match failed_at {
            Some(failed_at) => now.saturating_duration_since(*failed_at) < self.cool_down,
            None => false,
        }
    }
}
