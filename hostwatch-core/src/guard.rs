//! Counter monotonicity guard.
//!
//! Cumulative counters read from the kernel occasionally step backwards
//! (driver resets, wrapped 32-bit fields, racing reads). Exposing such a dip
//! makes the backend compute a huge bogus rate, so the guard republishes the
//! last value it published instead and waits for the counter to catch up.
//!
//! Keys that vanish from a sample (an interface removed at runtime, a disk
//! detached) keep their stored value but are not republished: a series only
//! appears in the output when the collector still reports it. Stored values
//! are never aged out, so a device that comes back under the same name is
//! guarded against its last published value.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::metric::{MetricKey, Sample};

/// Enforces non-decreasing values for counter series across scrapes.
///
/// Each collector owns one guard for the life of the process. All reads and
/// writes of the previous-value store happen under a single lock per call to
/// [`apply`](Self::apply), so overlapping scrapes never interleave a partial
/// update.
#[derive(Debug, Default)]
pub struct MonotonicGuard {
    previous: Mutex<HashMap<MetricKey, f64>>,
}

impl MonotonicGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass a raw sample through the guard.
    ///
    /// Returns exactly one `(key, published)` pair per key in `sample`. A value
    /// that is lower than the previously published one is replaced by the
    /// previous value and does not overwrite the store.
    pub fn apply(&self, sample: Sample) -> Vec<(MetricKey, f64)> {
        let mut previous = self.previous.lock();
        let mut published = Vec::with_capacity(sample.len());

        for (key, current) in sample {
            match previous.get(&key).copied() {
                Some(last) if current.is_nan() || current < last => {
                    debug!(
                        metric = %key.name,
                        labels = ?key.labels,
                        last,
                        current,
                        "Counter regressed, republishing last value"
                    );
                    published.push((key, last));
                }
                _ => {
                    if !current.is_nan() {
                        previous.insert(key.clone(), current);
                    }
                    published.push((key, current));
                }
            }
        }

        published
    }

    /// The last published value for a key, if any.
    pub fn last_published(&self, key: &MetricKey) -> Option<f64> {
        self.previous.lock().get(key).copied()
    }

    /// Number of series with a stored value.
    pub fn tracked_series(&self) -> usize {
        self.previous.lock().len()
    }
}
