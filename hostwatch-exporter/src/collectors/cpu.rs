//! Per-CPU time counters.

use std::sync::Arc;

use async_trait::async_trait;
use hostwatch_core::{FamilySet, MetricFamily, MetricKey, MetricType, MonotonicGuard, Sample};

use super::Collector;
use crate::error::CollectError;
use crate::source::HostSource;

const CPU_SECONDS: &str = "node_cpu_seconds_total";

/// Exposes `node_cpu_seconds_total{cpu,mode}` from `/proc/stat`.
pub struct CpuCollector {
    source: Arc<dyn HostSource>,
    guard: MonotonicGuard,
}

impl CpuCollector {
    pub fn new(source: Arc<dyn HostSource>) -> Self {
        Self {
            source,
            guard: MonotonicGuard::new(),
        }
    }
}

#[async_trait]
impl Collector for CpuCollector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let times = self.source.cpu_times()?;

        let mut sample = Sample::new();
        for cpu in &times {
            let index = cpu.cpu.to_string();
            for (mode, seconds) in cpu.modes() {
                let key = MetricKey::new(CPU_SECONDS)
                    .with_label("cpu", index.as_str())
                    .with_label("mode", mode);
                sample.insert(key, seconds);
            }
        }

        let mut families = FamilySet::new();
        families.declare(
            CPU_SECONDS,
            "Seconds the CPUs spent in each mode.",
            MetricType::Counter,
        );
        for (key, value) in self.guard.apply(sample) {
            families.add(key, value);
        }

        Ok(families.into_families())
    }
}
