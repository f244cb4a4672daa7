//! Memory gauges from `/proc/meminfo`.

use std::sync::Arc;

use async_trait::async_trait;
use hostwatch_core::{FamilySet, MetricFamily, MetricKey, MetricType};

use super::Collector;
use crate::error::CollectError;
use crate::mapping::memory_metric_name;
use crate::source::HostSource;

/// One gauge per meminfo field. Values are point-in-time and unguarded.
pub struct MemoryCollector {
    source: Arc<dyn HostSource>,
}

impl MemoryCollector {
    pub fn new(source: Arc<dyn HostSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let fields = self.source.meminfo()?;

        let mut families = FamilySet::new();
        for field in fields {
            let name = memory_metric_name(&field.name, field.bytes);
            let help = format!("Memory information field {}.", field.name);
            families.declare(&name, &help, MetricType::Gauge);
            families.add(MetricKey::new(name), field.value as f64);
        }

        Ok(families.into_families())
    }
}
