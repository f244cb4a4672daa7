//! Network interface counters and link state.

use std::sync::Arc;

use async_trait::async_trait;
use hostwatch_core::{FamilySet, MetricFamily, MetricKey, MetricType, MonotonicGuard, Sample};

use super::Collector;
use crate::error::CollectError;
use crate::filter::NameFilter;
use crate::source::{HostSource, NET_DEV_FIELDS};

const NETWORK_UP: &str = "node_network_up";
const NETWORK_INFO: &str = "node_network_info";

/// Exposes `/proc/net/dev` counters as `node_network_<field>_total{device}`
/// together with sysfs link state.
pub struct NetworkCollector {
    source: Arc<dyn HostSource>,
    filter: NameFilter,
    guard: MonotonicGuard,
}

impl NetworkCollector {
    pub fn new(source: Arc<dyn HostSource>, filter: NameFilter) -> Self {
        Self {
            source,
            filter,
            guard: MonotonicGuard::new(),
        }
    }
}

fn counter_name(field: &str) -> String {
    format!("node_network_{}_total", field)
}

#[async_trait]
impl Collector for NetworkCollector {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let devices: Vec<_> = self
            .source
            .net_dev()?
            .into_iter()
            .filter(|d| self.filter.should_include(&d.device))
            .collect();

        let sample: Sample = devices
            .iter()
            .flat_map(|dev| {
                dev.fields().map(move |(field, value)| {
                    let key =
                        MetricKey::new(counter_name(field)).with_label("device", dev.device.as_str());
                    (key, value as f64)
                })
            })
            .collect();

        let mut families = FamilySet::new();
        for field in NET_DEV_FIELDS {
            families.declare(
                &counter_name(field),
                &format!("Network device statistic {}.", field),
                MetricType::Counter,
            );
        }
        families.declare(
            NETWORK_UP,
            "Whether the operational state of the device is up.",
            MetricType::Gauge,
        );
        families.declare(
            NETWORK_INFO,
            "Non-numeric attributes of the network device, value is always 1.",
            MetricType::Gauge,
        );

        for (key, value) in self.guard.apply(sample) {
            families.add(key, value);
        }

        for dev in &devices {
            let attrs = self.source.net_attributes(&dev.device);
            let operstate = attrs.operstate.unwrap_or_default();
            let up = if operstate == "up" { 1.0 } else { 0.0 };

            families.add(
                MetricKey::new(NETWORK_UP).with_label("device", dev.device.as_str()),
                up,
            );
            families.add(
                MetricKey::new(NETWORK_INFO)
                    .with_label("device", dev.device.as_str())
                    .with_label("operstate", operstate)
                    .with_label("address", attrs.address.unwrap_or_default())
                    .with_label("ifalias", attrs.ifalias.unwrap_or_default()),
                1.0,
            );
        }

        Ok(families.into_families())
    }
}
