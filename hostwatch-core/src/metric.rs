//! Series identity and the per-scrape sample model.

use std::collections::{BTreeMap, HashMap};

/// A unique identifier for one time series: metric name plus ordered labels.
///
/// Labels keep the order they were added in, so two keys are equal only when
/// built the same way. Collectors always build their keys with a fixed label
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    /// The full metric name (e.g. `node_network_receive_bytes_total`).
    pub name: String,
    /// Label name/value pairs in declaration order.
    pub labels: Vec<(String, String)>,
}

impl MetricKey {
    /// Create a key without labels.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Append a label to this key.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw readings taken by a collector during one scrape.
///
/// Built fresh at the start of a scrape and consumed by
/// [`MonotonicGuard::apply`](crate::guard::MonotonicGuard::apply). Keys are
/// unique; inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    values: BTreeMap<MetricKey, f64>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading, returning the value it replaced (if any).
    pub fn insert(&mut self, key: MetricKey, value: f64) -> Option<f64> {
        self.values.insert(key, value)
    }

    pub fn get(&self, key: &MetricKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for Sample {
    type Item = (MetricKey, f64);
    type IntoIter = std::collections::btree_map::IntoIter<MetricKey, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl FromIterator<(MetricKey, f64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (MetricKey, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Exposition type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Untyped,
}

impl MetricType {
    /// Get the TYPE comment string for the text exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Untyped => "untyped",
        }
    }
}

/// One labelled value inside a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// All observations sharing one metric name, help text and type.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub observations: Vec<Observation>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, help: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            metric_type,
            observations: Vec::new(),
        }
    }

    /// Add an observation to this family.
    pub fn add(&mut self, labels: Vec<(String, String)>, value: f64) {
        self.observations.push(Observation { labels, value });
    }

    /// Find the value of the observation carrying exactly these label values.
    pub fn value_for(&self, labels: &[(&str, &str)]) -> Option<f64> {
        self.observations
            .iter()
            .find(|o| {
                labels
                    .iter()
                    .all(|(k, v)| o.labels.iter().any(|(lk, lv)| lk == k && lv == v))
            })
            .map(|o| o.value)
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Ordered set of families that routes keyed values to the family named by
/// the key.
///
/// Families keep their declaration order; values for a name that was never
/// declared land in an untyped family created on first use.
#[derive(Debug, Default)]
pub struct FamilySet {
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
}

impl FamilySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a family. Declaring an existing name is a no-op.
    pub fn declare(&mut self, name: &str, help: &str, metric_type: MetricType) {
        if self.index.contains_key(name) {
            return;
        }
        self.index.insert(name.to_string(), self.families.len());
        self.families.push(MetricFamily::new(name, help, metric_type));
    }

    /// Add a value under the family named by `key.name`.
    pub fn add(&mut self, key: MetricKey, value: f64) {
        let idx = match self.index.get(&key.name) {
            Some(idx) => *idx,
            None => {
                self.declare(&key.name, "", MetricType::Untyped);
                self.families.len() - 1
            }
        };
        self.families[idx].add(key.labels, value);
    }

    pub fn get(&self, name: &str) -> Option<&MetricFamily> {
        self.index.get(name).map(|idx| &self.families[*idx])
    }

    /// Consume the set, dropping families that received no observations.
    pub fn into_families(self) -> Vec<MetricFamily> {
        self.families.into_iter().filter(|f| !f.is_empty()).collect()
    }
}
