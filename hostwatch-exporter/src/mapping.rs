//! Naming rules for exposed metrics.

/// Namespace shared by every host metric.
pub const NAMESPACE: &str = "node";

/// Make a kernel-supplied name safe for use inside a metric name.
///
/// Metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Runs of invalid
/// characters become a single underscore, trailing underscores are dropped
/// and a leading digit gets an underscore prefix.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut pending_underscore = false;

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == ':' {
            if pending_underscore && !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            pending_underscore = false;
            result.push(c);
        } else {
            // '_' and anything invalid collapse into one separator
            pending_underscore = true;
        }
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Metric name for one `/proc/meminfo` field.
///
/// Byte quantities get the `_bytes` unit suffix; page counts such as
/// `HugePages_Total` are exposed without a unit.
pub fn memory_metric_name(field: &str, bytes: bool) -> String {
    let field = sanitize_metric_name(field);
    if bytes {
        format!("{}_memory_{}_bytes", NAMESPACE, field)
    } else {
        format!("{}_memory_{}", NAMESPACE, field)
    }
}
