//! Prometheus text exposition format (version 0.0.4).

use std::fmt::Write;

use hostwatch_core::MetricFamily;

/// Content type served with [`render`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render metric families as exposition text.
///
/// Families are written in the order given; each gets a `# HELP` line (when
/// it has help text) and a `# TYPE` line followed by one line per
/// observation.
pub fn render(families: &[MetricFamily]) -> String {
    let series: usize = families.iter().map(|f| f.observations.len()).sum();
    let mut output = String::with_capacity(series * 80);

    for family in families {
        if family.is_empty() {
            continue;
        }

        if !family.help.is_empty() {
            writeln!(output, "# HELP {} {}", family.name, escape_help(&family.help)).ok();
        }
        writeln!(
            output,
            "# TYPE {} {}",
            family.name,
            family.metric_type.as_str()
        )
        .ok();

        for observation in &family.observations {
            writeln!(
                output,
                "{}{} {}",
                family.name,
                format_labels(&observation.labels),
                format_value(observation.value)
            )
            .ok();
        }
    }

    output
}

/// Escape a label value: backslash, double quote and newline.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// HELP text only escapes backslash and newline.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a sample value; integral values are printed without a fraction.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
