use super::{OperationObserver, Outcome};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::time::Duration;

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Summary,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Summary => "summary",
        }
    }
}

type Labels = BTreeMap<String, String>;

/// One metric family with its samples
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: String,
    pub metric_type: MetricType,
    pub help: String,
    /// (suffix, labels, value); the suffix is appended to `name`
    pub samples: Vec<(&'static str, Labels, f64)>,
}

impl Metric {
    pub fn new(name: &str, metric_type: MetricType, help: &str) -> Self {
        Self {
            name: name.to_string(),
            metric_type,
            help: help.to_string(),
            samples: Vec::new(),
        }
    }

    pub fn add_value(&mut self, labels: Labels, value: f64) {
        self.samples.push(("", labels, value));
    }

    pub fn add_suffixed(&mut self, suffix: &'static str, labels: Labels, value: f64) {
        self.samples.push((suffix, labels, value));
    }

    /// Format metric in Prometheus exposition format
    pub fn format_prometheus(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(output, "# TYPE {} {}", self.name, self.metric_type.as_str());

        for (suffix, labels, value) in &self.samples {
            if labels.is_empty() {
                let _ = writeln!(output, "{}{} {}", self.name, suffix, value);
            } else {
                let label_str = labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = writeln!(output, "{}{}{{{}}} {}", self.name, suffix, label_str, value);
            }
        }

        output
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Default)]
struct OperationStats {
    in_flight: i64,
    success: u64,
    failure: u64,
    errors: BTreeMap<&'static str, u64>,
    duration_sum: f64,
    duration_max: f64,
}

/// In-process operation counters rendered as Prometheus text
#[derive(Debug, Default)]
pub struct MetricsObserver {
    operations: Mutex<BTreeMap<String, OperationStats>>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect current values into metric families
    pub fn collect(&self) -> Vec<Metric> {
        let operations = self.operations.lock();

        let mut total = Metric::new(
            "clusterforge_operations_total",
            MetricType::Counter,
            "Completed lifecycle operations by outcome",
        );
        let mut errors = Metric::new(
            "clusterforge_operation_errors_total",
            MetricType::Counter,
            "Failed lifecycle operations by error code",
        );
        let mut duration = Metric::new(
            "clusterforge_operation_duration_seconds",
            MetricType::Summary,
            "Lifecycle operation duration",
        );
        let mut duration_max = Metric::new(
            "clusterforge_operation_duration_seconds_max",
            MetricType::Gauge,
            "Longest observed lifecycle operation duration",
        );
        let mut in_flight = Metric::new(
            "clusterforge_operations_in_flight",
            MetricType::Gauge,
            "Lifecycle operations currently running",
        );

        for (operation, stats) in operations.iter() {
            let op = operation.as_str();
            total.add_value(
                labels(&[("operation", op), ("outcome", "success")]),
                stats.success as f64,
            );
            total.add_value(
                labels(&[("operation", op), ("outcome", "error")]),
                stats.failure as f64,
            );
            for (code, count) in &stats.errors {
                errors.add_value(labels(&[("operation", op), ("code", code)]), *count as f64);
            }
            let count = (stats.success + stats.failure) as f64;
            duration.add_suffixed("_sum", labels(&[("operation", op)]), stats.duration_sum);
            duration.add_suffixed("_count", labels(&[("operation", op)]), count);
            duration_max.add_value(labels(&[("operation", op)]), stats.duration_max);
            in_flight.add_value(labels(&[("operation", op)]), stats.in_flight as f64);
        }

        vec![total, errors, duration, duration_max, in_flight]
    }

    /// Render all metrics in Prometheus exposition format
    pub fn render(&self) -> String {
        self.collect()
            .iter()
            .map(Metric::format_prometheus)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OperationObserver for MetricsObserver {
    fn on_start(&self, operation: &str, _cluster: Option<&str>) {
        let mut operations = self.operations.lock();
        operations.entry(operation.to_string()).or_default().in_flight += 1;
    }

    fn on_finish(&self, operation: &str, _cluster: Option<&str>, duration: Duration, outcome: Outcome) {
        let mut operations = self.operations.lock();
        let stats = operations.entry(operation.to_string()).or_default();

        stats.in_flight = (stats.in_flight - 1).max(0);
        match outcome {
            Outcome::Success => stats.success += 1,
            Outcome::Error(code) => {
                stats.failure += 1;
                *stats.errors.entry(code.as_str()).or_default() += 1;
            }
        }

        let secs = duration.as_secs_f64();
        stats.duration_sum += secs;
        if secs > stats.duration_max {
            stats.duration_max = secs;
        }
    }
}
