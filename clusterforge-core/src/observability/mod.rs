//! Operation observability
//!
//! The lifecycle service reports every operation entry and exit to an
//! [`OperationObserver`]. Observers own all formatting and storage; the
//! service only supplies the operation name, target cluster, duration and
//! outcome.

mod metrics;

pub use metrics::{Metric, MetricType, MetricsObserver};

use clusterforge_common::ErrorCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a finished operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error(ErrorCode),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error(_) => "error",
        }
    }
}

/// Sink for operation lifecycle events
pub trait OperationObserver: Send + Sync {
    fn on_start(&self, _operation: &str, _cluster: Option<&str>) {}

    fn on_finish(&self, operation: &str, cluster: Option<&str>, duration: Duration, outcome: Outcome);
}

/// Logs entry at debug and exit at info (success) or warn (error)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl OperationObserver for TracingObserver {
    fn on_start(&self, operation: &str, cluster: Option<&str>) {
        debug!(operation, cluster = cluster.unwrap_or("-"), "Operation started");
    }

    fn on_finish(&self, operation: &str, cluster: Option<&str>, duration: Duration, outcome: Outcome) {
        let cluster = cluster.unwrap_or("-");
        let duration_ms = duration.as_millis() as u64;
        match outcome {
            Outcome::Success => crate::log_operation!(
                info,
                operation,
                cluster,
                "Operation completed",
                duration_ms = duration_ms,
                outcome = "success"
            ),
            Outcome::Error(code) => crate::log_operation!(
                warn,
                operation,
                cluster,
                "Operation failed",
                duration_ms = duration_ms,
                outcome = code.as_str()
            ),
        }
    }
}

/// Fans events out to several observers in order
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn OperationObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl OperationObserver for CompositeObserver {
    fn on_start(&self, operation: &str, cluster: Option<&str>) {
        for observer in &self.observers {
            observer.on_start(operation, cluster);
        }
    }

    fn on_finish(&self, operation: &str, cluster: Option<&str>, duration: Duration, outcome: Outcome) {
        for observer in &self.observers {
            observer.on_finish(operation, cluster, duration, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_fans_out() {
        let metrics = Arc::new(MetricsObserver::new());
        let composite = CompositeObserver::new()
            .with(Arc::new(TracingObserver))
            .with(metrics.clone());
        assert_eq!(composite.len(), 2);

        composite.on_start("get_cluster", Some("demo"));
        composite.on_finish(
            "get_cluster",
            Some("demo"),
            Duration::from_millis(20),
            Outcome::Error(ErrorCode::NotFound),
        );

        let text = metrics.render();
        assert!(text.contains(
            "clusterforge_operation_errors_total{code=\"NOT_FOUND\",operation=\"get_cluster\"} 1"
        ));
    }

    #[test]
    fn test_outcome_label() {
        assert_eq!(Outcome::Success.label(), "success");
        assert_eq!(Outcome::Error(ErrorCode::Timeout).label(), "error");
    }
}
