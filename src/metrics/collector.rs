//! Metrics collector using prometheus-client.
//!
//! Tracks check outcomes, check latency, per-service state and the overall
//! report status.

use crate::health::{HealthReport, OverallStatus, ServiceHealth, ServiceStatus};
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// Labels identifying a monitored service.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ServiceLabels {
    pub service: String,
}

/// Labels for check outcome counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    pub service: String,
    pub status: CheckStatus,
}

/// Check outcome as a label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CheckStatus {
    Up,
    Down,
    Degraded,
}

impl From<ServiceStatus> for CheckStatus {
    fn from(status: ServiceStatus) -> Self {
        match status {
            ServiceStatus::Up => CheckStatus::Up,
            ServiceStatus::Down => CheckStatus::Down,
            ServiceStatus::Degraded => CheckStatus::Degraded,
        }
    }
}

/// Labels for report cycle counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CycleLabels {
    pub status: CycleStatus,
}

/// Overall status as a label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CycleStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl From<OverallStatus> for CycleStatus {
    fn from(status: OverallStatus) -> Self {
        match status {
            OverallStatus::Healthy => CycleStatus::Healthy,
            OverallStatus::Degraded => CycleStatus::Degraded,
            OverallStatus::Unhealthy => CycleStatus::Unhealthy,
        }
    }
}

/// Collects and stores all metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsCollectorInner>,
}

struct MetricsCollectorInner {
    /// Check results by service and status.
    checks_total: Family<CheckLabels, Counter>,
    /// Check duration histogram (in seconds), fallback time included.
    check_duration_seconds: Family<ServiceLabels, Histogram>,
    /// Service state gauge (1 = up, 0 = down or degraded).
    service_up: Family<ServiceLabels, Gauge>,
    /// Overall status of the latest report (0 healthy, 1 degraded, 2 unhealthy).
    overall_status: Gauge,
    /// Completed report cycles by overall status.
    cycles_total: Family<CycleLabels, Counter>,
    /// Cycles replaced by the synthetic failure report.
    aggregation_failures_total: Counter,
    /// The prometheus registry.
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let checks_total = Family::<CheckLabels, Counter>::default();
        let check_duration_seconds = Family::<ServiceLabels, Histogram>::new_with_constructor(
            || {
                // Buckets: 5ms up to ~20s, covering the 10s timeout plus a fallback
                Histogram::new(exponential_buckets(0.005, 2.0, 13))
            },
        );
        let service_up = Family::<ServiceLabels, Gauge>::default();
        let overall_status = Gauge::default();
        let cycles_total = Family::<CycleLabels, Counter>::default();
        let aggregation_failures_total = Counter::default();

        registry.register(
            "healthagg_checks",
            "Total number of service checks performed",
            checks_total.clone(),
        );
        registry.register(
            "healthagg_check_duration_seconds",
            "Service check duration in seconds",
            check_duration_seconds.clone(),
        );
        registry.register(
            "healthagg_service_up",
            "Service state (1=up, 0=down or degraded)",
            service_up.clone(),
        );
        registry.register(
            "healthagg_overall_status",
            "Overall status of the latest report (0=healthy, 1=degraded, 2=unhealthy)",
            overall_status.clone(),
        );
        registry.register(
            "healthagg_cycles",
            "Total number of completed report cycles",
            cycles_total.clone(),
        );
        registry.register(
            "healthagg_aggregation_failures",
            "Report cycles that failed internally and produced a synthetic report",
            aggregation_failures_total.clone(),
        );

        Self {
            inner: Arc::new(MetricsCollectorInner {
                checks_total,
                check_duration_seconds,
                service_up,
                overall_status,
                cycles_total,
                aggregation_failures_total,
                registry,
            }),
        }
    }

    /// Get the prometheus registry for encoding.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Record the result of one service check.
    pub fn record_check(&self, service: &str, health: &ServiceHealth) {
        let labels = CheckLabels {
            service: service.to_string(),
            status: health.status.into(),
        };
        self.inner.checks_total.get_or_create(&labels).inc();

        let service_labels = ServiceLabels {
            service: service.to_string(),
        };
        if let Some(ms) = health.response_time_ms {
            self.inner
                .check_duration_seconds
                .get_or_create(&service_labels)
                .observe(Duration::from_millis(ms).as_secs_f64());
        }
        self.inner
            .service_up
            .get_or_create(&service_labels)
            .set(if health.is_up() { 1 } else { 0 });
    }

    /// Record a finished report, including each service result.
    pub fn record_report(&self, report: &HealthReport) {
        for (name, health) in report.services.iter() {
            self.record_check(name, health);
        }
        self.inner.overall_status.set(report.status.severity());
        self.inner
            .cycles_total
            .get_or_create(&CycleLabels {
                status: report.status.into(),
            })
            .inc();
    }

    /// Record a cycle that failed internally.
    pub fn record_aggregation_failure(&self) {
        self.inner.aggregation_failures_total.inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{ReportMetadata, ServiceMap};
    use prometheus_client::encoding::text::encode;

    fn report() -> HealthReport {
        HealthReport {
            status: OverallStatus::Degraded,
            timestamp: chrono::Utc::now(),
            services: ServiceMap {
                frontend: ServiceHealth::up(3),
                backend: ServiceHealth::degraded(20),
                database: ServiceHealth::up(15),
            },
            metadata: ReportMetadata {
                version: "1.0.0".to_string(),
                environment: "test".to_string(),
                uptime_ms: 1,
            },
        }
    }

    fn encoded(collector: &MetricsCollector) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, collector.registry()).unwrap();
        buffer
    }

    #[test]
    fn test_metrics_collector_new() {
        let collector = MetricsCollector::new();
        let _ = collector.registry();
    }

    #[test]
    fn test_record_report() {
        let collector = MetricsCollector::new();
        collector.record_report(&report());

        let buffer = encoded(&collector);
        assert!(buffer.contains("healthagg_checks_total"));
        assert!(buffer.contains("service=\"backend\",status=\"Degraded\""));
        assert!(buffer.contains("healthagg_overall_status 1"));
        assert!(buffer.contains("healthagg_service_up{service=\"frontend\"} 1"));
        assert!(buffer.contains("healthagg_service_up{service=\"backend\"} 0"));
    }

    #[test]
    fn test_check_without_response_time() {
        let collector = MetricsCollector::new();
        let mut health = ServiceHealth::down(0, "Health check failed");
        health.response_time_ms = None;
        collector.record_check("database", &health);

        let buffer = encoded(&collector);
        assert!(buffer.contains("healthagg_service_up{service=\"database\"} 0"));
        assert!(!buffer.contains("healthagg_check_duration_seconds_count{service=\"database\"}"));
    }

    #[test]
    fn test_aggregation_failure() {
        let collector = MetricsCollector::new();
        collector.record_aggregation_failure();
        assert!(encoded(&collector).contains("healthagg_aggregation_failures_total 1"));
    }
}
