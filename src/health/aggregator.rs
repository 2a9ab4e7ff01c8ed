//! Composite health aggregation.
//!
//! The aggregator runs the frontend, backend and database checks
//! concurrently and merges their results into one [`HealthReport`]. Its only
//! public operation cannot fail: any defect inside a cycle is caught and
//! turned into a synthetic unhealthy report.

use crate::config::{AppConfig, Config};
use crate::health::{
    derive_status, HealthReport, OverallStatus, Prober, ReportMetadata, ServiceCheck,
    ServiceHealth, ServiceKind, ServiceMap, ServiceStatus,
};
use crate::metrics::MetricsCollector;
use crate::util::CycleId;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Error text used for every service in the synthetic failure report.
pub const AGGREGATION_FAILED: &str = "Health check failed";

/// Runs report cycles against the three monitored services.
pub struct HealthAggregator {
    prober: Arc<dyn Prober>,
    frontend: ServiceCheck,
    backend: ServiceCheck,
    database: ServiceCheck,
    app: AppConfig,
    /// Recorded once at construction; uptime is measured from here.
    started_at: Instant,
    metrics: MetricsCollector,
}

impl HealthAggregator {
    /// Create an aggregator for the services in `config`.
    pub fn new(config: &Config, prober: Arc<dyn Prober>, metrics: MetricsCollector) -> Self {
        let services = &config.services;
        Self::with_checks(
            ServiceCheck::from_config(ServiceKind::Frontend, services),
            ServiceCheck::from_config(ServiceKind::Backend, services),
            ServiceCheck::from_config(ServiceKind::Database, services),
            config.app.clone(),
            prober,
            metrics,
        )
    }

    /// Create an aggregator from explicit checks.
    pub fn with_checks(
        frontend: ServiceCheck,
        backend: ServiceCheck,
        database: ServiceCheck,
        app: AppConfig,
        prober: Arc<dyn Prober>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            prober,
            frontend,
            backend,
            database,
            app,
            started_at: Instant::now(),
            metrics,
        }
    }

    /// Time since this aggregator was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run one report cycle.
    ///
    /// Never fails: dependency failures are classified per service, and a
    /// defect in the cycle itself yields [`HealthAggregator::failure_report`].
    #[instrument(name = "health_cycle", skip_all, fields(cycle = %CycleId::short()))]
    pub async fn check_all(&self) -> HealthReport {
        let start = Instant::now();

        let report = match AssertUnwindSafe(self.collect()).catch_unwind().await {
            Ok(services) => self.build_report(services),
            Err(panic) => {
                error!(error = %panic_message(panic.as_ref()), "health check cycle failed");
                self.metrics.record_aggregation_failure();
                self.failure_report()
            }
        };

        self.metrics.record_report(&report);
        info!(
            status = %report.status,
            services_up = report.services_up(),
            duration_ms = start.elapsed().as_millis() as u64,
            "health check cycle complete"
        );

        report
    }

    /// Run all three checks concurrently and wait for every one of them.
    async fn collect(&self) -> ServiceMap {
        let prober = self.prober.as_ref();
        let (frontend, backend, database) = tokio::join!(
            self.frontend.run(prober),
            self.backend.run(prober),
            self.database.run(prober),
        );
        ServiceMap {
            frontend,
            backend,
            database,
        }
    }

    fn build_report(&self, services: ServiceMap) -> HealthReport {
        HealthReport {
            status: derive_status(services.statuses()),
            timestamp: Utc::now(),
            services,
            metadata: self.metadata(),
        }
    }

    /// Report substituted when a cycle fails internally: every service down,
    /// overall unhealthy.
    pub fn failure_report(&self) -> HealthReport {
        let failed = || ServiceHealth {
            status: ServiceStatus::Down,
            response_time_ms: None,
            error: Some(AGGREGATION_FAILED.to_string()),
            details: None,
        };
        HealthReport {
            status: OverallStatus::Unhealthy,
            timestamp: Utc::now(),
            services: ServiceMap {
                frontend: failed(),
                backend: failed(),
                database: failed(),
            },
            metadata: self.metadata(),
        }
    }

    fn metadata(&self) -> ReportMetadata {
        ReportMetadata {
            version: self.app.version.clone(),
            environment: self.app.environment.clone(),
            uptime_ms: self.uptime().as_millis() as u64,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
