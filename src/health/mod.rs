//! Health checking and aggregation.
//!
//! Leaves first: [`Prober`] performs one network call, [`ServiceCheck`]
//! classifies one service, [`HealthAggregator`] merges the three services
//! into a [`HealthReport`], and [`HealthDriver`] schedules and caches cycles.

mod aggregator;
mod check;
mod driver;
mod prober;
mod report;

pub use aggregator::{HealthAggregator, AGGREGATION_FAILED};
pub use check::{ServiceCheck, ServiceKind};
pub use driver::HealthDriver;
pub use prober::{ContentKind, HttpProber, ProbeError, ProbeResponse, Prober, ServiceDescriptor};
pub use report::{
    derive_status, HealthReport, OverallStatus, Payload, ReportMetadata, ServiceHealth,
    ServiceMap, ServiceStatus,
};
