//! healthagg - composite health aggregation for a frontend, a backend API
//! and its database
//!
//! This crate provides:
//! - Concurrent, individually time-bounded service checks
//! - A backend fallback probe and per-service classification rules
//! - One composite report per cycle that never fails to build
//! - A polling driver with cached reports and subscriptions
//! - A status server with JSON report, liveness and Prometheus metrics

pub mod config;
pub mod health;
pub mod metrics;
pub mod util;

pub use config::Config;
pub use health::{HealthAggregator, HealthDriver, HealthReport};
