//! Metrics collection and the status server.

mod collector;
mod server;

pub use collector::MetricsCollector;
pub use server::{StatusRoutes, StatusServer};
