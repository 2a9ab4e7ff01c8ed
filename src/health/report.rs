//! Health report data model.
//!
//! Everything here is immutable once built. The JSON shape produced by
//! serde is the wire format consumers see:
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "timestamp": "2024-05-01T12:00:00.000Z",
//!   "services": {
//!     "frontend": { "status": "up", "responseTime": 12 },
//!     "backend":  { "status": "up", "responseTime": 40, "details": { "status": "UP" } },
//!     "database": { "status": "up", "responseTime": 38 }
//!   },
//!   "metadata": { "version": "1.0.0", "environment": "production", "uptime": 60000 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Status of a single monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
    Degraded,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Up => "up",
            ServiceStatus::Down => "down",
            ServiceStatus::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite status of a whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }

    /// Numeric severity, 0 for healthy up to 2 for unhealthy.
    pub fn severity(&self) -> i64 {
        match self {
            OverallStatus::Healthy => 0,
            OverallStatus::Degraded => 1,
            OverallStatus::Unhealthy => 2,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload attached to a probe response or a service result.
///
/// JSON bodies are kept verbatim, so fields this crate does not know about
/// still reach consumers through `details`. A bare JSON string reads back as
/// [`Payload::Text`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Look up a top-level string field of a JSON object payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self {
            Payload::Json(value) => value.get(key).and_then(|v| v.as_str()),
            Payload::Text(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => Payload::Text(text),
            value => Payload::Json(value),
        })
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Result of checking one service in one report cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: ServiceStatus,

    #[serde(
        rename = "responseTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Payload>,
}

impl ServiceHealth {
    pub fn up(response_time_ms: u64) -> Self {
        Self::new(ServiceStatus::Up, response_time_ms)
    }

    pub fn degraded(response_time_ms: u64) -> Self {
        Self::new(ServiceStatus::Degraded, response_time_ms)
    }

    pub fn down(response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(ServiceStatus::Down, response_time_ms)
        }
    }

    fn new(status: ServiceStatus, response_time_ms: u64) -> Self {
        Self {
            status,
            response_time_ms: Some(response_time_ms),
            error: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<Payload>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == ServiceStatus::Up
    }
}

/// One result per monitored service. The three fields make the mapping
/// total: a report can never be missing a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMap {
    pub frontend: ServiceHealth,
    pub backend: ServiceHealth,
    pub database: ServiceHealth,
}

impl ServiceMap {
    /// Iterate `(name, result)` pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ServiceHealth)> {
        [
            ("frontend", &self.frontend),
            ("backend", &self.backend),
            ("database", &self.database),
        ]
        .into_iter()
    }

    pub fn statuses(&self) -> [ServiceStatus; 3] {
        [
            self.frontend.status,
            self.backend.status,
            self.database.status,
        ]
    }
}

/// Report metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub environment: String,
    /// Milliseconds since the aggregator was created.
    #[serde(rename = "uptime")]
    pub uptime_ms: u64,
}

/// Composite health report produced by one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    #[serde(with = "iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    pub services: ServiceMap,
    pub metadata: ReportMetadata,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == OverallStatus::Healthy
    }

    /// `name: error` lines for every service carrying an error.
    pub fn errors(&self) -> Vec<String> {
        self.services
            .iter()
            .filter_map(|(name, health)| {
                health.error.as_ref().map(|e| format!("{}: {}", name, e))
            })
            .collect()
    }

    /// Number of services reporting `up`.
    pub fn services_up(&self) -> usize {
        self.services.iter().filter(|(_, h)| h.is_up()).count()
    }
}

/// Derive the overall status from individual service statuses.
///
/// All `up` is healthy. Otherwise any `down` makes the result unhealthy,
/// no matter how many services are degraded. What remains is degraded.
pub fn derive_status<I>(statuses: I) -> OverallStatus
where
    I: IntoIterator<Item = ServiceStatus>,
{
    let mut all_up = true;
    let mut any_down = false;
    for status in statuses {
        all_up &= status == ServiceStatus::Up;
        any_down |= status == ServiceStatus::Down;
    }

    if all_up {
        OverallStatus::Healthy
    } else if any_down {
        OverallStatus::Unhealthy
    } else {
        OverallStatus::Degraded
    }
}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
