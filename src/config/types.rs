//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Application identity reported in every health report
    #[serde(default)]
    pub app: AppConfig,

    /// Monitored dependencies
    #[serde(default)]
    pub services: ServicesConfig,

    /// Polling driver settings
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Status server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
            server: ServerConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Status server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Whether the status server is started
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind the status server
    #[serde(default = "default_server_address")]
    pub address: SocketAddr,

    /// Path serving Prometheus metrics
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Path serving the full JSON health report
    #[serde(default = "default_report_path")]
    pub report_path: String,

    /// Path answering 200 when healthy and 503 otherwise
    #[serde(default = "default_liveness_path")]
    pub liveness_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_server_address(),
            metrics_path: default_metrics_path(),
            report_path: default_report_path(),
            liveness_path: default_liveness_path(),
        }
    }
}

/// Application identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Version string reported in report metadata
    #[serde(default = "default_app_version")]
    pub version: String,

    /// Environment name reported in report metadata
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_app_version(),
            environment: default_environment(),
        }
    }
}

/// The three monitored dependencies.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub frontend: FrontendServiceConfig,

    #[serde(default)]
    pub backend: BackendServiceConfig,

    #[serde(default)]
    pub database: DatabaseServiceConfig,
}

/// Frontend asset layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrontendServiceConfig {
    /// Origin serving the frontend assets
    #[serde(default)]
    pub url: Option<String>,

    /// Static asset fetched to prove the frontend is serving
    #[serde(default = "default_asset_path")]
    pub asset_path: String,

    /// Probe timeout
    #[serde(default = "default_frontend_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FrontendServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            asset_path: default_asset_path(),
            timeout: default_frontend_timeout(),
        }
    }
}

/// Backend API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendServiceConfig {
    /// Base URL of the backend; when absent both backend and database checks
    /// report the configuration as missing
    #[serde(default)]
    pub base_url: Option<String>,

    /// Provider path appended to the base URL
    #[serde(default = "default_api_provider_path")]
    pub api_provider_path: String,

    /// Version path appended after the provider path
    #[serde(default = "default_api_version_path")]
    pub api_version_path: String,

    /// Primary health endpoint, relative to the API root
    #[serde(default = "default_backend_health_path")]
    pub health_path: String,

    /// Basic listing endpoint tried when the health endpoint fails
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Timeout for both the primary and the fallback probe
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_provider_path: default_api_provider_path(),
            api_version_path: default_api_version_path(),
            health_path: default_backend_health_path(),
            fallback_path: default_fallback_path(),
            timeout: default_api_timeout(),
        }
    }
}

impl BackendServiceConfig {
    /// Resolve the API root: base URL without a trailing slash, followed by
    /// the provider and version paths.
    ///
    /// Returns `None` when no base URL is configured.
    pub fn api_root(&self) -> Option<String> {
        let base = self.base_url.as_deref()?.trim();
        if base.is_empty() {
            return None;
        }
        Some(format!(
            "{}{}{}",
            base.trim_end_matches('/'),
            self.api_provider_path,
            self.api_version_path
        ))
    }
}

/// Database, probed through the backend API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseServiceConfig {
    /// Database health endpoint, relative to the backend API root
    #[serde(default = "default_database_health_path")]
    pub health_path: String,

    /// Probe timeout
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DatabaseServiceConfig {
    fn default() -> Self {
        Self {
            health_path: default_database_health_path(),
            timeout: default_api_timeout(),
        }
    }
}

/// Polling driver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Period between scheduled report cycles
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_true() -> bool {
    true
}

fn default_server_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_report_path() -> String {
    "/health".to_string()
}

fn default_liveness_path() -> String {
    "/healthz".to_string()
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_asset_path() -> String {
    "/assets/env.js".to_string()
}

fn default_api_provider_path() -> String {
    "/fineract-provider/api".to_string()
}

fn default_api_version_path() -> String {
    "/v1".to_string()
}

fn default_backend_health_path() -> String {
    "/actuator/health".to_string()
}

fn default_database_health_path() -> String {
    "/actuator/health/db".to_string()
}

fn default_fallback_path() -> String {
    "/offices".to_string()
}

fn default_frontend_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.app.version, "1.0.0");
        assert_eq!(config.app.environment, "production");
        assert_eq!(config.services.frontend.timeout, Duration::from_secs(5));
        assert_eq!(config.services.backend.timeout, Duration::from_secs(10));
        assert_eq!(config.services.database.timeout, Duration::from_secs(10));
        assert_eq!(config.driver.interval, Duration::from_secs(30));
    }

    #[test]
    fn test_api_root() {
        let mut backend = BackendServiceConfig::default();
        assert_eq!(backend.api_root(), None);

        backend.base_url = Some("https://api.example.com/".to_string());
        assert_eq!(
            backend.api_root().as_deref(),
            Some("https://api.example.com/fineract-provider/api/v1")
        );

        backend.base_url = Some("   ".to_string());
        assert_eq!(backend.api_root(), None);
    }

    #[test]
    fn test_duration_serde() {
        let yaml = "url: http://localhost:4200\ntimeout: 1m30s\n";
        let frontend: FrontendServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(frontend.timeout, Duration::from_secs(90));
        assert_eq!(frontend.asset_path, "/assets/env.js");
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_yaml::from_str("pretty").unwrap();
        assert_eq!(format, LogFormat::Pretty);
    }
}
