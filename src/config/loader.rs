//! Configuration loading.
//!
//! Configuration comes from an optional YAML file, then environment variables
//! override the handful of values deployments usually inject at runtime.

use crate::config::{validate_config, Config};
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding `services.backend.base_url`.
pub const ENV_BACKEND_URL: &str = "BACKEND_API_URL";
/// Environment variable overriding `services.backend.api_provider_path`.
pub const ENV_BACKEND_PROVIDER: &str = "BACKEND_API_PROVIDER";
/// Environment variable overriding `services.backend.api_version_path`.
pub const ENV_BACKEND_VERSION: &str = "BACKEND_API_VERSION";
/// Environment variable overriding `services.frontend.url`.
pub const ENV_FRONTEND_URL: &str = "FRONTEND_URL";
/// Environment variable overriding `app.version`.
pub const ENV_APP_VERSION: &str = "APP_VERSION";
/// Environment variable overriding `app.environment`.
pub const ENV_APP_ENVIRONMENT: &str = "APP_ENVIRONMENT";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a YAML file.
///
/// Reads the file, parses the YAML, applies environment overrides and
/// validates the result.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    finish(config)
}

/// Build configuration from defaults and the environment only.
pub fn load_from_env() -> Result<Config, ConfigError> {
    finish(Config::default())
}

fn finish(mut config: Config) -> Result<Config, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok(config)
}

/// Apply environment overrides using the given lookup.
///
/// Empty values are ignored so that an exported-but-blank variable does not
/// erase a value from the file.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_BACKEND_URL) {
        config.services.backend.base_url = Some(url);
    }
    if let Some(provider) = get(ENV_BACKEND_PROVIDER) {
        config.services.backend.api_provider_path = provider;
    }
    if let Some(version) = get(ENV_BACKEND_VERSION) {
        config.services.backend.api_version_path = version;
    }
    if let Some(url) = get(ENV_FRONTEND_URL) {
        config.services.frontend.url = Some(url);
    }
    if let Some(version) = get(ENV_APP_VERSION) {
        config.app.version = version;
    }
    if let Some(environment) = get(ENV_APP_ENVIRONMENT) {
        config.app.environment = environment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
app:
  version: "2.3.1"
  environment: staging

services:
  frontend:
    url: "http://127.0.0.1:4200"
  backend:
    base_url: "http://127.0.0.1:8443"
    timeout: 3s
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.app.version, "2.3.1");
        assert_eq!(config.services.backend.timeout, Duration::from_secs(3));
        assert_eq!(config.services.database.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.driver.interval, Duration::from_secs(30));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.yaml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::ReadError(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not: valid: yaml: {{{}}}").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"services:\n  backend:\n    base_url: ftp://nope\n")
            .unwrap();

        let result = load_config(file.path());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "http://backend:8080"),
            (ENV_BACKEND_VERSION, "/v2"),
            (ENV_APP_ENVIRONMENT, "qa"),
            (ENV_APP_VERSION, ""),
        ]);

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.services.backend.api_root().as_deref(),
            Some("http://backend:8080/fineract-provider/api/v2")
        );
        assert_eq!(config.app.environment, "qa");
        // blank values leave the default in place
        assert_eq!(config.app.version, "1.0.0");
        assert!(config.services.frontend.url.is_none());
    }
}
