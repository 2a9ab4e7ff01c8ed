//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;
use std::time::Duration;

/// Validate the configuration.
///
/// Checks for:
/// - A known log level
/// - Service URLs, when present, using `http://` or `https://`
/// - Paths starting with `/`
/// - Non-zero timeouts and polling interval
/// - Distinct status server paths
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();
    let services = &config.services;

    check_url(&mut errors, "services.frontend.url", services.frontend.url.as_deref());
    check_url(
        &mut errors,
        "services.backend.base_url",
        services.backend.base_url.as_deref(),
    );

    let paths = [
        ("services.frontend.asset_path", &services.frontend.asset_path),
        (
            "services.backend.api_provider_path",
            &services.backend.api_provider_path,
        ),
        (
            "services.backend.api_version_path",
            &services.backend.api_version_path,
        ),
        ("services.backend.health_path", &services.backend.health_path),
        ("services.backend.fallback_path", &services.backend.fallback_path),
        ("services.database.health_path", &services.database.health_path),
    ];
    for (field, path) in paths {
        check_path(&mut errors, field, path);
    }

    let durations = [
        ("services.frontend.timeout", services.frontend.timeout),
        ("services.backend.timeout", services.backend.timeout),
        ("services.database.timeout", services.database.timeout),
        ("driver.interval", config.driver.interval),
    ];
    for (field, duration) in durations {
        if duration == Duration::ZERO {
            errors.push(format!("{} must be greater than zero", field));
        }
    }

    // Status server routes
    let server = &config.global.server;
    let routes = [
        ("global.server.metrics_path", &server.metrics_path),
        ("global.server.report_path", &server.report_path),
        ("global.server.liveness_path", &server.liveness_path),
    ];
    let mut seen = HashSet::new();
    for (field, path) in routes {
        check_path(&mut errors, field, path);
        if !seen.insert(path.as_str()) {
            errors.push(format!("duplicate status server path: {}", path));
        }
    }

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// An absent URL is allowed; the matching checks report it as unconfigured.
fn check_url(errors: &mut Vec<String>, field: &str, url: Option<&str>) {
    let Some(url) = url else {
        return;
    };
    if url.trim().is_empty() {
        return;
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!(
            "{} '{}' must start with http:// or https://",
            field, url
        ));
    }
}

fn check_path(errors: &mut Vec<String>, field: &str, path: &str) {
    if !path.starts_with('/') {
        errors.push(format!("{} '{}' must start with '/'", field, path));
    }
}
