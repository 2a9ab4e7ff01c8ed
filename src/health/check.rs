//! Per-service checks.
//!
//! Each [`ServiceCheck`] turns one or two probes into exactly one
//! [`ServiceHealth`]. Failures never escape: missing configuration, transport
//! errors, timeouts and unexpected payloads all become a result.

use crate::config::ServicesConfig;
use crate::health::{
    ContentKind, Payload, ProbeError, ProbeResponse, Prober, ServiceDescriptor, ServiceHealth,
};
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Which dependency a check covers. The kind selects the classification and
/// fallback rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Frontend,
    Backend,
    Database,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::Frontend,
        ServiceKind::Backend,
        ServiceKind::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Frontend => "frontend",
            ServiceKind::Backend => "backend",
            ServiceKind::Database => "database",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe plan for one service.
#[derive(Debug, Clone)]
pub struct ServiceCheck {
    kind: ServiceKind,
    /// `None` when the service address could not be resolved.
    primary: Option<ServiceDescriptor>,
    /// Only ever set for the backend.
    fallback: Option<ServiceDescriptor>,
}

impl ServiceCheck {
    pub fn frontend(target: Option<ServiceDescriptor>) -> Self {
        Self {
            kind: ServiceKind::Frontend,
            primary: target,
            fallback: None,
        }
    }

    pub fn backend(target: Option<ServiceDescriptor>, fallback: Option<ServiceDescriptor>) -> Self {
        Self {
            kind: ServiceKind::Backend,
            primary: target,
            fallback,
        }
    }

    pub fn database(target: Option<ServiceDescriptor>) -> Self {
        Self {
            kind: ServiceKind::Database,
            primary: target,
            fallback: None,
        }
    }

    /// Build the check for `kind` from service configuration.
    pub fn from_config(kind: ServiceKind, services: &ServicesConfig) -> Self {
        let api_root = services.backend.api_root();
        match kind {
            ServiceKind::Frontend => {
                let frontend = &services.frontend;
                let target = frontend
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(|url| {
                        ServiceDescriptor::new(
                            url,
                            frontend.asset_path.as_str(),
                            frontend.timeout,
                            ContentKind::Text,
                        )
                    });
                Self::frontend(target)
            }
            ServiceKind::Backend => {
                let backend = &services.backend;
                let api = |path: &str| {
                    api_root.as_deref().map(|root| {
                        ServiceDescriptor::new(root, path, backend.timeout, ContentKind::Json)
                    })
                };
                Self::backend(api(&backend.health_path), api(&backend.fallback_path))
            }
            ServiceKind::Database => {
                let database = &services.database;
                Self::database(api_root.as_deref().map(|root| {
                    ServiceDescriptor::new(
                        root,
                        database.health_path.as_str(),
                        database.timeout,
                        ContentKind::Json,
                    )
                }))
            }
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn target(&self) -> Option<&ServiceDescriptor> {
        self.primary.as_ref()
    }

    /// Run the check. Always yields a result.
    pub async fn run(&self, prober: &dyn Prober) -> ServiceHealth {
        let Some(primary) = &self.primary else {
            warn!(service = %self.kind, "service address not configured");
            return ServiceHealth::down(0, self.missing_config_message());
        };

        let start = Instant::now();
        let outcome = probe_with_timeout(prober, primary).await;
        debug!(
            service = %self.kind,
            url = %primary,
            ok = outcome.is_ok(),
            "primary probe finished"
        );

        match (self.kind, outcome) {
            (ServiceKind::Frontend, Ok(_)) => ServiceHealth::up(elapsed_ms(start)).with_details(
                json!({ "message": "Frontend assets loaded successfully" }),
            ),
            (ServiceKind::Frontend, Err(e)) => {
                warn!(service = %self.kind, error = %e, "frontend probe failed");
                ServiceHealth::down(elapsed_ms(start), e.to_string())
                    .with_details(failure_details(&e, None))
            }

            (ServiceKind::Backend, Ok(response)) => {
                if reports_up(&response) {
                    ServiceHealth::up(elapsed_ms(start)).with_details(response.body)
                } else {
                    debug!(service = %self.kind, "backend reachable but not reporting UP");
                    ServiceHealth::degraded(elapsed_ms(start)).with_details(response.body)
                }
            }
            (ServiceKind::Backend, Err(e)) => {
                warn!(service = %self.kind, error = %e, "health endpoint failed, trying fallback");
                self.run_fallback(prober, start).await
            }

            (ServiceKind::Database, Ok(response)) => {
                if reports_up(&response) {
                    ServiceHealth::up(elapsed_ms(start)).with_details(response.body)
                } else {
                    // An ambiguous database answer counts as a failure, never as degraded
                    let message = match response.body.str_field("status") {
                        Some(status) => format!("Database reported status {}", status),
                        None => "Database reported no status".to_string(),
                    };
                    warn!(service = %self.kind, error = %message, "database not reporting UP");
                    ServiceHealth::down(elapsed_ms(start), message).with_details(response.body)
                }
            }
            (ServiceKind::Database, Err(e)) => {
                warn!(service = %self.kind, error = %e, "database probe failed");
                ServiceHealth::down(elapsed_ms(start), e.to_string()).with_details(
                    failure_details(
                        &e,
                        Some("Database health check unavailable - may not be exposed"),
                    ),
                )
            }
        }
    }

    /// Single fallback attempt. The elapsed time covers the primary probe too.
    async fn run_fallback(&self, prober: &dyn Prober, start: Instant) -> ServiceHealth {
        let Some(fallback) = &self.fallback else {
            return ServiceHealth::down(elapsed_ms(start), "Backend API fallback not configured");
        };

        match probe_with_timeout(prober, fallback).await {
            Ok(_) => ServiceHealth::up(elapsed_ms(start))
                .with_details(json!({ "message": "Basic backend API connection successful" })),
            Err(e) => {
                warn!(service = %self.kind, url = %fallback, error = %e, "fallback probe failed");
                ServiceHealth::down(
                    elapsed_ms(start),
                    format!("Backend API connection failed: {}", e),
                )
                .with_details(failure_details(&e, None))
            }
        }
    }

    fn missing_config_message(&self) -> &'static str {
        match self.kind {
            ServiceKind::Frontend => "Frontend URL not configured",
            ServiceKind::Backend => "Backend API URL not configured",
            ServiceKind::Database => "Cannot check database - backend API URL not configured",
        }
    }
}

/// Race the probe against the descriptor's timeout. Losing the race drops the
/// probe future.
async fn probe_with_timeout(
    prober: &dyn Prober,
    target: &ServiceDescriptor,
) -> Result<ProbeResponse, ProbeError> {
    match timeout(target.timeout, prober.probe(target)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout),
    }
}

/// Case-sensitive `status == "UP"`.
fn reports_up(response: &ProbeResponse) -> bool {
    response.body.str_field("status") == Some("UP")
}

fn failure_details(err: &ProbeError, message: Option<&str>) -> Payload {
    let message = message.map(str::to_string).unwrap_or_else(|| match err {
        ProbeError::Status { reason, .. } => reason.clone(),
        other => other.to_string(),
    });
    let mut details = json!({ "message": message });
    if let Some(code) = err.status_code() {
        details["statusCode"] = json!(code);
    }
    Payload::Json(details)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
