//! Status HTTP server.
//!
//! Serves the latest health report as JSON, a liveness endpoint for
//! orchestrators, and Prometheus metrics.

use crate::config::ServerConfig;
use crate::health::HealthDriver;
use crate::metrics::MetricsCollector;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus_client::encoding::text::encode;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Routes served by the status server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRoutes {
    pub metrics: String,
    pub report: String,
    pub liveness: String,
}

impl From<&ServerConfig> for StatusRoutes {
    fn from(config: &ServerConfig) -> Self {
        Self {
            metrics: config.metrics_path.clone(),
            report: config.report_path.clone(),
            liveness: config.liveness_path.clone(),
        }
    }
}

struct ServerState {
    routes: StatusRoutes,
    collector: MetricsCollector,
    driver: HealthDriver,
}

/// Status HTTP server.
pub struct StatusServer {
    /// Address to bind.
    address: SocketAddr,
    state: Arc<ServerState>,
}

impl StatusServer {
    pub fn new(
        address: SocketAddr,
        routes: StatusRoutes,
        collector: MetricsCollector,
        driver: HealthDriver,
    ) -> Self {
        Self {
            address,
            state: Arc::new(ServerState {
                routes,
                collector,
                driver,
            }),
        }
    }

    /// Bind and serve until shutdown.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) {
        let listener = match TcpListener::bind(self.address).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, address = %self.address, "failed to bind status server");
                return;
            }
        };
        self.serve(listener, shutdown).await;
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        info!(
            address = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            report = %self.state.routes.report,
            metrics = %self.state.routes.metrics,
            "status server started"
        );

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let state = Arc::clone(&self.state);

                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    async move { handle_request(req, &state).await }
                                });

                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!(error = %e, "status connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept status connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("status server shutting down");
                    break;
                }
            }
        }
    }
}

/// Handle one status request.
async fn handle_request<B>(
    req: Request<B>,
    state: &ServerState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    let method = req.method();
    let routes = &state.routes;

    debug!(path = %path, method = %method, "status request");

    if method != Method::GET {
        return Ok(respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "Method not allowed\n",
        ));
    }

    if path == routes.report {
        let report = state.driver.current_report().await;
        return Ok(match serde_json::to_vec(report.as_ref()) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(e) => {
                error!(error = %e, "failed to encode health report");
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    "Failed to encode health report\n",
                )
            }
        });
    }

    if path == routes.liveness {
        let report = state.driver.current_report().await;
        return Ok(if report.is_healthy() {
            respond(StatusCode::OK, "text/plain", "OK\n")
        } else {
            respond(
                StatusCode::SERVICE_UNAVAILABLE,
                "text/plain",
                format!("{}\n", report.status.as_str().to_uppercase()),
            )
        });
    }

    if path == routes.metrics {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, state.collector.registry()) {
            error!(error = %e, "failed to encode metrics");
            return Ok(respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "Failed to encode metrics\n",
            ));
        }
        return Ok(respond(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            buffer,
        ));
    }

    if path == "/" {
        let body = format!(
            "healthagg status server\n\nEndpoints:\n  {} - Health report (JSON)\n  {} - Liveness (200 when healthy, 503 otherwise)\n  {} - Prometheus metrics\n",
            routes.report, routes.liveness, routes.metrics
        );
        return Ok(respond(StatusCode::OK, "text/plain", body));
    }

    Ok(respond(StatusCode::NOT_FOUND, "text/plain", "Not found\n"))
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
