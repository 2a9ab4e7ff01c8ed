//! Integration tests for healthagg.
//!
//! These run the real HTTP prober against local servers.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use healthagg::config::{load_config, Config};
use healthagg::health::{
    HealthAggregator, HealthDriver, HealthReport, HttpProber, OverallStatus, ServiceStatus,
};
use healthagg::metrics::{MetricsCollector, StatusRoutes, StatusServer};
use healthagg::util::ShutdownSignal;

/// Canned response for one path: status line and body.
type Routes = HashMap<String, (&'static str, &'static str)>;

/// Helper to create an HTTP server answering by request path.
fn start_http_server(routes: Routes) -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    let request_count = Arc::new(AtomicU32::new(0));
    let count = Arc::clone(&request_count);

    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            count.fetch_add(1, Ordering::SeqCst);

            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

            let (status, body) = routes
                .get(&path)
                .copied()
                .unwrap_or(("404 Not Found", ""));
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (addr, request_count)
}

fn routes(entries: &[(&str, &'static str, &'static str)]) -> Routes {
    entries
        .iter()
        .map(|(path, status, body)| (path.to_string(), (*status, *body)))
        .collect()
}

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.services.frontend.url = Some(format!("http://{}", addr));
    config.services.backend.base_url = Some(format!("http://{}/", addr));
    config.services.frontend.timeout = Duration::from_secs(2);
    config.services.backend.timeout = Duration::from_secs(2);
    config.services.database.timeout = Duration::from_secs(2);
    config
}

fn aggregator(config: &Config) -> HealthAggregator {
    HealthAggregator::new(config, Arc::new(HttpProber::new()), MetricsCollector::new())
}

#[tokio::test]
async fn test_all_services_up() {
    let (addr, _) = start_http_server(routes(&[
        ("/assets/env.js", "200 OK", "window.env = {};"),
        ("/fineract-provider/api/v1/actuator/health", "200 OK", r#"{"status":"UP"}"#),
        ("/fineract-provider/api/v1/actuator/health/db", "200 OK", r#"{"status":"UP"}"#),
    ]));

    let report = aggregator(&config_for(addr)).check_all().await;

    assert_eq!(report.status, OverallStatus::Healthy);
    assert_eq!(report.services_up(), 3);
    assert!(report.errors().is_empty());
}

#[tokio::test]
async fn test_backend_fallback_over_http() {
    let (addr, _) = start_http_server(routes(&[
        ("/assets/env.js", "200 OK", "window.env = {};"),
        ("/fineract-provider/api/v1/offices", "200 OK", "[]"),
        ("/fineract-provider/api/v1/actuator/health/db", "200 OK", r#"{"status":"UP"}"#),
    ]));

    let report = aggregator(&config_for(addr)).check_all().await;

    // the health endpoint 404s, the listing endpoint answers
    assert_eq!(report.services.backend.status, ServiceStatus::Up);
    assert_eq!(report.status, OverallStatus::Healthy);
}

#[tokio::test]
async fn test_database_unavailable() {
    let (addr, _) = start_http_server(routes(&[
        ("/assets/env.js", "200 OK", "window.env = {};"),
        ("/fineract-provider/api/v1/actuator/health", "200 OK", r#"{"status":"UP"}"#),
        ("/fineract-provider/api/v1/actuator/health/db", "503 Service Unavailable", ""),
    ]));

    let report = aggregator(&config_for(addr)).check_all().await;

    let database = &report.services.database;
    assert_eq!(database.status, ServiceStatus::Down);
    assert_eq!(database.error.as_deref(), Some("HTTP 503 Service Unavailable"));

    let details = serde_json::to_value(database.details.as_ref().unwrap()).unwrap();
    assert_eq!(details["statusCode"], 503);
    assert_eq!(report.status, OverallStatus::Unhealthy);
}

#[tokio::test]
async fn test_missing_backend_url_never_reaches_network() {
    let (addr, count) = start_http_server(routes(&[(
        "/assets/env.js",
        "200 OK",
        "window.env = {};",
    )]));

    let mut config = config_for(addr);
    config.services.backend.base_url = None;

    let report = aggregator(&config).check_all().await;

    assert_eq!(report.services.frontend.status, ServiceStatus::Up);
    assert_eq!(
        report.services.backend.error.as_deref(),
        Some("Backend API URL not configured")
    );
    assert_eq!(
        report.services.database.error.as_deref(),
        Some("Cannot check database - backend API URL not configured")
    );
    // only the frontend asset was requested
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_config_file_drives_checks() {
    use tempfile::NamedTempFile;

    let (addr, _) = start_http_server(routes(&[
        ("/static/ping.txt", "200 OK", "pong"),
        ("/api/v2/health", "200 OK", r#"{"status":"PARTIAL"}"#),
        ("/api/v2/health/db", "200 OK", r#"{"status":"UP"}"#),
    ]));

    let config_content = format!(
        r#"
app:
  version: "9.9.9"
  environment: integration

services:
  frontend:
    url: "http://{addr}"
    asset_path: /static/ping.txt
    timeout: 2s
  backend:
    base_url: "http://{addr}"
    api_provider_path: /api
    api_version_path: /v2
    health_path: /health
    timeout: 2s
  database:
    health_path: /health/db
    timeout: 2s
"#
    );

    let mut temp_file = NamedTempFile::new().expect("failed to create temp file");
    temp_file
        .write_all(config_content.as_bytes())
        .expect("failed to write config");

    let config = load_config(temp_file.path()).expect("failed to load config");
    let report = aggregator(&config).check_all().await;

    assert_eq!(report.services.backend.status, ServiceStatus::Degraded);
    assert_eq!(report.status, OverallStatus::Degraded);
    assert_eq!(report.metadata.version, "9.9.9");
    assert_eq!(report.metadata.environment, "integration");
}

#[tokio::test]
async fn test_status_server_serves_report() {
    let (addr, _) = start_http_server(routes(&[
        ("/assets/env.js", "200 OK", "window.env = {};"),
        ("/fineract-provider/api/v1/actuator/health", "200 OK", r#"{"status":"UP"}"#),
        ("/fineract-provider/api/v1/actuator/health/db", "200 OK", r#"{"status":"UP"}"#),
    ]));
    let config = config_for(addr);

    let collector = MetricsCollector::new();
    let aggregator =
        HealthAggregator::new(&config, Arc::new(HttpProber::new()), collector.clone());
    let driver = HealthDriver::new(aggregator, config.driver.interval);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let status_addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let server = StatusServer::new(
        status_addr,
        StatusRoutes::from(&config.global.server),
        collector,
        driver,
    );
    let handle = tokio::spawn(server.serve(listener, shutdown.subscribe()));

    let response = tokio::task::spawn_blocking(move || {
        let mut client = TcpStream::connect(status_addr).expect("failed to connect");
        client
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .expect("failed to write");
        let mut response = String::new();
        client.read_to_string(&mut response).expect("failed to read");
        response
    })
    .await
    .unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    let body = response.split("\r\n\r\n").nth(1).expect("no body");
    let report: HealthReport = serde_json::from_str(body).expect("body is not a report");
    assert!(report.is_healthy());

    shutdown.shutdown();
    handle.await.unwrap();
}
