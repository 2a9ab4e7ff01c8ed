//! healthagg - composite health aggregator
//!
//! Usage:
//!     healthagg [--config <path>] [--once]
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use healthagg::config::{load_config, load_from_env, Config};
use healthagg::health::{
    HealthAggregator, HealthDriver, HealthReport, HttpProber, OverallStatus, ServiceCheck,
    ServiceKind,
};
use healthagg::metrics::{MetricsCollector, StatusRoutes, StatusServer};
use healthagg::util::{init_logging, ShutdownSignal};

/// Aggregates frontend, backend and database health into one report.
#[derive(Parser, Debug)]
#[command(name = "healthagg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults plus environment when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Run a single report cycle, print it as JSON and exit non-zero unless healthy
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| {
            format!("failed to load configuration from '{}'", path.display())
        })?,
        None => load_from_env().context("failed to build configuration from environment")?,
    };

    // CLI overrides config
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);
    init_logging(log_level, &config.global.log_format);

    if cli.validate {
        info!("Configuration is valid");
        print_summary(&config);
        return Ok(());
    }

    for kind in ServiceKind::ALL {
        let check = ServiceCheck::from_config(kind, &config.services);
        match check.target() {
            Some(target) => info!(
                service = %kind,
                url = %target,
                timeout_ms = target.timeout.as_millis() as u64,
                "configured service"
            ),
            None => warn!(service = %kind, "service not configured, it will report down"),
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let healthy = if cli.once {
        runtime.block_on(run_once(config))?
    } else {
        runtime.block_on(run_async(config))?;
        true
    };

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(config: &Config) {
    println!("Configuration is valid.");
    println!(
        "  App: {} ({})",
        config.app.version, config.app.environment
    );
    println!("  Interval: {}", humantime::format_duration(config.driver.interval));
    for kind in ServiceKind::ALL {
        let check = ServiceCheck::from_config(kind, &config.services);
        match check.target() {
            Some(target) => println!(
                "    - {} -> {} [timeout {}]",
                kind,
                target,
                humantime::format_duration(target.timeout)
            ),
            None => println!("    - {} -> not configured", kind),
        }
    }
    let server = &config.global.server;
    if server.enabled {
        println!(
            "  Status server: {} (report {}, liveness {}, metrics {})",
            server.address, server.report_path, server.liveness_path, server.metrics_path
        );
    }
}

/// Run one cycle and print the report.
async fn run_once(config: Config) -> Result<bool> {
    let aggregator = HealthAggregator::new(
        &config,
        Arc::new(HttpProber::new()),
        MetricsCollector::new(),
    );

    let report = aggregator.check_all().await;
    let json = serde_json::to_string_pretty(&report).context("failed to encode health report")?;
    println!("{}", json);

    Ok(report.is_healthy())
}

/// Run the driver loop and status server until Ctrl+C.
async fn run_async(config: Config) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let collector = MetricsCollector::new();

    let aggregator = HealthAggregator::new(&config, Arc::new(HttpProber::new()), collector.clone());
    let driver = HealthDriver::new(aggregator, config.driver.interval);

    let mut handles = Vec::new();

    handles.push(tokio::spawn(log_transitions(
        driver.subscribe(),
        shutdown.subscribe(),
    )));

    let server_config = &config.global.server;
    if server_config.enabled {
        let server = StatusServer::new(
            server_config.address,
            StatusRoutes::from(server_config),
            collector,
            driver.clone(),
        );
        handles.push(tokio::spawn(server.run(shutdown.subscribe())));
    }

    handles.push(tokio::spawn(driver.run(shutdown.subscribe())));

    info!("healthagg is running");
    info!("press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    shutdown.shutdown();

    for handle in handles {
        let _ = handle.await;
    }

    info!("healthagg shut down complete");
    Ok(())
}

/// Log every change of the overall status.
async fn log_transitions(
    mut updates: broadcast::Receiver<Arc<HealthReport>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut last: Option<OverallStatus> = None;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(report) if last == Some(report.status) => {}
                Ok(report) => {
                    if report.is_healthy() {
                        info!(
                            status = %report.status,
                            previous = ?last,
                            "health status changed"
                        );
                    } else {
                        warn!(
                            status = %report.status,
                            previous = ?last,
                            errors = ?report.errors(),
                            "health status changed"
                        );
                    }
                    last = Some(report.status);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "report subscriber lagged behind");
                }
                Err(RecvError::Closed) => break,
            },

            _ = shutdown.recv() => break,
        }
    }
}
