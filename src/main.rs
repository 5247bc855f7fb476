//! cloudreach - Microsoft cloud endpoint reachability checker
//!
//! Probes the endpoints of the selected service groups for TCP reachability,
//! ICMP latency and HTTP throughput, then reports per-group health.

mod catalog;
mod config;
mod probe;
mod runner;
mod stats;

use catalog::load_catalog;
use config::RunConfig;
use probe::NetProber;
use runner::{ProbeSettings, Runner};
use stats::{aggregate, RunReport, RunSummary};

use chrono::Utc;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_UNREACHABLE: u8 = 1;
const EXIT_CATALOG_UNAVAILABLE: u8 = 2;
const EXIT_BAD_CONFIG: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "cloudreach=info".parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let cfg = match RunConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };
    tracing::info!(
        "Starting cloudreach (timeout {:?}, skip ping: {}, skip speed: {})",
        cfg.timeout,
        cfg.skip_latency,
        cfg.skip_throughput
    );

    // Load and narrow the catalog
    let catalog = match load_catalog(&cfg.catalog)
        .await
        .and_then(|c| c.select(&cfg.selected_groups))
    {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Endpoint catalog unavailable: {}", e);
            return ExitCode::from(EXIT_CATALOG_UNAVAILABLE);
        }
    };

    tracing::info!(
        "Loaded {} endpoints in {} service groups",
        catalog.endpoint_count(),
        catalog.groups().len()
    );

    // Probe
    let started_at = Utc::now();
    let runner = Runner::new(NetProber, ProbeSettings::from(&cfg));
    let results = runner.run(&catalog).await;
    let summary = aggregate(&catalog, &results);
    let finished_at = Utc::now();

    log_summary(&summary);
    let healthy = summary.is_healthy();

    if let Some(path) = &cfg.report_path {
        let report = RunReport {
            started_at,
            finished_at,
            results,
            summary,
        };
        match report.write_json(path) {
            Ok(()) => tracing::info!("Report written to {}", path.display()),
            Err(e) => tracing::error!("Failed to write report to {}: {}", path.display(), e),
        }
    }

    if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_UNREACHABLE)
    }
}

fn log_summary(summary: &RunSummary) {
    for group in &summary.groups {
        let stats = &group.stats;
        tracing::info!(
            "{}: {}/{} reachable ({}%), latency avg {} ms",
            group.name,
            stats.reachable,
            stats.total,
            stats.success_rate,
            stats
                .latency_ms
                .avg
                .map(|v| v.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
        );
    }

    for group in summary.groups.iter().filter(|g| !g.unreachable_endpoints.is_empty()) {
        let endpoints: Vec<&str> = group.unreachable_endpoints.iter().map(|e| e.as_str()).collect();
        tracing::warn!("{} unreachable: {}", group.name, endpoints.join(", "));
        if let Some(impact) = group.impact {
            tracing::warn!("  impact: {}", impact.impact);
            tracing::warn!("  symptoms: {}", impact.symptoms);
        }
    }

    let overall = &summary.overall;
    tracing::info!(
        "Total: {}/{} reachable ({}%), {} failed groups",
        overall.reachable,
        overall.total,
        overall.success_rate,
        summary.failed_groups.len()
    );
}
