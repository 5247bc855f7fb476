//! Probe orchestrator: runs the primitives over a catalog.
//!
//! Endpoints are probed on a bounded worker pool. Each worker sends its
//! result over a channel tagged with the endpoint's catalog position, and
//! the collector reassembles them in catalog order.

mod models;

pub use models::*;

use crate::catalog::{Catalog, Endpoint};
use crate::config::RunConfig;
use crate::probe::{Prober, Reachability};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// The part of the run configuration the orchestrator needs.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub skip_latency: bool,
    pub skip_throughput: bool,
    pub timeout: Duration,
    pub port: u16,
    pub ping_count: u32,
    pub concurrency: usize,
}

impl From<&RunConfig> for ProbeSettings {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            skip_latency: cfg.skip_latency,
            skip_throughput: cfg.skip_throughput,
            timeout: cfg.timeout,
            port: cfg.port,
            ping_count: cfg.ping_count,
            concurrency: cfg.concurrency,
        }
    }
}

/// Runs every endpoint of a catalog exactly once.
pub struct Runner<P> {
    prober: Arc<P>,
    settings: ProbeSettings,
}

impl<P: Prober + 'static> Runner<P> {
    pub fn new(prober: P, settings: ProbeSettings) -> Self {
        Self {
            prober: Arc::new(prober),
            settings,
        }
    }

    /// Probe the whole catalog. Results come back in catalog order.
    pub async fn run(&self, catalog: &Catalog) -> Vec<ProbeResult> {
        let jobs: Vec<(String, Endpoint)> = catalog
            .iter()
            .map(|(group, endpoint)| (group.name.clone(), endpoint.clone()))
            .collect();
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        tracing::info!(
            "Probing {} endpoints in {} groups (concurrency {})",
            total,
            catalog.groups().len(),
            pool_size(self.settings.concurrency, total)
        );

        let (tx, mut rx) = mpsc::channel(total);
        let dispatcher = tokio::spawn(dispatch(
            jobs.clone(),
            self.prober.clone(),
            self.settings.clone(),
            tx,
        ));

        let mut slots: Vec<Option<ProbeResult>> = vec![None; total];
        let mut done = 0;
        while let Some((index, result)) = rx.recv().await {
            done += 1;
            log_progress(done, total, &result);
            slots[index] = Some(result);
        }

        if let Err(e) = dispatcher.await {
            tracing::error!("Probe dispatcher failed: {}", e);
        }

        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, (group, endpoint))| {
                slot.unwrap_or_else(|| {
                    tracing::warn!("No result for {}, recording it as unreachable", endpoint);
                    ProbeResult::unreachable(&group, &endpoint)
                })
            })
            .collect()
    }
}

/// Start one task per endpoint, at most `concurrency` at a time.
async fn dispatch<P: Prober + 'static>(
    jobs: Vec<(String, Endpoint)>,
    prober: Arc<P>,
    settings: ProbeSettings,
    tx: mpsc::Sender<(usize, ProbeResult)>,
) {
    let semaphore = Arc::new(Semaphore::new(pool_size(settings.concurrency, jobs.len())));

    for (index, (group, endpoint)) in jobs.into_iter().enumerate() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                tracing::error!("Worker pool closed, stopping dispatch");
                return;
            }
        };

        let prober = prober.clone();
        let settings = settings.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = permit; // Hold permit until done
            let result = probe_endpoint(prober.as_ref(), &group, &endpoint, &settings).await;
            if tx.send((index, result)).await.is_err() {
                tracing::error!("Failed to send result for {}", endpoint);
            }
        });
    }
}

/// Workers actually started: at least one, never more than there are jobs.
fn pool_size(concurrency: usize, jobs: usize) -> usize {
    concurrency.min(jobs).max(1)
}

/// Probe one endpoint.
///
/// Latency and throughput are only attempted after reachability succeeds.
pub async fn probe_endpoint<P: Prober>(
    prober: &P,
    group: &str,
    endpoint: &Endpoint,
    settings: &ProbeSettings,
) -> ProbeResult {
    let target = endpoint.probe_target();

    let reachability = prober.reachability(&target, settings.port, settings.timeout);
    let address = match reachability.await {
        Reachability::Reachable(address) => address,
        Reachability::Unreachable => return ProbeResult::unreachable(group, endpoint),
    };

    let latency_ms = if settings.skip_latency {
        None
    } else {
        let ping_target = address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| target.clone());
        prober
            .latency_sample(&ping_target, settings.ping_count, settings.timeout)
            .await
    };

    let throughput = if settings.skip_throughput {
        None
    } else {
        prober.throughput_sample(&endpoint.url(), settings.timeout).await
    };

    ProbeResult {
        group: group.to_string(),
        endpoint: endpoint.clone(),
        kind: endpoint.kind(),
        target,
        outcome: ProbeOutcome::Reachable {
            address,
            latency_ms,
            throughput,
        },
    }
}

fn log_progress(done: usize, total: usize, result: &ProbeResult) {
    if result.is_reachable() {
        tracing::info!(
            "[{}/{}] {} ({}) reachable{}{}{}",
            done,
            total,
            result.endpoint,
            result.group,
            result
                .address()
                .map(|ip| format!(" at {}", ip))
                .unwrap_or_default(),
            result
                .latency_ms()
                .map(|ms| format!(", latency {} ms", ms))
                .unwrap_or_default(),
            result
                .throughput()
                .map(|t| format!(", {:?}", t))
                .unwrap_or_default(),
        );
    } else {
        tracing::warn!(
            "[{}/{}] {} ({}) unreachable",
            done,
            total,
            result.endpoint,
            result.group
        );
    }
}
