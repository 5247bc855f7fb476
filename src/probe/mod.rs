//! Probe primitives for endpoint checks.
//!
//! Supports TCP reachability, ICMP latency and HTTP throughput probes. Each
//! primitive is stateless and bounded by its own timeout; failures collapse to
//! `Unreachable` or "no sample" at this boundary.

mod http;
mod ping;
mod tcp;

pub use http::*;
pub use ping::*;
pub use tcp::*;

use serde::Serialize;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("command failed: {0}")]
    Command(String),
}

/// Outcome of a TCP reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The connection completed; carries the remote address when known.
    Reachable(Option<IpAddr>),
    Unreachable,
}

/// A throughput sample, tagged with the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ThroughputSample {
    /// Small object downloaded; rate in kilobits per second.
    Download { kbps: f64 },
    /// HEAD round trip in milliseconds.
    Head { ms: f64 },
    /// Time to first response of a plain GET, in milliseconds.
    FirstResponse { ms: f64 },
}

impl ThroughputSample {
    pub fn kbps(&self) -> Option<f64> {
        match self {
            ThroughputSample::Download { kbps } => Some(*kbps),
            _ => None,
        }
    }

    pub fn response_ms(&self) -> Option<f64> {
        match self {
            ThroughputSample::Head { ms } | ThroughputSample::FirstResponse { ms } => Some(*ms),
            ThroughputSample::Download { .. } => None,
        }
    }
}

/// The three probe primitives.
pub trait Prober: Send + Sync {
    fn reachability(
        &self,
        target: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Reachability> + Send;

    /// Average echo round trip in milliseconds, `None` when nothing came back.
    fn latency_sample(
        &self,
        target: &str,
        count: u32,
        timeout: Duration,
    ) -> impl Future<Output = Option<f64>> + Send;

    fn throughput_sample(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Option<ThroughputSample>> + Send;
}

/// Prober that talks to the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetProber;

impl Prober for NetProber {
    async fn reachability(&self, target: &str, port: u16, timeout: Duration) -> Reachability {
        match check_reachability(target, port, timeout).await {
            Ok(addr) => Reachability::Reachable(Some(addr.ip())),
            Err(e) => {
                tracing::debug!("Reachability failed for {}:{}: {}", target, port, e);
                Reachability::Unreachable
            }
        }
    }

    async fn latency_sample(&self, target: &str, count: u32, timeout: Duration) -> Option<f64> {
        sample_latency(target, count, timeout).await
    }

    async fn throughput_sample(&self, url: &str, timeout: Duration) -> Option<ThroughputSample> {
        sample_throughput(url, timeout).await
    }
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
