//! Probe result types.

use crate::catalog::{Endpoint, EndpointKind};
use crate::probe::ThroughputSample;
use serde::Serialize;
use std::net::IpAddr;

/// What happened to one endpoint in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Reachable {
        address: Option<IpAddr>,
        /// Mean ICMP round trip in milliseconds
        latency_ms: Option<f64>,
        throughput: Option<ThroughputSample>,
    },
    Unreachable,
}

/// One result per endpoint per run. Never mutated after the orchestrator builds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub group: String,
    pub endpoint: Endpoint,
    pub kind: EndpointKind,
    /// Host or IP actually probed
    pub target: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn unreachable(group: &str, endpoint: &Endpoint) -> Self {
        Self {
            group: group.to_string(),
            endpoint: endpoint.clone(),
            kind: endpoint.kind(),
            target: endpoint.probe_target(),
            outcome: ProbeOutcome::Unreachable,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Reachable { .. })
    }

    pub fn address(&self) -> Option<IpAddr> {
        match self.outcome {
            ProbeOutcome::Reachable { address, .. } => address,
            ProbeOutcome::Unreachable => None,
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self.outcome {
            ProbeOutcome::Reachable { latency_ms, .. } => latency_ms,
            ProbeOutcome::Unreachable => None,
        }
    }

    pub fn throughput(&self) -> Option<ThroughputSample> {
        match self.outcome {
            ProbeOutcome::Reachable { throughput, .. } => throughput,
            ProbeOutcome::Unreachable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_result_has_no_samples() {
        let endpoint = Endpoint::new("https://*.manage.microsoft.com");
        let result = ProbeResult::unreachable("Intune", &endpoint);
        assert!(!result.is_reachable());
        assert_eq!(result.target, "www.manage.microsoft.com");
        assert_eq!(result.address(), None);
        assert_eq!(result.latency_ms(), None);
        assert_eq!(result.throughput(), None);
    }

    #[test]
    fn test_result_json_shape() {
        let result = ProbeResult {
            group: "Intune".to_string(),
            endpoint: Endpoint::new("manage.microsoft.com"),
            kind: EndpointKind::Hostname,
            target: "manage.microsoft.com".to_string(),
            outcome: ProbeOutcome::Reachable {
                address: Some("10.0.0.1".parse().unwrap()),
                latency_ms: Some(12.5),
                throughput: None,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "reachable");
        assert_eq!(json["endpoint"], "manage.microsoft.com");
        assert_eq!(json["kind"], "hostname");
        assert_eq!(json["address"], "10.0.0.1");
        assert_eq!(json["latency_ms"], 12.5);
        assert!(json["throughput"].is_null());
    }
}
