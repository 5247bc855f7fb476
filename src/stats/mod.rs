//! Aggregation of probe results into run and per-group statistics.
//!
//! Everything here is a pure function of the result list and the catalog.

mod digest;
mod report;

pub use digest::*;
pub use report::*;

use crate::catalog::{impact, Catalog, Endpoint};
use crate::probe::round_to;
use crate::runner::ProbeResult;
use serde::Serialize;

/// Counts and sample statistics over a set of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub total: usize,
    pub reachable: usize,
    pub unreachable: usize,
    /// Percentage reachable, one decimal place; 0 when there are no results
    pub success_rate: f64,
    pub latency_ms: MetricStats,
    /// Download samples only
    pub throughput_kbps: MetricStats,
    /// HEAD and first-response samples only
    pub response_time_ms: MetricStats,
}

impl RunStatistics {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ProbeResult>,
    {
        let mut total = 0;
        let mut reachable = 0;
        let mut latency = Vec::new();
        let mut kbps = Vec::new();
        let mut response = Vec::new();

        for result in results {
            total += 1;
            if !result.is_reachable() {
                continue;
            }
            reachable += 1;
            if let Some(ms) = result.latency_ms() {
                latency.push(ms);
            }
            if let Some(sample) = result.throughput() {
                kbps.extend(sample.kbps());
                response.extend(sample.response_ms());
            }
        }

        Self {
            total,
            reachable,
            unreachable: total - reachable,
            success_rate: success_rate(reachable, total),
            latency_ms: MetricStats::from_samples(&latency),
            throughput_kbps: MetricStats::from_samples(&kbps),
            response_time_ms: MetricStats::from_samples(&response),
        }
    }
}

/// `round(reachable / total * 100, 1)`, or 0 for an empty set.
pub fn success_rate(reachable: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(reachable as f64 / total as f64 * 100.0, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupHealth {
    Healthy,
    /// At least one endpoint unreachable
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub health: GroupHealth,
    pub stats: RunStatistics,
    pub unreachable_endpoints: Vec<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<&'static impact::ServiceImpact>,
}

/// Aggregator output handed to sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub overall: RunStatistics,
    pub groups: Vec<GroupSummary>,
    /// Groups with at least one unreachable endpoint, in catalog order
    pub failed_groups: Vec<String>,
}

impl RunSummary {
    pub fn is_healthy(&self) -> bool {
        self.overall.unreachable == 0
    }
}

/// Build run and per-group statistics from the results of one run.
pub fn aggregate(catalog: &Catalog, results: &[ProbeResult]) -> RunSummary {
    let groups: Vec<GroupSummary> = catalog
        .groups()
        .iter()
        .map(|group| {
            let members: Vec<&ProbeResult> =
                results.iter().filter(|r| r.group == group.name).collect();
            let stats = RunStatistics::from_results(members.iter().copied());
            let unreachable_endpoints: Vec<Endpoint> = members
                .iter()
                .filter(|r| !r.is_reachable())
                .map(|r| r.endpoint.clone())
                .collect();

            let health = if stats.unreachable > 0 {
                GroupHealth::Degraded
            } else {
                GroupHealth::Healthy
            };

            GroupSummary {
                name: group.name.clone(),
                health,
                impact: match health {
                    GroupHealth::Degraded => impact::lookup(&group.name),
                    GroupHealth::Healthy => None,
                },
                stats,
                unreachable_endpoints,
            }
        })
        .collect();

    let failed_groups = groups
        .iter()
        .filter(|g| g.health == GroupHealth::Degraded)
        .map(|g| g.name.clone())
        .collect();

    RunSummary {
        overall: RunStatistics::from_results(results),
        groups,
        failed_groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EndpointKind;
    use crate::probe::ThroughputSample;
    use crate::runner::ProbeOutcome;

    fn reachable(
        group: &str,
        endpoint: &str,
        latency: Option<f64>,
        throughput: Option<ThroughputSample>,
    ) -> ProbeResult {
        ProbeResult {
            group: group.to_string(),
            endpoint: Endpoint::new(endpoint),
            kind: EndpointKind::Hostname,
            target: endpoint.to_string(),
            outcome: ProbeOutcome::Reachable {
                address: None,
                latency_ms: latency,
                throughput,
            },
        }
    }

    fn unreachable(group: &str, endpoint: &str) -> ProbeResult {
        ProbeResult::unreachable(group, &Endpoint::new(endpoint))
    }

    fn catalog(groups: &[(&str, &[&str])]) -> Catalog {
        Catalog::from_groups(
            groups.iter().map(|(name, eps)| {
                (name.to_string(), eps.iter().map(|e| e.to_string()).collect())
            }),
        )
    }

    #[test]
    fn test_single_unreachable_endpoint() {
        let catalog = catalog(&[("Group1", &["host-a"])]);
        let results = vec![unreachable("Group1", "host-a")];

        let summary = aggregate(&catalog, &results);
        let group = &summary.groups[0];
        assert_eq!(group.stats.total, 1);
        assert_eq!(group.stats.reachable, 0);
        assert_eq!(group.stats.success_rate, 0.0);
        assert_eq!(group.health, GroupHealth::Degraded);
        assert_eq!(group.unreachable_endpoints, vec![Endpoint::new("host-a")]);
        assert_eq!(summary.failed_groups, vec!["Group1"]);
        assert!(!summary.is_healthy());
    }

    #[test]
    fn test_two_reachable_endpoints_latency_stats() {
        let catalog = catalog(&[("Group1", &["host-a", "host-b"])]);
        let results = vec![
            reachable("Group1", "host-a", Some(20.0), None),
            reachable("Group1", "host-b", Some(80.0), None),
        ];

        let summary = aggregate(&catalog, &results);
        let stats = &summary.groups[0].stats;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.reachable, 2);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.latency_ms.avg, Some(50.0));
        assert_eq!(stats.latency_ms.min, Some(20.0));
        assert_eq!(stats.latency_ms.max, Some(80.0));
        assert_eq!(stats.throughput_kbps.samples, 0);
        assert!(summary.failed_groups.is_empty());
        assert!(summary.is_healthy());
        assert!(summary.groups[0].impact.is_none());
    }

    #[test]
    fn test_empty_group_has_no_data() {
        let catalog = catalog(&[("Empty", &[]), ("Group1", &["host-a"])]);
        let results = vec![reachable("Group1", "host-a", None, None)];

        let summary = aggregate(&catalog, &results);
        let empty = &summary.groups[0];
        assert_eq!(empty.stats, RunStatistics::default());
        assert_eq!(empty.stats.success_rate, 0.0);
        assert_eq!(empty.stats.latency_ms.avg, None);
        assert_eq!(empty.health, GroupHealth::Healthy);
    }

    #[test]
    fn test_samples_from_reachable_only_and_units_split() {
        let catalog = catalog(&[("Group1", &["a", "b", "c", "d"])]);
        let results = vec![
            reachable("Group1", "a", Some(10.0), Some(ThroughputSample::Download { kbps: 800.0 })),
            reachable("Group1", "b", None, Some(ThroughputSample::Head { ms: 30.0 })),
            reachable(
                "Group1",
                "c",
                Some(30.0),
                Some(ThroughputSample::FirstResponse { ms: 50.0 }),
            ),
            unreachable("Group1", "d"),
        ];

        let stats = &aggregate(&catalog, &results).groups[0].stats;
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.latency_ms.samples, 2);
        assert_eq!(stats.latency_ms.avg, Some(20.0));
        assert_eq!(stats.throughput_kbps.samples, 1);
        assert_eq!(stats.throughput_kbps.avg, Some(800.0));
        assert_eq!(stats.response_time_ms.samples, 2);
        assert_eq!(stats.response_time_ms.avg, Some(40.0));
    }

    #[test]
    fn test_reachable_without_samples_reports_zero_samples() {
        let catalog = catalog(&[("Group1", &["a", "b"])]);
        let results = vec![
            reachable("Group1", "a", None, None),
            reachable("Group1", "b", None, None),
        ];

        let stats = &aggregate(&catalog, &results).groups[0].stats;
        assert_eq!(stats.reachable, 2);
        assert_eq!(stats.latency_ms.samples, 0);
        assert_eq!(stats.latency_ms.avg, None);
    }

    #[test]
    fn test_group_counts_match_results() {
        let catalog = catalog(&[("One", &["a", "b", "c"]), ("Two", &["d", "e"])]);
        let results = vec![
            reachable("One", "a", None, None),
            unreachable("One", "b"),
            reachable("One", "c", None, None),
            unreachable("Two", "d"),
            unreachable("Two", "e"),
        ];

        let summary = aggregate(&catalog, &results);
        for group in &summary.groups {
            let expected = results
                .iter()
                .filter(|r| r.group == group.name && r.is_reachable())
                .count();
            assert_eq!(group.stats.reachable, expected);
        }
        assert_eq!(summary.groups[0].stats.success_rate, 66.7);
        assert_eq!(summary.groups[1].stats.success_rate, 0.0);
        assert_eq!(summary.failed_groups, vec!["One", "Two"]);
        assert_eq!(summary.overall.total, 5);
        assert_eq!(summary.overall.reachable, 2);
        assert_eq!(summary.overall.success_rate, 40.0);
    }

    #[test]
    fn test_failed_group_carries_impact() {
        let catalog = catalog(&[("Intune", &["manage.microsoft.com"])]);
        let results = vec![unreachable("Intune", "manage.microsoft.com")];
        let summary = aggregate(&catalog, &results);
        assert_eq!(summary.groups[0].impact.map(|i| i.group), Some("Intune"));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let catalog = catalog(&[("One", &["a", "b"])]);
        let results = vec![reachable("One", "a", Some(3.0), None), unreachable("One", "b")];
        assert_eq!(aggregate(&catalog, &results), aggregate(&catalog, &results));
    }

    #[test]
    fn test_success_rate_bounds() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 3), 33.3);
        assert_eq!(success_rate(2, 3), 66.7);
        assert_eq!(success_rate(3, 3), 100.0);
    }
}
