//! Configuration module for cloudreach.
//!
//! Loads run configuration from environment variables with sensible defaults.

use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Default endpoint-list service used by the remote catalog.
pub const DEFAULT_INSTANCE_URL: &str = "https://endpoints.office.com/endpoints/WorldWide";

/// Configuration error types.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Which service groups a run should probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelection {
    All,
    Named(BTreeSet<String>),
}

impl GroupSelection {
    /// Parse a comma separated list. `All` (any case) or an empty list selects everything.
    pub fn parse(raw: &str) -> Self {
        let names: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
            GroupSelection::All
        } else {
            GroupSelection::Named(names)
        }
    }
}

/// Where the endpoint catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogKind {
    /// Compiled-in table of service groups.
    Builtin,
    /// Fetched from the endpoint-list web service.
    Remote {
        instance_url: String,
        service_areas: Vec<String>,
    },
}

/// Run configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Service groups to probe (default: all)
    pub selected_groups: GroupSelection,
    /// Skip ICMP latency sampling
    pub skip_latency: bool,
    /// Skip HTTP throughput sampling
    pub skip_throughput: bool,
    /// Per-primitive timeout
    pub timeout: Duration,
    /// TCP port used for the reachability check (default: 443)
    pub port: u16,
    /// ICMP echoes per latency sample (default: 4)
    pub ping_count: u32,
    /// Maximum endpoints probed at once; 1 keeps the run strictly sequential
    pub concurrency: usize,
    pub catalog: CatalogKind,
    /// Optional path for the JSON run report
    pub report_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            selected_groups: GroupSelection::All,
            skip_latency: false,
            skip_throughput: false,
            timeout: Duration::from_secs(5),
            port: 443,
            ping_count: 4,
            concurrency: 8,
            catalog: CatalogKind::Builtin,
            report_path: None,
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CLOUDREACH_SERVICES`: comma separated group names or `All` (default: All)
    /// - `CLOUDREACH_SKIP_PING`: skip latency sampling (default: false)
    /// - `CLOUDREACH_SKIP_SPEED`: skip throughput sampling (default: false)
    /// - `CLOUDREACH_TIMEOUT`: timeout in seconds (default: 5)
    /// - `CLOUDREACH_PORT`: reachability port (default: 443)
    /// - `CLOUDREACH_PING_COUNT`: echoes per latency sample (default: 4)
    /// - `CLOUDREACH_CONCURRENCY`: worker pool size (default: 8)
    /// - `CLOUDREACH_CATALOG`: `builtin` or `remote` (default: builtin)
    /// - `CLOUDREACH_SERVICE_AREAS`: remote service areas (default: Common)
    /// - `CLOUDREACH_INSTANCE_URL`: remote endpoint-list URL
    /// - `CLOUDREACH_REPORT_PATH`: write a JSON report here
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup("CLOUDREACH_SERVICES") {
            cfg.selected_groups = GroupSelection::parse(&raw);
        }

        if let Some(raw) = lookup("CLOUDREACH_SKIP_PING") {
            cfg.skip_latency = parse_flag("CLOUDREACH_SKIP_PING", &raw)?;
        }

        if let Some(raw) = lookup("CLOUDREACH_SKIP_SPEED") {
            cfg.skip_throughput = parse_flag("CLOUDREACH_SKIP_SPEED", &raw)?;
        }

        if let Some(raw) = lookup("CLOUDREACH_TIMEOUT") {
            let secs: u64 = parse_number("CLOUDREACH_TIMEOUT", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Zero("CLOUDREACH_TIMEOUT"));
            }
            cfg.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("CLOUDREACH_PORT") {
            cfg.port = parse_number("CLOUDREACH_PORT", &raw)?;
            if cfg.port == 0 {
                return Err(ConfigError::Zero("CLOUDREACH_PORT"));
            }
        }

        if let Some(raw) = lookup("CLOUDREACH_PING_COUNT") {
            cfg.ping_count = parse_number("CLOUDREACH_PING_COUNT", &raw)?;
            if cfg.ping_count == 0 {
                return Err(ConfigError::Zero("CLOUDREACH_PING_COUNT"));
            }
        }

        if let Some(raw) = lookup("CLOUDREACH_CONCURRENCY") {
            cfg.concurrency = parse_number("CLOUDREACH_CONCURRENCY", &raw)?;
            if cfg.concurrency == 0 {
                return Err(ConfigError::Zero("CLOUDREACH_CONCURRENCY"));
            }
            if cfg.concurrency > Semaphore::MAX_PERMITS {
                return Err(ConfigError::Invalid {
                    key: "CLOUDREACH_CONCURRENCY",
                    value: raw,
                });
            }
        }

        let catalog = lookup("CLOUDREACH_CATALOG").unwrap_or_else(|| "builtin".to_string());
        cfg.catalog = match catalog.trim().to_ascii_lowercase().as_str() {
            "builtin" | "static" => CatalogKind::Builtin,
            "remote" => {
                let areas =
                    lookup("CLOUDREACH_SERVICE_AREAS").unwrap_or_else(|| "Common".to_string());
                let service_areas: Vec<String> = areas
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if service_areas.is_empty() {
                    return Err(ConfigError::Invalid {
                        key: "CLOUDREACH_SERVICE_AREAS",
                        value: areas,
                    });
                }
                CatalogKind::Remote {
                    instance_url: lookup("CLOUDREACH_INSTANCE_URL")
                        .unwrap_or_else(|| DEFAULT_INSTANCE_URL.to_string()),
                    service_areas,
                }
            }
            _ => {
                return Err(ConfigError::Invalid {
                    key: "CLOUDREACH_CATALOG",
                    value: catalog,
                })
            }
        };

        if let Some(path) = lookup("CLOUDREACH_REPORT_PATH") {
            if !path.trim().is_empty() {
                cfg.report_path = Some(PathBuf::from(path));
            }
        }

        Ok(cfg)
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
