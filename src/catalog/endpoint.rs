//! Endpoint identifiers and probe target derivation.

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Label substituted for a leading `*.` so DNS resolves a concrete name.
pub const WILDCARD_PLACEHOLDER: &str = "www";

/// How an endpoint identifier was written in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Hostname,
    Url,
    /// A bare IP address or CIDR block.
    IpNetwork,
}

/// A catalog entry. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> EndpointKind {
        if scheme_split(&self.0).is_some() {
            EndpointKind::Url
        } else if parse_network(&self.0).is_some() {
            EndpointKind::IpNetwork
        } else {
            EndpointKind::Hostname
        }
    }

    /// Bare hostname or IP used for TCP and ICMP probes.
    ///
    /// Scheme, path, port and CIDR prefix are removed and a leading `*.`
    /// becomes `www.`.
    pub fn probe_target(&self) -> String {
        let rest = match scheme_split(&self.0) {
            Some((_, rest)) => rest,
            None => self.0.as_str(),
        };

        if let Some(ip) = parse_network(rest) {
            return ip.to_string();
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
        let host = strip_port(host);
        rewrite_wildcard(host).to_ascii_lowercase()
    }

    /// URL used for HTTP sampling. Keeps the catalog scheme when there is one,
    /// otherwise assumes HTTPS against the probe target.
    pub fn url(&self) -> String {
        match scheme_split(&self.0) {
            Some((scheme, rest)) => {
                let (host, path) = match rest.find(['/', '?', '#']) {
                    Some(idx) => rest.split_at(idx),
                    None => (rest, ""),
                };
                format!("{}://{}{}", scheme.to_ascii_lowercase(), rewrite_wildcard(host), path)
            }
            None => format!("https://{}", bracket_v6(&self.probe_target())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Endpoint::new(s)
    }
}

fn scheme_split(s: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = s.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
        return None;
    }
    Some((scheme, rest))
}

/// Parse `a.b.c.d`, `a.b.c.d/nn`, an IPv6 address or an IPv6 block.
fn parse_network(s: &str) -> Option<IpAddr> {
    let (addr, prefix) = match s.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (s, None),
    };
    let ip: IpAddr = addr.trim_matches(['[', ']']).parse().ok()?;
    if let Some(prefix) = prefix {
        let bits: u8 = prefix.parse().ok()?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return None;
        }
    }
    Some(ip)
}

fn strip_port(host: &str) -> &str {
    if let Some(inner) = host.strip_prefix('[') {
        return inner.split(']').next().unwrap_or(inner);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

fn rewrite_wildcard(host: &str) -> String {
    match host.strip_prefix("*.") {
        Some(rest) => format!("{}.{}", WILDCARD_PLACEHOLDER, rest),
        None => host.to_string(),
    }
}

fn bracket_v6(target: &str) -> String {
    if target.contains(':') {
        format!("[{}]", target)
    } else {
        target.to_string()
    }
}
