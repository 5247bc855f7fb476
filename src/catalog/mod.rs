//! Endpoint catalog: service groups and the sources that produce them.
//!
//! A catalog is an ordered list of service groups. Every endpoint belongs to
//! exactly one group; when a source lists the same endpoint twice, the first
//! group keeps it.

mod builtin;
mod endpoint;
pub mod impact;
mod remote;

pub use builtin::*;
pub use endpoint::*;
pub use remote::*;

use crate::config::{CatalogKind, GroupSelection};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;

/// Catalog error types. All of them abort the run before any probing.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to fetch endpoint list: {0}")]
    Network(String),
    #[error("failed to decode endpoint list: {0}")]
    Decode(String),
    #[error("endpoint catalog is empty")]
    Empty,
    #[error("none of the requested service groups exist: {0}")]
    NoGroupsSelected(String),
}

/// A named set of endpoints reported as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceGroup {
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

/// Ordered mapping of group name to endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    groups: Vec<ServiceGroup>,
}

impl Catalog {
    /// Build a catalog from `(group, endpoints)` pairs.
    ///
    /// Blank identifiers are dropped and duplicates are removed, both within
    /// a group and across groups. Groups with the same name are merged.
    pub fn from_groups<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut groups: Vec<ServiceGroup> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (name, ids) in entries {
            let idx = match groups.iter().position(|g| g.name == name) {
                Some(idx) => idx,
                None => {
                    groups.push(ServiceGroup {
                        name: name.clone(),
                        endpoints: Vec::new(),
                    });
                    groups.len() - 1
                }
            };

            for id in ids {
                let endpoint = Endpoint::new(id);
                if endpoint.as_str().is_empty() {
                    continue;
                }
                if !seen.insert(endpoint.as_str().to_ascii_lowercase()) {
                    tracing::debug!(
                        "Catalog: {} already listed, skipping it in {}",
                        endpoint,
                        name
                    );
                    continue;
                }
                groups[idx].endpoints.push(endpoint);
            }
        }

        Self { groups }
    }

    pub fn groups(&self) -> &[ServiceGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ServiceGroup> {
        self.groups.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.endpoints.is_empty())
    }

    pub fn endpoint_count(&self) -> usize {
        self.groups.iter().map(|g| g.endpoints.len()).sum()
    }

    /// Iterate `(group, endpoint)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceGroup, &Endpoint)> {
        self.groups
            .iter()
            .flat_map(|g| g.endpoints.iter().map(move |e| (g, e)))
    }

    /// Keep only the selected groups, preserving catalog order.
    ///
    /// Unknown names are logged and ignored; selecting nothing is an error.
    pub fn select(self, selection: &GroupSelection) -> Result<Self, CatalogError> {
        let names = match selection {
            GroupSelection::All => return Ok(self),
            GroupSelection::Named(names) => names,
        };

        for name in names {
            if self.group(name).is_none() {
                tracing::warn!("Catalog: unknown service group {:?}, ignoring", name);
            }
        }

        let groups: Vec<ServiceGroup> = self
            .groups
            .into_iter()
            .filter(|g| names.iter().any(|n| n.eq_ignore_ascii_case(&g.name)))
            .collect();

        if groups.is_empty() {
            let requested: Vec<&str> = names.iter().map(String::as_str).collect();
            return Err(CatalogError::NoGroupsSelected(requested.join(", ")));
        }

        Ok(Self { groups })
    }
}

/// Anything that can produce a catalog for a run.
pub trait CatalogSource {
    fn load(&self) -> impl Future<Output = Result<Catalog, CatalogError>> + Send;
}

/// Load the catalog described by the configuration.
pub async fn load_catalog(kind: &CatalogKind) -> Result<Catalog, CatalogError> {
    match kind {
        CatalogKind::Builtin => BuiltinCatalog.load().await,
        CatalogKind::Remote {
            instance_url,
            service_areas,
        } => RemoteCatalog::new(instance_url.clone(), service_areas.clone()).load().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample() -> Catalog {
        Catalog::from_groups(vec![
            ("Intune".to_string(), vec!["a.example.com".to_string(), "b.example.com".to_string()]),
            ("Autopilot".to_string(), vec!["c.example.com".to_string()]),
            ("Store".to_string(), vec!["d.example.com".to_string()]),
        ])
    }

    #[test]
    fn test_duplicates_removed_within_and_across_groups() {
        let catalog = Catalog::from_groups(vec![
            ("One".to_string(), vec!["a.com".to_string(), "A.com".to_string(), "".to_string()]),
            ("Two".to_string(), vec!["a.com".to_string(), "b.com".to_string()]),
        ]);
        assert_eq!(catalog.group("One").unwrap().endpoints, vec![Endpoint::new("a.com")]);
        assert_eq!(catalog.group("Two").unwrap().endpoints, vec![Endpoint::new("b.com")]);
        assert_eq!(catalog.endpoint_count(), 2);
    }

    #[test]
    fn test_same_name_groups_merge() {
        let catalog = Catalog::from_groups(vec![
            ("One".to_string(), vec!["a.com".to_string()]),
            ("One".to_string(), vec!["b.com".to_string()]),
        ]);
        assert_eq!(catalog.groups().len(), 1);
        assert_eq!(catalog.endpoint_count(), 2);
    }

    #[test]
    fn test_iter_follows_catalog_order() {
        let catalog = sample();
        let order: Vec<&str> = catalog.iter().map(|(_, e)| e.as_str()).collect();
        assert_eq!(order, vec!["a.example.com", "b.example.com", "c.example.com", "d.example.com"]);
    }

    #[test]
    fn test_select_keeps_catalog_order() {
        let names: BTreeSet<String> =
            ["store", "Intune", "Nope"].iter().map(|s| s.to_string()).collect();
        let selected = sample().select(&GroupSelection::Named(names)).unwrap();
        let groups: Vec<&str> = selected.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, vec!["Intune", "Store"]);
    }

    #[test]
    fn test_select_nothing_is_an_error() {
        let names: BTreeSet<String> = ["Nope".to_string()].into_iter().collect();
        let err = sample().select(&GroupSelection::Named(names)).unwrap_err();
        assert!(matches!(err, CatalogError::NoGroupsSelected(_)));
    }

    #[test]
    fn test_select_all() {
        assert_eq!(sample().select(&GroupSelection::All).unwrap(), sample());
    }
}
