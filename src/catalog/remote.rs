//! Catalog fetched from the Microsoft 365 endpoint-list web service.

use super::{Catalog, CatalogError, CatalogSource};
use serde::Deserialize;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One record of the endpoint-list response.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSet {
    #[serde(rename = "serviceArea", alias = "ServiceArea", default)]
    pub service_area: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Fetches one group per service area.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    instance_url: String,
    service_areas: Vec<String>,
}

impl RemoteCatalog {
    pub fn new(instance_url: String, service_areas: Vec<String>) -> Self {
        Self {
            instance_url,
            service_areas,
        }
    }

    async fn fetch_area(
        &self,
        client: &reqwest::Client,
        area: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::info!("Fetching endpoint list for service area {}", area);

        let response = client
            .get(&self.instance_url)
            .query(&[("ServiceAreas", area), ("clientrequestid", request_id.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let sets: Vec<EndpointSet> = response.json().await.map_err(|e| {
            if e.is_decode() {
                CatalogError::Decode(e.to_string())
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;

        Ok(endpoints_in_area(sets, area))
    }
}

impl CatalogSource for RemoteCatalog {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let mut groups = Vec::with_capacity(self.service_areas.len());
        for area in &self.service_areas {
            let endpoints = self.fetch_area(&client, area).await?;
            tracing::info!("Service area {}: {} endpoints", area, endpoints.len());
            groups.push((area.clone(), endpoints));
        }

        let catalog = Catalog::from_groups(groups);
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }
}

/// The endpoints of `area`: for every matching record its `urls`, then its `ips`.
pub fn endpoints_in_area(sets: Vec<EndpointSet>, area: &str) -> Vec<String> {
    sets.into_iter()
        .filter(|s| s.service_area.eq_ignore_ascii_case(area))
        .flat_map(|s| s.urls.into_iter().chain(s.ips))
        .collect()
}
