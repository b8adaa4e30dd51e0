use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Error, snippet};
use crate::parcels::GeneratedParcel;

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

/// Proposal metadata document referenced by a proposal token's URI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ProposalMetadata {
    /// Builds a document describing `parcels` in the order given.
    pub fn for_parcels(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
        image: impl Into<String>,
        parcels: &[&GeneratedParcel],
    ) -> Self {
        let total_area: f64 = parcels.iter().map(|p| p.area_m2).sum();
        let mut attributes = vec![
            Attribute {
                trait_type: "Parcel Count".to_string(),
                value: parcels.len().into(),
            },
            Attribute {
                trait_type: "Total Area (m2)".to_string(),
                value: serde_json::json!((total_area * 100.0).round() / 100.0),
            },
        ];
        attributes.extend(parcels.iter().map(|p| Attribute {
            trait_type: "Parcel".to_string(),
            value: p.id.clone().into(),
        }));
        Self {
            name: name.into(),
            description: description.into(),
            kind: kind.into(),
            image: image.into(),
            attributes,
        }
    }

    pub fn parcel_ids(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|a| a.trait_type == "Parcel")
            .filter_map(|a| a.value.as_str())
    }
}

/// Resolves a content-addressed `uri` against `gateway`.
///
/// `ipfs://<cid>` and `ipfs://ipfs/<cid>` both become `<gateway>/<cid>`; any
/// other scheme is returned unchanged.
pub fn gateway_url(gateway: &str, uri: &str) -> String {
    let Some(path) = uri.strip_prefix(IPFS_SCHEME) else {
        return uri.to_string();
    };
    let path = path.strip_prefix("ipfs/").unwrap_or(path);
    format!("{}/{}", gateway.trim_end_matches('/'), path)
}

pub trait MetadataSource {
    fn fetch_metadata(&self, uri: &str) -> impl Future<Output = Result<ProposalMetadata, Error>>;
}

pub struct MetadataClient {
    http: reqwest::Client,
    gateway: String,
}

impl MetadataClient {
    pub fn new(config: &EngineConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            gateway: config.ipfs_gateway.clone(),
        })
    }

    pub fn resolve(&self, uri: &str) -> String {
        gateway_url(&self.gateway, uri)
    }
}

impl MetadataSource for MetadataClient {
    async fn fetch_metadata(&self, uri: &str) -> Result<ProposalMetadata, Error> {
        let url = self.resolve(uri);
        tracing::debug!(%url, "fetching proposal metadata");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::FetchStatus {
                status: status.as_u16(),
                snippet: snippet(body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcels::ClipOutcome;
    use crate::types::Tags;
    use geo::polygon;

    #[test]
    fn test_gateway_url() {
        let gateway = "https://ipfs.io/ipfs/";
        assert_eq!(gateway_url(gateway, "ipfs://bafy123"), "https://ipfs.io/ipfs/bafy123");
        assert_eq!(
            gateway_url(gateway, "ipfs://ipfs/bafy123/meta.json"),
            "https://ipfs.io/ipfs/bafy123/meta.json"
        );
        assert_eq!(
            gateway_url("http://localhost:8080/ipfs", "ipfs://bafy123"),
            "http://localhost:8080/ipfs/bafy123"
        );
        assert_eq!(
            gateway_url(gateway, "https://example.com/a.json"),
            "https://example.com/a.json"
        );
    }

    #[test]
    fn test_metadata_document_shape() {
        let json = r#"{
            "name": "Park",
            "description": "Green space",
            "type": "park",
            "image": "ipfs://bafyimg",
            "attributes": [{"trait_type": "Parcel", "value": "123"}]
        }"#;
        let metadata: ProposalMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.kind, "park");
        assert_eq!(metadata.parcel_ids().collect::<Vec<_>>(), ["123"]);
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["type"], "park");
    }

    #[test]
    fn test_for_parcels_keeps_order() {
        let parcel = |id: &str, area_m2: f64| GeneratedParcel {
            id: id.to_string(),
            building_id: id.to_string(),
            geometry: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
            area_m2,
            tags: Tags::new(),
            outcome: ClipOutcome::Unclipped,
        };
        let b = parcel("b", 120.004);
        let a = parcel("a", 340.0);
        let metadata = ProposalMetadata::for_parcels("n", "d", "t", "i", &[&b, &a]);
        assert_eq!(metadata.parcel_ids().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(metadata.attributes[0].value, 2);
        assert_eq!(metadata.attributes[1].value, 460.0);
    }
}
