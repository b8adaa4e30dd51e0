use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::error::{Error, snippet};
use crate::types::{BoundingBox, GeoPoint, OsmElement, Tags};

/// Highway classes that never bound a parcel.
pub const EXCLUDED_HIGHWAYS: [&str; 4] = ["service", "footway", "path", "cycleway"];

/// Source of raw building and road ways for a viewport.
pub trait GeodataSource {
    fn fetch(&self, bbox: &BoundingBox) -> impl Future<Output = Result<Vec<OsmElement>, Error>>;
}

pub fn build_query(bbox: &BoundingBox) -> String {
    let BoundingBox {
        south,
        west,
        north,
        east,
    } = *bbox;
    let excluded = EXCLUDED_HIGHWAYS.join("|");
    format!(
        "[out:json][timeout:25];\
        (\
            way[\"building\"]({south},{west},{north},{east});\
            way[\"area:highway\"]({south},{west},{north},{east});\
            way[\"highway\"][\"highway\"!~\"^({excluded})$\"]({south},{west},{north},{east});\
        );\
        out body geom;"
    )
}

#[derive(Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    id: ElementId,
    #[serde(default)]
    geometry: Vec<OverpassNode>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ElementId {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct OverpassNode {
    lat: Option<f64>,
    lon: Option<f64>,
}

pub fn parse_response(body: &str) -> Result<Vec<OsmElement>, Error> {
    let parsed: OverpassResponse = serde_json::from_str(body)?;
    let elements = parsed
        .elements
        .into_iter()
        .map(|element| {
            let id = match element.id {
                ElementId::Number(n) => n.to_string(),
                ElementId::Text(s) => s,
            };
            let geometry = element
                .geometry
                .into_iter()
                .filter_map(|node| Some(GeoPoint::new(node.lat?, node.lon?)))
                .collect();
            OsmElement {
                id,
                geometry,
                tags: element.tags,
            }
        })
        .collect();
    Ok(elements)
}

/// Overpass interpreter client. One request per call, no retry.
#[derive(Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    url: String,
}

impl OverpassClient {
    pub fn new(config: &EngineConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            url: config.overpass_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl GeodataSource for OverpassClient {
    async fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<OsmElement>, Error> {
        bbox.validate()?;
        let query = build_query(bbox);
        tracing::debug!(url = %self.url, ?bbox, "requesting overpass");
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::FetchStatus {
                status: status.as_u16(),
                snippet: snippet(body),
            });
        }

        let elements = parse_response(&body)?;
        tracing::info!(count = elements.len(), "fetched overpass elements");
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_contains_bbox_and_filters() {
        let bbox = BoundingBox::new(45.75, 15.95, 45.77, 15.97).unwrap();
        let query = build_query(&bbox);
        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains("way[\"building\"](45.75,15.95,45.77,15.97);"));
        assert!(query.contains("way[\"area:highway\"](45.75,15.95,45.77,15.97);"));
        // whole-value match, so `services` or `path_link` stay in
        assert!(query.contains("[\"highway\"!~\"^(service|footway|path|cycleway)$\"]"));
        assert!(!query.contains("!~\"service|"));
        assert!(query.ends_with("out body geom;"));
    }

    #[test]
    fn test_parse_elements() {
        let body = r#"{
            "version": 0.6,
            "elements": [
                {
                    "type": "way",
                    "id": 123,
                    "geometry": [{"lat": 45.0, "lon": 15.0}, {"lat": 45.1, "lon": 15.1}],
                    "tags": {"highway": "primary"}
                },
                {
                    "type": "way",
                    "id": "b-7",
                    "geometry": [{"lat": 45.0}, {"lat": 45.2, "lon": 15.2}]
                }
            ]
        }"#;
        let elements = parse_response(body).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].id, "123");
        assert_eq!(elements[0].geometry.len(), 2);
        assert_eq!(elements[0].tag("highway"), Some("primary"));
        assert_eq!(elements[1].id, "b-7");
        assert_eq!(elements[1].geometry, vec![GeoPoint::new(45.2, 15.2)]);
        assert!(elements[1].tags.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = parse_response("<html>busy</html>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        let err = parse_response(r#"{"remark": "no elements"}"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
