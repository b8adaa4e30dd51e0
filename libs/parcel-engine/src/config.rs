use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;
use crate::selection::SelectionMode;
use crate::types::GeoPoint;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";
const DEFAULT_CENTER: GeoPoint = GeoPoint::new(45.760772, 15.962169);
const DEFAULT_ZOOM: u8 = 17;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub overpass_url: String,
    pub request_timeout_s: u64,
    pub user_agent: String,
    pub initial_center: GeoPoint,
    pub initial_zoom: u8,
    pub ipfs_gateway: String,
    pub selection_mode: SelectionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            request_timeout_s: 25,
            user_agent: concat!("parcel-engine/", env!("CARGO_PKG_VERSION")).to_string(),
            initial_center: DEFAULT_CENTER,
            initial_zoom: DEFAULT_ZOOM,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            selection_mode: SelectionMode::Single,
        }
    }
}

impl EngineConfig {
    /// Loads the first config file found, then applies environment overrides.
    ///
    /// Search order: `path`, `$PARCELS_CONFIG`, `./parcels.toml`. A missing
    /// file everywhere yields the defaults; an explicit `path` that cannot be
    /// read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidates = std::env::var("PARCELS_CONFIG")
                    .ok()
                    .map(PathBuf::from)
                    .into_iter()
                    .chain([PathBuf::from("./parcels.toml")]);
                let mut found = None;
                for candidate in candidates {
                    let Ok(text) = std::fs::read_to_string(&candidate) else {
                        continue;
                    };
                    tracing::debug!(path = %candidate.display(), "loaded config");
                    found = Some(Self::from_toml(&text)?);
                    break;
                }
                found.unwrap_or_default()
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PARCELS_OVERPASS_URL") {
            self.overpass_url = url;
        }
        if let Some(timeout) = env_parse("PARCELS_TIMEOUT_S") {
            self.request_timeout_s = timeout;
        }
        if let Ok(gateway) = std::env::var("PARCELS_IPFS_GATEWAY") {
            self.ipfs_gateway = gateway;
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.overpass_url.trim().is_empty() {
            return Err(Error::Config("overpass_url must not be empty".to_string()));
        }
        if self.request_timeout_s == 0 {
            return Err(Error::Config("request_timeout_s must be positive".to_string()));
        }
        if !self.initial_center.is_finite() {
            return Err(Error::Config("initial_center must be finite".to_string()));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}
