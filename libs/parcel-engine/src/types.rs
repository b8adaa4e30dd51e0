use std::collections::BTreeMap;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type Tags = BTreeMap<String, String>;

/// WGS-84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Planar coordinate in `[lon, lat]` order.
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, ValidationError> {
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Viewport spanning two zoom-level tiles in each axis around `center`.
    pub fn around(center: GeoPoint, zoom: u8) -> Result<Self, ValidationError> {
        let tiles = 2_f64.powi(i32::from(zoom));
        let degrees_per_tile = 360.0 / tiles;
        let half = degrees_per_tile;
        Self::new(
            center.lat - half,
            center.lon - half,
            center.lat + half,
            center.lon + half,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let finite = [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.south >= self.north || self.west >= self.east {
            return Err(ValidationError::InvalidBoundingBox {
                south: self.south,
                west: self.west,
                north: self.north,
                east: self.east,
            });
        }
        Ok(())
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.south + self.north) * 0.5,
            lon: (self.west + self.east) * 0.5,
        }
    }

    /// `[west, south, east, north]`, the order the tessellation clips against.
    pub fn extent(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// A way returned by the geodata service: a building outline or a road.
#[derive(Clone, Debug, PartialEq)]
pub struct OsmElement {
    pub id: String,
    pub geometry: Vec<GeoPoint>,
    pub tags: Tags,
}

impl OsmElement {
    pub fn is_building(&self) -> bool {
        self.tags.contains_key("building")
    }

    pub fn is_road_area(&self) -> bool {
        self.tags.contains_key("area:highway")
    }

    pub fn is_road_way(&self) -> bool {
        self.tags.contains_key("highway") && !self.is_road_area()
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        match (self.geometry.first(), self.geometry.last()) {
            (Some(first), Some(last)) => self.geometry.len() > 1 && first == last,
            _ => false,
        }
    }
}
