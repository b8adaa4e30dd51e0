//! Local metric frame used for buffering and area measurement.
//!
//! Coordinates are projected with an equirectangular approximation anchored
//! at a single origin (the viewport centre for an analysis pass). At the
//! scale of a map viewport the distortion is well below a percent, and using
//! one frame for the whole pass keeps every area comparable.

use geo::{Area, Coord, LineString, MapCoords, MultiPolygon, Polygon};

use crate::types::GeoPoint;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalFrame {
    origin: GeoPoint,
    lat_scale: f64,
    lon_scale: f64,
}

impl LocalFrame {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            lat_scale: meters_per_degree_lat(origin.lat),
            lon_scale: meters_per_degree_lon(origin.lat),
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// `[lon, lat]` degrees to `[east, north]` metres.
    pub fn to_local(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (coord.x - self.origin.lon) * self.lon_scale,
            y: (coord.y - self.origin.lat) * self.lat_scale,
        }
    }

    /// `[east, north]` metres to `[lon, lat]` degrees.
    pub fn to_geo(&self, local: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.origin.lon + local.x / self.lon_scale,
            y: self.origin.lat + local.y / self.lat_scale,
        }
    }

    pub fn polygon_to_local(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        polygon.map_coords(|c| self.to_local(c))
    }

    pub fn polygon_to_geo(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        polygon.map_coords(|c| self.to_geo(c))
    }

    pub fn ring_to_geo(&self, ring: &LineString<f64>) -> LineString<f64> {
        ring.map_coords(|c| self.to_geo(c))
    }

    /// Planar area in square metres of a polygon given in degrees.
    pub fn area_m2(&self, polygon: &Polygon<f64>) -> f64 {
        self.polygon_to_local(polygon).unsigned_area()
    }

    pub fn multi_area_m2(&self, polygons: &MultiPolygon<f64>) -> f64 {
        polygons.iter().map(|p| self.area_m2(p)).sum()
    }
}

pub fn meters_per_degree_lat(lat_deg: f64) -> f64 {
    let lat = lat_deg.to_radians();
    111_132.92 - 559.82 * (2.0 * lat).cos() + 1.175 * (4.0 * lat).cos()
}

pub fn meters_per_degree_lon(lat_deg: f64) -> f64 {
    let lat = lat_deg.to_radians();
    111_412.84 * lat.cos() - 93.5 * (3.0 * lat).cos()
}
