use geo::{LineString, Polygon};

use crate::error::ValidationError;
use crate::projection::LocalFrame;
use crate::roads::CombinedRoadRegion;
use crate::types::{GeoPoint, OsmElement, Tags};

/// A building retained for tessellation.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingCenter {
    pub id: String,
    pub center: GeoPoint,
    pub geometry: Vec<GeoPoint>,
    pub tags: Tags,
}

impl BuildingCenter {
    pub fn footprint(&self) -> Option<Polygon<f64>> {
        if self.geometry.len() < 3 {
            return None;
        }
        let ring: LineString<f64> = self.geometry.iter().map(|p| p.to_coord()).collect();
        Some(Polygon::new(ring, vec![]))
    }

    pub fn footprint_area_m2(&self, frame: &LocalFrame) -> f64 {
        self.footprint()
            .map(|polygon| frame.area_m2(&polygon))
            .unwrap_or(0.0)
    }
}

/// Arithmetic mean of the ring's points.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
    Some(GeoPoint::new(lat / n, lon / n))
}

pub fn filter_buildings(
    buildings: &[&OsmElement],
    region: Option<&CombinedRoadRegion>,
) -> Result<Vec<BuildingCenter>, ValidationError> {
    let mut retained = Vec::with_capacity(buildings.len());
    let mut on_road = 0usize;
    for building in buildings {
        let Some(center) = centroid(&building.geometry) else {
            continue;
        };
        if !center.is_finite() {
            tracing::debug!(id = %building.id, "building centroid is not finite");
            continue;
        }
        if region.is_some_and(|region| region.contains(center)) {
            tracing::debug!(id = %building.id, "building centroid inside road region");
            on_road += 1;
            continue;
        }
        retained.push(BuildingCenter {
            id: building.id.clone(),
            center,
            geometry: building.geometry.clone(),
            tags: building.tags.clone(),
        });
    }
    tracing::info!(
        retained = retained.len(),
        on_road,
        total = buildings.len(),
        "filtered buildings"
    );
    if retained.len() < 2 {
        return Err(ValidationError::InsufficientBuildings {
            found: retained.len(),
        });
    }
    Ok(retained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roads::{build_road_geometry, classify};
    use approx::assert_relative_eq;
    use geo::Coord;

    fn square(id: &str, frame: &LocalFrame, x: f64, y: f64, size: f64) -> OsmElement {
        let pt = |x: f64, y: f64| GeoPoint::from_coord(frame.to_geo(Coord { x, y }));
        OsmElement {
            id: id.to_string(),
            geometry: vec![
                pt(x, y),
                pt(x + size, y),
                pt(x + size, y + size),
                pt(x, y + size),
            ],
            tags: [("building".to_string(), "yes".to_string())].into(),
        }
    }

    #[test]
    fn test_centroid_is_mean() {
        let c = centroid(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 2.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(2.0, 0.0),
        ])
        .unwrap();
        assert_relative_eq!(c.lat, 1.0);
        assert_relative_eq!(c.lon, 1.0);
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_single_building_is_insufficient() {
        let frame = LocalFrame::new(GeoPoint::new(45.76, 15.96));
        let a = square("a", &frame, 0.0, 0.0, 10.0);
        let err = filter_buildings(&[&a], None).unwrap_err();
        assert_eq!(err, ValidationError::InsufficientBuildings { found: 1 });
    }

    #[test]
    fn test_empty_geometry_is_ignored() {
        let frame = LocalFrame::new(GeoPoint::new(45.76, 15.96));
        let a = square("a", &frame, 0.0, 0.0, 10.0);
        let b = square("b", &frame, 30.0, 0.0, 10.0);
        let empty = OsmElement {
            id: "e".to_string(),
            geometry: vec![],
            tags: Tags::new(),
        };
        let retained = filter_buildings(&[&a, &empty, &b], None).unwrap();
        let ids: Vec<_> = retained.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_building_on_road_is_dropped() {
        let frame = LocalFrame::new(GeoPoint::new(45.76, 15.96));
        let pt = |x: f64, y: f64| GeoPoint::from_coord(frame.to_geo(Coord { x, y }));
        let road = OsmElement {
            id: "r".to_string(),
            geometry: vec![pt(-100.0, 0.0), pt(100.0, 0.0)],
            tags: [("highway".to_string(), "primary".to_string())].into(),
        };
        let on_road = square("a", &frame, -2.0, -2.0, 4.0);
        let b = square("b", &frame, 0.0, 20.0, 10.0);
        let c = square("c", &frame, 0.0, -30.0, 10.0);
        let elements = vec![road, on_road, b, c];
        let classified = classify(&elements);
        let roads = build_road_geometry(&classified, &frame);
        let retained = filter_buildings(&classified.buildings, roads.region.as_ref()).unwrap();
        let ids: Vec<_> = retained.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn test_footprint_area() {
        let frame = LocalFrame::new(GeoPoint::new(45.76, 15.96));
        let a = square("a", &frame, 0.0, 0.0, 10.0);
        let center = BuildingCenter {
            id: a.id.clone(),
            center: centroid(&a.geometry).unwrap(),
            geometry: a.geometry.clone(),
            tags: a.tags.clone(),
        };
        assert_relative_eq!(center.footprint_area_m2(&frame), 100.0, epsilon = 1e-6);
    }
}
