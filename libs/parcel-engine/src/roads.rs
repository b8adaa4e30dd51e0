use std::f64::consts::PI;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};

use crate::boolean;
use crate::error::GeometryError;
use crate::projection::LocalFrame;
use crate::types::{GeoPoint, OsmElement};

const CAP_SEGMENTS: usize = 16;

/// Road classification keyed off the `highway` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Other,
}

impl RoadClass {
    pub fn from_tag(highway: &str) -> Self {
        match highway {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            _ => RoadClass::Other,
        }
    }

    /// Buffer radius in kilometres.
    pub fn buffer_km(self) -> f64 {
        match self {
            RoadClass::Motorway => 0.012,
            RoadClass::Trunk => 0.010,
            RoadClass::Primary => 0.008,
            RoadClass::Secondary => 0.006,
            RoadClass::Other => 0.004,
        }
    }

    pub fn buffer_m(self) -> f64 {
        self.buffer_km() * 1000.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoadSource {
    Area,
    Way(RoadClass),
}

/// Planar polygon in `[lon, lat]` derived from one road element.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadPolygon {
    pub element_id: String,
    pub source: RoadSource,
    pub polygon: Polygon<f64>,
}

/// Union of every road polygon of a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedRoadRegion(MultiPolygon<f64>);

impl CombinedRoadRegion {
    pub fn from_multi(polygons: MultiPolygon<f64>) -> Self {
        Self(polygons)
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.0
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.0.contains(&Point::from(point.to_coord()))
    }
}

#[derive(Debug, Default)]
pub struct RoadGeometry {
    pub polygons: Vec<RoadPolygon>,
    pub region: Option<CombinedRoadRegion>,
    pub skipped: Vec<(String, GeometryError)>,
}

/// Buildings, road areas and road ways of a fetch result.
#[derive(Debug, Default)]
pub struct Classified<'a> {
    pub buildings: Vec<&'a OsmElement>,
    pub road_areas: Vec<&'a OsmElement>,
    pub road_ways: Vec<&'a OsmElement>,
}

pub fn classify(elements: &[OsmElement]) -> Classified<'_> {
    let mut classified = Classified::default();
    for element in elements {
        if element.is_building() {
            classified.buildings.push(element);
        }
        if element.is_road_area() {
            classified.road_areas.push(element);
        } else if element.is_road_way() {
            classified.road_ways.push(element);
        }
    }
    classified
}

/// Returns the ring with its first point repeated at the end if it was open.
pub fn close_ring(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut ring = points.to_vec();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last())
        && first != *last
    {
        ring.push(first);
    }
    ring
}

pub fn build_road_geometry(classified: &Classified<'_>, frame: &LocalFrame) -> RoadGeometry {
    let mut geometry = RoadGeometry::default();

    for element in &classified.road_areas {
        match road_area_polygon(element) {
            Ok(polygon) => geometry.polygons.push(RoadPolygon {
                element_id: element.id.clone(),
                source: RoadSource::Area,
                polygon,
            }),
            Err(err) => {
                tracing::warn!(id = %element.id, %err, "skipping road area");
                geometry.skipped.push((element.id.clone(), err));
            }
        }
    }

    for element in &classified.road_ways {
        let class = RoadClass::from_tag(element.tag("highway").unwrap_or_default());
        let points: Vec<GeoPoint> = element
            .geometry
            .iter()
            .copied()
            .filter(GeoPoint::is_finite)
            .collect();
        if points.len() < 2 {
            tracing::debug!(id = %element.id, "road way has fewer than 2 valid points");
            continue;
        }
        match buffer_line(&points, class.buffer_m(), frame) {
            Ok(buffered) => {
                geometry
                    .polygons
                    .extend(buffered.into_iter().map(|polygon| RoadPolygon {
                        element_id: element.id.clone(),
                        source: RoadSource::Way(class),
                        polygon,
                    }))
            }
            Err(err) => {
                tracing::warn!(id = %element.id, %err, "skipping road way buffer");
                geometry.skipped.push((element.id.clone(), err));
            }
        }
    }

    let (region, failed) = union_all(&geometry.polygons);
    geometry.skipped.extend(failed);
    geometry.region = region;
    tracing::info!(
        polygons = geometry.polygons.len(),
        skipped = geometry.skipped.len(),
        parts = geometry.region.as_ref().map(|r| r.0.0.len()).unwrap_or(0),
        "built road region"
    );
    geometry
}

fn road_area_polygon(element: &OsmElement) -> Result<Polygon<f64>, GeometryError> {
    if element.geometry.iter().any(|p| !p.is_finite()) {
        return Err(GeometryError::NonFinite { op: "road area" });
    }
    let ring = close_ring(&element.geometry);
    // three distinct vertices plus the closing point
    if ring.len() < 4 {
        return Err(GeometryError::Degenerate { what: "road area ring" });
    }
    let exterior: LineString<f64> = ring.iter().map(|p| p.to_coord()).collect();
    Ok(Polygon::new(exterior, vec![]))
}

/// Buffers a polyline by `radius_m` metres with round caps and joins.
pub fn buffer_line(
    points: &[GeoPoint],
    radius_m: f64,
    frame: &LocalFrame,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let local: Vec<Coord<f64>> = points.iter().map(|p| frame.to_local(p.to_coord())).collect();
    let mut buffered = MultiPolygon::new(vec![]);
    let mut segments = 0;
    for pair in local.windows(2) {
        let Some(capsule) = segment_capsule(pair[0], pair[1], radius_m) else {
            continue;
        };
        buffered = boolean::union(&buffered, &capsule)?;
        segments += 1;
    }
    if segments == 0 {
        return Err(GeometryError::Degenerate { what: "road line" });
    }
    Ok(MultiPolygon::new(
        buffered.iter().map(|p| frame.polygon_to_geo(p)).collect(),
    ))
}

fn segment_capsule(a: Coord<f64>, b: Coord<f64>, radius: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    if len < 1e-9 || radius <= 0.0 {
        return None;
    }
    // left normal of a -> b
    let normal_angle = (dx / len).atan2(-dy / len);
    let mut ring = Vec::with_capacity(2 * CAP_SEGMENTS + 3);
    // right side forward, round the far end, left side back, round the near end
    for i in 0..=CAP_SEGMENTS {
        let t = normal_angle - PI + PI * i as f64 / CAP_SEGMENTS as f64;
        ring.push(Coord {
            x: b.x + radius * t.cos(),
            y: b.y + radius * t.sin(),
        });
    }
    for i in 0..=CAP_SEGMENTS {
        let t = normal_angle + PI * i as f64 / CAP_SEGMENTS as f64;
        ring.push(Coord {
            x: a.x + radius * t.cos(),
            y: a.y + radius * t.sin(),
        });
    }
    Some(Polygon::new(LineString::from(ring), vec![]))
}

fn union_all(
    polygons: &[RoadPolygon],
) -> (Option<CombinedRoadRegion>, Vec<(String, GeometryError)>) {
    let mut failed = Vec::new();
    let mut acc: Option<MultiPolygon<f64>> = None;
    for road in polygons {
        let next = match &acc {
            None => boolean::union(&MultiPolygon::new(vec![]), &road.polygon),
            Some(current) => boolean::union(current, &road.polygon),
        };
        match next {
            Ok(merged) => acc = Some(merged),
            Err(err) => {
                tracing::warn!(id = %road.element_id, %err, "dropping road polygon from union");
                failed.push((road.element_id.clone(), err));
            }
        }
    }
    let region = acc
        .filter(|multi| !multi.0.is_empty())
        .map(CombinedRoadRegion);
    (region, failed)
}
