use geo::{MultiPolygon, Polygon};
use serde::Serialize;

use crate::boolean;
use crate::buildings::BuildingCenter;
use crate::projection::LocalFrame;
use crate::roads::CombinedRoadRegion;
use crate::types::{GeoPoint, Tags};
use crate::voronoi::Tessellation;

/// How a parcel's geometry was derived from its Voronoi cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipOutcome {
    /// No road region in the pass.
    Unclipped,
    /// The difference left a single polygon.
    Clipped,
    /// The difference split the cell; the largest of `parts` was kept.
    Largest { parts: usize },
    /// The difference failed and the raw cell was kept.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedParcel {
    pub id: String,
    pub building_id: String,
    pub geometry: Polygon<f64>,
    pub area_m2: f64,
    pub tags: Tags,
    pub outcome: ClipOutcome,
}

impl GeneratedParcel {
    /// Closed rings of the parcel, exterior first and then one per hole.
    pub fn rings(&self) -> Vec<Vec<GeoPoint>> {
        std::iter::once(self.geometry.exterior())
            .chain(self.geometry.interiors())
            .map(|ring| ring.coords().map(|c| GeoPoint::from_coord(*c)).collect())
            .collect()
    }
}

/// Component with the largest area; `None` for an empty collection.
pub fn largest_component(
    polygons: MultiPolygon<f64>,
    frame: &LocalFrame,
) -> Option<Polygon<f64>> {
    polygons
        .into_iter()
        .map(|polygon| (frame.area_m2(&polygon), polygon))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, polygon)| polygon)
}

/// Subtracts the road region from each building's cell.
///
/// `buildings[i]` is paired with `tessellation.cell(i)`; buildings without a
/// valid cell and parcels with no remaining area are dropped.
pub fn clip_parcels(
    buildings: &[BuildingCenter],
    tessellation: &Tessellation,
    region: Option<&CombinedRoadRegion>,
    frame: &LocalFrame,
) -> Vec<GeneratedParcel> {
    let mut parcels = Vec::with_capacity(buildings.len());
    for (index, building) in buildings.iter().enumerate() {
        let Some(cell) = tessellation.cell(index) else {
            tracing::debug!(id = %building.id, "no valid cell for building");
            continue;
        };
        let Some((geometry, outcome)) = clip_cell(&building.id, cell, region, frame) else {
            continue;
        };
        let area_m2 = frame.area_m2(&geometry);
        if area_m2.is_nan() || area_m2 <= 0.0 {
            tracing::debug!(id = %building.id, area_m2, "dropping parcel without area");
            continue;
        }
        parcels.push(GeneratedParcel {
            id: building.id.clone(),
            building_id: building.id.clone(),
            geometry,
            area_m2,
            tags: building.tags.clone(),
            outcome,
        });
    }
    tracing::info!(parcels = parcels.len(), buildings = buildings.len(), "clipped parcels");
    parcels
}

fn clip_cell(
    id: &str,
    cell: &Polygon<f64>,
    region: Option<&CombinedRoadRegion>,
    frame: &LocalFrame,
) -> Option<(Polygon<f64>, ClipOutcome)> {
    let Some(region) = region else {
        return Some((cell.clone(), ClipOutcome::Unclipped));
    };
    match boolean::difference(cell, region.polygons()) {
        Ok(remaining) => match remaining.0.len() {
            0 => {
                tracing::debug!(id, "cell fully covered by road region");
                None
            }
            1 => remaining
                .into_iter()
                .next()
                .map(|polygon| (polygon, ClipOutcome::Clipped)),
            parts => largest_component(remaining, frame)
                .map(|polygon| (polygon, ClipOutcome::Largest { parts })),
        },
        Err(err) => {
            tracing::warn!(id, %err, "cell difference failed, keeping unclipped cell");
            Some((cell.clone(), ClipOutcome::Fallback))
        }
    }
}
