//! Bounded planar Voronoi tessellation.
//!
//! Each cell is the viewport rectangle clipped by the bisector half-planes of
//! the site's Delaunay neighbours. When the sites are all collinear the
//! triangulation has no faces and every other site is used instead.

use std::collections::HashMap;

use geo::{Coord, LineString, Polygon};
use spade::handles::FixedVertexHandle;
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::error::ValidationError;

#[derive(Debug, Default)]
pub struct Tessellation {
    cells: Vec<Option<Polygon<f64>>>,
    unique_sites: usize,
}

impl Tessellation {
    /// Cell of the `index`-th input point, if it produced a valid one.
    pub fn cell(&self, index: usize) -> Option<&Polygon<f64>> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn valid_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn unique_sites(&self) -> usize {
        self.unique_sites
    }
}

/// Tessellates `points` (`[lon, lat]`) inside `extent` (`[west, south, east, north]`).
///
/// Exact duplicate points are collapsed before construction; the first input
/// index at a position owns the cell and later duplicates get none.
pub fn tessellate(
    points: &[Coord<f64>],
    extent: [f64; 4],
) -> Result<Tessellation, ValidationError> {
    let mut unique: Vec<Coord<f64>> = Vec::with_capacity(points.len());
    let mut site_of: Vec<Option<usize>> = Vec::with_capacity(points.len());
    let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let key = (normalized_bits(point.x), normalized_bits(point.y));
        if seen.contains_key(&key) {
            tracing::debug!(index, "duplicate tessellation site");
            site_of.push(None);
            continue;
        }
        seen.insert(key, unique.len());
        site_of.push(Some(unique.len()));
        unique.push(*point);
    }
    if unique.len() < 2 {
        return Err(ValidationError::InsufficientUniquePoints {
            found: unique.len(),
        });
    }

    let neighbors = delaunay_neighbors(&unique).unwrap_or_else(|| {
        tracing::debug!("degenerate triangulation, clipping against every site");
        (0..unique.len())
            .map(|i| (0..unique.len()).filter(|&j| j != i).collect())
            .collect()
    });

    let [west, south, east, north] = extent;
    let bounds = vec![
        Coord { x: west, y: south },
        Coord { x: east, y: south },
        Coord { x: east, y: north },
        Coord { x: west, y: north },
    ];
    let site_cells: Vec<Option<Polygon<f64>>> = unique
        .iter()
        .enumerate()
        .map(|(i, site)| {
            let mut cell = bounds.clone();
            for &j in &neighbors[i] {
                cell = clip_half_plane(&cell, *site, unique[j]);
                if cell.is_empty() {
                    break;
                }
            }
            close_cell(cell)
        })
        .collect();

    let cells = site_of
        .iter()
        .map(|site| site.and_then(|s| site_cells[s].clone()))
        .collect();
    Ok(Tessellation {
        cells,
        unique_sites: unique.len(),
    })
}

fn normalized_bits(v: f64) -> u64 {
    // 0.0 and -0.0 compare equal
    if v == 0.0 { 0 } else { v.to_bits() }
}

fn delaunay_neighbors(sites: &[Coord<f64>]) -> Option<Vec<Vec<usize>>> {
    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let mut index_of: HashMap<FixedVertexHandle, usize> = HashMap::with_capacity(sites.len());
    for (i, site) in sites.iter().enumerate() {
        let handle = match triangulation.insert(Point2::new(site.x, site.y)) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(?err, "delaunay insertion failed");
                return None;
            }
        };
        index_of.insert(handle, i);
    }
    if triangulation.num_inner_faces() == 0 {
        return None;
    }
    let mut neighbors = vec![Vec::new(); sites.len()];
    for vertex in triangulation.vertices() {
        let Some(&i) = index_of.get(&vertex.fix()) else {
            continue;
        };
        neighbors[i] = vertex
            .out_edges()
            .filter_map(|edge| index_of.get(&edge.to().fix()).copied())
            .collect();
    }
    Some(neighbors)
}

/// Keeps the part of convex `polygon` closer to `site` than to `other`.
fn clip_half_plane(
    polygon: &[Coord<f64>],
    site: Coord<f64>,
    other: Coord<f64>,
) -> Vec<Coord<f64>> {
    let mid = Coord {
        x: (site.x + other.x) * 0.5,
        y: (site.y + other.y) * 0.5,
    };
    let dir = Coord {
        x: other.x - site.x,
        y: other.y - site.y,
    };
    let side = |p: Coord<f64>| (p.x - mid.x) * dir.x + (p.y - mid.y) * dir.y;

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (k, &current) in polygon.iter().enumerate() {
        let next = polygon[(k + 1) % polygon.len()];
        let sc = side(current);
        let sn = side(next);
        if sc <= 0.0 {
            out.push(current);
        }
        if (sc < 0.0 && sn > 0.0) || (sc > 0.0 && sn < 0.0) {
            let t = sc / (sc - sn);
            out.push(Coord {
                x: current.x + t * (next.x - current.x),
                y: current.y + t * (next.y - current.y),
            });
        }
    }
    out
}

fn close_cell(mut ring: Vec<Coord<f64>>) -> Option<Polygon<f64>> {
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    // three vertices plus the closing point
    if ring.len() < 4 || ring.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return None;
    }
    Some(Polygon::new(LineString::from(ring), vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Area, Contains, Point};

    const UNIT: [f64; 4] = [0.0, 0.0, 1.0, 1.0];

    #[test]
    fn test_two_sites_split_box() {
        let points = [Coord { x: 0.25, y: 0.5 }, Coord { x: 0.75, y: 0.5 }];
        let tess = tessellate(&points, UNIT).unwrap();
        let left = tess.cell(0).unwrap();
        let right = tess.cell(1).unwrap();
        assert_relative_eq!(left.unsigned_area(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(right.unsigned_area(), 0.5, epsilon = 1e-12);
        assert!(left.contains(&Point::new(0.1, 0.9)));
        assert!(right.contains(&Point::new(0.9, 0.1)));
    }

    #[test]
    fn test_cells_cover_box() {
        let points = [
            Coord { x: 0.1, y: 0.2 },
            Coord { x: 0.8, y: 0.3 },
            Coord { x: 0.4, y: 0.9 },
            Coord { x: 0.5, y: 0.5 },
            Coord { x: 0.9, y: 0.9 },
        ];
        let tess = tessellate(&points, UNIT).unwrap();
        assert_eq!(tess.valid_cells(), 5);
        let total: f64 = (0..points.len())
            .map(|i| tess.cell(i).unwrap().unsigned_area())
            .sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        for (i, p) in points.iter().enumerate() {
            assert!(tess.cell(i).unwrap().contains(&Point::from(*p)));
        }
    }

    #[test]
    fn test_collinear_sites() {
        let points = [
            Coord { x: 0.1, y: 0.5 },
            Coord { x: 0.5, y: 0.5 },
            Coord { x: 0.9, y: 0.5 },
        ];
        let tess = tessellate(&points, UNIT).unwrap();
        assert_relative_eq!(tess.cell(0).unwrap().unsigned_area(), 0.3, epsilon = 1e-9);
        assert_relative_eq!(tess.cell(1).unwrap().unsigned_area(), 0.4, epsilon = 1e-9);
        assert_relative_eq!(tess.cell(2).unwrap().unsigned_area(), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicates_collapse() {
        let points = [
            Coord { x: 0.25, y: 0.5 },
            Coord { x: 0.25, y: 0.5 },
            Coord { x: 0.75, y: 0.5 },
        ];
        let tess = tessellate(&points, UNIT).unwrap();
        assert_eq!(tess.unique_sites(), 2);
        assert!(tess.cell(0).is_some());
        assert!(tess.cell(1).is_none());
        assert!(tess.cell(2).is_some());
    }

    #[test]
    fn test_insufficient_unique_points() {
        let points = [Coord { x: 0.5, y: 0.5 }, Coord { x: 0.5, y: 0.5 }];
        let err = tessellate(&points, UNIT).unwrap_err();
        assert_eq!(err, ValidationError::InsufficientUniquePoints { found: 1 });
    }

    #[test]
    fn test_site_outside_box_has_no_cell() {
        let points = [
            Coord { x: 0.5, y: 0.5 },
            Coord { x: 0.6, y: 0.5 },
            Coord { x: 5.0, y: 5.0 },
        ];
        let tess = tessellate(&points, UNIT).unwrap();
        assert!(tess.cell(0).is_some());
        assert!(tess.cell(1).is_some());
        assert!(tess.cell(2).is_none());
    }
}
