//! Boolean polygon operations with per-feature failure reporting.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{BooleanOps, CoordsIter, MultiPolygon, Polygon};

use crate::error::GeometryError;

pub fn union(
    acc: &MultiPolygon<f64>,
    polygon: &Polygon<f64>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    ensure_finite("union", acc.coords_iter())?;
    ensure_finite("union", polygon.coords_iter())?;
    guarded("union", || acc.union(polygon))
}

pub fn difference(
    polygon: &Polygon<f64>,
    cut: &MultiPolygon<f64>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    ensure_finite("difference", polygon.coords_iter())?;
    ensure_finite("difference", cut.coords_iter())?;
    guarded("difference", || polygon.difference(cut))
}

fn ensure_finite(
    op: &'static str,
    mut coords: impl Iterator<Item = geo::Coord<f64>>,
) -> Result<(), GeometryError> {
    if coords.all(|c| c.x.is_finite() && c.y.is_finite()) {
        Ok(())
    } else {
        Err(GeometryError::NonFinite { op })
    }
}

// The sweep-line kernel asserts on some degenerate inputs; a single bad
// feature must not take the whole pass down with it.
fn guarded<T>(op: &'static str, f: impl FnOnce() -> T) -> Result<T, GeometryError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        GeometryError::Kernel { op, message }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Area, polygon};

    #[test]
    fn test_difference_splits_square() {
        let cell = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let strip = MultiPolygon::new(vec![polygon![
            (x: 4.0, y: -1.0),
            (x: 6.0, y: -1.0),
            (x: 6.0, y: 11.0),
            (x: 4.0, y: 11.0),
        ]]);
        let result = difference(&cell, &strip).unwrap();
        assert_eq!(result.0.len(), 2);
        assert_relative_eq!(result.unsigned_area(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_rejects_nan() {
        let good = MultiPolygon::new(vec![]);
        let bad = polygon![
            (x: 0.0, y: 0.0),
            (x: f64::NAN, y: 0.0),
            (x: 1.0, y: 1.0),
        ];
        assert_eq!(
            union(&good, &bad),
            Err(GeometryError::NonFinite { op: "union" })
        );
    }

    #[test]
    fn test_guarded_catches_panic() {
        let err = guarded("union", || -> u8 { panic!("sweep invariant") }).unwrap_err();
        assert_eq!(
            err,
            GeometryError::Kernel {
                op: "union",
                message: "sweep invariant".to_string()
            }
        );
    }
}
