//! Drawn polygons and the surface they live on.
//!
//! The engine never holds a map-library object directly. Every handle a
//! [`MapSurface`] hands back is stored in an [`Overlay`] keyed by layer and
//! id, and [`Overlay::teardown`] is the only way handles are released in bulk.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::selection::PolygonStyle;
use crate::types::GeoPoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Buildings,
    Parcels,
}

/// Rendering backend the engine draws onto.
pub trait MapSurface {
    type Handle;

    /// `rings` holds closed rings, the exterior first and any holes after it.
    fn draw_polygon(
        &mut self,
        layer: Layer,
        id: &str,
        rings: &[Vec<GeoPoint>],
        style: PolygonStyle,
    ) -> Self::Handle;

    fn restyle(&mut self, handle: &Self::Handle, style: PolygonStyle);

    fn remove(&mut self, handle: Self::Handle);
}

#[derive(Debug)]
pub struct Overlay<H> {
    handles: BTreeMap<(Layer, String), H>,
}

impl<H> Default for Overlay<H> {
    fn default() -> Self {
        Self {
            handles: BTreeMap::new(),
        }
    }
}

impl<H> Overlay<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws `rings`, releasing any polygon already drawn under the same key.
    pub fn draw<S>(
        &mut self,
        surface: &mut S,
        layer: Layer,
        id: &str,
        rings: &[Vec<GeoPoint>],
        style: PolygonStyle,
    ) where
        S: MapSurface<Handle = H>,
    {
        let handle = surface.draw_polygon(layer, id, rings, style);
        if let Some(previous) = self.handles.insert((layer, id.to_string()), handle) {
            surface.remove(previous);
        }
    }

    /// Returns false when nothing is drawn under `(layer, id)`.
    pub fn restyle<S>(&self, surface: &mut S, layer: Layer, id: &str, style: PolygonStyle) -> bool
    where
        S: MapSurface<Handle = H>,
    {
        match self.handles.get(&(layer, id.to_string())) {
            Some(handle) => {
                surface.restyle(handle, style);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, layer: Layer, id: &str) -> bool {
        self.handles.contains_key(&(layer, id.to_string()))
    }

    pub fn ids(&self, layer: Layer) -> impl Iterator<Item = &str> {
        self.handles
            .keys()
            .filter(move |(l, _)| *l == layer)
            .map(|(_, id)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Removes every drawn polygon from `surface`, returning how many were released.
    pub fn teardown<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface<Handle = H>,
    {
        let handles = std::mem::take(&mut self.handles);
        let released = handles.len();
        for handle in handles.into_values() {
            surface.remove(handle);
        }
        released
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawnPolygon {
    pub layer: Layer,
    pub id: String,
    pub rings: Vec<Vec<GeoPoint>>,
    pub style: PolygonStyle,
}

/// In-memory surface for the CLI and tests.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_handle: u64,
    polygons: BTreeMap<u64, DrawnPolygon>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polygons(&self) -> impl Iterator<Item = &DrawnPolygon> {
        self.polygons.values()
    }

    pub fn find(&self, layer: Layer, id: &str) -> Option<&DrawnPolygon> {
        self.polygons
            .values()
            .find(|p| p.layer == layer && p.id == id)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

impl MapSurface for HeadlessSurface {
    type Handle = u64;

    fn draw_polygon(
        &mut self,
        layer: Layer,
        id: &str,
        rings: &[Vec<GeoPoint>],
        style: PolygonStyle,
    ) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.polygons.insert(
            handle,
            DrawnPolygon {
                layer,
                id: id.to_string(),
                rings: rings.to_vec(),
                style,
            },
        );
        handle
    }

    fn restyle(&mut self, handle: &u64, style: PolygonStyle) {
        if let Some(polygon) = self.polygons.get_mut(handle) {
            polygon.style = style;
        }
    }

    fn remove(&mut self, handle: u64) {
        self.polygons.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> Vec<Vec<GeoPoint>> {
        vec![vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(0.0, 0.0),
        ]]
    }

    #[test]
    fn test_redraw_replaces_handle() {
        let mut surface = HeadlessSurface::new();
        let mut overlay = Overlay::new();
        overlay.draw(&mut surface, Layer::Parcels, "a", &ring(), PolygonStyle::DEFAULT);
        overlay.draw(&mut surface, Layer::Parcels, "a", &ring(), PolygonStyle::DEFAULT);
        assert_eq!(overlay.len(), 1);
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn test_restyle_by_id() {
        let mut surface = HeadlessSurface::new();
        let mut overlay = Overlay::new();
        overlay.draw(&mut surface, Layer::Buildings, "a", &ring(), PolygonStyle::DEFAULT);
        assert!(overlay.restyle(&mut surface, Layer::Buildings, "a", PolygonStyle::SELECTED));
        assert!(!overlay.restyle(&mut surface, Layer::Parcels, "a", PolygonStyle::SELECTED));
        let drawn = surface.find(Layer::Buildings, "a").unwrap();
        assert_eq!(drawn.style, PolygonStyle::SELECTED);
    }

    #[test]
    fn test_holes_are_drawn() {
        let mut surface = HeadlessSurface::new();
        let mut overlay = Overlay::new();
        let hole = vec![
            GeoPoint::new(0.2, 0.5),
            GeoPoint::new(0.2, 0.6),
            GeoPoint::new(0.3, 0.6),
            GeoPoint::new(0.2, 0.5),
        ];
        let mut rings = ring();
        rings.push(hole.clone());
        overlay.draw(&mut surface, Layer::Parcels, "a", &rings, PolygonStyle::DEFAULT);
        let drawn = surface.find(Layer::Parcels, "a").unwrap();
        assert_eq!(drawn.rings.len(), 2);
        assert_eq!(drawn.rings[1], hole);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut surface = HeadlessSurface::new();
        let mut overlay = Overlay::new();
        for id in ["a", "b", "c"] {
            overlay.draw(&mut surface, Layer::Parcels, id, &ring(), PolygonStyle::DEFAULT);
            overlay.draw(&mut surface, Layer::Buildings, id, &ring(), PolygonStyle::DEFAULT);
        }
        assert_eq!(overlay.ids(Layer::Parcels).collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(overlay.teardown(&mut surface), 6);
        assert!(overlay.is_empty());
        assert!(surface.is_empty());
    }
}
