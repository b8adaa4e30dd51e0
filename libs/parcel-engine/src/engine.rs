//! Analysis state machine.
//!
//! A pass moves `Idle → Fetching → Classifying → Tessellating → Clipping →
//! Rendered`, or ends in `Failed`. Every pass produces a fresh
//! [`AnalysisPass`] generation; nothing from the previous one survives a new
//! run. The engine owns its [`MapSurface`] and releases every drawn polygon
//! when a pass starts and when the engine is dropped.

use serde::Serialize;

use crate::buildings::{BuildingCenter, filter_buildings};
use crate::error::{Error, GeometryError};
use crate::overlay::{Layer, MapSurface, Overlay};
use crate::overpass::GeodataSource;
use crate::parcels::{GeneratedParcel, clip_parcels};
use crate::projection::LocalFrame;
use crate::roads::{CombinedRoadRegion, build_road_geometry, classify, close_ring};
use crate::selection::{BuildingDetails, PolygonStyle, Selection, SelectionEvent, SelectionMode};
use crate::types::BoundingBox;
use crate::voronoi::tessellate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    #[default]
    Idle,
    Fetching,
    Classifying,
    Tessellating,
    Clipping,
    Rendered,
    Failed,
}

impl AnalysisState {
    /// True while a pass is in flight; the trigger must stay disabled.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            AnalysisState::Fetching
                | AnalysisState::Classifying
                | AnalysisState::Tessellating
                | AnalysisState::Clipping
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    State(AnalysisState),
    Selection(SelectionEvent),
}

/// Everything one analysis run produced.
#[derive(Debug)]
pub struct AnalysisPass {
    pub generation: u64,
    pub bbox: BoundingBox,
    pub frame: LocalFrame,
    pub element_count: usize,
    pub road_polygon_count: usize,
    pub road_region: Option<CombinedRoadRegion>,
    pub buildings: Vec<BuildingCenter>,
    pub parcels: Vec<GeneratedParcel>,
    pub skipped: Vec<(String, GeometryError)>,
}

impl AnalysisPass {
    pub fn parcel(&self, id: &str) -> Option<&GeneratedParcel> {
        self.parcels.iter().find(|p| p.id == id)
    }

    pub fn building(&self, id: &str) -> Option<&BuildingCenter> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn details(&self, id: &str) -> Option<BuildingDetails> {
        let building = self.building(id)?;
        Some(BuildingDetails::new(building, self.parcel(id), &self.frame))
    }

    pub fn total_parcel_area_m2(&self) -> f64 {
        self.parcels.iter().map(|p| p.area_m2).sum()
    }
}

#[derive(Default)]
struct Status {
    state: AnalysisState,
    subscribers: Vec<flume::Sender<EngineEvent>>,
}

impl Status {
    fn set(&mut self, state: AnalysisState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "analysis state");
        self.state = state;
        self.broadcast(EngineEvent::State(state));
    }

    fn broadcast(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Holds the engine busy for the length of a pass.
///
/// If the pass future is dropped before it completes, the state falls back
/// to `Idle`.
struct BusyGuard<'a> {
    status: &'a mut Status,
    done: bool,
}

impl<'a> BusyGuard<'a> {
    fn new(status: &'a mut Status) -> Self {
        status.set(AnalysisState::Fetching);
        Self {
            status,
            done: false,
        }
    }

    fn advance(&mut self, state: AnalysisState) {
        self.status.set(state);
    }

    fn complete(mut self, state: AnalysisState) {
        self.done = true;
        self.status.set(state);
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!(state = ?self.status.state, "analysis pass abandoned");
            self.status.set(AnalysisState::Idle);
        }
    }
}

pub struct ParcelEngine<S, M: MapSurface> {
    source: S,
    surface: M,
    overlay: Overlay<M::Handle>,
    selection: Selection,
    status: Status,
    generation: u64,
    pass: Option<AnalysisPass>,
}

impl<S: GeodataSource, M: MapSurface> ParcelEngine<S, M> {
    pub fn new(source: S, surface: M) -> Self {
        Self {
            source,
            surface,
            overlay: Overlay::new(),
            selection: Selection::default(),
            status: Status::default(),
            generation: 0,
            pass: None,
        }
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection = Selection::new(mode);
        self
    }

    /// Runs one full analysis of `bbox`, replacing whatever the previous pass
    /// produced.
    ///
    /// A malformed box is rejected before anything is cleared or fetched.
    /// Pass-level failures leave the engine `Failed` with no overlays drawn.
    pub async fn analyze_area(&mut self, bbox: BoundingBox) -> Result<&AnalysisPass, Error> {
        bbox.validate()?;
        self.reset();
        self.generation += 1;
        let generation = self.generation;
        tracing::info!(generation, ?bbox, "starting analysis pass");

        let mut guard = BusyGuard::new(&mut self.status);
        let pass = match run_pass(&self.source, &mut guard, bbox, generation).await {
            Ok(pass) => pass,
            Err(err) => {
                tracing::error!(generation, %err, "analysis pass failed");
                guard.complete(AnalysisState::Failed);
                return Err(err);
            }
        };
        render(&mut self.surface, &mut self.overlay, &pass);
        guard.complete(AnalysisState::Rendered);
        tracing::info!(
            generation,
            parcels = pass.parcels.len(),
            buildings = pass.buildings.len(),
            skipped = pass.skipped.len(),
            "analysis pass rendered"
        );
        Ok(&*self.pass.insert(pass))
    }

    /// Toggles the id behind a clicked polygon on `layer`.
    ///
    /// Returns `None` when nothing is drawn there; otherwise the event carries
    /// building details on select and `None` details on deselect.
    pub fn click(&mut self, layer: Layer, id: &str) -> Option<SelectionEvent> {
        let pass = self.pass.as_ref()?;
        if !self.overlay.contains(layer, id) {
            tracing::debug!(?layer, id, "click on unknown polygon");
            return None;
        }
        let change = self.selection.toggle(id);
        if let Some(released) = &change.released {
            paint(&mut self.surface, &self.overlay, released, false);
        }
        paint(&mut self.surface, &self.overlay, id, change.selected);

        let details = if change.selected {
            pass.details(id)
        } else {
            None
        };
        let event = SelectionEvent {
            parcel_id: id.to_string(),
            details,
        };
        self.status.broadcast(EngineEvent::Selection(event.clone()));
        Some(event)
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        for id in self.selection.set_mode(mode) {
            paint(&mut self.surface, &self.overlay, &id, false);
        }
    }

    /// Clears selection, overlays and the current pass.
    pub fn reset(&mut self) {
        let deselected = self.selection.clear();
        let released = self.overlay.teardown(&mut self.surface);
        if let Some(pass) = self.pass.take() {
            tracing::debug!(
                generation = pass.generation,
                released,
                deselected = deselected.len(),
                "discarded analysis pass"
            );
        }
        self.status.set(AnalysisState::Idle);
    }

    /// Receives state transitions and selection events from now on.
    pub fn subscribe(&mut self) -> flume::Receiver<EngineEvent> {
        let (tx, rx) = flume::unbounded();
        self.status.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> AnalysisState {
        self.status.state
    }

    pub fn is_busy(&self) -> bool {
        self.status.state.is_busy()
    }

    pub fn pass(&self) -> Option<&AnalysisPass> {
        self.pass.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S, M: MapSurface> Drop for ParcelEngine<S, M> {
    fn drop(&mut self) {
        let released = self.overlay.teardown(&mut self.surface);
        if released > 0 {
            tracing::debug!(released, "released overlays on drop");
        }
    }
}

async fn run_pass<S: GeodataSource>(
    source: &S,
    guard: &mut BusyGuard<'_>,
    bbox: BoundingBox,
    generation: u64,
) -> Result<AnalysisPass, Error> {
    let elements = source.fetch(&bbox).await?;
    tracing::info!(generation, elements = elements.len(), "fetched geodata");

    guard.advance(AnalysisState::Classifying);
    let frame = LocalFrame::new(bbox.center());
    let classified = classify(&elements);
    tracing::debug!(
        buildings = classified.buildings.len(),
        road_areas = classified.road_areas.len(),
        road_ways = classified.road_ways.len(),
        "classified elements"
    );
    let roads = build_road_geometry(&classified, &frame);
    let buildings = filter_buildings(&classified.buildings, roads.region.as_ref())?;

    guard.advance(AnalysisState::Tessellating);
    let sites: Vec<_> = buildings.iter().map(|b| b.center.to_coord()).collect();
    let tessellation = tessellate(&sites, bbox.extent())?;
    tracing::debug!(
        cells = tessellation.valid_cells(),
        sites = tessellation.unique_sites(),
        "tessellated"
    );

    guard.advance(AnalysisState::Clipping);
    let parcels = clip_parcels(&buildings, &tessellation, roads.region.as_ref(), &frame);

    Ok(AnalysisPass {
        generation,
        bbox,
        frame,
        element_count: elements.len(),
        road_polygon_count: roads.polygons.len(),
        road_region: roads.region,
        buildings,
        parcels,
        skipped: roads.skipped,
    })
}

fn render<M: MapSurface>(
    surface: &mut M,
    overlay: &mut Overlay<M::Handle>,
    pass: &AnalysisPass,
) {
    for building in &pass.buildings {
        if building.geometry.len() < 3 {
            continue;
        }
        let rings = [close_ring(&building.geometry)];
        overlay.draw(surface, Layer::Buildings, &building.id, &rings, PolygonStyle::DEFAULT);
    }
    for parcel in &pass.parcels {
        let rings = parcel.rings();
        overlay.draw(surface, Layer::Parcels, &parcel.id, &rings, PolygonStyle::DEFAULT);
    }
}

fn paint<M: MapSurface>(
    surface: &mut M,
    overlay: &Overlay<M::Handle>,
    id: &str,
    selected: bool,
) {
    let style = PolygonStyle::for_selected(selected);
    for layer in [Layer::Buildings, Layer::Parcels] {
        overlay.restyle(surface, layer, id, style);
    }
}
