use serde::{Deserialize, Serialize};

use crate::buildings::BuildingCenter;
use crate::parcels::GeneratedParcel;
use crate::projection::LocalFrame;
use crate::types::{GeoPoint, Tags};

pub const DEFAULT_COLOR: &str = "#3388ff";
pub const SELECTED_COLOR: &str = "#ff3388";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// At most one actively highlighted id.
    #[default]
    Single,
    /// Ordered, duplicate-free list used by the proposal flow.
    Multi,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PolygonStyle {
    pub color: &'static str,
    pub fill_color: &'static str,
    pub fill_opacity: f64,
}

impl PolygonStyle {
    pub const DEFAULT: Self = Self {
        color: DEFAULT_COLOR,
        fill_color: DEFAULT_COLOR,
        fill_opacity: 0.2,
    };

    pub const SELECTED: Self = Self {
        color: SELECTED_COLOR,
        fill_color: SELECTED_COLOR,
        fill_opacity: 0.4,
    };

    pub fn for_selected(selected: bool) -> Self {
        if selected {
            Self::SELECTED
        } else {
            Self::DEFAULT
        }
    }
}

/// Projection of a building and its parcel handed to the selection callback.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildingDetails {
    pub id: String,
    pub name: Option<String>,
    pub tags: Tags,
    pub center: GeoPoint,
    pub building_area_m2: f64,
    pub parcel_id: Option<String>,
    pub parcel_area_m2: Option<f64>,
}

impl BuildingDetails {
    pub fn new(
        building: &BuildingCenter,
        parcel: Option<&GeneratedParcel>,
        frame: &LocalFrame,
    ) -> Self {
        Self {
            id: building.id.clone(),
            name: display_name(&building.tags),
            tags: building.tags.clone(),
            center: building.center,
            building_area_m2: building.footprint_area_m2(frame),
            parcel_id: parcel.map(|p| p.id.clone()),
            parcel_area_m2: parcel.map(|p| p.area_m2),
        }
    }
}

fn display_name(tags: &Tags) -> Option<String> {
    if let Some(name) = tags.get("name") {
        return Some(name.clone());
    }
    match (tags.get("addr:street"), tags.get("addr:housenumber")) {
        (Some(street), Some(number)) => Some(format!("{street} {number}")),
        (Some(street), None) => Some(street.clone()),
        _ => None,
    }
}

/// Payload of the selection callback: details on select, `None` on deselect.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectionEvent {
    pub parcel_id: String,
    pub details: Option<BuildingDetails>,
}

/// Outcome of a single toggle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionChange {
    pub id: String,
    pub selected: bool,
    /// Id implicitly deselected to keep a single active highlight.
    pub released: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    mode: SelectionMode,
    ids: Vec<String>,
}

impl Selection {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ids: Vec::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Selected ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn active(&self) -> Option<&str> {
        match self.mode {
            SelectionMode::Single => self.ids.first().map(String::as_str),
            SelectionMode::Multi => self.ids.last().map(String::as_str),
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn toggle(&mut self, id: &str) -> SelectionChange {
        if let Some(pos) = self.ids.iter().position(|s| s == id) {
            self.ids.remove(pos);
            return SelectionChange {
                id: id.to_string(),
                selected: false,
                released: None,
            };
        }
        let released = match self.mode {
            SelectionMode::Single => self.ids.pop(),
            SelectionMode::Multi => None,
        };
        self.ids.push(id.to_string());
        SelectionChange {
            id: id.to_string(),
            selected: true,
            released,
        }
    }

    /// Empties the selection, returning what was selected.
    pub fn clear(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ids)
    }

    /// Switching modes keeps only the most recent id when narrowing to single.
    pub fn set_mode(&mut self, mode: SelectionMode) -> Vec<String> {
        self.mode = mode;
        if mode == SelectionMode::Single && self.ids.len() > 1 {
            let keep = self.ids.split_off(self.ids.len() - 1);
            return std::mem::replace(&mut self.ids, keep);
        }
        Vec::new()
    }
}
