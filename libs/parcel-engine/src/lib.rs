pub mod boolean;
pub mod buildings;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod overlay;
pub mod overpass;
pub mod parcels;
pub mod projection;
pub mod roads;
pub mod selection;
pub mod types;
pub mod voronoi;

pub use config::EngineConfig;
pub use engine::*;
pub use error::*;
pub use overlay::{HeadlessSurface, Layer, MapSurface, Overlay};
pub use overpass::{GeodataSource, OverpassClient};
pub use parcels::{ClipOutcome, GeneratedParcel};
pub use selection::*;
pub use types::*;
