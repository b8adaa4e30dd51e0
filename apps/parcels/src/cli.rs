use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, miette};
use parcel_engine::overpass::build_query;
use parcel_engine::{
    AnalysisPass, BoundingBox, ClipOutcome, EngineConfig, GeoPoint, HeadlessSurface, Layer,
    OverpassClient, ParcelEngine, SelectionEvent, SelectionMode,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one analysis pass and print the parcels as JSON
    Analyze(AnalyzeArgs),
    /// Print the Overpass query for a viewport without sending it
    Query(ViewportArgs),
}

#[derive(Args, Debug)]
struct ViewportArgs {
    /// Viewport as south,west,north,east
    #[arg(long, value_parser = parse_bbox, conflicts_with_all = ["center", "zoom"])]
    bbox: Option<BoundingBox>,
    /// Viewport centre as lat,lon; defaults to the configured centre
    #[arg(long, value_parser = parse_point)]
    center: Option<GeoPoint>,
    #[arg(long)]
    zoom: Option<u8>,
}

impl ViewportArgs {
    fn resolve(&self, config: &EngineConfig) -> miette::Result<BoundingBox> {
        if let Some(bbox) = self.bbox {
            return Ok(bbox);
        }
        let center = self.center.unwrap_or(config.initial_center);
        let zoom = self.zoom.unwrap_or(config.initial_zoom);
        Ok(BoundingBox::around(center, zoom).map_err(parcel_engine::Error::from)?)
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    viewport: ViewportArgs,
    /// Parcel id to select after the pass; repeat for several
    #[arg(long = "select", value_name = "ID")]
    select: Vec<String>,
    /// Accumulate selections instead of keeping a single highlight
    #[arg(long)]
    multi: bool,
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    pub async fn run(self) -> miette::Result<()> {
        let config = EngineConfig::load(self.config.as_deref())?;
        match self.command {
            Command::Query(viewport) => {
                let bbox = viewport.resolve(&config)?;
                println!("{}", build_query(&bbox));
                Ok(())
            }
            Command::Analyze(args) => args.run(config).await,
        }
    }
}

impl AnalyzeArgs {
    async fn run(self, config: EngineConfig) -> miette::Result<()> {
        let bbox = self.viewport.resolve(&config)?;
        let mode = if self.multi {
            SelectionMode::Multi
        } else {
            config.selection_mode
        };
        let client = OverpassClient::new(&config)?;
        tracing::info!(url = client.url(), ?bbox, ?mode, "analyzing area");
        let mut engine =
            ParcelEngine::new(client, HeadlessSurface::new()).with_selection_mode(mode);
        engine.analyze_area(bbox).await?;

        let mut events = Vec::with_capacity(self.select.len());
        for id in &self.select {
            match engine.click(Layer::Parcels, id) {
                Some(event) => events.push(event),
                None => tracing::warn!(id, "no parcel drawn with this id"),
            }
        }

        let pass = engine
            .pass()
            .ok_or_else(|| miette!("analysis finished without a pass"))?;
        let report = Report::new(pass, engine.selection().ids(), events);
        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        }
        .into_diagnostic()?;
        println!("{json}");
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generation: u64,
    bbox: BoundingBox,
    elements: usize,
    road_polygons: usize,
    buildings: usize,
    total_area_m2: f64,
    parcels: Vec<ParcelReport<'a>>,
    skipped: Vec<SkippedFeature<'a>>,
    selected: &'a [String],
    events: Vec<SelectionEvent>,
}

#[derive(Serialize)]
struct ParcelReport<'a> {
    id: &'a str,
    area_m2: f64,
    outcome: ClipOutcome,
    rings: Vec<Vec<GeoPoint>>,
}

#[derive(Serialize)]
struct SkippedFeature<'a> {
    id: &'a str,
    reason: String,
}

impl<'a> Report<'a> {
    fn new(pass: &'a AnalysisPass, selected: &'a [String], events: Vec<SelectionEvent>) -> Self {
        Self {
            generation: pass.generation,
            bbox: pass.bbox,
            elements: pass.element_count,
            road_polygons: pass.road_polygon_count,
            buildings: pass.buildings.len(),
            total_area_m2: pass.total_parcel_area_m2(),
            parcels: pass
                .parcels
                .iter()
                .map(|p| ParcelReport {
                    id: &p.id,
                    area_m2: p.area_m2,
                    outcome: p.outcome,
                    rings: p.rings(),
                })
                .collect(),
            skipped: pass
                .skipped
                .iter()
                .map(|(id, err)| SkippedFeature {
                    id,
                    reason: err.to_string(),
                })
                .collect(),
            selected,
            events,
        }
    }
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let values = parse_floats(s)?;
    let [south, west, north, east] = values[..] else {
        return Err(format!("expected south,west,north,east, got {} values", values.len()));
    };
    BoundingBox::new(south, west, north, east).map_err(|err| err.to_string())
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let values = parse_floats(s)?;
    let [lat, lon] = values[..] else {
        return Err(format!("expected lat,lon, got {} values", values.len()));
    };
    let point = GeoPoint::new(lat, lon);
    if !point.is_finite() {
        return Err("coordinates must be finite".to_string());
    }
    Ok(point)
}

fn parse_floats(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|err| format!("invalid number {v:?}: {err}"))
        })
        .collect()
}
