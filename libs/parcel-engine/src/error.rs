use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("geodata fetch failed: {0}")]
    #[diagnostic(help("check the Overpass endpoint and try again"))]
    Fetch(String),
    #[error("geodata fetch failed: HTTP {status}: {snippet}")]
    FetchStatus { status: u16, snippet: String },
    #[error("malformed geodata response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("config error: {0}")]
    Config(String),
    #[error("toml parsing failed")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("contract call {call} failed: {reason}")]
    Contract { call: &'static str, reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Fetch(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid bounding box: south {south} north {north} west {west} east {east}")]
    InvalidBoundingBox {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
    #[error("insufficient buildings: {found} in view, at least 2 required")]
    InsufficientBuildings { found: usize },
    #[error("insufficient unique points: {found} after dedup, at least 2 required")]
    InsufficientUniquePoints { found: usize },
    #[error("empty parcel selection")]
    EmptySelection,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{op} received non-finite coordinates")]
    NonFinite { op: &'static str },
    #[error("{op} panicked inside the geometry kernel: {message}")]
    Kernel { op: &'static str, message: String },
    #[error("degenerate {what}")]
    Degenerate { what: &'static str },
}

const SNIPPET_LEN: usize = 256;

/// Truncates a response body for inclusion in an error message.
pub(crate) fn snippet(body: String) -> String {
    if body.len() <= SNIPPET_LEN {
        return body;
    }
    let mut end = SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl Error {
    /// Pass-level errors abort an analysis; everything else is per-feature.
    pub fn is_pass_level(&self) -> bool {
        !matches!(self, Error::Geometry(_))
    }
}
