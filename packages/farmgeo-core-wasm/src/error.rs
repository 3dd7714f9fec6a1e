// Error types shared across the crate. Converted to JsValue strings at the wasm boundary.
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Why a geometry could not take part in an equality comparison.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComparisonFailure {
    #[error("feature has no geometry")]
    MissingGeometry,

    #[error("unsupported geometry type {0}")]
    UnsupportedType(&'static str),

    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },
}

/// Raised by the duplicate detector when geometry `index` cannot be compared.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot compare geometry at index {index}: {reason}")]
pub struct GeometryComparisonError {
    pub index: usize,
    pub reason: ComparisonFailure,
}

/// Failures while turning an uploaded file into a feature collection.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("upload is empty")]
    EmptyInput,

    #[error("error decompressing gzip data: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("upload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("malformed data URL: {0}")]
    DataUrl(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("feature {feature}: polygon ring is not closed")]
    UnclosedRing { feature: usize },

    #[error("feature {feature}: {message}")]
    Geometry { feature: usize, message: String },
}

/// Top-level error for dashboard operations.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Comparison(#[from] GeometryComparisonError),

    #[error("unknown session {0}")]
    UnknownSession(String),

    #[error("no dataset uploaded for session {0}")]
    NoDataset(String),

    #[error("feature {index} not found (dataset has {count} features)")]
    FeatureNotFound { index: usize, count: usize },

    #[error("unknown tab '{0}' (expected 'table' or 'map')")]
    UnknownTab(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Serialization(err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for DashboardError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        DashboardError::Serialization(err.to_string())
    }
}

impl From<DashboardError> for JsValue {
    fn from(err: DashboardError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
