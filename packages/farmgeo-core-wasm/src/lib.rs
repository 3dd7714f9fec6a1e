use wasm_bindgen::prelude::*;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use js_sys::Date;

// Create a console module for logging
pub mod console;
// Error types shared by every module
pub mod error;
// Dashboard configuration
pub mod config;
// GeoJSON upload decoding
pub mod geojson_features;
// Simple-feature validity checks
pub mod validity;
// Geometric equality predicate
pub mod equality;
// Duplicate / validity annotation
pub mod detector;
// Uploaded dataset with its annotations
pub mod dataset;
// Table / map view models
pub mod view;
// Per-session state
pub mod module_state;

use config::DashboardConfig;
use dataset::{AnnotatedDataset, DatasetSummary};
use error::DashboardError;
use module_state::ModuleState;
use view::{Tab, TabView, MapView};

pub use detector::{detect, Annotation, DetectorConfig, DuplicateGeometryDetector};
pub use error::{ComparisonFailure, GeometryComparisonError};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

// Use the macros from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => (crate::console::warn(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("Farm GeoJSON dashboard core initialized");
    });
}

// Plain JS objects rather than Maps for attribute records
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, DashboardError> {
    Ok(value.serialize(&Serializer::json_compatible())?)
}

/// Replace the active configuration. Absent fields take their defaults.
#[wasm_bindgen]
pub fn configure(config: JsValue) -> Result<(), JsValue> {
    let config: DashboardConfig = serde_wasm_bindgen::from_value(config)
        .map_err(|e| DashboardError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    ModuleState::with_mut(|state| state.config = config);
    Ok(())
}

#[wasm_bindgen]
pub fn open_session() -> String {
    ModuleState::with_mut(|state| state.open_session())
}

#[wasm_bindgen]
pub fn close_session(session_id: &str) -> bool {
    ModuleState::with_mut(|state| state.close_session(session_id))
}

/// Decode and annotate an uploaded file (plain or gzipped GeoJSON bytes).
#[wasm_bindgen]
pub fn upload_geojson(session_id: &str, filename: &str, data: &[u8]) -> Result<JsValue, JsValue> {
    let now = Date::now();
    let summary = ModuleState::with_mut(|state| {
        let dataset = AnnotatedDataset::from_upload(filename, data, now, &state.config);
        store_upload(state, session_id, dataset)
    })?;
    Ok(to_js(&summary)?)
}

/// Same as `upload_geojson` for a `data:...;base64,...` string from an upload widget.
#[wasm_bindgen]
pub fn upload_data_url(session_id: &str, filename: &str, contents: &str) -> Result<JsValue, JsValue> {
    let now = Date::now();
    let summary = ModuleState::with_mut(|state| {
        let dataset = geojson_features::decode_data_url(contents)
            .map_err(DashboardError::from)
            .and_then(|fc| AnnotatedDataset::from_collection(filename, fc, now, &state.config));
        store_upload(state, session_id, dataset)
    })?;
    Ok(to_js(&summary)?)
}

#[wasm_bindgen]
pub fn render_tabs(session_id: &str, active_tab: &str) -> Result<JsValue, JsValue> {
    let view = ModuleState::with(|state| tab_view(state, session_id, active_tab))?;
    Ok(to_js(&view)?)
}

/// Redraw the map with `index` highlighted, or with no highlight when `index` is undefined.
#[wasm_bindgen]
pub fn select_feature(session_id: &str, index: Option<u32>) -> Result<JsValue, JsValue> {
    let view = ModuleState::with(|state| map_selection(state, session_id, index.map(|i| i as usize)))?;
    Ok(to_js(&view)?)
}

#[wasm_bindgen]
pub fn export_annotated_geojson(session_id: &str) -> Result<String, JsValue> {
    let json = ModuleState::with(|state| state.require_dataset(session_id)?.to_annotated_geojson())?;
    Ok(json)
}

/// Stateless annotation of GeoJSON text: one `{is_valid, is_duplicate}` per feature.
#[wasm_bindgen]
pub fn detect_duplicates(geojson_text: &str) -> Result<JsValue, JsValue> {
    let annotations = annotate_text(geojson_text)?;
    Ok(to_js(&annotations)?)
}

// Get information about WASM module capabilities
#[wasm_bindgen]
pub fn get_module_info() -> String {
    let (sessions, config) = ModuleState::with(|state| (state.session_count(), state.config.clone()));
    serde_json::to_string(&serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": sessions,
        "config": config,
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

// A failed upload leaves the session's previous dataset in place.
fn store_upload(
    state: &mut ModuleState,
    session_id: &str,
    dataset: Result<AnnotatedDataset, DashboardError>,
) -> Result<DatasetSummary, DashboardError> {
    if !state.has_session(session_id) {
        return Err(DashboardError::UnknownSession(session_id.to_string()));
    }
    let dataset = dataset.map_err(|e| {
        console_warn!("Upload rejected for session {}: {}", session_id, e);
        e
    })?;
    let summary = dataset.summary();
    state.store_dataset(session_id, dataset)?;
    console_log!(
        "Stored {} ({} features, {} invalid, {} duplicate) for session {}",
        summary.filename,
        summary.feature_count,
        summary.invalid_count,
        summary.duplicate_count,
        session_id
    );
    Ok(summary)
}

fn tab_view(state: &ModuleState, session_id: &str, active_tab: &str) -> Result<TabView, DashboardError> {
    let tab: Tab = active_tab.parse()?;
    view::render_tabs(tab, state.dataset(session_id)?, &state.config)
}

fn map_selection(state: &ModuleState, session_id: &str, index: Option<usize>) -> Result<MapView, DashboardError> {
    let dataset = state.require_dataset(session_id)?;
    view::select_feature(index, dataset, &state.config)
}

fn annotate_text(geojson_text: &str) -> Result<Vec<Annotation>, DashboardError> {
    let collection = geojson_features::decode_geojson_str(geojson_text)?;
    let config = ModuleState::with(|state| state.config.detector_config());
    Ok(DuplicateGeometryDetector::new(config).detect_features(&collection)?)
}
