//! View models handed to the browser shell. Every function here is a pure
//! mapping from `(dataset, ui selection)` to a serializable value; drawing the
//! table and the map is left to JavaScript.

use geo::Point;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::config::DashboardConfig;
use crate::dataset::AnnotatedDataset;
use crate::error::DashboardError;

pub const UPLOAD_PROMPT: &str = "Please upload a GeoJSON file.";
pub const DROPDOWN_PLACEHOLDER: &str = "Select feature to highlight";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Table,
    Map,
}

impl FromStr for Tab {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Tab::Table),
            "map" => Ok(Tab::Map),
            other => Err(DashboardError::UnknownTab(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TabView {
    Prompt {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Content {
        active_tab: Tab,
        table: TableView,
        dropdown: DropdownView,
        map: MapView,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Map<String, Value>>,
    pub page_size: usize,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropdownView {
    pub placeholder: String,
    pub options: Vec<DropdownOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl From<Point<f64>> for LatLon {
    fn from(p: Point<f64>) -> Self {
        LatLon { lat: p.y(), lon: p.x() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFeature {
    pub id: String,
    /// "true" for duplicates, "false" otherwise
    pub color_group: String,
    pub geometry: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub feature_id: String,
    /// GeoJSON FeatureCollection holding the selected geometry, drawn as a line layer
    pub outline: Value,
    pub color: String,
    pub line_width: f64,
    pub marker: Option<LatLon>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub style: String,
    pub center: Option<LatLon>,
    pub zoom: f64,
    pub opacity: f64,
    pub features: Vec<MapFeature>,
    pub highlight: Option<Highlight>,
}

/// Top-level tab content. Without a dataset the shell shows the upload prompt.
pub fn render_tabs(
    active_tab: Tab,
    dataset: Option<&AnnotatedDataset>,
    config: &DashboardConfig,
) -> Result<TabView, DashboardError> {
    let dataset = match dataset {
        Some(dataset) => dataset,
        None => {
            return Ok(TabView::Prompt {
                message: UPLOAD_PROMPT.to_string(),
            })
        }
    };

    Ok(TabView::Content {
        active_tab,
        table: build_table_view(dataset, config)?,
        dropdown: build_dropdown(dataset),
        map: build_map_view(None, dataset, config)?,
    })
}

pub fn build_table_view(dataset: &AnnotatedDataset, config: &DashboardConfig) -> Result<TableView, DashboardError> {
    let columns = dataset
        .columns()
        .into_iter()
        .map(|name| TableColumn { id: name.clone(), name })
        .collect();
    let rows = (0..dataset.len())
        .map(|i| dataset.record(i))
        .collect::<Result<Vec<_>, _>>()?;
    let page_size = config.page_size.max(1);

    Ok(TableView {
        columns,
        page_count: rows.len().div_ceil(page_size),
        rows,
        page_size,
    })
}

pub fn build_dropdown(dataset: &AnnotatedDataset) -> DropdownView {
    DropdownView {
        placeholder: DROPDOWN_PLACEHOLDER.to_string(),
        options: (0..dataset.len())
            .map(|i| DropdownOption {
                label: format!("Feature {}", i),
                value: i.to_string(),
            })
            .collect(),
    }
}

/// Base layer coloured by duplicate flag, plus an optional highlight of one feature.
pub fn build_map_view(
    selected: Option<usize>,
    dataset: &AnnotatedDataset,
    config: &DashboardConfig,
) -> Result<MapView, DashboardError> {
    let mut features = Vec::with_capacity(dataset.len());
    for index in 0..dataset.len() {
        let geometry = dataset.geometry(index)?;
        let (_, annotation) = dataset.feature(index)?;
        features.push(MapFeature {
            id: index.to_string(),
            color_group: annotation.is_duplicate.to_string(),
            geometry: serde_json::to_value(geojson::Geometry::new(geojson::Value::from(geometry)))?,
        });
    }

    let mut view = MapView {
        style: config.map_style.clone(),
        center: dataset.mean_centroid().map(LatLon::from),
        zoom: config.base_zoom,
        opacity: config.base_opacity,
        features,
        highlight: None,
    };

    if let Some(index) = selected {
        let geometry = dataset.geometry(index)?;
        let outline = geojson::FeatureCollection {
            bbox: None,
            features: vec![geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };
        let marker = dataset.centroid(index)?.map(LatLon::from);
        if let Some(centroid) = marker {
            view.center = Some(centroid);
            view.zoom = config.highlight_zoom;
        }
        view.highlight = Some(Highlight {
            feature_id: index.to_string(),
            outline: serde_json::to_value(&outline)?,
            color: config.highlight_color.clone(),
            line_width: config.highlight_line_width,
            marker,
        });
    }

    Ok(view)
}

/// Redraw for a dropdown change: `None` clears the highlight.
pub fn select_feature(
    index: Option<usize>,
    dataset: &AnnotatedDataset,
    config: &DashboardConfig,
) -> Result<MapView, DashboardError> {
    build_map_view(index, dataset, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"plot": 1},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]}},
            {"type": "Feature", "properties": {"plot": 2},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]}},
            {"type": "Feature", "properties": {"plot": 3},
             "geometry": {"type": "Point", "coordinates": [10, 20]}}
        ]
    }"#;

    fn dataset() -> AnnotatedDataset {
        AnnotatedDataset::from_upload("plots.geojson", UPLOAD.as_bytes(), 0.0, &DashboardConfig::default()).unwrap()
    }

    #[test]
    fn prompt_without_dataset() {
        match render_tabs(Tab::Table, None, &DashboardConfig::default()).unwrap() {
            TabView::Prompt { message } => assert_eq!(message, UPLOAD_PROMPT),
            other => panic!("expected prompt, got {other:?}"),
        }
    }

    #[test]
    fn table_excludes_geometry() {
        let table = build_table_view(&dataset(), &DashboardConfig::default()).unwrap();
        let ids: Vec<&str> = table.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["plot", "__id__", "is_valid", "is_duplicate"]);
        assert!(table.rows.iter().all(|r| !r.contains_key("geometry")));
        assert_eq!(table.rows[1]["is_duplicate"], Value::Bool(true));
        assert_eq!(table.page_size, 10);
        assert_eq!(table.page_count, 1);
    }

    #[test]
    fn dropdown_lists_every_feature() {
        let dropdown = build_dropdown(&dataset());
        assert_eq!(dropdown.options.len(), 3);
        assert_eq!(dropdown.options[2].label, "Feature 2");
        assert_eq!(dropdown.options[2].value, "2");
    }

    #[test]
    fn base_map_colours_duplicates() {
        let map = build_map_view(None, &dataset(), &DashboardConfig::default()).unwrap();
        let groups: Vec<&str> = map.features.iter().map(|f| f.color_group.as_str()).collect();
        assert_eq!(groups, vec!["false", "true", "false"]);
        assert!(map.highlight.is_none());
        assert!((map.zoom - 10.0).abs() < 1e-12);
        let center = map.center.unwrap();
        assert!((center.lon - 14.0 / 3.0).abs() < 1e-9);
        assert!((center.lat - 8.0).abs() < 1e-9);
    }

    #[test]
    fn selection_adds_highlight_and_recentres() {
        let ds = dataset();
        let config = DashboardConfig::default();
        let map = select_feature(Some(2), &ds, &config).unwrap();
        let highlight = map.highlight.expect("highlight");
        assert_eq!(highlight.feature_id, "2");
        assert_eq!(highlight.marker, Some(LatLon { lat: 20.0, lon: 10.0 }));
        assert_eq!(highlight.outline["features"][0]["geometry"]["type"], "Point");
        assert_eq!(map.center, Some(LatLon { lat: 20.0, lon: 10.0 }));
        assert!((map.zoom - 16.0).abs() < 1e-12);

        let cleared = select_feature(None, &ds, &config).unwrap();
        assert!(cleared.highlight.is_none());
    }

    #[test]
    fn selecting_unknown_feature_fails() {
        let err = select_feature(Some(7), &dataset(), &DashboardConfig::default()).unwrap_err();
        assert!(matches!(err, DashboardError::FeatureNotFound { index: 7, count: 3 }));
    }

    #[test]
    fn tab_names_parse() {
        assert_eq!("map".parse::<Tab>().unwrap(), Tab::Map);
        assert!("chart".parse::<Tab>().is_err());
    }
}
