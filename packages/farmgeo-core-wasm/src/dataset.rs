// An uploaded dataset together with its annotations. Built once per upload, never mutated.
use geo::{Centroid, Geometry, Point};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::detector::{Annotation, DuplicateGeometryDetector};
use crate::error::DashboardError;
use crate::geojson_features::{decode_upload, Feature, FeatureCollection};
use crate::config::DashboardConfig;

pub const ID_COLUMN: &str = "__id__";
pub const VALID_COLUMN: &str = "is_valid";
pub const DUPLICATE_COLUMN: &str = "is_duplicate";

#[derive(Debug, Clone)]
pub struct AnnotatedDataset {
    pub id: String,
    pub filename: String,
    pub uploaded_at: f64,
    pub collection: FeatureCollection,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: String,
    pub filename: String,
    pub feature_count: usize,
    pub invalid_count: usize,
    pub duplicate_count: usize,
    pub columns: Vec<String>,
}

impl AnnotatedDataset {
    /// Decode and annotate an upload. Fails without a partial dataset.
    pub fn from_upload(
        filename: &str,
        bytes: &[u8],
        uploaded_at: f64,
        config: &DashboardConfig,
    ) -> Result<Self, DashboardError> {
        let collection = decode_upload(bytes)?;
        Self::from_collection(filename, collection, uploaded_at, config)
    }

    pub fn from_collection(
        filename: &str,
        collection: FeatureCollection,
        uploaded_at: f64,
        config: &DashboardConfig,
    ) -> Result<Self, DashboardError> {
        let annotations = DuplicateGeometryDetector::new(config.detector_config()).detect_features(&collection)?;
        Ok(AnnotatedDataset {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            uploaded_at,
            collection,
            annotations,
        })
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn feature(&self, index: usize) -> Result<(&Feature, Annotation), DashboardError> {
        match (self.collection.features.get(index), self.annotations.get(index)) {
            (Some(feature), Some(annotation)) => Ok((feature, *annotation)),
            _ => Err(DashboardError::FeatureNotFound {
                index,
                count: self.len(),
            }),
        }
    }

    /// Geometry of one feature. Annotation rejects features without one, so a stored
    /// dataset always has it; a hand-built dataset that doesn't reports the index as missing.
    pub fn geometry(&self, index: usize) -> Result<&Geometry<f64>, DashboardError> {
        let (feature, _) = self.feature(index)?;
        feature.geometry.as_ref().ok_or(DashboardError::FeatureNotFound {
            index,
            count: self.len(),
        })
    }

    /// Table columns: attribute fields in first-seen order, then the id and the two flags.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .collection
            .property_names()
            .into_iter()
            .filter(|name| name != ID_COLUMN && name != VALID_COLUMN && name != DUPLICATE_COLUMN)
            .collect();
        columns.push(ID_COLUMN.to_string());
        columns.push(VALID_COLUMN.to_string());
        columns.push(DUPLICATE_COLUMN.to_string());
        columns
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            feature_count: self.len(),
            invalid_count: self.annotations.iter().filter(|a| !a.is_valid).count(),
            duplicate_count: self.annotations.iter().filter(|a| a.is_duplicate).count(),
            columns: self.columns(),
        }
    }

    /// Attribute record of one feature, with the derived columns filled in.
    pub fn record(&self, index: usize) -> Result<serde_json::Map<String, Value>, DashboardError> {
        let (feature, annotation) = self.feature(index)?;
        let mut record = feature.properties.clone();
        record.insert(ID_COLUMN.to_string(), Value::String(index.to_string()));
        record.insert(VALID_COLUMN.to_string(), Value::Bool(annotation.is_valid));
        record.insert(DUPLICATE_COLUMN.to_string(), Value::Bool(annotation.is_duplicate));
        Ok(record)
    }

    /// None for empty geometries.
    pub fn centroid(&self, index: usize) -> Result<Option<Point<f64>>, DashboardError> {
        Ok(self.geometry(index)?.centroid())
    }

    /// Mean of the feature centroids; None when no feature has one.
    pub fn mean_centroid(&self) -> Option<Point<f64>> {
        let centroids: Vec<Point<f64>> = self
            .collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref().and_then(|g| g.centroid()))
            .collect();
        if centroids.is_empty() {
            return None;
        }
        let n = centroids.len() as f64;
        let (sx, sy) = centroids.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x(), sy + p.y()));
        Some(Point::new(sx / n, sy / n))
    }

    /// GeoJSON FeatureCollection with `__id__`, `is_valid` and `is_duplicate` added to every feature.
    pub fn to_annotated_geojson(&self) -> Result<String, DashboardError> {
        let mut features = Vec::with_capacity(self.len());
        for (index, feature) in self.collection.features.iter().enumerate() {
            let geometry = feature
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g)));
            features.push(geojson::Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(self.record(index)?),
                foreign_members: None,
            });
        }
        let fc = geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Ok(serde_json::to_string(&fc)?)
    }
}
