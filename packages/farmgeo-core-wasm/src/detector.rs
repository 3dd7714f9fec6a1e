//! Duplicate and validity annotation for one uploaded dataset.
//!
//! Every geometry is compared against all earlier ones with the geometric
//! equality predicate; only later occurrences of a repeated geometry are
//! flagged. The scan is quadratic, which is fine for a single field map of
//! tens to low hundreds of features.

use geo::Geometry;
use serde::Serialize;

use crate::console_log;
use crate::equality::{check_comparable, geometries_equal};
use crate::error::{ComparisonFailure, GeometryComparisonError};
use crate::geojson_features::FeatureCollection;
use crate::validity::is_valid;

/// Per-geometry flags computed once per upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub is_valid: bool,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub coordinate_tolerance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            coordinate_tolerance: 1e-9,
        }
    }
}

pub struct DuplicateGeometryDetector {
    config: DetectorConfig,
}

impl Default for DuplicateGeometryDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl DuplicateGeometryDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Annotate `geometries` in input order.
    pub fn detect(&self, geometries: &[Geometry<f64>]) -> Result<Vec<Annotation>, GeometryComparisonError> {
        let refs: Vec<Option<&Geometry<f64>>> = geometries.iter().map(Some).collect();
        self.detect_optional(&refs)
    }

    /// Annotate the features of a decoded upload. A feature without geometry fails the whole batch.
    pub fn detect_features(&self, collection: &FeatureCollection) -> Result<Vec<Annotation>, GeometryComparisonError> {
        let refs: Vec<Option<&Geometry<f64>>> = collection
            .features
            .iter()
            .map(|f| f.geometry.as_ref())
            .collect();
        self.detect_optional(&refs)
    }

    fn detect_optional(&self, geometries: &[Option<&Geometry<f64>>]) -> Result<Vec<Annotation>, GeometryComparisonError> {
        // Surface the first unusable geometry before comparing anything
        let mut comparable = Vec::with_capacity(geometries.len());
        for (index, geometry) in geometries.iter().copied().enumerate() {
            let geometry = geometry.ok_or(GeometryComparisonError {
                index,
                reason: ComparisonFailure::MissingGeometry,
            })?;
            check_comparable(geometry).map_err(|reason| GeometryComparisonError { index, reason })?;
            comparable.push(geometry);
        }

        let tolerance = self.config.coordinate_tolerance;
        let mut annotations = Vec::with_capacity(comparable.len());
        for (i, geometry) in comparable.iter().enumerate() {
            let mut is_duplicate = false;
            for earlier in &comparable[..i] {
                let equal = geometries_equal(earlier, geometry, tolerance)
                    .map_err(|reason| GeometryComparisonError { index: i, reason })?;
                if equal {
                    is_duplicate = true;
                    break;
                }
            }
            annotations.push(Annotation {
                is_valid: is_valid(geometry),
                is_duplicate,
            });
        }

        console_log!(
            "Annotated {} geometries: {} invalid, {} duplicate",
            annotations.len(),
            annotations.iter().filter(|a| !a.is_valid).count(),
            annotations.iter().filter(|a| a.is_duplicate).count()
        );

        Ok(annotations)
    }
}

/// Convenience wrapper with the default tolerance.
pub fn detect(geometries: &[Geometry<f64>]) -> Result<Vec<Annotation>, GeometryComparisonError> {
    DuplicateGeometryDetector::default().detect(geometries)
}
