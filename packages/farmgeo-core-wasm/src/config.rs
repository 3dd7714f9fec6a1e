// Dashboard configuration. Defaults match the stock dashboard; JS may override any field.
use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::error::DashboardError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Coordinate tolerance used by the equality predicate
    pub coordinate_tolerance: f64,
    /// Rows per table page
    pub page_size: usize,
    pub map_style: String,
    pub base_zoom: f64,
    pub highlight_zoom: f64,
    pub base_opacity: f64,
    pub highlight_color: String,
    pub highlight_line_width: f64,
    /// Upper bound on concurrently open sessions before the oldest is evicted
    pub max_sessions: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            coordinate_tolerance: 1e-9,
            page_size: 10,
            map_style: "open-street-map".to_string(),
            base_zoom: 10.0,
            highlight_zoom: 16.0,
            base_opacity: 0.4,
            highlight_color: "red".to_string(),
            highlight_line_width: 3.0,
            max_sessions: 16,
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), DashboardError> {
        if !self.coordinate_tolerance.is_finite() || self.coordinate_tolerance < 0.0 {
            return Err(DashboardError::InvalidConfig(format!(
                "coordinateTolerance must be a finite, non-negative number (got {})",
                self.coordinate_tolerance
            )));
        }
        if self.page_size == 0 {
            return Err(DashboardError::InvalidConfig("pageSize must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.base_opacity) {
            return Err(DashboardError::InvalidConfig(format!(
                "baseOpacity must be within [0, 1] (got {})",
                self.base_opacity
            )));
        }
        if self.max_sessions == 0 {
            return Err(DashboardError::InvalidConfig("maxSessions must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            coordinate_tolerance: self.coordinate_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<DashboardConfig, DashboardError> {
        let config: DashboardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = parse(r#"{"pageSize": 25}"#).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.map_style, "open-street-map");
        assert!((config.base_zoom - 10.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse(r#"{"pageSize": 0}"#).is_err());
        assert!(parse(r#"{"baseOpacity": 1.5}"#).is_err());
        assert!(parse(r#"{"coordinateTolerance": -1.0}"#).is_err());
        assert!(parse(r#"{"maxSessions": 0}"#).is_err());
    }
}
