use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use geojson::{GeoJson, PolygonType};
use serde_json::{Map, Value};
use std::io::Read;

use crate::console_log;
use crate::error::DecodeError;

// One record of an uploaded file: a geometry plus its attribute fields
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub index: usize,                       // Position of first appearance in the upload
    pub geometry: Option<geo_types::Geometry<f64>>, // None for `"geometry": null`
    pub properties: Map<String, Value>,     // Original properties
}

// Ordered features decoded from one upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Property names in first-seen order across all features.
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for feature in &self.features {
            for key in feature.properties.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}

// Function to detect if data is gzipped (checking for gzip magic number)
fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

// Function to decompress gzipped data
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if !is_gzipped(data) {
        return Ok(data.to_vec());
    }

    let mut decoder = GzDecoder::new(data);
    let mut decompressed_data = Vec::new();
    decoder.read_to_end(&mut decompressed_data)?;

    Ok(decompressed_data)
}

/// Decode an uploaded GeoJSON file (plain or gzipped).
pub fn decode_upload(bytes: &[u8]) -> Result<FeatureCollection, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    let data = decompress_gzip(bytes)?;
    let text = String::from_utf8(data)?;
    decode_geojson_str(&text)
}

/// Decode the `data:<mime>;base64,<payload>` string produced by a browser upload widget.
pub fn decode_data_url(contents: &str) -> Result<FeatureCollection, DecodeError> {
    let (header, payload) = contents
        .split_once(',')
        .ok_or_else(|| DecodeError::DataUrl("missing ',' separator".to_string()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(DecodeError::DataUrl(format!("unsupported header '{}'", header)));
    }
    let bytes = STANDARD.decode(payload.trim())?;
    decode_upload(&bytes)
}

/// Decode GeoJSON text. Accepts a FeatureCollection, a single Feature or a bare geometry.
pub fn decode_geojson_str(text: &str) -> Result<FeatureCollection, DecodeError> {
    let geojson: GeoJson = text.parse()?;

    let raw_features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for (index, raw) in raw_features.into_iter().enumerate() {
        let geometry = match raw.geometry {
            Some(geometry) => {
                ensure_rings_closed(&geometry.value, index)?;
                let converted = geo_types::Geometry::<f64>::try_from(geometry).map_err(|e| DecodeError::Geometry {
                    feature: index,
                    message: e.to_string(),
                })?;
                Some(converted)
            }
            None => None,
        };
        features.push(Feature {
            index,
            geometry,
            properties: raw.properties.unwrap_or_default(),
        });
    }

    console_log!("Decoded GeoJSON upload with {} features", features.len());
    Ok(FeatureCollection { features })
}

// geo_types closes rings silently, so an open ring has to be caught on the raw positions
fn ensure_rings_closed(value: &geojson::Value, feature: usize) -> Result<(), DecodeError> {
    let polygon_closed = |rings: &PolygonType| {
        rings
            .iter()
            .all(|ring| ring.is_empty() || ring.first() == ring.last())
    };

    let closed = match value {
        geojson::Value::Polygon(rings) => polygon_closed(rings),
        geojson::Value::MultiPolygon(polygons) => polygons.iter().all(polygon_closed),
        geojson::Value::GeometryCollection(members) => {
            for member in members {
                ensure_rings_closed(&member.value, feature)?;
            }
            true
        }
        _ => true,
    };

    if closed {
        Ok(())
    } else {
        Err(DecodeError::UnclosedRing { feature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const FIELDS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "north", "crop": "wheat"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"name": "south", "area_ha": 4.2},
             "geometry": {"type": "Point", "coordinates": [5, 5]}},
            {"type": "Feature", "properties": null, "geometry": null}
        ]
    }"#;

    #[test]
    fn decodes_feature_collection_in_order() {
        let fc = decode_upload(FIELDS.as_bytes()).unwrap();
        assert_eq!(fc.len(), 3);
        assert_eq!(fc.features[1].index, 1);
        assert!(matches!(fc.features[0].geometry, Some(geo_types::Geometry::Polygon(_))));
        assert!(fc.features[2].geometry.is_none());
        assert!(fc.features[2].properties.is_empty());
        assert_eq!(fc.property_names(), vec!["name", "crop", "area_ha"]);
    }

    #[test]
    fn decodes_single_feature_and_bare_geometry() {
        let feature = r#"{"type":"Feature","properties":{"id":7},"geometry":{"type":"Point","coordinates":[1,2]}}"#;
        assert_eq!(decode_upload(feature.as_bytes()).unwrap().len(), 1);

        let geometry = r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#;
        let fc = decode_upload(geometry.as_bytes()).unwrap();
        assert_eq!(fc.len(), 1);
        assert!(fc.features[0].properties.is_empty());
    }

    #[test]
    fn decodes_gzipped_upload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(FIELDS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decode_upload(&compressed).unwrap().len(), 3);
    }

    #[test]
    fn decodes_data_url() {
        let url = format!("data:application/geo+json;base64,{}", STANDARD.encode(FIELDS));
        assert_eq!(decode_data_url(&url).unwrap().len(), 3);
        assert!(matches!(decode_data_url("no separator"), Err(DecodeError::DataUrl(_))));
    }

    #[test]
    fn rejects_unclosed_ring() {
        let open = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#;
        assert!(matches!(
            decode_upload(open.as_bytes()),
            Err(DecodeError::UnclosedRing { feature: 0 })
        ));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decode_upload(b""), Err(DecodeError::EmptyInput)));
        assert!(matches!(decode_upload(b"{not json"), Err(DecodeError::GeoJson(_))));
        assert!(matches!(decode_upload(&[0xff, 0xfe, 0x00]), Err(DecodeError::Utf8(_))));
    }

    #[test]
    fn empty_collection_is_fine() {
        let fc = decode_upload(br#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert!(fc.is_empty());
    }
}
