//! GeoJSON village points and the name-based geo-join

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::Aggregates;
use crate::error::PipelineError;

/// A point as `(longitude, latitude)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

/// A named feature from the boundary file
#[derive(Debug, Clone, PartialEq)]
pub struct VillageFeature {
    /// Uppercased feature name
    pub name: String,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl Geometry {
    fn point(&self) -> Option<Coordinate> {
        if self.kind != "Point" {
            return None;
        }
        let pair = self.coordinates.as_array()?;
        let longitude = pair.first()?.as_f64()?;
        let latitude = pair.get(1)?.as_f64()?;
        Some(Coordinate {
            longitude,
            latitude,
        })
    }
}

/// Parse a GeoJSON feature collection into named village points.
///
/// Features without a string `name` property are skipped. Geometries that are
/// not a numeric `Point` keep the feature with no coordinate.
pub fn parse_features(json: &str) -> crate::Result<Vec<VillageFeature>> {
    let collection: FeatureCollection =
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidGeoJson(e.to_string()))?;

    let features = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let name = feature
                .properties
                .as_ref()
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)?
                .trim()
                .to_uppercase();

            let coordinate = feature.geometry.as_ref().and_then(Geometry::point);
            if coordinate.is_none() {
                log::debug!("Feature {name}: no usable point coordinate");
            }
            Some(VillageFeature { name, coordinate })
        })
        .collect();

    Ok(features)
}

/// Read and parse a GeoJSON file
pub fn load_features(file_path: &Path) -> crate::Result<Vec<VillageFeature>> {
    let json = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", file_path.display()))?;
    let features = parse_features(&json)?;
    log::info!(
        "Loaded {} named features from {}",
        features.len(),
        file_path.display()
    );
    Ok(features)
}

/// Attach coordinates to aggregates by exact uppercase name match.
///
/// The first feature with a matching name wins. Returns the villages left
/// without a coordinate: those with no matching feature and those whose
/// feature has no usable point.
pub fn geo_join(aggregates: &mut Aggregates, features: &[VillageFeature]) -> Vec<String> {
    let mut unmatched = Vec::new();

    for (village, aggregate) in aggregates.iter_mut() {
        let key = village.to_uppercase();
        aggregate.coordinate = features
            .iter()
            .find(|f| f.name.to_uppercase() == key)
            .and_then(|f| f.coordinate);
        if aggregate.coordinate.is_none() {
            unmatched.push(village.clone());
        }
    }

    if !unmatched.is_empty() {
        log::warn!(
            "{} villages have no usable coordinate and will not be mapped: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }
    unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::VillageAggregate;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Paoman"},
             "geometry": {"type": "Point", "coordinates": [108.32, -6.33]}},
            {"type": "Feature", "properties": {"name": "PAOMAN"},
             "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
            {"type": "Feature", "properties": {"name": "Dukuh"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]}},
            {"type": "Feature", "properties": {"kode": "3212"},
             "geometry": {"type": "Point", "coordinates": [108.0, -6.0]}},
            {"type": "Feature", "properties": {"name": "Singa"},
             "geometry": {"type": "Point", "coordinates": ["x", "y"]}}
        ]
    }"#;

    #[test]
    fn test_parse_features() {
        let features = parse_features(SAMPLE).unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(features[0].name, "PAOMAN");
        assert_eq!(
            features[0].coordinate,
            Some(Coordinate {
                longitude: 108.32,
                latitude: -6.33
            })
        );
        assert_eq!(features[2].name, "DUKUH");
        assert_eq!(features[2].coordinate, None);
        assert_eq!(features[3].coordinate, None);
    }

    #[test]
    fn test_invalid_geojson() {
        let err = parse_features("not json").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_geo_join_first_match_wins_and_misses_are_none() {
        let features = parse_features(SAMPLE).unwrap();
        let mut aggregates = Aggregates::new();
        for name in ["PAOMAN", "DUKUH", "TAMBAK"] {
            aggregates.insert(name.to_string(), VillageAggregate::empty(name));
        }

        let unmatched = geo_join(&mut aggregates, &features);

        assert_eq!(unmatched, vec!["DUKUH", "TAMBAK"]);
        assert_eq!(
            aggregates["PAOMAN"].coordinate.map(|c| c.longitude),
            Some(108.32)
        );
        assert_eq!(aggregates["DUKUH"].coordinate, None);
        assert_eq!(aggregates["TAMBAK"].coordinate, None);
    }

    #[test]
    fn test_geo_join_polygon_match_is_not_mappable() {
        let features = vec![VillageFeature {
            name: "DUKUH".to_string(),
            coordinate: None,
        }];
        let mut aggregates = Aggregates::new();
        aggregates.insert("DUKUH".to_string(), VillageAggregate::empty("DUKUH"));

        let unmatched = geo_join(&mut aggregates, &features);
        assert_eq!(unmatched, vec!["DUKUH"]);
        assert_eq!(aggregates["DUKUH"].coordinate, None);
    }

    #[test]
    fn test_geo_join_no_partial_matches() {
        let features = vec![VillageFeature {
            name: "SINGARAJA".to_string(),
            coordinate: Some(Coordinate {
                longitude: 1.0,
                latitude: 1.0,
            }),
        }];
        let mut aggregates = Aggregates::new();
        aggregates.insert("SINGA".to_string(), VillageAggregate::empty("SINGA"));

        let unmatched = geo_join(&mut aggregates, &features);
        assert_eq!(unmatched, vec!["SINGA"]);
    }
}
