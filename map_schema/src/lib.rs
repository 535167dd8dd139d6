//! Wire-level data types shared by the map bridge crates.
//!
//! Coordinates cross the message boundary as `[latitude, longitude]` pairs.
//! Inside the workspace they always travel as the named fields of [`LatLng`],
//! so the positional order only matters where values are decoded or encoded.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use thiserror::Error;

/// Geographic coordinate in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Outward-facing `[latitude, longitude]` pair.
    pub fn to_pair(self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub southwest: LatLng,
    pub northeast: LatLng,
}

impl LatLngBounds {
    pub const fn new(southwest: LatLng, northeast: LatLng) -> Self {
        Self {
            southwest,
            northeast,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.southwest.latitude + self.northeast.latitude) / 2.0,
            (self.southwest.longitude + self.northeast.longitude) / 2.0,
        )
    }

    pub fn latitude_span(&self) -> f64 {
        (self.northeast.latitude - self.southwest.latitude).abs()
    }

    pub fn longitude_span(&self) -> f64 {
        (self.northeast.longitude - self.southwest.longitude).abs()
    }
}

/// Position on the map view in physical pixels, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenCoordinate {
    pub x: f64,
    pub y: f64,
}

impl ScreenCoordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Padding around the map view in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl EdgeInsets {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Fully resolved camera as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub bearing: f64,
    pub target: LatLng,
    pub tilt: f64,
    pub zoom: f64,
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self {
            bearing: 0.0,
            target: LatLng::default(),
            tilt: 0.0,
            zoom: 0.0,
        }
    }
}

/// A location fix delivered by the platform location provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub position: LatLng,
    pub altitude: f64,
    pub speed: f64,
    pub bearing: f64,
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("failed to parse geojson: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected geojson type '{expected}', found '{found}'")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },
}

/// GeoJSON feature identifier; either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Text(String),
    Number(JsonNumber),
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId::Text(value.to_string())
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        FeatureId::Number(JsonNumber::from(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    #[serde(default)]
    pub geometry: JsonValue,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub properties: JsonMap<String, JsonValue>,
    /// Members other than the four above, such as `bbox`.
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<JsonMap<String, JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<JsonMap<String, JsonValue>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Feature {
    pub fn new(
        id: Option<FeatureId>,
        geometry: JsonValue,
        properties: JsonMap<String, JsonValue>,
    ) -> Self {
        Self {
            kind: feature_type(),
            id,
            geometry,
            properties,
            extra: JsonMap::new(),
        }
    }

    pub fn from_json_str(contents: &str) -> Result<Self, GeoJsonError> {
        let feature: Feature = serde_json::from_str(contents)?;
        feature.validate()
    }

    pub fn from_value(value: JsonValue) -> Result<Self, GeoJsonError> {
        let feature: Feature = serde_json::from_value(value)?;
        feature.validate()
    }

    fn validate(self) -> Result<Self, GeoJsonError> {
        if self.kind != "Feature" {
            return Err(GeoJsonError::UnexpectedType {
                expected: "Feature",
                found: self.kind,
            });
        }
        Ok(self)
    }

    pub fn property(&self, key: &str) -> Option<&JsonValue> {
        self.properties.get(key)
    }

    /// Only a literal `true` marks a feature as draggable.
    pub fn is_draggable(&self) -> bool {
        matches!(self.property("draggable"), Some(JsonValue::Bool(true)))
    }

    pub fn to_json_string(&self) -> Result<String, GeoJsonError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: feature_collection_type(),
            features,
            extra: JsonMap::new(),
        }
    }

    pub fn from_json_str(contents: &str) -> Result<Self, GeoJsonError> {
        let collection: FeatureCollection = serde_json::from_str(contents)?;
        collection.validate()
    }

    pub fn from_value(value: JsonValue) -> Result<Self, GeoJsonError> {
        let collection: FeatureCollection = serde_json::from_value(value)?;
        collection.validate()
    }

    fn validate(self) -> Result<Self, GeoJsonError> {
        if self.kind != "FeatureCollection" {
            return Err(GeoJsonError::UnexpectedType {
                expected: "FeatureCollection",
                found: self.kind,
            });
        }
        for feature in &self.features {
            if feature.kind != "Feature" {
                return Err(GeoJsonError::UnexpectedType {
                    expected: "Feature",
                    found: feature.kind.clone(),
                });
            }
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Replaces the first feature sharing `feature`'s id. Features without an
    /// id never match. Returns `false` when nothing was replaced; the
    /// collection is never grown.
    pub fn replace_feature(&mut self, feature: Feature) -> bool {
        let Some(id) = feature.id.as_ref() else {
            return false;
        };
        match self
            .features
            .iter()
            .position(|candidate| candidate.id.as_ref() == Some(id))
        {
            Some(index) => {
                self.features[index] = feature;
                true
            }
            None => false,
        }
    }
}
