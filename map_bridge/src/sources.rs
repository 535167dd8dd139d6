//! Typed source descriptors built from a generic property mapping.

use serde_json::Value as JsonValue;

use crate::convert::{
    decode_coordinate_list, decode_f64, decode_list, decode_map, decode_str, ArgumentsExt, JsonMap,
};
use crate::error::DecodeError;
use crate::{FeatureCollection, LatLng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileScheme {
    Xyz,
    Tms,
}

/// Inline tile-set description, used when a source has no `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSet {
    pub tiles: Vec<String>,
    pub bounds: Option<Vec<f64>>,
    pub scheme: Option<TileScheme>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub attribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileSource {
    Url(String),
    TileSet(TileSet),
}

/// Per-source GeoJSON options; unset fields fall back to engine defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoJsonOptions {
    pub buffer: Option<i64>,
    pub cluster: Option<bool>,
    pub cluster_max_zoom: Option<i64>,
    pub cluster_radius: Option<i64>,
    pub line_metrics: Option<bool>,
    pub max_zoom: Option<i64>,
    pub min_zoom: Option<i64>,
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoJsonData {
    Url(String),
    Inline(FeatureCollection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Vector(TileSource),
    Raster(TileSource),
    RasterDem(TileSource),
    Image {
        url: String,
        /// Top-left, top-right, bottom-right, bottom-left.
        coordinates: [LatLng; 4],
    },
    GeoJson {
        data: GeoJsonData,
        options: GeoJsonOptions,
    },
    /// Raw image bytes registered under a source id.
    ImageData(Vec<u8>),
}

impl SourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceKind::Vector(_) => "vector",
            SourceKind::Raster(_) => "raster",
            SourceKind::RasterDem(_) => "raster-dem",
            SourceKind::Image { .. } | SourceKind::ImageData(_) => "image",
            SourceKind::GeoJson { .. } => "geojson",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub id: String,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn geojson(id: impl Into<String>, collection: FeatureCollection) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::GeoJson {
                data: GeoJsonData::Inline(collection),
                options: GeoJsonOptions::default(),
            },
        }
    }

    /// Inline feature data, if this is a GeoJSON source that carries any.
    pub fn inline_features(&self) -> Option<&FeatureCollection> {
        match &self.kind {
            SourceKind::GeoJson {
                data: GeoJsonData::Inline(collection),
                ..
            } => Some(collection),
            _ => None,
        }
    }
}

/// Builds a descriptor for source `id`, dispatching on the required `type`
/// property. Unknown types and tile sources with neither `url` nor `tiles`
/// are decode errors rather than silent no-ops.
pub fn build_source(id: &str, properties: &JsonValue) -> Result<SourceDescriptor, DecodeError> {
    let data = decode_map(properties, "properties")?;
    let kind = match data.required_str("type")? {
        "vector" => SourceKind::Vector(build_tile_source(data)?),
        "raster" => SourceKind::Raster(build_tile_source(data)?),
        "raster-dem" => SourceKind::RasterDem(build_tile_source(data)?),
        "image" => build_image_source(data)?,
        "geojson" => build_geojson_source(data)?,
        other => {
            return Err(DecodeError::InvalidEnumValue {
                field: "source type",
                value: other.to_string(),
            })
        }
    };
    Ok(SourceDescriptor {
        id: id.to_string(),
        kind,
    })
}

fn build_tile_source(data: &JsonMap) -> Result<TileSource, DecodeError> {
    if let Some(url) = data.optional_str("url")? {
        return Ok(TileSource::Url(url.to_string()));
    }
    match build_tile_set(data)? {
        Some(tile_set) => Ok(TileSource::TileSet(tile_set)),
        None => Err(DecodeError::missing("url or tiles")),
    }
}

fn build_tile_set(data: &JsonMap) -> Result<Option<TileSet>, DecodeError> {
    let Some(tiles) = data.optional("tiles") else {
        return Ok(None);
    };
    let tiles = decode_list(tiles, "tiles")?
        .iter()
        .map(|tile| decode_str(tile, "tiles").map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let bounds = data
        .optional("bounds")
        .map(|bounds| {
            decode_list(bounds, "bounds")?
                .iter()
                .map(|value| decode_f64(value, "bounds"))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let scheme = match data.optional_str("scheme")? {
        None => None,
        Some("xyz") => Some(TileScheme::Xyz),
        Some("tms") => Some(TileScheme::Tms),
        Some(other) => {
            return Err(DecodeError::InvalidEnumValue {
                field: "tile scheme",
                value: other.to_string(),
            })
        }
    };
    Ok(Some(TileSet {
        tiles,
        bounds,
        scheme,
        min_zoom: data.optional_f64("minzoom")?,
        max_zoom: data.optional_f64("maxzoom")?,
        attribution: data.optional_str("attribution")?.map(str::to_string),
    }))
}

fn build_image_source(data: &JsonMap) -> Result<SourceKind, DecodeError> {
    let url = data.required_str("url")?.to_string();
    let corners = decode_coordinate_list(data.required("coordinates")?, true, "coordinates")?;
    let coordinates: [LatLng; 4] = corners.as_slice().try_into().map_err(|_| {
        DecodeError::mismatch(
            "coordinates",
            "4 coordinates",
            format!("{} coordinates", corners.len()),
        )
    })?;
    Ok(SourceKind::Image { url, coordinates })
}

fn build_geojson_source(data: &JsonMap) -> Result<SourceKind, DecodeError> {
    let payload = data.required("data")?;
    let geojson = match payload {
        JsonValue::String(url) => GeoJsonData::Url(url.clone()),
        JsonValue::Object(_) => {
            GeoJsonData::Inline(FeatureCollection::from_value(payload.clone())?)
        }
        other => {
            return Err(DecodeError::mismatch(
                "data",
                "text or mapping",
                crate::convert::value_kind(other),
            ))
        }
    };
    let options = GeoJsonOptions {
        buffer: data.optional_i64("buffer")?,
        cluster: data.optional_bool("cluster")?,
        cluster_max_zoom: data.optional_i64("clusterMaxZoom")?,
        cluster_radius: data.optional_i64("clusterRadius")?,
        line_metrics: data.optional_bool("lineMetrics")?,
        max_zoom: data.optional_i64("maxZoom")?,
        min_zoom: data.optional_i64("minZoom")?,
        tolerance: data.optional_f64("tolerance")?,
    };
    Ok(SourceKind::GeoJson {
        data: geojson,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vector_prefers_url_over_tiles() {
        let source = build_source(
            "streets",
            &json!({"type": "vector", "url": "mapbox://mapbox.streets", "tiles": ["a"]}),
        )
        .unwrap();
        assert_eq!(
            source.kind,
            SourceKind::Vector(TileSource::Url("mapbox://mapbox.streets".into()))
        );
    }

    #[test]
    fn raster_tile_set_reads_optional_fields() {
        let source = build_source(
            "sat",
            &json!({
                "type": "raster",
                "tiles": ["https://tiles/{z}/{x}/{y}.png"],
                "scheme": "tms",
                "minzoom": 2,
                "attribution": "(c) tiles"
            }),
        )
        .unwrap();
        let SourceKind::Raster(TileSource::TileSet(tile_set)) = source.kind else {
            panic!("expected raster tile set");
        };
        assert_eq!(tile_set.tiles.len(), 1);
        assert_eq!(tile_set.scheme, Some(TileScheme::Tms));
        assert_eq!(tile_set.min_zoom, Some(2.0));
        assert_eq!(tile_set.max_zoom, None);
        assert_eq!(tile_set.attribution.as_deref(), Some("(c) tiles"));
    }

    #[test]
    fn tile_source_without_url_or_tiles_fails() {
        let err = build_source("dem", &json!({"type": "raster-dem"})).unwrap_err();
        assert_eq!(err, DecodeError::missing("url or tiles"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = build_source("x", &json!({"type": "video"})).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidEnumValue {
                field: "source type",
                ..
            }
        ));
    }

    #[test]
    fn image_coordinates_are_longitude_first() {
        let source = build_source(
            "overlay",
            &json!({
                "type": "image",
                "url": "https://img/overlay.png",
                "coordinates": [[-80.4, 46.4], [-71.5, 46.4], [-71.5, 37.9], [-80.4, 37.9]]
            }),
        )
        .unwrap();
        let SourceKind::Image { coordinates, .. } = source.kind else {
            panic!("expected image source");
        };
        assert_eq!(coordinates[0], LatLng::new(46.4, -80.4));
        assert_eq!(coordinates[2], LatLng::new(37.9, -71.5));
    }

    #[test]
    fn image_needs_four_corners() {
        let err = build_source(
            "overlay",
            &json!({"type": "image", "url": "u", "coordinates": [[0, 0], [1, 1]]}),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }

    #[test]
    fn geojson_inline_data_and_options() {
        let source = build_source(
            "pts",
            &json!({
                "type": "geojson",
                "data": {"type": "FeatureCollection", "features": []},
                "cluster": true,
                "clusterRadius": 40,
                "tolerance": 0.5
            }),
        )
        .unwrap();
        assert!(source.inline_features().is_some());
        let SourceKind::GeoJson { options, .. } = source.kind else {
            panic!("expected geojson source");
        };
        assert_eq!(options.cluster, Some(true));
        assert_eq!(options.cluster_radius, Some(40));
        assert_eq!(options.tolerance, Some(0.5));
        assert_eq!(options.buffer, None);
    }

    #[test]
    fn geojson_url_is_kept_verbatim() {
        let source = build_source(
            "remote",
            &json!({"type": "geojson", "data": "https://example.org/points.geojson"}),
        )
        .unwrap();
        assert!(source.inline_features().is_none());
        assert_eq!(source.kind.type_name(), "geojson");
    }
}
