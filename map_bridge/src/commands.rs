//! Closed enumeration of the method calls the bridge understands.
//!
//! Each method name is resolved once, at the boundary, into a variant that
//! carries its fully decoded arguments.

use serde_json::Value as JsonValue;

use crate::camera::CameraUpdate;
use crate::convert::{
    decode_bytes, decode_f64, decode_list, decode_map, decode_str, pixels_from_logical,
    ArgumentsExt, JsonMap,
};
use crate::engine::{QueryGeometry, StyleSource};
use crate::error::{CommandError, DecodeError};
use crate::layers::{FilterExpression, LayerDescriptor, LayerKind};
use crate::options::{LocationTrackingMode, MapOptions};
use crate::sources::{build_source, SourceDescriptor};
use crate::{EdgeInsets, Feature, FeatureCollection, LatLng, ScreenCoordinate};

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    WaitForMap,
    Update(MapOptions),
    UpdateMyLocationTrackingMode(LocationTrackingMode),
    MatchMapLanguageWithDeviceDefault,
    SetMapLanguage(String),
    UpdateContentInsets {
        insets: EdgeInsets,
        animated: bool,
    },
    SetStyle(StyleSource),
    GetVisibleRegion,
    ToScreenLocation(LatLng),
    ToScreenLocationBatch(Vec<LatLng>),
    ToLatLng(ScreenCoordinate),
    GetMetersPerPixelAtLatitude(f64),
    QueryRenderedFeatures {
        geometry: QueryGeometry,
        layer_ids: Vec<String>,
        filter: Option<FilterExpression>,
    },
    SetTelemetryEnabled(bool),
    GetTelemetryEnabled,
    InvalidateAmbientCache,
    TakeSnapshot,
    MoveCamera(CameraUpdate),
    AnimateCamera {
        update: CameraUpdate,
        duration_ms: Option<u64>,
    },
    AddGeoJson {
        source_id: String,
        collection: FeatureCollection,
    },
    SetGeoJson {
        source_id: String,
        collection: FeatureCollection,
    },
    SetFeature {
        source_id: String,
        feature: Feature,
    },
    AddLayer(LayerDescriptor),
    GetLastLocation,
    AddImage {
        name: String,
        bytes: Vec<u8>,
        sdf: bool,
    },
    AddImageSource {
        source_id: String,
        bytes: Vec<u8>,
    },
    AddSource(SourceDescriptor),
    RemoveSource(String),
    /// Raster layer over an image source; `below_layer_id` is set for
    /// `style#addLayerBelow`.
    AddImageLayer(LayerDescriptor),
    RemoveLayer(String),
    SetFilter {
        layer_id: String,
        filter: Option<FilterExpression>,
    },
}

impl MapCommand {
    /// Decodes `method` with its argument mapping. Logical pixel arguments
    /// are scaled by `density`.
    pub fn decode(method: &str, args: &JsonMap, density: f64) -> Result<Self, CommandError> {
        let command = match method {
            "map#waitForMap" => MapCommand::WaitForMap,
            "map#update" => {
                MapCommand::Update(MapOptions::decode(args.required("options")?, density)?)
            }
            "map#updateMyLocationTrackingMode" => MapCommand::UpdateMyLocationTrackingMode(
                LocationTrackingMode::try_from(args.required_i64("mode")?)?,
            ),
            "map#matchMapLanguageWithDeviceDefault" => {
                MapCommand::MatchMapLanguageWithDeviceDefault
            }
            "map#setMapLanguage" => {
                MapCommand::SetMapLanguage(args.required_str("language")?.to_string())
            }
            "map#updateContentInsets" => {
                let bounds = decode_map(args.required("bounds")?, "bounds")?;
                let edge = |key: &str| -> Result<f64, DecodeError> {
                    Ok(pixels_from_logical(bounds.required_f64(key)?, density) as f64)
                };
                MapCommand::UpdateContentInsets {
                    insets: EdgeInsets::new(
                        edge("left")?,
                        edge("top")?,
                        edge("right")?,
                        edge("bottom")?,
                    ),
                    animated: args.required_bool("animated")?,
                }
            }
            "map#setStyle" => {
                MapCommand::SetStyle(StyleSource::resolve(args.required_str("style")?)?)
            }
            "map#getVisibleRegion" => MapCommand::GetVisibleRegion,
            "map#toScreenLocation" => MapCommand::ToScreenLocation(LatLng::new(
                args.required_f64("latitude")?,
                args.required_f64("longitude")?,
            )),
            "map#toScreenLocationBatch" => MapCommand::ToScreenLocationBatch(
                decode_flat_coordinates(args.required("coordinates")?)?,
            ),
            "map#toLatLng" => MapCommand::ToLatLng(ScreenCoordinate::new(
                args.required_f64("x")?,
                args.required_f64("y")?,
            )),
            "map#getMetersPerPixelAtLatitude" => {
                MapCommand::GetMetersPerPixelAtLatitude(args.required_f64("latitude")?)
            }
            "map#queryRenderedFeatures" => decode_query(args)?,
            "map#setTelemetryEnabled" => {
                MapCommand::SetTelemetryEnabled(args.required_bool("enabled")?)
            }
            "map#getTelemetryEnabled" => MapCommand::GetTelemetryEnabled,
            "map#invalidateAmbientCache" => MapCommand::InvalidateAmbientCache,
            "map#takeSnapshot" => MapCommand::TakeSnapshot,
            "camera#move" => MapCommand::MoveCamera(CameraUpdate::decode(
                args.required("cameraUpdate")?,
                density,
            )?),
            "camera#animate" => {
                let update = CameraUpdate::decode(args.required("cameraUpdate")?, density)?;
                let duration_ms = match args.optional_i64("duration")? {
                    Some(ms) => Some(u64::try_from(ms).map_err(|_| {
                        DecodeError::mismatch(
                            "duration",
                            "non-negative milliseconds",
                            ms.to_string(),
                        )
                    })?),
                    None => None,
                };
                MapCommand::AnimateCamera { update, duration_ms }
            }
            "source#addGeoJson" => MapCommand::AddGeoJson {
                source_id: args.required_str("sourceId")?.to_string(),
                collection: FeatureCollection::from_json_str(args.required_str("geojson")?)
                    .map_err(DecodeError::from)?,
            },
            "source#setGeoJson" => MapCommand::SetGeoJson {
                source_id: args.required_str("sourceId")?.to_string(),
                collection: FeatureCollection::from_json_str(args.required_str("geojson")?)
                    .map_err(DecodeError::from)?,
            },
            "source#setFeature" => MapCommand::SetFeature {
                source_id: args.required_str("sourceId")?.to_string(),
                feature: Feature::from_json_str(args.required_str("geojsonFeature")?)
                    .map_err(DecodeError::from)?,
            },
            "symbolLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Symbol, args)?)
            }
            "lineLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Line, args)?)
            }
            "fillLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Fill, args)?)
            }
            "circleLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Circle, args)?)
            }
            "rasterLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Raster, args)?)
            }
            "hillshadeLayer#add" => {
                MapCommand::AddLayer(LayerDescriptor::decode(LayerKind::Hillshade, args)?)
            }
            "locationComponent#getLastLocation" => MapCommand::GetLastLocation,
            "style#addImage" => MapCommand::AddImage {
                name: args.required_str("name")?.to_string(),
                bytes: decode_image_bytes(args)?,
                sdf: args.required_bool("sdf")?,
            },
            "style#addImageSource" => MapCommand::AddImageSource {
                source_id: args.required_str("imageSourceId")?.to_string(),
                bytes: decode_image_bytes(args)?,
            },
            "style#addSource" => {
                let source_id = args.required_str("sourceId")?;
                MapCommand::AddSource(build_source(source_id, args.required("properties")?)?)
            }
            "style#removeSource" => {
                MapCommand::RemoveSource(args.required_str("sourceId")?.to_string())
            }
            "style#addLayer" => {
                MapCommand::AddImageLayer(LayerDescriptor::decode_image_layer(args, false)?)
            }
            "style#addLayerBelow" => {
                MapCommand::AddImageLayer(LayerDescriptor::decode_image_layer(args, true)?)
            }
            "style#removeLayer" => {
                MapCommand::RemoveLayer(args.required_str("layerId")?.to_string())
            }
            "style#setFilter" => MapCommand::SetFilter {
                layer_id: args.required_str("layerId")?.to_string(),
                filter: FilterExpression::parse(args.required_str("filter")?)?,
            },
            other => return Err(CommandError::NotImplemented(other.to_string())),
        };
        Ok(command)
    }

    pub fn method(&self) -> &'static str {
        match self {
            MapCommand::WaitForMap => "map#waitForMap",
            MapCommand::Update(_) => "map#update",
            MapCommand::UpdateMyLocationTrackingMode(_) => "map#updateMyLocationTrackingMode",
            MapCommand::MatchMapLanguageWithDeviceDefault => {
                "map#matchMapLanguageWithDeviceDefault"
            }
            MapCommand::SetMapLanguage(_) => "map#setMapLanguage",
            MapCommand::UpdateContentInsets { .. } => "map#updateContentInsets",
            MapCommand::SetStyle(_) => "map#setStyle",
            MapCommand::GetVisibleRegion => "map#getVisibleRegion",
            MapCommand::ToScreenLocation(_) => "map#toScreenLocation",
            MapCommand::ToScreenLocationBatch(_) => "map#toScreenLocationBatch",
            MapCommand::ToLatLng(_) => "map#toLatLng",
            MapCommand::GetMetersPerPixelAtLatitude(_) => "map#getMetersPerPixelAtLatitude",
            MapCommand::QueryRenderedFeatures { .. } => "map#queryRenderedFeatures",
            MapCommand::SetTelemetryEnabled(_) => "map#setTelemetryEnabled",
            MapCommand::GetTelemetryEnabled => "map#getTelemetryEnabled",
            MapCommand::InvalidateAmbientCache => "map#invalidateAmbientCache",
            MapCommand::TakeSnapshot => "map#takeSnapshot",
            MapCommand::MoveCamera(_) => "camera#move",
            MapCommand::AnimateCamera { .. } => "camera#animate",
            MapCommand::AddGeoJson { .. } => "source#addGeoJson",
            MapCommand::SetGeoJson { .. } => "source#setGeoJson",
            MapCommand::SetFeature { .. } => "source#setFeature",
            MapCommand::AddLayer(layer) => match layer.kind {
                LayerKind::Symbol => "symbolLayer#add",
                LayerKind::Line => "lineLayer#add",
                LayerKind::Fill => "fillLayer#add",
                LayerKind::Circle => "circleLayer#add",
                LayerKind::Raster => "rasterLayer#add",
                LayerKind::Hillshade => "hillshadeLayer#add",
            },
            MapCommand::GetLastLocation => "locationComponent#getLastLocation",
            MapCommand::AddImage { .. } => "style#addImage",
            MapCommand::AddImageSource { .. } => "style#addImageSource",
            MapCommand::AddSource(_) => "style#addSource",
            MapCommand::RemoveSource(_) => "style#removeSource",
            MapCommand::AddImageLayer(layer) if layer.below_layer_id.is_some() => {
                "style#addLayerBelow"
            }
            MapCommand::AddImageLayer(_) => "style#addLayer",
            MapCommand::RemoveLayer(_) => "style#removeLayer",
            MapCommand::SetFilter { .. } => "style#setFilter",
        }
    }

    /// Commands that mutate or read the loaded style.
    pub fn requires_style(&self) -> bool {
        matches!(
            self,
            MapCommand::MatchMapLanguageWithDeviceDefault
                | MapCommand::SetMapLanguage(_)
                | MapCommand::AddGeoJson { .. }
                | MapCommand::SetGeoJson { .. }
                | MapCommand::SetFeature { .. }
                | MapCommand::AddLayer(_)
                | MapCommand::AddImage { .. }
                | MapCommand::AddImageSource { .. }
                | MapCommand::AddSource(_)
                | MapCommand::RemoveSource(_)
                | MapCommand::AddImageLayer(_)
                | MapCommand::RemoveLayer(_)
                | MapCommand::SetFilter { .. }
        )
    }
}

/// Reads a flat `[lat, lng, lat, lng, ...]` sequence.
fn decode_flat_coordinates(value: &JsonValue) -> Result<Vec<LatLng>, DecodeError> {
    let items = decode_list(value, "coordinates")?;
    if items.len() % 2 != 0 {
        return Err(DecodeError::mismatch(
            "coordinates",
            "even number of values",
            format!("{} values", items.len()),
        ));
    }
    items
        .chunks_exact(2)
        .map(|pair| {
            Ok(LatLng::new(
                decode_f64(&pair[0], "coordinates")?,
                decode_f64(&pair[1], "coordinates")?,
            ))
        })
        .collect()
}

fn decode_query(args: &JsonMap) -> Result<MapCommand, DecodeError> {
    let geometry = if args.contains_key("x") {
        QueryGeometry::Point(ScreenCoordinate::new(
            args.required_f64("x")?,
            args.required_f64("y")?,
        ))
    } else {
        QueryGeometry::Box {
            top_left: ScreenCoordinate::new(args.required_f64("left")?, args.required_f64("top")?),
            bottom_right: ScreenCoordinate::new(
                args.required_f64("right")?,
                args.required_f64("bottom")?,
            ),
        }
    };
    let layer_ids = match args.optional("layerIds") {
        Some(ids) => decode_list(ids, "layerIds")?
            .iter()
            .map(|id| decode_str(id, "layerIds").map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let filter = args
        .optional("filter")
        .map(FilterExpression::from_value)
        .transpose()?
        .flatten();
    Ok(MapCommand::QueryRenderedFeatures {
        geometry,
        layer_ids,
        filter,
    })
}

/// Image bytes, cut to `length` when given.
fn decode_image_bytes(args: &JsonMap) -> Result<Vec<u8>, DecodeError> {
    let mut bytes = decode_bytes(args.required("bytes")?, "bytes")?;
    if let Some(length) = args.optional_i64("length")? {
        let length = usize::try_from(length)
            .ok()
            .filter(|length| *length <= bytes.len())
            .ok_or_else(|| {
                DecodeError::mismatch(
                    "length",
                    "length within bytes",
                    format!("{length} for {} bytes", bytes.len()),
                )
            })?;
        bytes.truncate(length);
    }
    Ok(bytes)
}
