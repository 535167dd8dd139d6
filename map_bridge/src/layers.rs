//! Layer descriptors and the per-kind table of recognised style properties.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::convert::{decode_map, decode_str, value_kind, ArgumentsExt, JsonMap};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Symbol,
    Line,
    Fill,
    Circle,
    Raster,
    Hillshade,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Symbol => "symbol",
            LayerKind::Line => "line",
            LayerKind::Fill => "fill",
            LayerKind::Circle => "circle",
            LayerKind::Raster => "raster",
            LayerKind::Hillshade => "hillshade",
        }
    }

    /// Whether the kind renders vector features, and so accepts a source
    /// layer, a filter, interaction and style properties.
    pub fn is_feature_layer(self) -> bool {
        matches!(
            self,
            LayerKind::Symbol | LayerKind::Line | LayerKind::Fill | LayerKind::Circle
        )
    }

    pub fn property_names(self) -> &'static [&'static str] {
        match self {
            LayerKind::Symbol => SYMBOL_PROPERTIES,
            LayerKind::Line => LINE_PROPERTIES,
            LayerKind::Fill => FILL_PROPERTIES,
            LayerKind::Circle => CIRCLE_PROPERTIES,
            LayerKind::Raster | LayerKind::Hillshade => &[],
        }
    }
}

const SYMBOL_PROPERTIES: &[&str] = &[
    "icon-opacity",
    "icon-color",
    "icon-halo-color",
    "icon-halo-width",
    "icon-halo-blur",
    "icon-translate",
    "icon-translate-anchor",
    "text-opacity",
    "text-color",
    "text-halo-color",
    "text-halo-width",
    "text-halo-blur",
    "text-translate",
    "text-translate-anchor",
    "symbol-placement",
    "symbol-spacing",
    "symbol-avoid-edges",
    "symbol-sort-key",
    "symbol-z-order",
    "icon-allow-overlap",
    "icon-ignore-placement",
    "icon-optional",
    "icon-rotation-alignment",
    "icon-size",
    "icon-text-fit",
    "icon-text-fit-padding",
    "icon-image",
    "icon-rotate",
    "icon-padding",
    "icon-keep-upright",
    "icon-offset",
    "icon-anchor",
    "icon-pitch-alignment",
    "text-pitch-alignment",
    "text-rotation-alignment",
    "text-field",
    "text-font",
    "text-size",
    "text-max-width",
    "text-line-height",
    "text-letter-spacing",
    "text-justify",
    "text-radial-offset",
    "text-variable-anchor",
    "text-anchor",
    "text-max-angle",
    "text-writing-mode",
    "text-rotate",
    "text-padding",
    "text-keep-upright",
    "text-transform",
    "text-offset",
    "text-allow-overlap",
    "text-ignore-placement",
    "text-optional",
    "visibility",
];

const CIRCLE_PROPERTIES: &[&str] = &[
    "circle-radius",
    "circle-color",
    "circle-blur",
    "circle-opacity",
    "circle-translate",
    "circle-translate-anchor",
    "circle-pitch-scale",
    "circle-pitch-alignment",
    "circle-stroke-width",
    "circle-stroke-color",
    "circle-stroke-opacity",
    "circle-sort-key",
    "visibility",
];

const LINE_PROPERTIES: &[&str] = &[
    "line-opacity",
    "line-color",
    "line-translate",
    "line-translate-anchor",
    "line-width",
    "line-gap-width",
    "line-offset",
    "line-blur",
    "line-dasharray",
    "line-pattern",
    "line-gradient",
    "line-cap",
    "line-join",
    "line-miter-limit",
    "line-round-limit",
    "line-sort-key",
    "visibility",
];

const FILL_PROPERTIES: &[&str] = &[
    "fill-antialias",
    "fill-opacity",
    "fill-color",
    "fill-outline-color",
    "fill-translate",
    "fill-translate-anchor",
    "fill-pattern",
    "fill-sort-key",
    "visibility",
];

/// A filter expression, kept as the decoded JSON it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression(JsonValue);

impl FilterExpression {
    /// Parses a JSON-encoded expression. Blank text means "no filter".
    pub fn parse(text: &str) -> Result<Option<Self>, DecodeError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|err| DecodeError::mismatch("filter", "JSON expression", err.to_string()))?;
        Self::from_expression(value).map(Some)
    }

    /// Accepts an expression either inline or as JSON-encoded text.
    pub fn from_value(value: &JsonValue) -> Result<Option<Self>, DecodeError> {
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::String(text) => Self::parse(text),
            other => Self::from_expression(other.clone()).map(Some),
        }
    }

    fn from_expression(value: JsonValue) -> Result<Self, DecodeError> {
        match value {
            JsonValue::Array(_) | JsonValue::Bool(_) => Ok(Self(value)),
            other => Err(DecodeError::mismatch(
                "filter",
                "expression",
                value_kind(&other),
            )),
        }
    }

    pub fn expression(&self) -> &JsonValue {
        &self.0
    }
}

/// One paint or layout property with its parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProperty {
    pub name: &'static str,
    pub value: JsonValue,
}

/// Decodes a `{name: "<json expression>"}` mapping against the property
/// table of `kind`. Unrecognised names are skipped.
pub fn decode_layer_properties(
    kind: LayerKind,
    value: &JsonValue,
) -> Result<Vec<LayerProperty>, DecodeError> {
    let entries = decode_map(value, "properties")?;
    let known = kind.property_names();
    let mut properties = Vec::with_capacity(entries.len());
    for (name, raw) in entries {
        let Some(&name) = known.iter().find(|known| **known == name.as_str()) else {
            debug!(
                target: "map_bridge::dispatch",
                layer_kind = kind.name(),
                property = %name,
                "layer_property.skipped=unknown"
            );
            continue;
        };
        let text = decode_str(raw, name)?;
        let value = serde_json::from_str(text)
            .map_err(|err| DecodeError::mismatch(name, "JSON expression", err.to_string()))?;
        properties.push(LayerProperty { name, value });
    }
    Ok(properties)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub id: String,
    pub source_id: String,
    pub kind: LayerKind,
    pub below_layer_id: Option<String>,
    pub source_layer: Option<String>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub interactive: bool,
    pub filter: Option<FilterExpression>,
    pub properties: Vec<LayerProperty>,
}

impl LayerDescriptor {
    pub fn new(kind: LayerKind, id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            kind,
            below_layer_id: None,
            source_layer: None,
            min_zoom: None,
            max_zoom: None,
            interactive: false,
            filter: None,
            properties: Vec::new(),
        }
    }

    /// Reads the arguments of a `<kind>Layer#add` call.
    pub fn decode(kind: LayerKind, args: &JsonMap) -> Result<Self, DecodeError> {
        let mut layer = Self::new(
            kind,
            args.required_str("layerId")?,
            args.required_str("sourceId")?,
        );
        layer.below_layer_id = args.optional_str("belowLayerId")?.map(str::to_string);
        layer.min_zoom = args.optional_f64("minzoom")?;
        layer.max_zoom = args.optional_f64("maxzoom")?;
        if kind.is_feature_layer() {
            layer.source_layer = args.optional_str("sourceLayer")?.map(str::to_string);
            layer.interactive = args.required_bool("enableInteraction")?;
            layer.filter = args
                .optional("filter")
                .map(FilterExpression::from_value)
                .transpose()?
                .flatten();
            layer.properties = args
                .optional("properties")
                .map(|properties| decode_layer_properties(kind, properties))
                .transpose()?
                .unwrap_or_default();
        }
        Ok(layer)
    }

    /// Reads the arguments of `style#addLayer` / `style#addLayerBelow`: a
    /// raster layer over an image source.
    pub fn decode_image_layer(args: &JsonMap, below: bool) -> Result<Self, DecodeError> {
        let mut layer = Self::new(
            LayerKind::Raster,
            args.required_str("imageLayerId")?,
            args.required_str("imageSourceId")?,
        );
        layer.min_zoom = args.optional_f64("minzoom")?;
        layer.max_zoom = args.optional_f64("maxzoom")?;
        if below {
            layer.below_layer_id = Some(args.required_str("belowLayerId")?.to_string());
        }
        Ok(layer)
    }
}
