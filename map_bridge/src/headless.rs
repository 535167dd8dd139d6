//! In-memory [`MapEngine`] with no renderer behind it.
//!
//! Used by the integration tests and the bridge harness. Asynchronous
//! operations queue their completions until [`HeadlessEngine::settle`] runs
//! them, so callers can observe deferred replies deterministically.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::f64::consts::PI;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::camera::CameraOptions;
use crate::engine::{AnimationOutcome, Completion, MapEngine, QueryGeometry, StyleSource};
use crate::error::EngineFailure;
use crate::layers::{FilterExpression, LayerDescriptor, LayerKind};
use crate::options::{MapOptionsSink, MapViewSettings};
use crate::sources::{build_source, GeoJsonData, SourceDescriptor, SourceKind};
use crate::{
    CameraPosition, EdgeInsets, Feature, FeatureCollection, LatLng, LatLngBounds,
    ScreenCoordinate, UserLocation,
};

const TILE_SIZE: f64 = 256.0;
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

struct PlacedFeature {
    layer_id: String,
    top_left: ScreenCoordinate,
    bottom_right: ScreenCoordinate,
    feature: Feature,
}

struct PendingAnimation {
    target: CameraPosition,
    done: Completion<AnimationOutcome>,
}

type PendingTask = Box<dyn FnOnce() + Send>;

pub struct HeadlessEngine {
    settings: MapViewSettings,
    camera: CameraPosition,
    viewport: (f64, f64),
    style: Option<StyleSource>,
    layers: Vec<LayerDescriptor>,
    sources: BTreeMap<String, SourceDescriptor>,
    images: BTreeSet<String>,
    placed: Vec<PlacedFeature>,
    animation: Option<PendingAnimation>,
    tasks: VecDeque<PendingTask>,
    telemetry_enabled: bool,
    locale: Option<String>,
    camera_bounds: Option<LatLngBounds>,
    last_location: Option<UserLocation>,
    snapshot: Option<Vec<u8>>,
    call_log: Vec<String>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl HeadlessEngine {
    /// A viewport of `width` x `height` physical pixels.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            settings: MapViewSettings::default(),
            camera: CameraPosition::default(),
            viewport: (width, height),
            style: None,
            layers: Vec::new(),
            sources: BTreeMap::new(),
            images: BTreeSet::new(),
            placed: Vec::new(),
            animation: None,
            tasks: VecDeque::new(),
            telemetry_enabled: true,
            locale: None,
            camera_bounds: None,
            last_location: None,
            snapshot: None,
            call_log: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MapViewSettings {
        &self.settings
    }

    pub fn style(&self) -> Option<&StyleSource> {
        self.style.as_ref()
    }

    pub fn source(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images.contains(name)
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn camera_bounds(&self) -> Option<LatLngBounds> {
        self.camera_bounds
    }

    pub fn call_log(&self) -> &[String] {
        &self.call_log
    }

    pub fn take_call_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.call_log)
    }

    pub fn set_camera(&mut self, camera: CameraPosition) {
        self.camera = camera;
    }

    pub fn set_last_location(&mut self, location: Option<UserLocation>) {
        self.last_location = location;
    }

    /// Bytes returned by the next snapshot; `None` simulates a missing frame.
    pub fn set_snapshot(&mut self, bytes: Option<Vec<u8>>) {
        self.snapshot = bytes;
    }

    /// Makes `feature` hit-testable on `layer_id` inside the given screen
    /// rectangle. Later placements are drawn above earlier ones.
    pub fn place_feature(
        &mut self,
        layer_id: &str,
        top_left: ScreenCoordinate,
        bottom_right: ScreenCoordinate,
        feature: Feature,
    ) {
        self.placed.push(PlacedFeature {
            layer_id: layer_id.to_string(),
            top_left,
            bottom_right,
            feature,
        });
    }

    pub fn has_pending_work(&self) -> bool {
        self.animation.is_some() || !self.tasks.is_empty()
    }

    /// Completes the in-flight animation and every queued completion.
    /// Returns the number of completions delivered.
    pub fn settle(&mut self) -> usize {
        let mut delivered = 0;
        if let Some(animation) = self.animation.take() {
            self.camera = animation.target;
            self.log(format!("animation.finished zoom={}", self.camera.zoom));
            (animation.done)(AnimationOutcome::Finished);
            delivered += 1;
        }
        while let Some(task) = self.tasks.pop_front() {
            task();
            delivered += 1;
        }
        debug!(target: "map_bridge::headless", delivered, "headless.settled");
        delivered
    }

    /// Cancels the in-flight animation, as a user gesture would.
    pub fn interrupt(&mut self) {
        if let Some(animation) = self.animation.take() {
            self.log("animation.cancelled reason=interrupt".to_string());
            (animation.done)(AnimationOutcome::Cancelled);
        }
    }

    fn log(&mut self, entry: String) {
        debug!(target: "map_bridge::headless", entry = %entry, "headless.call");
        self.call_log.push(entry);
    }

    fn pixels_per_degree(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.camera.zoom) / 360.0
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    fn start_animation(&mut self, camera: CameraOptions, done: Completion<AnimationOutcome>) {
        if let Some(previous) = self.animation.take() {
            self.log("animation.cancelled reason=superseded".to_string());
            (previous.done)(AnimationOutcome::Cancelled);
        }
        let mut target = camera.apply_to(&self.camera);
        if let Some(min) = self.settings.min_zoom {
            target.zoom = target.zoom.max(min);
        }
        if let Some(max) = self.settings.max_zoom {
            target.zoom = target.zoom.min(max);
        }
        self.animation = Some(PendingAnimation { target, done });
    }

    fn load_style_layers(&mut self, json: &str) -> Result<(), EngineFailure> {
        let style: JsonValue = serde_json::from_str(json)
            .map_err(|err| EngineFailure::new("STYLE_PARSE_ERROR", err.to_string()))?;
        if let Some(sources) = style.get("sources").and_then(JsonValue::as_object) {
            for (id, definition) in sources {
                match build_source(id, definition) {
                    Ok(source) => {
                        self.sources.insert(id.clone(), source);
                    }
                    Err(err) => debug!(
                        target: "map_bridge::headless",
                        source_id = %id,
                        error = %err,
                        "style.source_skipped"
                    ),
                }
            }
        }
        if let Some(layers) = style.get("layers").and_then(JsonValue::as_array) {
            for layer in layers {
                let Some(id) = layer.get("id").and_then(JsonValue::as_str) else {
                    continue;
                };
                let source = layer.get("source").and_then(JsonValue::as_str).unwrap_or("");
                let kind = match layer.get("type").and_then(JsonValue::as_str) {
                    Some("symbol") => LayerKind::Symbol,
                    Some("line") => LayerKind::Line,
                    Some("circle") => LayerKind::Circle,
                    Some("raster") => LayerKind::Raster,
                    Some("hillshade") => LayerKind::Hillshade,
                    _ => LayerKind::Fill,
                };
                self.layers.push(LayerDescriptor::new(kind, id, source));
            }
        }
        Ok(())
    }
}

/// Evaluates the filter forms the headless engine understands:
/// booleans and `["==" | "!=", key | ["get", key], value]`. Anything else
/// matches every feature.
fn filter_matches(filter: &FilterExpression, feature: &Feature) -> bool {
    let expression = filter.expression();
    if let Some(flag) = expression.as_bool() {
        return flag;
    }
    let Some([operator, key, expected]) = expression.as_array().map(Vec::as_slice).and_then(
        |items| <&[JsonValue; 3]>::try_from(items).ok(),
    ) else {
        return true;
    };
    let key = match key {
        JsonValue::String(key) => key.as_str(),
        JsonValue::Array(get) if get.len() == 2 && get[0] == "get" => match get[1].as_str() {
            Some(key) => key,
            None => return true,
        },
        _ => return true,
    };
    let actual = feature.property(key);
    match operator.as_str() {
        Some("==") => actual == Some(expected),
        Some("!=") => actual != Some(expected),
        _ => true,
    }
}

impl MapEngine for HeadlessEngine {
    fn view_options(&mut self) -> &mut dyn MapOptionsSink {
        &mut self.settings
    }

    fn load_style(&mut self, style: StyleSource) -> Result<(), EngineFailure> {
        self.layers.clear();
        self.sources.clear();
        self.images.clear();
        self.placed.clear();
        match &style {
            StyleSource::Uri(uri) => self.log(format!("load_style uri={uri}")),
            StyleSource::Json(json) => {
                self.log("load_style json".to_string());
                self.load_style_layers(json)?;
            }
        }
        self.style = Some(style);
        Ok(())
    }

    fn style_layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    fn add_source(&mut self, source: SourceDescriptor) -> Result<(), EngineFailure> {
        if self.sources.contains_key(&source.id) {
            return Err(EngineFailure::new(
                "SOURCE_EXISTS",
                format!("Source '{}' already exists", source.id),
            ));
        }
        self.log(format!("add_source {} type={}", source.id, source.kind.type_name()));
        self.sources.insert(source.id.clone(), source);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), EngineFailure> {
        if let Some(layer) = self.layers.iter().find(|layer| layer.source_id == id) {
            return Err(EngineFailure::new(
                "SOURCE_IN_USE",
                format!("Source '{id}' is in use by layer '{}'", layer.id),
            ));
        }
        if self.sources.remove(id).is_none() {
            return Err(EngineFailure::new(
                "SOURCE_NOT_FOUND",
                format!("Source '{id}' does not exist"),
            ));
        }
        self.log(format!("remove_source {id}"));
        Ok(())
    }

    fn set_geojson_data(
        &mut self,
        source_id: &str,
        data: &FeatureCollection,
    ) -> Result<(), EngineFailure> {
        let Some(source) = self.sources.get_mut(source_id) else {
            return Err(EngineFailure::new(
                "SOURCE_NOT_FOUND",
                format!("Source '{source_id}' does not exist"),
            ));
        };
        let SourceKind::GeoJson { data: current, .. } = &mut source.kind else {
            return Err(EngineFailure::new(
                "INVALID SOURCE TYPE",
                format!("Source '{source_id}' is not a GeoJSON source"),
            ));
        };
        *current = GeoJsonData::Inline(data.clone());
        self.log(format!("set_geojson_data {source_id} features={}", data.len()));
        Ok(())
    }

    fn add_image_source(&mut self, id: &str, bytes: Vec<u8>) -> Result<(), EngineFailure> {
        self.add_source(SourceDescriptor {
            id: id.to_string(),
            kind: SourceKind::ImageData(bytes),
        })
    }

    fn add_layer(&mut self, layer: LayerDescriptor) -> Result<(), EngineFailure> {
        if self.layer_index(&layer.id).is_some() {
            return Err(EngineFailure::new(
                "LAYER_EXISTS",
                format!("Layer '{}' already exists", layer.id),
            ));
        }
        if !self.sources.contains_key(&layer.source_id) {
            return Err(EngineFailure::new(
                "SOURCE_NOT_FOUND",
                format!("Source '{}' does not exist", layer.source_id),
            ));
        }
        let index = match &layer.below_layer_id {
            Some(below) => self.layer_index(below).ok_or_else(|| {
                EngineFailure::new("LAYER_NOT_FOUND", format!("Layer '{below}' does not exist"))
            })?,
            None => self.layers.len(),
        };
        self.log(format!(
            "add_layer {} kind={} source={} index={index}",
            layer.id,
            layer.kind.name(),
            layer.source_id
        ));
        self.layers.insert(index, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), EngineFailure> {
        let Some(index) = self.layer_index(id) else {
            return Err(EngineFailure::new(
                "LAYER_NOT_FOUND",
                format!("Layer '{id}' does not exist"),
            ));
        };
        self.layers.remove(index);
        self.placed.retain(|placed| placed.layer_id != id);
        self.log(format!("remove_layer {id}"));
        Ok(())
    }

    fn set_layer_filter(
        &mut self,
        id: &str,
        filter: FilterExpression,
    ) -> Result<(), EngineFailure> {
        let Some(index) = self.layer_index(id) else {
            return Err(EngineFailure::new(
                "LAYER_NOT_FOUND",
                format!("Layer '{id}' does not exist"),
            ));
        };
        let layer = &mut self.layers[index];
        if !layer.kind.is_feature_layer() {
            return Err(EngineFailure::new(
                "INVALID LAYER TYPE",
                format!("Layer '{id}' does not support filtering."),
            ));
        }
        layer.filter = Some(filter);
        self.log(format!("set_layer_filter {id}"));
        Ok(())
    }

    fn add_image(&mut self, name: &str, bytes: Vec<u8>, sdf: bool) -> Result<(), EngineFailure> {
        self.log(format!("add_image {name} bytes={} sdf={sdf}", bytes.len()));
        self.images.insert(name.to_string());
        Ok(())
    }

    fn localize_labels(&mut self, locale: &str) -> Result<(), EngineFailure> {
        if locale.trim().is_empty() {
            return Err(EngineFailure::new(
                "MAPBOX LOCALIZATION PLUGIN ERROR",
                "empty locale",
            ));
        }
        self.log(format!("localize_labels {locale}"));
        self.locale = Some(locale.to_string());
        Ok(())
    }

    fn set_camera_bounds(&mut self, bounds: Option<LatLngBounds>) {
        self.log(format!("set_camera_bounds set={}", bounds.is_some()));
        self.camera_bounds = bounds;
    }

    fn query_rendered_features(
        &mut self,
        geometry: QueryGeometry,
        layer_ids: Vec<String>,
        filter: Option<FilterExpression>,
        done: Completion<Result<Vec<Feature>, EngineFailure>>,
    ) {
        let order = if layer_ids.is_empty() {
            self.style_layer_ids().into_iter().rev().collect()
        } else {
            layer_ids
        };
        let mut hits = Vec::new();
        for layer_id in &order {
            for placed in self.placed.iter().rev() {
                if &placed.layer_id != layer_id
                    || !geometry.touches(placed.top_left, placed.bottom_right)
                {
                    continue;
                }
                if filter
                    .as_ref()
                    .map_or(true, |filter| filter_matches(filter, &placed.feature))
                {
                    hits.push(placed.feature.clone());
                }
            }
        }
        self.log(format!(
            "query_rendered_features layers={} hits={}",
            order.join(","),
            hits.len()
        ));
        self.tasks.push_back(Box::new(move || done(Ok(hits))));
    }

    fn ease_to(&mut self, camera: CameraOptions, done: Completion<AnimationOutcome>) {
        self.log(format!("ease_to {}", describe_camera(&camera)));
        self.start_animation(camera, done);
    }

    fn fly_to(
        &mut self,
        camera: CameraOptions,
        duration_ms: Option<u64>,
        done: Completion<AnimationOutcome>,
    ) {
        let duration = duration_ms.map_or_else(|| "default".to_string(), |ms| ms.to_string());
        self.log(format!(
            "fly_to {} duration={duration}",
            describe_camera(&camera)
        ));
        self.start_animation(camera, done);
    }

    fn camera_state(&self) -> CameraPosition {
        self.camera
    }

    fn camera_for_bounds(&self, bounds: LatLngBounds, padding: EdgeInsets) -> CameraOptions {
        let width = (self.viewport.0 - padding.left - padding.right).max(1.0);
        let height = (self.viewport.1 - padding.top - padding.bottom).max(1.0);
        let fit = |pixels: f64, span: f64| (pixels * 360.0 / (span * TILE_SIZE)).log2();
        let zoom = match (bounds.longitude_span(), bounds.latitude_span()) {
            (lng, lat) if lng > 0.0 && lat > 0.0 => fit(width, lng).min(fit(height, lat)),
            (lng, _) if lng > 0.0 => fit(width, lng),
            (_, lat) if lat > 0.0 => fit(height, lat),
            _ => self.camera.zoom,
        };
        CameraOptions {
            zoom: Some(zoom),
            ..CameraOptions::centered(bounds.center())
        }
    }

    fn pixel_for_coordinate(&self, coordinate: LatLng) -> ScreenCoordinate {
        let scale = self.pixels_per_degree();
        ScreenCoordinate::new(
            self.viewport.0 / 2.0 + (coordinate.longitude - self.camera.target.longitude) * scale,
            self.viewport.1 / 2.0 - (coordinate.latitude - self.camera.target.latitude) * scale,
        )
    }

    fn coordinate_for_pixel(&self, pixel: ScreenCoordinate) -> LatLng {
        let scale = self.pixels_per_degree();
        LatLng::new(
            self.camera.target.latitude - (pixel.y - self.viewport.1 / 2.0) / scale,
            self.camera.target.longitude + (pixel.x - self.viewport.0 / 2.0) / scale,
        )
    }

    fn visible_region(&self) -> LatLngBounds {
        LatLngBounds::new(
            self.coordinate_for_pixel(ScreenCoordinate::new(0.0, self.viewport.1)),
            self.coordinate_for_pixel(ScreenCoordinate::new(self.viewport.0, 0.0)),
        )
    }

    fn meters_per_pixel_at_latitude(&self, latitude: f64) -> f64 {
        EARTH_CIRCUMFERENCE_M * (latitude * PI / 180.0).cos()
            / (TILE_SIZE * 2f64.powf(self.camera.zoom))
    }

    fn set_telemetry_enabled(&mut self, enabled: bool) {
        self.log(format!("set_telemetry_enabled {enabled}"));
        self.telemetry_enabled = enabled;
    }

    fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    fn invalidate_ambient_cache(&mut self, done: Completion<Result<(), EngineFailure>>) {
        self.log("invalidate_ambient_cache".to_string());
        self.tasks.push_back(Box::new(move || done(Ok(()))));
    }

    fn take_snapshot(&mut self, done: Completion<Option<Vec<u8>>>) {
        self.log("take_snapshot".to_string());
        let snapshot = self.snapshot.clone();
        self.tasks.push_back(Box::new(move || done(snapshot)));
    }

    fn last_known_location(&self) -> Option<UserLocation> {
        self.last_location.clone()
    }
}

fn describe_camera(camera: &CameraOptions) -> String {
    let mut parts = Vec::new();
    if let Some(center) = camera.center {
        parts.push(format!("center={},{}", center.latitude, center.longitude));
    }
    if let Some(zoom) = camera.zoom {
        parts.push(format!("zoom={zoom}"));
    }
    if let Some(bearing) = camera.bearing {
        parts.push(format!("bearing={bearing}"));
    }
    if let Some(pitch) = camera.pitch {
        parts.push(format!("pitch={pitch}"));
    }
    if let Some(padding) = camera.padding {
        parts.push(format!(
            "padding={},{},{},{}",
            padding.left, padding.top, padding.right, padding.bottom
        ));
    }
    if parts.is_empty() {
        "unchanged".to_string()
    } else {
        parts.join(" ")
    }
}
