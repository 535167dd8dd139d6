//! Per-view command dispatcher.
//!
//! A [`MapController`] owns the engine for one map view. It decodes each
//! inbound [`MethodCall`], runs it and answers through a [`Responder`].
//! Host lifecycle hooks (`on_*`) feed map state changes and gestures back in
//! and produce [`MapEvent`]s.
//!
//! All methods run on the host's UI thread. Engine completions may run
//! elsewhere; they only touch the responder, the event sink and the shared
//! drag state they captured.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, warn};

use crate::commands::MapCommand;
use crate::config::BridgeConfig;
use crate::convert::{encode_camera_position, encode_coordinate};
use crate::engine::{AnimationOutcome, Completion, MapEngine, QueryGeometry, StyleSource};
use crate::error::{CommandError, EngineFailure};
use crate::events::{DragPhase, EventSink, MapEvent};
use crate::gestures::{DragState, MoveGesture, SharedDragState};
use crate::options::{AnchorCorner, LocationRenderMode, LocationTrackingMode, MapOptionsSink};
use crate::registry::{FeatureCollectionRegistry, FeatureUpdate, InteractiveLayerSet};
use crate::reply::{Reply, Responder};
use crate::sources::SourceDescriptor;
use crate::{CameraOptions, Feature, LatLngBounds, MethodCall, ScreenCoordinate, UserLocation};

/// Half-width, in physical pixels, of the square hit-tested around a touch.
const HIT_SLOP_PX: f64 = 10.0;

/// Receiving ends handed to the host when a controller is created.
pub struct BridgeChannels {
    pub replies: Receiver<Reply>,
    pub events: Receiver<MapEvent>,
}

pub struct MapController<E: MapEngine> {
    engine: E,
    config: BridgeConfig,
    reply_tx: Sender<Reply>,
    events: EventSink,
    collections: FeatureCollectionRegistry,
    interactive_layers: InteractiveLayerSet,
    drag: SharedDragState,
    map_ready: bool,
    style_loaded: bool,
    map_ready_waiters: Vec<Responder>,
    pending_style: Option<StyleSource>,
    camera_target_bounds: Option<LatLngBounds>,
    track_camera_position: bool,
    drag_enabled: bool,
}

impl<E: MapEngine> MapController<E> {
    pub fn new(mut engine: E, config: BridgeConfig) -> (Self, BridgeChannels) {
        let (reply_tx, replies) = unbounded();
        let (event_tx, events) = unbounded();
        engine.view_options().set_drag_enabled(config.drag_enabled);
        let controller = Self {
            engine,
            drag_enabled: config.drag_enabled,
            config,
            reply_tx,
            events: EventSink::new(event_tx),
            collections: FeatureCollectionRegistry::new(),
            interactive_layers: InteractiveLayerSet::new(),
            drag: Arc::new(Mutex::new(DragState::default())),
            map_ready: false,
            style_loaded: false,
            map_ready_waiters: Vec::new(),
            pending_style: None,
            camera_target_bounds: None,
            track_camera_position: false,
        };
        (controller, BridgeChannels { replies, events })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn collections(&self) -> &FeatureCollectionRegistry {
        &self.collections
    }

    pub fn interactive_layers(&self) -> &InteractiveLayerSet {
        &self.interactive_layers
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.lock().clone()
    }

    pub fn is_map_ready(&self) -> bool {
        self.map_ready
    }

    pub fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    /// Decodes and runs one method call. Exactly one reply is sent for it,
    /// possibly after this returns.
    pub fn handle(&mut self, call: MethodCall) {
        debug!(
            target: "map_bridge::dispatch",
            method = %call.method,
            id = ?call.correlation_id,
            "command.received"
        );
        let responder = Responder::new(
            call.correlation_id,
            call.method.as_str(),
            self.reply_tx.clone(),
        );
        match MapCommand::decode(&call.method, &call.arguments, self.config.pixel_density) {
            Ok(command) => self.dispatch(command, responder),
            Err(err) => {
                warn!(
                    target: "map_bridge::dispatch",
                    method = %call.method,
                    code = err.code(),
                    error = %err,
                    "command.rejected"
                );
                responder.error(err);
            }
        }
    }

    fn dispatch(&mut self, command: MapCommand, responder: Responder) {
        let method = command.method();
        if command.requires_style() && !self.style_loaded {
            let err = CommandError::precondition(format!("{method} requires a loaded style"));
            warn!(target: "map_bridge::dispatch", method, error = %err, "command.rejected");
            responder.error(err);
            return;
        }

        let result = match command {
            MapCommand::WaitForMap => {
                if !self.map_ready {
                    self.map_ready_waiters.push(responder);
                    return;
                }
                Ok(JsonValue::Null)
            }
            MapCommand::Update(options) => {
                options.apply_to(self);
                Ok(self.tracked_camera())
            }
            MapCommand::UpdateMyLocationTrackingMode(mode) => {
                self.engine.view_options().set_my_location_tracking_mode(mode);
                Ok(JsonValue::Null)
            }
            MapCommand::MatchMapLanguageWithDeviceDefault => {
                match self.config.default_locale.clone() {
                    Some(locale) => localize(&mut self.engine, &locale),
                    None => Err(CommandError::precondition("no default locale configured")),
                }
            }
            MapCommand::SetMapLanguage(language) => localize(&mut self.engine, &language),
            MapCommand::UpdateContentInsets { insets, animated } => {
                let camera = CameraOptions {
                    padding: Some(insets),
                    ..Default::default()
                };
                if animated {
                    self.engine.fly_to(camera, None, animation_reply(responder));
                } else {
                    self.engine.ease_to(camera, animation_reply(responder));
                }
                return;
            }
            MapCommand::SetStyle(style) => {
                if self.map_ready {
                    self.load_style(style).map(|()| JsonValue::Null).map_err(CommandError::from)
                } else {
                    Err(CommandError::precondition("map is not ready"))
                }
            }
            MapCommand::GetVisibleRegion => {
                let region = self.engine.visible_region();
                Ok(json!({
                    "sw": encode_coordinate(region.southwest),
                    "ne": encode_coordinate(region.northeast),
                }))
            }
            MapCommand::ToScreenLocation(coordinate) => {
                let point = self.engine.pixel_for_coordinate(coordinate);
                Ok(json!({ "x": point.x, "y": point.y }))
            }
            MapCommand::ToScreenLocationBatch(coordinates) => {
                let flat: Vec<f64> = coordinates
                    .into_iter()
                    .flat_map(|coordinate| {
                        let point = self.engine.pixel_for_coordinate(coordinate);
                        [point.x, point.y]
                    })
                    .collect();
                Ok(json!(flat))
            }
            MapCommand::ToLatLng(point) => {
                let coordinate = self.engine.coordinate_for_pixel(point);
                Ok(json!({
                    "latitude": coordinate.latitude,
                    "longitude": coordinate.longitude,
                }))
            }
            MapCommand::GetMetersPerPixelAtLatitude(latitude) => Ok(json!({
                "metersperpixel": self.engine.meters_per_pixel_at_latitude(latitude),
            })),
            MapCommand::QueryRenderedFeatures {
                geometry,
                layer_ids,
                filter,
            } => {
                self.engine.query_rendered_features(
                    geometry,
                    layer_ids,
                    filter,
                    Box::new(move |result| responder.resolve(encode_query_result(result))),
                );
                return;
            }
            MapCommand::SetTelemetryEnabled(enabled) => {
                self.engine.set_telemetry_enabled(enabled);
                Ok(JsonValue::Null)
            }
            MapCommand::GetTelemetryEnabled => Ok(JsonValue::Bool(self.engine.telemetry_enabled())),
            MapCommand::InvalidateAmbientCache => {
                let done: Completion<Result<(), EngineFailure>> =
                    Box::new(move |result| responder.resolve(null_on_success(result)));
                self.engine.invalidate_ambient_cache(done);
                return;
            }
            MapCommand::TakeSnapshot => {
                self.engine.take_snapshot(Box::new(move |bytes: Option<Vec<u8>>| {
                    responder.success(bytes.map_or(JsonValue::Null, |bytes| json!(bytes)))
                }));
                return;
            }
            MapCommand::MoveCamera(update) => {
                let camera = update.resolve(&self.engine);
                self.engine.ease_to(camera, animation_reply(responder));
                return;
            }
            MapCommand::AnimateCamera { update, duration_ms } => {
                let camera = update.resolve(&self.engine);
                self.engine.fly_to(camera, duration_ms, animation_reply(responder));
                return;
            }
            MapCommand::AddGeoJson {
                source_id,
                collection,
            } => {
                let source = SourceDescriptor::geojson(source_id.as_str(), collection.clone());
                self.engine
                    .add_source(source)
                    .map(|()| {
                        self.collections.insert(&source_id, collection);
                        JsonValue::Null
                    })
                    .map_err(CommandError::from)
            }
            MapCommand::SetGeoJson {
                source_id,
                collection,
            } => self
                .engine
                .set_geojson_data(&source_id, &collection)
                .map(|()| {
                    self.collections.insert(&source_id, collection);
                    JsonValue::Null
                })
                .map_err(CommandError::from),
            MapCommand::SetFeature { source_id, feature } => self.set_feature(&source_id, feature),
            MapCommand::AddLayer(layer) => {
                let layer_id = layer.id.clone();
                let interactive = layer.interactive;
                self.engine
                    .add_layer(layer)
                    .map(|()| {
                        if interactive {
                            self.interactive_layers.insert(&layer_id);
                        }
                        JsonValue::Null
                    })
                    .map_err(CommandError::from)
            }
            MapCommand::GetLastLocation => match self.engine.last_known_location() {
                Some(location) => Ok(json!({
                    "latitude": location.position.latitude,
                    "longitude": location.position.longitude,
                    "altitude": location.altitude,
                })),
                None => Err(CommandError::precondition("no location fix available")),
            },
            MapCommand::AddImage { name, bytes, sdf } => {
                null_on_success(self.engine.add_image(&name, bytes, sdf))
            }
            MapCommand::AddImageSource { source_id, bytes } => {
                null_on_success(self.engine.add_image_source(&source_id, bytes))
            }
            MapCommand::AddSource(source) => {
                let inline = source.inline_features().cloned();
                let source_id = source.id.clone();
                self.engine
                    .add_source(source)
                    .map(|()| {
                        if let Some(collection) = inline {
                            self.collections.insert(&source_id, collection);
                        }
                        JsonValue::Null
                    })
                    .map_err(CommandError::from)
            }
            MapCommand::RemoveSource(source_id) => self
                .engine
                .remove_source(&source_id)
                .map(|()| {
                    self.collections.remove(&source_id);
                    JsonValue::Null
                })
                .map_err(CommandError::from),
            MapCommand::AddImageLayer(layer) => null_on_success(self.engine.add_layer(layer)),
            MapCommand::RemoveLayer(layer_id) => self
                .engine
                .remove_layer(&layer_id)
                .map(|()| {
                    self.interactive_layers.remove(&layer_id);
                    JsonValue::Null
                })
                .map_err(CommandError::from),
            MapCommand::SetFilter { layer_id, filter } => match filter {
                Some(filter) => null_on_success(self.engine.set_layer_filter(&layer_id, filter)),
                None => {
                    debug!(
                        target: "map_bridge::dispatch",
                        layer_id = %layer_id,
                        "filter.skipped=blank"
                    );
                    Ok(JsonValue::Null)
                }
            },
        };

        if let Err(err) = &result {
            match err {
                CommandError::Engine(failure) => error!(
                    target: "map_bridge::dispatch",
                    method,
                    code = %failure.code,
                    error = %failure.message,
                    "command.failed"
                ),
                other => warn!(
                    target: "map_bridge::dispatch",
                    method,
                    code = other.code(),
                    error = %other,
                    "command.failed"
                ),
            }
        }
        responder.resolve(result);
    }

    fn set_feature(
        &mut self,
        source_id: &str,
        feature: Feature,
    ) -> Result<JsonValue, CommandError> {
        match self.collections.with_feature(source_id, feature) {
            FeatureUpdate::Replaced(collection) => {
                self.engine.set_geojson_data(source_id, &collection)?;
                self.collections.insert(source_id, collection);
                Ok(JsonValue::Null)
            }
            FeatureUpdate::NoMatch => {
                debug!(
                    target: "map_bridge::dispatch",
                    source_id,
                    "feature.update_skipped=no_match"
                );
                Ok(JsonValue::Null)
            }
            FeatureUpdate::UnknownSource => Err(CommandError::precondition(format!(
                "no feature collection registered for source {source_id}"
            ))),
        }
    }

    fn load_style(&mut self, style: StyleSource) -> Result<(), EngineFailure> {
        self.style_loaded = false;
        self.interactive_layers.clear();
        self.collections = FeatureCollectionRegistry::new();
        self.drag.lock().clear();
        self.engine.load_style(style)
    }

    fn tracked_camera(&self) -> JsonValue {
        if self.track_camera_position {
            encode_camera_position(Some(&self.engine.camera_state()))
        } else {
            JsonValue::Null
        }
    }

    /// The host's map finished initialising. Loads the pending or
    /// configured style and releases `map#waitForMap` callers.
    pub fn on_map_ready(&mut self) {
        if self.map_ready {
            return;
        }
        self.map_ready = true;
        info!(target: "map_bridge::dispatch", "map.ready=true");

        let style = match self.pending_style.take() {
            Some(style) => Some(style),
            None => match StyleSource::resolve(&self.config.initial_style) {
                Ok(style) => Some(style),
                Err(err) => {
                    warn!(
                        target: "map_bridge::dispatch",
                        error = %err,
                        "style.initial_invalid"
                    );
                    None
                }
            },
        };
        if let Some(style) = style {
            if let Err(failure) = self.load_style(style) {
                error!(
                    target: "map_bridge::dispatch",
                    code = %failure.code,
                    error = %failure.message,
                    "style.load_failed"
                );
            }
        }

        for waiter in self.map_ready_waiters.drain(..) {
            waiter.success(JsonValue::Null);
        }
    }

    /// The engine finished loading the current style.
    pub fn on_style_loaded(&mut self) {
        self.style_loaded = true;
        if let Some(bounds) = self.camera_target_bounds {
            self.engine.set_camera_bounds(Some(bounds));
        }
        self.events.emit(MapEvent::StyleLoaded);
    }

    pub fn on_map_idle(&mut self) {
        let position = self
            .track_camera_position
            .then(|| self.engine.camera_state());
        self.events.emit(MapEvent::CameraIdle { position });
    }

    pub fn on_camera_changed(&mut self) {
        if self.track_camera_position {
            self.events.emit(MapEvent::CameraMove {
                position: self.engine.camera_state(),
            });
        }
    }

    pub fn on_map_click(&mut self, point: ScreenCoordinate) {
        self.report_tap(point, false);
    }

    pub fn on_map_long_click(&mut self, point: ScreenCoordinate) {
        self.report_tap(point, true);
    }

    fn report_tap(&mut self, point: ScreenCoordinate, long: bool) {
        let coordinate = self.engine.coordinate_for_pixel(point);
        let tap = move |feature_id| {
            if long {
                MapEvent::LongTap {
                    point,
                    coordinate,
                    feature_id,
                }
            } else {
                MapEvent::Tap {
                    point,
                    coordinate,
                    feature_id,
                }
            }
        };
        let Some(layers) = self.hit_test_layers() else {
            self.events.emit(tap(None));
            return;
        };
        let events = self.events.clone();
        self.engine.query_rendered_features(
            hit_area(point),
            layers,
            None,
            Box::new(move |result| {
                let feature_id = top_feature(result).and_then(|feature| feature.id);
                events.emit(tap(feature_id));
            }),
        );
    }

    /// Interactive layers to hit-test, topmost first; `None` when there is
    /// nothing to test against.
    fn hit_test_layers(&self) -> Option<Vec<String>> {
        if !self.style_loaded || self.interactive_layers.is_empty() {
            return None;
        }
        let layers = self
            .interactive_layers
            .hit_test_order(&self.engine.style_layer_ids());
        (!layers.is_empty()).then_some(layers)
    }

    /// A move gesture started. Starts a hit-test for a draggable feature
    /// under the focal point; returns whether one was started.
    pub fn on_move_begin(&mut self, gesture: MoveGesture) -> bool {
        if !self.drag_enabled || gesture.pointer_count != 1 || !gesture.began_with_touch_down {
            return false;
        }
        let Some(layers) = self.hit_test_layers() else {
            return false;
        };
        let point = gesture.focal_point;
        let origin = self.engine.coordinate_for_pixel(point);
        let generation = self.drag.lock().arm();
        let drag = Arc::clone(&self.drag);
        let events = self.events.clone();
        self.engine.query_rendered_features(
            hit_area(point),
            layers,
            None,
            Box::new(move |result| {
                let mut state = drag.lock();
                if !state.take_pending(generation) {
                    debug!(
                        target: "map_bridge::gestures",
                        generation,
                        "drag.skipped=gesture_over"
                    );
                    return;
                }
                let Some(feature) = top_feature(result) else {
                    return;
                };
                if !state.begin(&feature, origin) {
                    debug!(target: "map_bridge::gestures", "drag.skipped=not_draggable");
                    return;
                }
                debug!(target: "map_bridge::gestures", id = ?feature.id, "drag.started");
                if let Some(event) = state.advance(point, origin, DragPhase::Start) {
                    events.emit(event);
                }
            }),
        );
        true
    }

    /// The focal point moved. Emits a drag event while a drag is active. A
    /// second pointer ends the drag; returns `true` when that happened.
    pub fn on_move(&mut self, gesture: MoveGesture) -> bool {
        let mut state = self.drag.lock();
        if gesture.pointer_count > 1 && state.is_pending() {
            state.clear();
            debug!(target: "map_bridge::gestures", "drag.cancelled=second_pointer");
        }
        if !state.is_active() {
            return false;
        }
        let point = gesture.focal_point;
        let current = self.engine.coordinate_for_pixel(point);
        if gesture.pointer_count > 1 {
            if let Some(event) = state.advance(point, current, DragPhase::End) {
                self.events.emit(event);
            }
            state.clear();
            debug!(target: "map_bridge::gestures", "drag.ended=second_pointer");
            return true;
        }
        if let Some(event) = state.advance(point, current, DragPhase::Drag) {
            self.events.emit(event);
        }
        false
    }

    /// The gesture finished. Ends an active drag and disarms a hit-test that
    /// has not completed yet.
    pub fn on_move_end(&mut self, gesture: MoveGesture) {
        let mut state = self.drag.lock();
        if !state.is_active() {
            state.clear();
            return;
        }
        let point = gesture.focal_point;
        let current = self.engine.coordinate_for_pixel(point);
        if let Some(event) = state.advance(point, current, DragPhase::End) {
            self.events.emit(event);
        }
        state.clear();
        debug!(target: "map_bridge::gestures", "drag.ended=release");
    }

    pub fn on_user_location(&mut self, location: UserLocation) {
        self.events.emit(MapEvent::UserLocationUpdated(location));
    }
}

/// Options that change bridge state are kept here; the rest go to the
/// engine's view settings.
impl<E: MapEngine> MapOptionsSink for MapController<E> {
    fn set_camera_target_bounds(&mut self, bounds: Option<LatLngBounds>) {
        self.camera_target_bounds = bounds;
        self.engine.view_options().set_camera_target_bounds(bounds);
        if self.style_loaded {
            self.engine.set_camera_bounds(bounds);
        }
    }

    fn set_compass_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_compass_enabled(enabled);
    }

    fn set_style_string(&mut self, style: &str) {
        let source = match StyleSource::resolve(style) {
            Ok(source) => source,
            Err(err) => {
                warn!(target: "map_bridge::dispatch", error = %err, "style.rejected");
                return;
            }
        };
        self.engine.view_options().set_style_string(style);
        if !self.map_ready {
            self.pending_style = Some(source);
            return;
        }
        if let Err(failure) = self.load_style(source) {
            error!(
                target: "map_bridge::dispatch",
                code = %failure.code,
                error = %failure.message,
                "style.load_failed"
            );
        }
    }

    fn set_min_max_zoom_preference(&mut self, min: Option<f64>, max: Option<f64>) {
        self.engine.view_options().set_min_max_zoom_preference(min, max);
    }

    fn set_rotate_gestures_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_rotate_gestures_enabled(enabled);
    }

    fn set_scroll_gestures_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_scroll_gestures_enabled(enabled);
    }

    fn set_tilt_gestures_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_tilt_gestures_enabled(enabled);
    }

    fn set_track_camera_position(&mut self, enabled: bool) {
        self.track_camera_position = enabled;
        self.engine.view_options().set_track_camera_position(enabled);
    }

    fn set_zoom_gestures_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_zoom_gestures_enabled(enabled);
    }

    fn set_my_location_enabled(&mut self, enabled: bool) {
        self.engine.view_options().set_my_location_enabled(enabled);
    }

    fn set_my_location_tracking_mode(&mut self, mode: LocationTrackingMode) {
        self.engine.view_options().set_my_location_tracking_mode(mode);
    }

    fn set_my_location_render_mode(&mut self, mode: LocationRenderMode) {
        self.engine.view_options().set_my_location_render_mode(mode);
    }

    fn set_logo_view_margins(&mut self, x: i32, y: i32) {
        self.engine.view_options().set_logo_view_margins(x, y);
    }

    fn set_compass_gravity(&mut self, corner: AnchorCorner) {
        self.engine.view_options().set_compass_gravity(corner);
    }

    fn set_compass_view_margins(&mut self, x: i32, y: i32) {
        self.engine.view_options().set_compass_view_margins(x, y);
    }

    fn set_attribution_button_gravity(&mut self, corner: AnchorCorner) {
        self.engine.view_options().set_attribution_button_gravity(corner);
    }

    fn set_attribution_button_margins(&mut self, x: i32, y: i32) {
        self.engine.view_options().set_attribution_button_margins(x, y);
    }

    fn set_drag_enabled(&mut self, enabled: bool) {
        self.drag_enabled = enabled;
        if !enabled {
            self.drag.lock().clear();
        }
        self.engine.view_options().set_drag_enabled(enabled);
    }
}

fn localize<E: MapEngine>(engine: &mut E, locale: &str) -> Result<JsonValue, CommandError> {
    null_on_success(engine.localize_labels(locale))
}

fn null_on_success(result: Result<(), EngineFailure>) -> Result<JsonValue, CommandError> {
    result.map(|()| JsonValue::Null).map_err(CommandError::from)
}

fn animation_reply(responder: Responder) -> Completion<AnimationOutcome> {
    Box::new(move |outcome: AnimationOutcome| {
        responder.success(JsonValue::Bool(outcome.finished()))
    })
}

fn encode_query_result(
    result: Result<Vec<Feature>, EngineFailure>,
) -> Result<JsonValue, CommandError> {
    let features = result?;
    if features.is_empty() {
        return Ok(JsonValue::Null);
    }
    let encoded = features
        .iter()
        .map(Feature::to_json_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CommandError::Decode(err.into()))?;
    Ok(json!({ "features": encoded }))
}

fn hit_area(point: ScreenCoordinate) -> QueryGeometry {
    QueryGeometry::Box {
        top_left: ScreenCoordinate::new(point.x - HIT_SLOP_PX, point.y - HIT_SLOP_PX),
        bottom_right: ScreenCoordinate::new(point.x + HIT_SLOP_PX, point.y + HIT_SLOP_PX),
    }
}

/// The first hit, if any. Query failures count as no hit.
fn top_feature(result: Result<Vec<Feature>, EngineFailure>) -> Option<Feature> {
    match result {
        Ok(features) => features.into_iter().next(),
        Err(failure) => {
            warn!(
                target: "map_bridge::gestures",
                code = %failure.code,
                error = %failure.message,
                "hit_test.failed"
            );
            None
        }
    }
}
