//! Capability surface of the map engine the bridge drives.
//!
//! Production code binds [`MapEngine`] to a real renderer; tests and the
//! harness bind it to [`crate::headless::HeadlessEngine`]. Operations that
//! complete asynchronously take a boxed completion which the engine must call
//! exactly once.

use crate::camera::CameraOptions;
use crate::error::{DecodeError, EngineFailure};
use crate::layers::{FilterExpression, LayerDescriptor};
use crate::options::MapOptionsSink;
use crate::sources::SourceDescriptor;
use crate::{
    CameraPosition, EdgeInsets, Feature, FeatureCollection, LatLng, LatLngBounds,
    ScreenCoordinate, UserLocation,
};

pub type Completion<T> = Box<dyn FnOnce(T) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Finished,
    Cancelled,
}

impl AnimationOutcome {
    pub fn finished(self) -> bool {
        self == AnimationOutcome::Finished
    }
}

/// Screen region a rendered-feature query covers, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryGeometry {
    Point(ScreenCoordinate),
    Box {
        top_left: ScreenCoordinate,
        bottom_right: ScreenCoordinate,
    },
}

impl QueryGeometry {
    /// Whether the geometry touches the rectangle spanned by `min` and `max`.
    pub fn touches(&self, min: ScreenCoordinate, max: ScreenCoordinate) -> bool {
        let (low, high) = match *self {
            QueryGeometry::Point(at) => (at, at),
            QueryGeometry::Box {
                top_left,
                bottom_right,
            } => (top_left, bottom_right),
        };
        low.x <= max.x && high.x >= min.x && low.y <= max.y && high.y >= min.y
    }
}

/// Where a style is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    Uri(String),
    Json(String),
}

impl StyleSource {
    /// Inline JSON starts with `{` or `[`; absolute paths become `file://`
    /// URIs; `http(s)://` and `mapbox://` pass through; any other string
    /// names a bundled asset.
    pub fn resolve(style: &str) -> Result<Self, DecodeError> {
        let trimmed = style.trim_start();
        if trimmed.is_empty() {
            return Err(DecodeError::mismatch("style", "style string", "empty text"));
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Ok(StyleSource::Json(style.to_string()));
        }
        if style.starts_with('/') {
            return Ok(StyleSource::Uri(format!("file://{style}")));
        }
        const PASS_THROUGH: [&str; 4] = ["http://", "https://", "mapbox://", "file://"];
        if PASS_THROUGH.iter().any(|scheme| style.starts_with(scheme)) {
            return Ok(StyleSource::Uri(style.to_string()));
        }
        Ok(StyleSource::Uri(format!("asset://{style}")))
    }
}

pub trait MapEngine {
    /// View-level settings the options mapping is applied to.
    fn view_options(&mut self) -> &mut dyn MapOptionsSink;

    /// Starts loading a style. Completion is reported through the
    /// controller's `on_style_loaded` hook.
    fn load_style(&mut self, style: StyleSource) -> Result<(), EngineFailure>;
    /// Layer ids of the loaded style in paint order, bottom first.
    fn style_layer_ids(&self) -> Vec<String>;

    fn add_source(&mut self, source: SourceDescriptor) -> Result<(), EngineFailure>;
    fn remove_source(&mut self, id: &str) -> Result<(), EngineFailure>;
    /// Replaces the whole feature collection of a GeoJSON source.
    fn set_geojson_data(
        &mut self,
        source_id: &str,
        data: &FeatureCollection,
    ) -> Result<(), EngineFailure>;
    fn add_image_source(&mut self, id: &str, bytes: Vec<u8>) -> Result<(), EngineFailure>;

    fn add_layer(&mut self, layer: LayerDescriptor) -> Result<(), EngineFailure>;
    fn remove_layer(&mut self, id: &str) -> Result<(), EngineFailure>;
    fn set_layer_filter(&mut self, id: &str, filter: FilterExpression)
        -> Result<(), EngineFailure>;

    fn add_image(&mut self, name: &str, bytes: Vec<u8>, sdf: bool) -> Result<(), EngineFailure>;
    fn localize_labels(&mut self, locale: &str) -> Result<(), EngineFailure>;
    fn set_camera_bounds(&mut self, bounds: Option<LatLngBounds>);

    fn query_rendered_features(
        &mut self,
        geometry: QueryGeometry,
        layer_ids: Vec<String>,
        filter: Option<FilterExpression>,
        done: Completion<Result<Vec<Feature>, EngineFailure>>,
    );

    /// Short implicit-duration transition. Starting a transition cancels any
    /// transition still in flight.
    fn ease_to(&mut self, camera: CameraOptions, done: Completion<AnimationOutcome>);
    fn fly_to(
        &mut self,
        camera: CameraOptions,
        duration_ms: Option<u64>,
        done: Completion<AnimationOutcome>,
    );

    fn camera_state(&self) -> CameraPosition;
    fn camera_for_bounds(&self, bounds: LatLngBounds, padding: EdgeInsets) -> CameraOptions;
    fn pixel_for_coordinate(&self, coordinate: LatLng) -> ScreenCoordinate;
    fn coordinate_for_pixel(&self, pixel: ScreenCoordinate) -> LatLng;
    fn visible_region(&self) -> LatLngBounds;
    fn meters_per_pixel_at_latitude(&self, latitude: f64) -> f64;

    fn set_telemetry_enabled(&mut self, enabled: bool);
    fn telemetry_enabled(&self) -> bool;
    fn invalidate_ambient_cache(&mut self, done: Completion<Result<(), EngineFailure>>);
    /// PNG bytes of the current frame, or `None` if no frame was available.
    fn take_snapshot(&mut self, done: Completion<Option<Vec<u8>>>);
    fn last_known_location(&self) -> Option<UserLocation>;
}
