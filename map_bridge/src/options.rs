//! Map view options: the closed set of recognised keys, their decoded form
//! and the sink they are applied to.

use serde_json::Value as JsonValue;

use crate::convert::{
    decode_bounds, decode_f64, decode_list, decode_map, decode_screen_point, element, ArgumentsExt,
};
use crate::engine::StyleSource;
use crate::error::DecodeError;
use crate::LatLngBounds;

/// Corner an ornament (compass, logo, attribution) is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorCorner {
    TopStart,
    TopEnd,
    BottomStart,
    BottomEnd,
}

impl TryFrom<i64> for AnchorCorner {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AnchorCorner::TopStart),
            1 => Ok(AnchorCorner::TopEnd),
            2 => Ok(AnchorCorner::BottomStart),
            3 => Ok(AnchorCorner::BottomEnd),
            other => Err(DecodeError::InvalidEnumValue {
                field: "anchor corner",
                value: other.to_string(),
            }),
        }
    }
}

impl AnchorCorner {
    /// Margins are relative to the corner: `x` is measured from the
    /// horizontal edge the corner touches, `y` from the vertical one. The
    /// two edges the corner does not touch keep their values.
    pub fn place_margins(self, mut margins: OrnamentMargins, x: i32, y: i32) -> OrnamentMargins {
        match self {
            AnchorCorner::TopStart => {
                margins.left = x;
                margins.top = y;
            }
            AnchorCorner::TopEnd => {
                margins.right = x;
                margins.top = y;
            }
            AnchorCorner::BottomStart => {
                margins.left = x;
                margins.bottom = y;
            }
            AnchorCorner::BottomEnd => {
                margins.right = x;
                margins.bottom = y;
            }
        }
        margins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationTrackingMode {
    #[default]
    None,
    Tracking,
    TrackingCompass,
    TrackingGps,
}

impl TryFrom<i64> for LocationTrackingMode {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LocationTrackingMode::None),
            1 => Ok(LocationTrackingMode::Tracking),
            2 => Ok(LocationTrackingMode::TrackingCompass),
            3 => Ok(LocationTrackingMode::TrackingGps),
            other => Err(DecodeError::InvalidEnumValue {
                field: "location tracking mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationRenderMode {
    #[default]
    Normal,
    Compass,
    Gps,
}

impl TryFrom<i64> for LocationRenderMode {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LocationRenderMode::Normal),
            1 => Ok(LocationRenderMode::Compass),
            2 => Ok(LocationRenderMode::Gps),
            other => Err(DecodeError::InvalidEnumValue {
                field: "location render mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration surface the options are applied to.
pub trait MapOptionsSink {
    fn set_camera_target_bounds(&mut self, bounds: Option<LatLngBounds>);
    fn set_compass_enabled(&mut self, enabled: bool);
    fn set_style_string(&mut self, style: &str);
    fn set_min_max_zoom_preference(&mut self, min: Option<f64>, max: Option<f64>);
    fn set_rotate_gestures_enabled(&mut self, enabled: bool);
    fn set_scroll_gestures_enabled(&mut self, enabled: bool);
    fn set_tilt_gestures_enabled(&mut self, enabled: bool);
    fn set_track_camera_position(&mut self, enabled: bool);
    fn set_zoom_gestures_enabled(&mut self, enabled: bool);
    fn set_my_location_enabled(&mut self, enabled: bool);
    fn set_my_location_tracking_mode(&mut self, mode: LocationTrackingMode);
    fn set_my_location_render_mode(&mut self, mode: LocationRenderMode);
    fn set_logo_view_margins(&mut self, x: i32, y: i32);
    fn set_compass_gravity(&mut self, corner: AnchorCorner);
    fn set_compass_view_margins(&mut self, x: i32, y: i32);
    fn set_attribution_button_gravity(&mut self, corner: AnchorCorner);
    fn set_attribution_button_margins(&mut self, x: i32, y: i32);
    fn set_drag_enabled(&mut self, enabled: bool);
}

/// Decoded options mapping. `None` means the key was absent (or null) and
/// the sink keeps its current value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapOptions {
    /// `Some(None)` clears the bounds.
    pub camera_target_bounds: Option<Option<LatLngBounds>>,
    pub compass_enabled: Option<bool>,
    pub style_string: Option<String>,
    pub min_max_zoom_preference: Option<(Option<f64>, Option<f64>)>,
    pub rotate_gestures_enabled: Option<bool>,
    pub scroll_gestures_enabled: Option<bool>,
    pub tilt_gestures_enabled: Option<bool>,
    pub track_camera_position: Option<bool>,
    pub zoom_gestures_enabled: Option<bool>,
    pub my_location_enabled: Option<bool>,
    pub my_location_tracking_mode: Option<LocationTrackingMode>,
    pub my_location_render_mode: Option<LocationRenderMode>,
    pub logo_view_margins: Option<(i32, i32)>,
    pub compass_view_position: Option<AnchorCorner>,
    pub compass_view_margins: Option<(i32, i32)>,
    pub attribution_button_position: Option<AnchorCorner>,
    pub attribution_button_margins: Option<(i32, i32)>,
    pub drag_enabled: Option<bool>,
}

fn decode_nullable_f64(value: &JsonValue, context: &str) -> Result<Option<f64>, DecodeError> {
    if value.is_null() {
        Ok(None)
    } else {
        decode_f64(value, context).map(Some)
    }
}

impl MapOptions {
    /// Decodes every recognised key before anything is applied, so a bad
    /// value leaves the sink untouched.
    pub fn decode(value: &JsonValue, density: f64) -> Result<Self, DecodeError> {
        let data = decode_map(value, "options")?;
        let mut options = MapOptions::default();

        if let Some(bounds) = data.optional("cameraTargetBounds") {
            let wrapped = decode_list(bounds, "cameraTargetBounds")?;
            let inner = element(wrapped, 0, "cameraTargetBounds")?;
            options.camera_target_bounds = Some(if inner.is_null() {
                None
            } else {
                Some(decode_bounds(inner, "cameraTargetBounds")?)
            });
        }
        options.compass_enabled = data.optional_bool("compassEnabled")?;
        if let Some(style) = data.optional_str("styleString")? {
            StyleSource::resolve(style)?;
            options.style_string = Some(style.to_string());
        }
        if let Some(zoom) = data.optional("minMaxZoomPreference") {
            let pair = decode_list(zoom, "minMaxZoomPreference")?;
            options.min_max_zoom_preference = Some((
                decode_nullable_f64(element(pair, 0, "minMaxZoomPreference")?, "minZoom")?,
                decode_nullable_f64(element(pair, 1, "minMaxZoomPreference")?, "maxZoom")?,
            ));
        }
        options.rotate_gestures_enabled = data.optional_bool("rotateGesturesEnabled")?;
        options.scroll_gestures_enabled = data.optional_bool("scrollGesturesEnabled")?;
        options.tilt_gestures_enabled = data.optional_bool("tiltGesturesEnabled")?;
        options.track_camera_position = data.optional_bool("trackCameraPosition")?;
        options.zoom_gestures_enabled = data.optional_bool("zoomGesturesEnabled")?;
        options.my_location_enabled = data.optional_bool("myLocationEnabled")?;
        options.my_location_tracking_mode = data
            .optional_i64("myLocationTrackingMode")?
            .map(LocationTrackingMode::try_from)
            .transpose()?;
        options.my_location_render_mode = data
            .optional_i64("myLocationRenderMode")?
            .map(LocationRenderMode::try_from)
            .transpose()?;
        options.logo_view_margins = data
            .optional("logoViewMargins")
            .map(|value| decode_screen_point(value, density, "logoViewMargins"))
            .transpose()?;
        options.compass_view_position = data
            .optional_i64("compassViewPosition")?
            .map(AnchorCorner::try_from)
            .transpose()?;
        options.compass_view_margins = data
            .optional("compassViewMargins")
            .map(|value| decode_screen_point(value, density, "compassViewMargins"))
            .transpose()?;
        options.attribution_button_position = data
            .optional_i64("attributionButtonPosition")?
            .map(AnchorCorner::try_from)
            .transpose()?;
        options.attribution_button_margins = data
            .optional("attributionButtonMargins")
            .map(|value| decode_screen_point(value, density, "attributionButtonMargins"))
            .transpose()?;
        options.drag_enabled = data.optional_bool("dragEnabled")?;

        Ok(options)
    }

    /// Applies the present fields in a fixed order. An ornament's position is
    /// applied before its margins, so margins land on the corner configured
    /// once this call has finished with it.
    pub fn apply_to<S: MapOptionsSink + ?Sized>(&self, sink: &mut S) {
        if let Some(bounds) = self.camera_target_bounds {
            sink.set_camera_target_bounds(bounds);
        }
        if let Some(enabled) = self.compass_enabled {
            sink.set_compass_enabled(enabled);
        }
        if let Some(style) = &self.style_string {
            sink.set_style_string(style);
        }
        if let Some((min, max)) = self.min_max_zoom_preference {
            sink.set_min_max_zoom_preference(min, max);
        }
        if let Some(enabled) = self.rotate_gestures_enabled {
            sink.set_rotate_gestures_enabled(enabled);
        }
        if let Some(enabled) = self.scroll_gestures_enabled {
            sink.set_scroll_gestures_enabled(enabled);
        }
        if let Some(enabled) = self.tilt_gestures_enabled {
            sink.set_tilt_gestures_enabled(enabled);
        }
        if let Some(enabled) = self.track_camera_position {
            sink.set_track_camera_position(enabled);
        }
        if let Some(enabled) = self.zoom_gestures_enabled {
            sink.set_zoom_gestures_enabled(enabled);
        }
        if let Some(enabled) = self.my_location_enabled {
            sink.set_my_location_enabled(enabled);
        }
        if let Some(mode) = self.my_location_tracking_mode {
            sink.set_my_location_tracking_mode(mode);
        }
        if let Some(mode) = self.my_location_render_mode {
            sink.set_my_location_render_mode(mode);
        }
        if let Some((x, y)) = self.logo_view_margins {
            sink.set_logo_view_margins(x, y);
        }
        if let Some(corner) = self.compass_view_position {
            sink.set_compass_gravity(corner);
        }
        if let Some((x, y)) = self.compass_view_margins {
            sink.set_compass_view_margins(x, y);
        }
        if let Some(corner) = self.attribution_button_position {
            sink.set_attribution_button_gravity(corner);
        }
        if let Some((x, y)) = self.attribution_button_margins {
            sink.set_attribution_button_margins(x, y);
        }
        if let Some(enabled) = self.drag_enabled {
            sink.set_drag_enabled(enabled);
        }
    }
}

/// Decodes `options` and applies it to `sink`. Nothing is applied when any
/// key fails to decode.
pub fn interpret_map_options<S: MapOptionsSink + ?Sized>(
    options: &JsonValue,
    density: f64,
    sink: &mut S,
) -> Result<(), DecodeError> {
    let decoded = MapOptions::decode(options, density)?;
    decoded.apply_to(sink);
    Ok(())
}

/// Physical pixel margins of an ornament from each edge of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrnamentMargins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ornament {
    pub enabled: bool,
    pub corner: AnchorCorner,
    pub margins: OrnamentMargins,
}

impl Ornament {
    fn pinned(corner: AnchorCorner) -> Self {
        Self {
            enabled: true,
            corner,
            margins: OrnamentMargins::default(),
        }
    }

    /// Sets the two margins relative to the current corner.
    pub fn set_margins(&mut self, x: i32, y: i32) {
        self.margins = self.corner.place_margins(self.margins, x, y);
    }
}

/// Plain record of every view setting; engines embed one and hand it out as
/// their options sink.
#[derive(Debug, Clone, PartialEq)]
pub struct MapViewSettings {
    pub camera_target_bounds: Option<LatLngBounds>,
    pub compass: Ornament,
    pub logo: Ornament,
    pub attribution: Ornament,
    pub style_string: Option<String>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub rotate_gestures_enabled: bool,
    pub scroll_gestures_enabled: bool,
    pub tilt_gestures_enabled: bool,
    pub zoom_gestures_enabled: bool,
    pub track_camera_position: bool,
    pub my_location_enabled: bool,
    pub my_location_tracking_mode: LocationTrackingMode,
    pub my_location_render_mode: LocationRenderMode,
    pub drag_enabled: bool,
}

impl Default for MapViewSettings {
    fn default() -> Self {
        Self {
            camera_target_bounds: None,
            compass: Ornament::pinned(AnchorCorner::TopEnd),
            logo: Ornament::pinned(AnchorCorner::BottomStart),
            attribution: Ornament::pinned(AnchorCorner::BottomStart),
            style_string: None,
            min_zoom: None,
            max_zoom: None,
            rotate_gestures_enabled: true,
            scroll_gestures_enabled: true,
            tilt_gestures_enabled: true,
            zoom_gestures_enabled: true,
            track_camera_position: false,
            my_location_enabled: false,
            my_location_tracking_mode: LocationTrackingMode::None,
            my_location_render_mode: LocationRenderMode::Normal,
            drag_enabled: true,
        }
    }
}

impl MapOptionsSink for MapViewSettings {
    fn set_camera_target_bounds(&mut self, bounds: Option<LatLngBounds>) {
        self.camera_target_bounds = bounds;
    }

    fn set_compass_enabled(&mut self, enabled: bool) {
        self.compass.enabled = enabled;
    }

    fn set_style_string(&mut self, style: &str) {
        self.style_string = Some(style.to_string());
    }

    fn set_min_max_zoom_preference(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min_zoom = min;
        self.max_zoom = max;
    }

    fn set_rotate_gestures_enabled(&mut self, enabled: bool) {
        self.rotate_gestures_enabled = enabled;
    }

    fn set_scroll_gestures_enabled(&mut self, enabled: bool) {
        self.scroll_gestures_enabled = enabled;
    }

    fn set_tilt_gestures_enabled(&mut self, enabled: bool) {
        self.tilt_gestures_enabled = enabled;
    }

    fn set_track_camera_position(&mut self, enabled: bool) {
        self.track_camera_position = enabled;
    }

    fn set_zoom_gestures_enabled(&mut self, enabled: bool) {
        self.zoom_gestures_enabled = enabled;
    }

    fn set_my_location_enabled(&mut self, enabled: bool) {
        self.my_location_enabled = enabled;
    }

    fn set_my_location_tracking_mode(&mut self, mode: LocationTrackingMode) {
        self.my_location_tracking_mode = mode;
    }

    fn set_my_location_render_mode(&mut self, mode: LocationRenderMode) {
        self.my_location_render_mode = mode;
    }

    fn set_logo_view_margins(&mut self, x: i32, y: i32) {
        self.logo.set_margins(x, y);
    }

    fn set_compass_gravity(&mut self, corner: AnchorCorner) {
        self.compass.corner = corner;
    }

    fn set_compass_view_margins(&mut self, x: i32, y: i32) {
        self.compass.set_margins(x, y);
    }

    fn set_attribution_button_gravity(&mut self, corner: AnchorCorner) {
        self.attribution.corner = corner;
    }

    fn set_attribution_button_margins(&mut self, x: i32, y: i32) {
        self.attribution.set_margins(x, y);
    }

    fn set_drag_enabled(&mut self, enabled: bool) {
        self.drag_enabled = enabled;
    }
}
