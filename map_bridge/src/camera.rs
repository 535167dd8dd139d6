use serde_json::Value as JsonValue;

use crate::convert::{
    decode_bounds, decode_coordinate, decode_f64, decode_list, decode_map, decode_str, element,
    pixels_from_logical, value_kind, ArgumentsExt,
};
use crate::engine::MapEngine;
use crate::error::DecodeError;
use crate::{CameraPosition, EdgeInsets, LatLng, LatLngBounds, ScreenCoordinate};

/// Partial camera handed to the engine. Unset fields keep the engine's
/// current value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOptions {
    pub center: Option<LatLng>,
    pub zoom: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
    pub anchor: Option<ScreenCoordinate>,
    pub padding: Option<EdgeInsets>,
}

impl CameraOptions {
    pub fn centered(center: LatLng) -> Self {
        Self {
            center: Some(center),
            ..Self::default()
        }
    }

    /// Reads a `{bearing?, target, tilt?, zoom?}` mapping; only the target is
    /// required.
    pub fn decode(value: &JsonValue) -> Result<Self, DecodeError> {
        let data = decode_map(value, "camera position")?;
        Ok(Self {
            center: Some(decode_coordinate(data.required("target")?, "target")?),
            zoom: data.optional_f64("zoom")?,
            bearing: data.optional_f64("bearing")?,
            pitch: data.optional_f64("tilt")?,
            ..Self::default()
        })
    }

    /// Overlays the set fields on `current`.
    pub fn apply_to(&self, current: &CameraPosition) -> CameraPosition {
        CameraPosition {
            bearing: self.bearing.unwrap_or(current.bearing),
            target: self.center.unwrap_or(current.target),
            tilt: self.pitch.unwrap_or(current.tilt),
            zoom: self.zoom.unwrap_or(current.zoom),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<CameraPosition> for CameraOptions {
    fn from(position: CameraPosition) -> Self {
        Self {
            center: Some(position.target),
            zoom: Some(position.zoom),
            bearing: Some(position.bearing),
            pitch: Some(position.tilt),
            ..Self::default()
        }
    }
}

/// Tagged camera command, decoded from `[tag, args...]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraUpdate {
    NewCameraPosition(CameraOptions),
    NewLatLng(LatLng),
    NewLatLngBounds {
        bounds: LatLngBounds,
        padding: EdgeInsets,
    },
    NewLatLngZoom {
        target: LatLng,
        zoom: f64,
    },
    /// Pan by a physical pixel offset.
    ScrollBy {
        dx: i32,
        dy: i32,
    },
    ZoomBy {
        amount: f64,
        focus: Option<ScreenCoordinate>,
    },
    ZoomIn,
    ZoomOut,
    ZoomTo(f64),
    BearingTo(f64),
    TiltTo(f64),
}

impl CameraUpdate {
    /// Decodes the tagged sequence; logical offsets are scaled by `density`.
    pub fn decode(value: &JsonValue, density: f64) -> Result<Self, DecodeError> {
        let items = decode_list(value, "cameraUpdate")?;
        let tag = decode_str(element(items, 0, "cameraUpdate")?, "cameraUpdate tag")?;
        let arg = |index: usize| element(items, index, tag);
        let logical = |index: usize| -> Result<f64, DecodeError> {
            Ok(pixels_from_logical(decode_f64(arg(index)?, tag)?, density) as f64)
        };
        match tag {
            "newCameraPosition" => Ok(CameraUpdate::NewCameraPosition(CameraOptions::decode(
                arg(1)?,
            )?)),
            "newLatLng" => Ok(CameraUpdate::NewLatLng(decode_coordinate(arg(1)?, tag)?)),
            "newLatLngBounds" => Ok(CameraUpdate::NewLatLngBounds {
                bounds: decode_bounds(arg(1)?, tag)?,
                padding: EdgeInsets::new(logical(2)?, logical(3)?, logical(4)?, logical(5)?),
            }),
            "newLatLngZoom" => Ok(CameraUpdate::NewLatLngZoom {
                target: decode_coordinate(arg(1)?, tag)?,
                zoom: decode_f64(arg(2)?, tag)?,
            }),
            "scrollBy" => Ok(CameraUpdate::ScrollBy {
                dx: logical(1)? as i32,
                dy: logical(2)? as i32,
            }),
            "zoomBy" => {
                let amount = decode_f64(arg(1)?, tag)?;
                let focus = match items.get(2) {
                    None | Some(JsonValue::Null) => None,
                    Some(point) => {
                        let pair = decode_list(point, "zoomBy focus")?;
                        if pair.len() != 2 {
                            return Err(DecodeError::mismatch(
                                "zoomBy focus",
                                "sequence of 2",
                                value_kind(point),
                            ));
                        }
                        Some(ScreenCoordinate::new(
                            pixels_from_logical(decode_f64(&pair[0], "zoomBy focus")?, density)
                                as f64,
                            pixels_from_logical(decode_f64(&pair[1], "zoomBy focus")?, density)
                                as f64,
                        ))
                    }
                };
                Ok(CameraUpdate::ZoomBy { amount, focus })
            }
            "zoomIn" => Ok(CameraUpdate::ZoomIn),
            "zoomOut" => Ok(CameraUpdate::ZoomOut),
            "zoomTo" => Ok(CameraUpdate::ZoomTo(decode_f64(arg(1)?, tag)?)),
            "bearingTo" => Ok(CameraUpdate::BearingTo(decode_f64(arg(1)?, tag)?)),
            "tiltTo" => Ok(CameraUpdate::TiltTo(decode_f64(arg(1)?, tag)?)),
            other => Err(DecodeError::UnknownCommandTag(other.to_string())),
        }
    }

    /// Resolves the update into absolute camera options. Relative updates are
    /// measured from the engine's current camera.
    pub fn resolve<E: MapEngine + ?Sized>(&self, engine: &E) -> CameraOptions {
        match *self {
            CameraUpdate::NewCameraPosition(options) => options,
            CameraUpdate::NewLatLng(target) => CameraOptions::centered(target),
            CameraUpdate::NewLatLngBounds { bounds, padding } => {
                engine.camera_for_bounds(bounds, padding)
            }
            CameraUpdate::NewLatLngZoom { target, zoom } => CameraOptions {
                zoom: Some(zoom),
                ..CameraOptions::centered(target)
            },
            CameraUpdate::ScrollBy { dx, dy } => {
                let current = engine.camera_state();
                let center = engine.pixel_for_coordinate(current.target);
                let moved = ScreenCoordinate::new(center.x + dx as f64, center.y + dy as f64);
                CameraOptions::centered(engine.coordinate_for_pixel(moved))
            }
            CameraUpdate::ZoomBy { amount, focus } => CameraOptions {
                zoom: Some(engine.camera_state().zoom + amount),
                anchor: focus,
                ..CameraOptions::default()
            },
            CameraUpdate::ZoomIn => CameraOptions {
                zoom: Some(engine.camera_state().zoom + 1.0),
                ..CameraOptions::default()
            },
            CameraUpdate::ZoomOut => CameraOptions {
                zoom: Some(engine.camera_state().zoom - 1.0),
                ..CameraOptions::default()
            },
            CameraUpdate::ZoomTo(zoom) => CameraOptions {
                zoom: Some(zoom),
                ..CameraOptions::default()
            },
            CameraUpdate::BearingTo(bearing) => CameraOptions {
                bearing: Some(bearing),
                ..CameraOptions::default()
            },
            CameraUpdate::TiltTo(pitch) => CameraOptions {
                pitch: Some(pitch),
                ..CameraOptions::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_lat_lng_zoom_keeps_axis_order() {
        let update = CameraUpdate::decode(&json!(["newLatLngZoom", [12.9, 77.6], 14.0]), 1.0)
            .expect("decodes");
        assert_eq!(
            update,
            CameraUpdate::NewLatLngZoom {
                target: LatLng::new(12.9, 77.6),
                zoom: 14.0
            }
        );
    }

    #[test]
    fn unknown_tag_is_reported() {
        let err = CameraUpdate::decode(&json!(["spinAround", 1.0]), 1.0).unwrap_err();
        assert_eq!(err, DecodeError::UnknownCommandTag("spinAround".into()));
    }

    #[test]
    fn missing_positional_argument_is_a_mismatch() {
        let err = CameraUpdate::decode(&json!(["zoomTo"]), 1.0).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }

    #[test]
    fn scroll_offsets_scale_with_density() {
        let update = CameraUpdate::decode(&json!(["scrollBy", 10.5, -4.0]), 2.0).unwrap();
        assert_eq!(update, CameraUpdate::ScrollBy { dx: 21, dy: -8 });
    }

    #[test]
    fn camera_position_requires_target_only() {
        let update = CameraUpdate::decode(
            &json!(["newCameraPosition", {"target": [1.0, 2.0], "zoom": 3.0}]),
            1.0,
        )
        .unwrap();
        let CameraUpdate::NewCameraPosition(options) = update else {
            panic!("unexpected update {update:?}");
        };
        assert_eq!(options.center, Some(LatLng::new(1.0, 2.0)));
        assert_eq!(options.zoom, Some(3.0));
        assert_eq!(options.bearing, None);

        let err = CameraUpdate::decode(&json!(["newCameraPosition", {"zoom": 3.0}]), 1.0)
            .unwrap_err();
        assert_eq!(err, DecodeError::missing("target"));
    }

    #[test]
    fn options_overlay_current_camera() {
        let current = CameraPosition {
            bearing: 10.0,
            target: LatLng::new(1.0, 1.0),
            tilt: 5.0,
            zoom: 4.0,
        };
        let options = CameraOptions {
            zoom: Some(8.0),
            ..CameraOptions::default()
        };
        let next = options.apply_to(&current);
        assert_eq!(next.zoom, 8.0);
        assert_eq!(next.target, current.target);
        assert_eq!(next.bearing, 10.0);
    }
}
