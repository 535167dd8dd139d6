//! Conversions between the generic wire values and the bridge's domain types.
//!
//! Every decoder takes a `context` naming the argument being read so a
//! mismatch reports where it happened. Decoders never coerce: a value of the
//! wrong shape is a [`DecodeError::TypeMismatch`], never a default.

use serde_json::{json, Map, Value as JsonValue};

use crate::error::DecodeError;
use crate::{CameraPosition, LatLng, LatLngBounds};

pub type JsonMap = Map<String, JsonValue>;

/// Short name of a value's shape, used in mismatch reports.
pub fn value_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "text",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}

pub fn decode_bool(value: &JsonValue, context: &str) -> Result<bool, DecodeError> {
    value
        .as_bool()
        .ok_or_else(|| DecodeError::mismatch(context, "boolean", value_kind(value)))
}

pub fn decode_f64(value: &JsonValue, context: &str) -> Result<f64, DecodeError> {
    value
        .as_f64()
        .ok_or_else(|| DecodeError::mismatch(context, "number", value_kind(value)))
}

/// Accepts any integral JSON number, including ones written as `3.0`.
pub fn decode_i64(value: &JsonValue, context: &str) -> Result<i64, DecodeError> {
    if let Some(integer) = value.as_i64() {
        return Ok(integer);
    }
    match value.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => Ok(float as i64),
        Some(float) => Err(DecodeError::mismatch(context, "integer", float.to_string())),
        None => Err(DecodeError::mismatch(context, "integer", value_kind(value))),
    }
}

pub fn decode_str<'a>(value: &'a JsonValue, context: &str) -> Result<&'a str, DecodeError> {
    value
        .as_str()
        .ok_or_else(|| DecodeError::mismatch(context, "text", value_kind(value)))
}

pub fn decode_list<'a>(
    value: &'a JsonValue,
    context: &str,
) -> Result<&'a [JsonValue], DecodeError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DecodeError::mismatch(context, "sequence", value_kind(value)))
}

pub fn decode_map<'a>(value: &'a JsonValue, context: &str) -> Result<&'a JsonMap, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| DecodeError::mismatch(context, "mapping", value_kind(value)))
}

/// Element `index` of a positional sequence; a short sequence is a mismatch.
pub fn element<'a>(
    items: &'a [JsonValue],
    index: usize,
    context: &str,
) -> Result<&'a JsonValue, DecodeError> {
    items.get(index).ok_or_else(|| {
        DecodeError::mismatch(
            context,
            "longer sequence",
            format!("sequence of {}", items.len()),
        )
    })
}

fn decode_pair(value: &JsonValue, context: &str) -> Result<(f64, f64), DecodeError> {
    let items = decode_list(value, context)?;
    if items.len() != 2 {
        return Err(DecodeError::mismatch(
            context,
            "sequence of 2",
            format!("sequence of {}", items.len()),
        ));
    }
    Ok((decode_f64(&items[0], context)?, decode_f64(&items[1], context)?))
}

/// Reads an outward-facing `[latitude, longitude]` pair.
pub fn decode_coordinate(value: &JsonValue, context: &str) -> Result<LatLng, DecodeError> {
    let (latitude, longitude) = decode_pair(value, context)?;
    Ok(LatLng::new(latitude, longitude))
}

/// Reads a sequence of coordinate pairs. With `flipped` the pairs are
/// `[longitude, latitude]`, otherwise `[latitude, longitude]`.
pub fn decode_coordinate_list(
    value: &JsonValue,
    flipped: bool,
    context: &str,
) -> Result<Vec<LatLng>, DecodeError> {
    decode_list(value, context)?
        .iter()
        .map(|pair| {
            let (first, second) = decode_pair(pair, context)?;
            Ok(if flipped {
                LatLng::new(second, first)
            } else {
                LatLng::new(first, second)
            })
        })
        .collect()
}

/// Reads `[[south, west], [north, east]]`.
pub fn decode_bounds(value: &JsonValue, context: &str) -> Result<LatLngBounds, DecodeError> {
    let items = decode_list(value, context)?;
    if items.len() != 2 {
        return Err(DecodeError::mismatch(
            context,
            "sequence of 2 corners",
            format!("sequence of {}", items.len()),
        ));
    }
    Ok(LatLngBounds::new(
        decode_coordinate(&items[0], context)?,
        decode_coordinate(&items[1], context)?,
    ))
}

/// Decodes a fully populated `{bearing, target, tilt, zoom}` mapping.
pub fn decode_camera_position(value: &JsonValue) -> Result<CameraPosition, DecodeError> {
    let data = decode_map(value, "camera position")?;
    Ok(CameraPosition {
        bearing: data.required_f64("bearing")?,
        target: decode_coordinate(data.required("target")?, "target")?,
        tilt: data.required_f64("tilt")?,
        zoom: data.required_f64("zoom")?,
    })
}

/// Encodes a camera as `{bearing, target, tilt, zoom}`; null when absent.
pub fn encode_camera_position(position: Option<&CameraPosition>) -> JsonValue {
    match position {
        Some(position) => json!({
            "bearing": position.bearing,
            "target": encode_coordinate(position.target),
            "tilt": position.tilt,
            "zoom": position.zoom,
        }),
        None => JsonValue::Null,
    }
}

pub fn encode_coordinate(coordinate: LatLng) -> JsonValue {
    json!(coordinate.to_pair())
}

/// Scales a logical (density independent) length to physical pixels,
/// truncating toward zero.
pub fn pixels_from_logical(value: f64, density: f64) -> i32 {
    (value * density) as i32
}

/// Reads a logical `[x, y]` pair into physical pixels.
pub fn decode_screen_point(
    value: &JsonValue,
    density: f64,
    context: &str,
) -> Result<(i32, i32), DecodeError> {
    let (x, y) = decode_pair(value, context)?;
    Ok((pixels_from_logical(x, density), pixels_from_logical(y, density)))
}

/// Reads a sequence of byte values.
pub fn decode_bytes(value: &JsonValue, context: &str) -> Result<Vec<u8>, DecodeError> {
    decode_list(value, context)?
        .iter()
        .map(|item| {
            let byte = decode_i64(item, context)?;
            u8::try_from(byte).map_err(|_| DecodeError::mismatch(context, "byte", byte.to_string()))
        })
        .collect()
}

/// Keyed access into a command's argument mapping.
///
/// A required key that is absent is [`DecodeError::MissingArgument`]; a
/// required key holding null is a type mismatch. Optional keys treat null the
/// same as absent.
pub trait ArgumentsExt {
    fn required(&self, key: &str) -> Result<&JsonValue, DecodeError>;
    fn optional(&self, key: &str) -> Option<&JsonValue>;

    fn required_str(&self, key: &str) -> Result<&str, DecodeError> {
        decode_str(self.required(key)?, key)
    }

    fn required_f64(&self, key: &str) -> Result<f64, DecodeError> {
        decode_f64(self.required(key)?, key)
    }

    fn required_i64(&self, key: &str) -> Result<i64, DecodeError> {
        decode_i64(self.required(key)?, key)
    }

    fn required_bool(&self, key: &str) -> Result<bool, DecodeError> {
        decode_bool(self.required(key)?, key)
    }

    fn optional_str(&self, key: &str) -> Result<Option<&str>, DecodeError> {
        self.optional(key).map(|value| decode_str(value, key)).transpose()
    }

    fn optional_f64(&self, key: &str) -> Result<Option<f64>, DecodeError> {
        self.optional(key).map(|value| decode_f64(value, key)).transpose()
    }

    fn optional_i64(&self, key: &str) -> Result<Option<i64>, DecodeError> {
        self.optional(key).map(|value| decode_i64(value, key)).transpose()
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>, DecodeError> {
        self.optional(key).map(|value| decode_bool(value, key)).transpose()
    }
}

impl ArgumentsExt for JsonMap {
    fn required(&self, key: &str) -> Result<&JsonValue, DecodeError> {
        match self.get(key) {
            None => Err(DecodeError::missing(key)),
            Some(JsonValue::Null) => Err(DecodeError::mismatch(key, "value", "null")),
            Some(value) => Ok(value),
        }
    }

    fn optional(&self, key: &str) -> Option<&JsonValue> {
        self.get(key).filter(|value| !value.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn coordinate_reads_latitude_then_longitude() {
        let coordinate = decode_coordinate(&json!([12.9, 77.6]), "target").unwrap();
        assert_eq!(coordinate, LatLng::new(12.9, 77.6));
    }

    #[test]
    fn coordinate_rejects_wrong_arity_and_shape() {
        assert!(matches!(
            decode_coordinate(&json!([1.0]), "target"),
            Err(DecodeError::TypeMismatch { .. })
        ));
        let err = decode_coordinate(&json!({"lat": 1.0}), "target").unwrap_err();
        assert_eq!(
            err,
            DecodeError::mismatch("target", "sequence", "mapping")
        );
    }

    #[test]
    fn flipped_lists_swap_axes() {
        let pairs = json!([[1.0, 2.0], [3.0, 4.0], [-5.5, 60.25]]);
        let straight = decode_coordinate_list(&pairs, false, "coordinates").unwrap();
        let flipped = decode_coordinate_list(&pairs, true, "coordinates").unwrap();
        assert_eq!(straight.len(), flipped.len());
        for (a, b) in straight.iter().zip(&flipped) {
            assert_eq!(a.latitude, b.longitude);
            assert_eq!(a.longitude, b.latitude);
        }
    }

    #[test]
    fn camera_position_round_trips() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..64 {
            let position = CameraPosition {
                bearing: rng.gen_range(0.0..360.0),
                target: LatLng::new(rng.gen_range(-85.0..85.0), rng.gen_range(-180.0..180.0)),
                tilt: rng.gen_range(0.0..60.0),
                zoom: rng.gen_range(0.0..22.0),
            };
            let encoded = encode_camera_position(Some(&position));
            let decoded = decode_camera_position(&encoded).unwrap();
            assert_eq!(encode_camera_position(Some(&decoded)), encoded);
            assert_eq!(decoded, position);
        }
    }

    #[test]
    fn absent_camera_encodes_null() {
        assert_eq!(encode_camera_position(None), JsonValue::Null);
    }

    #[test]
    fn pixels_truncate_toward_zero() {
        assert_eq!(pixels_from_logical(10.9, 1.0), 10);
        assert_eq!(pixels_from_logical(-10.9, 1.0), -10);
        assert_eq!(pixels_from_logical(8.0, 2.75), 22);
    }

    #[test]
    fn integers_accept_integral_floats_only() {
        assert_eq!(decode_i64(&json!(3.0), "mode").unwrap(), 3);
        assert!(decode_i64(&json!(3.5), "mode").is_err());
        assert!(decode_i64(&json!("3"), "mode").is_err());
    }

    #[test]
    fn absent_and_null_are_distinguished() {
        let args = json!({"sourceId": null, "layerId": "roads"});
        let args = args.as_object().unwrap();
        assert_eq!(
            args.required("belowLayerId"),
            Err(DecodeError::missing("belowLayerId"))
        );
        assert!(matches!(
            args.required("sourceId"),
            Err(DecodeError::TypeMismatch { .. })
        ));
        assert_eq!(args.optional_str("sourceId").unwrap(), None);
        assert_eq!(args.required_str("layerId").unwrap(), "roads");
    }

    #[test]
    fn bytes_must_fit_in_a_byte() {
        assert_eq!(decode_bytes(&json!([0, 255]), "bytes").unwrap(), vec![0, 255]);
        assert!(decode_bytes(&json!([256]), "bytes").is_err());
    }
}
