mod common;

use common::Bridge;
use map_bridge::{CommandError, DecodeError, MapEngine, StyleSource};
use serde_json::{json, Value as JsonValue};

#[test]
fn unknown_method_is_not_implemented() {
    let mut bridge = Bridge::ready();
    let err = bridge.call("foo#bar", json!({})).unwrap_err();
    assert_eq!(err, CommandError::NotImplemented("foo#bar".to_string()));
    assert_eq!(err.code(), "NOT_IMPLEMENTED");
}

#[test]
fn wait_for_map_is_released_by_map_ready() {
    let mut bridge = Bridge::new();
    let first = bridge.send("map#waitForMap", JsonValue::Null);
    let second = bridge.send("map#waitForMap", JsonValue::Null);
    assert!(bridge.replies().is_empty());

    bridge.controller.on_map_ready();
    let replies = bridge.replies();
    let ids: Vec<_> = replies.iter().map(|reply| reply.correlation_id).collect();
    assert_eq!(ids, vec![Some(first), Some(second)]);
    assert!(replies.iter().all(|reply| reply.result == Ok(JsonValue::Null)));

    // Once ready, later waiters resolve immediately.
    assert_eq!(bridge.call("map#waitForMap", JsonValue::Null), Ok(JsonValue::Null));
}

#[test]
fn initial_style_comes_from_config() {
    let mut bridge = Bridge::new();
    bridge.controller.on_map_ready();
    assert!(matches!(bridge.engine().style(), Some(StyleSource::Json(_))));
    assert_eq!(bridge.engine().style_layer_ids(), vec!["background", "water"]);
}

#[test]
fn style_commands_wait_for_the_style() {
    let mut bridge = Bridge::new();
    bridge.controller.on_map_ready();
    for (method, arguments) in [
        ("style#removeLayer", json!({"layerId": "water"})),
        ("source#addGeoJson", json!({"sourceId": "pts", "geojson": common::feature_collection(&[])})),
        ("map#setMapLanguage", json!({"language": "fr"})),
        ("style#addImage", json!({"name": "pin", "bytes": [1, 2], "sdf": false})),
    ] {
        let err = bridge.call(method, arguments).unwrap_err();
        assert!(
            matches!(err, CommandError::PreconditionNotMet(_)),
            "{method} returned {err:?}"
        );
    }

    bridge.controller.on_style_loaded();
    assert_eq!(
        bridge.call("map#setMapLanguage", json!({"language": "fr"})),
        Ok(JsonValue::Null)
    );
    assert_eq!(bridge.engine().locale(), Some("fr"));
}

#[test]
fn set_style_before_ready_is_rejected() {
    let mut bridge = Bridge::new();
    let err = bridge
        .call("map#setStyle", json!({"style": "mapbox://styles/mapbox/dark-v10"}))
        .unwrap_err();
    assert!(matches!(err, CommandError::PreconditionNotMet(_)));
}

#[test]
fn set_style_resets_style_state() {
    let mut bridge = Bridge::ready();
    bridge
        .call("source#addGeoJson", json!({"sourceId": "pts", "geojson": common::feature_collection(&[("a", true)])}))
        .unwrap();
    bridge
        .call("circleLayer#add", json!({"sourceId": "pts", "layerId": "dots", "enableInteraction": true}))
        .unwrap();

    bridge
        .call("map#setStyle", json!({"style": "outdoors.json"}))
        .unwrap();
    assert_eq!(
        bridge.engine().style(),
        Some(&StyleSource::Uri("asset://outdoors.json".into()))
    );
    assert!(!bridge.controller.is_style_loaded());
    assert!(bridge.controller.collections().is_empty());
    assert!(bridge.controller.interactive_layers().is_empty());
}

#[test]
fn decode_failures_carry_their_kind() {
    let mut bridge = Bridge::ready();

    let err = bridge.call("map#toLatLng", json!({"x": 1.0})).unwrap_err();
    assert_eq!(err, CommandError::Decode(DecodeError::MissingArgument("y".into())));

    let err = bridge
        .call("map#toLatLng", json!({"x": "1", "y": 2.0}))
        .unwrap_err();
    assert_eq!(err.code(), "TYPE_MISMATCH");

    let err = bridge
        .call("camera#move", json!({"cameraUpdate": ["spin", 1.0]}))
        .unwrap_err();
    assert_eq!(err, CommandError::Decode(DecodeError::UnknownCommandTag("spin".into())));

    let err = bridge
        .call("map#updateMyLocationTrackingMode", json!({"mode": 9}))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ENUM_VALUE");
}

#[test]
fn map_update_applies_options_to_the_view() {
    let mut bridge = Bridge::ready();
    let reply = bridge
        .call(
            "map#update",
            json!({"options": {
                "compassEnabled": false,
                "minMaxZoomPreference": [3.0, 15.0],
                "dragEnabled": false
            }}),
        )
        .unwrap();
    assert_eq!(reply, JsonValue::Null);

    let settings = bridge.engine().settings().clone();
    assert!(!settings.compass.enabled);
    assert_eq!(settings.min_zoom, Some(3.0));
    assert_eq!(settings.max_zoom, Some(15.0));
    assert!(!settings.drag_enabled);
}

#[test]
fn map_update_rejects_an_empty_style_string() {
    let mut bridge = Bridge::ready();
    let err = bridge
        .call(
            "map#update",
            json!({"options": {"compassEnabled": false, "styleString": ""}}),
        )
        .unwrap_err();
    assert_eq!(err.code(), "TYPE_MISMATCH");
    assert!(bridge.engine().settings().compass.enabled);
    assert!(bridge.controller.is_style_loaded());
}

#[test]
fn telemetry_round_trips() {
    let mut bridge = Bridge::ready();
    assert_eq!(bridge.call("map#getTelemetryEnabled", json!({})), Ok(json!(true)));
    bridge
        .call("map#setTelemetryEnabled", json!({"enabled": false}))
        .unwrap();
    assert_eq!(bridge.call("map#getTelemetryEnabled", json!({})), Ok(json!(false)));
}

#[test]
fn match_language_uses_configured_locale() {
    let mut bridge = Bridge::ready();
    bridge
        .call("map#matchMapLanguageWithDeviceDefault", JsonValue::Null)
        .unwrap();
    assert_eq!(bridge.engine().locale(), Some("en"));
}

#[test]
fn replies_encode_to_the_wire_envelope() {
    let mut bridge = Bridge::ready();
    let id = bridge.send("foo#bar", JsonValue::Null);
    let reply = bridge.take_reply(id).unwrap();
    assert_eq!(
        reply.to_json(),
        json!({
            "id": id,
            "error": {"code": "NOT_IMPLEMENTED", "message": "method not implemented: foo#bar"}
        })
    );
}
