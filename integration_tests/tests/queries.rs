mod common;

use common::Bridge;
use map_bridge::{CommandError, Feature, LatLng, ScreenCoordinate, UserLocation};
use serde_json::{json, Value as JsonValue};

fn place(bridge: &mut Bridge, layer: &str, id: &str, kind: &str) {
    let feature = Feature::from_value(json!({
        "type": "Feature",
        "id": id,
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
        "properties": {"kind": kind}
    }))
    .unwrap();
    bridge.engine().place_feature(
        layer,
        ScreenCoordinate::new(0.0, 0.0),
        ScreenCoordinate::new(50.0, 50.0),
        feature,
    );
}

#[test]
fn point_query_returns_encoded_features() {
    let mut bridge = Bridge::ready();
    place(&mut bridge, "water", "lake", "water");

    let reply = bridge
        .call("map#queryRenderedFeatures", json!({"x": 10.0, "y": 10.0, "layerIds": ["water"]}))
        .unwrap();
    let features = reply["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    let decoded = Feature::from_json_str(features[0].as_str().unwrap()).unwrap();
    assert_eq!(decoded.property("kind"), Some(&json!("water")));
}

#[test]
fn empty_query_replies_null() {
    let mut bridge = Bridge::ready();
    place(&mut bridge, "water", "lake", "water");
    let reply = bridge.call(
        "map#queryRenderedFeatures",
        json!({"left": 300.0, "top": 300.0, "right": 400.0, "bottom": 400.0}),
    );
    assert_eq!(reply, Ok(JsonValue::Null));
}

#[test]
fn query_filter_narrows_results() {
    let mut bridge = Bridge::ready();
    place(&mut bridge, "water", "lake", "water");
    place(&mut bridge, "water", "pond", "pond");

    let reply = bridge
        .call(
            "map#queryRenderedFeatures",
            json!({
                "left": 0.0, "top": 0.0, "right": 20.0, "bottom": 20.0,
                "filter": ["==", ["get", "kind"], "pond"]
            }),
        )
        .unwrap();
    assert_eq!(reply["features"].as_array().unwrap().len(), 1);

    let err = bridge
        .call("map#queryRenderedFeatures", json!({"x": 1.0, "y": 1.0, "filter": 42}))
        .unwrap_err();
    assert_eq!(err.code(), "TYPE_MISMATCH");
}

#[test]
fn snapshot_and_cache_reply_after_settling() {
    let mut bridge = Bridge::ready();
    bridge.engine().set_snapshot(Some(vec![137, 80, 78, 71]));
    let snapshot = bridge.send("map#takeSnapshot", JsonValue::Null);
    let cache = bridge.send("map#invalidateAmbientCache", JsonValue::Null);
    assert!(bridge.engine().has_pending_work());

    assert_eq!(bridge.settle(), 2);
    let replies = bridge.replies();
    assert_eq!(replies[0].correlation_id, Some(snapshot));
    assert_eq!(replies[0].result, Ok(json!([137, 80, 78, 71])));
    assert_eq!(replies[1].correlation_id, Some(cache));
    assert_eq!(replies[1].result, Ok(JsonValue::Null));

    bridge.engine().set_snapshot(None);
    assert_eq!(bridge.call("map#takeSnapshot", JsonValue::Null), Ok(JsonValue::Null));
}

#[test]
fn last_location_needs_a_fix() {
    let mut bridge = Bridge::ready();
    let err = bridge
        .call("locationComponent#getLastLocation", JsonValue::Null)
        .unwrap_err();
    assert!(matches!(err, CommandError::PreconditionNotMet(_)));

    bridge.engine().set_last_location(Some(UserLocation {
        position: LatLng::new(51.5, -0.12),
        altitude: 11.0,
        speed: 0.0,
        bearing: 0.0,
        horizontal_accuracy: 3.0,
        vertical_accuracy: Some(2.0),
        timestamp_ms: 0,
    }));
    assert_eq!(
        bridge.call("locationComponent#getLastLocation", JsonValue::Null),
        Ok(json!({"latitude": 51.5, "longitude": -0.12, "altitude": 11.0}))
    );
}
