mod common;

use common::{feature_collection, Bridge};
use map_bridge::{DragPhase, Feature, FeatureId, MapEvent, MoveGesture, ScreenCoordinate};
use serde_json::json;

fn marker(id: &str, draggable: bool) -> Feature {
    Feature::from_value(json!({
        "type": "Feature",
        "id": id,
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
        "properties": {"draggable": draggable}
    }))
    .unwrap()
}

/// A ready map with an interactive circle layer and `feature` drawn around
/// screen point (100, 100).
fn map_with(feature: Feature) -> Bridge {
    let mut bridge = Bridge::ready();
    bridge
        .call(
            "source#addGeoJson",
            json!({"sourceId": "pts", "geojson": feature_collection(&[("a", true), ("b", false)])}),
        )
        .unwrap();
    bridge
        .call(
            "circleLayer#add",
            json!({"sourceId": "pts", "layerId": "dots", "enableInteraction": true}),
        )
        .unwrap();
    bridge.engine().place_feature(
        "dots",
        ScreenCoordinate::new(95.0, 95.0),
        ScreenCoordinate::new(105.0, 105.0),
        feature,
    );
    bridge.events();
    bridge
}

fn at(x: f64, y: f64) -> MoveGesture {
    MoveGesture::single(ScreenCoordinate::new(x, y))
}

#[test]
fn click_without_interactive_layers_is_a_plain_map_click() {
    let mut bridge = Bridge::ready();
    bridge.controller.on_map_click(ScreenCoordinate::new(400.0, 300.0));
    let events = bridge.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].method(), "map#onMapClick");
    assert_eq!(
        events[0].arguments(),
        json!({"x": 400.0, "y": 300.0, "lng": 0.0, "lat": 0.0})
    );
}

#[test]
fn click_on_an_interactive_feature_reports_its_id() {
    let mut bridge = map_with(marker("a", false));
    bridge.controller.on_map_click(ScreenCoordinate::new(100.0, 100.0));
    assert!(bridge.events().is_empty());

    bridge.settle();
    let events = bridge.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].method(), "feature#onTap");
    assert_eq!(events[0].arguments()["id"], json!("a"));

    bridge.controller.on_map_long_click(ScreenCoordinate::new(600.0, 500.0));
    bridge.settle();
    assert_eq!(bridge.events()[0].method(), "map#onMapLongClick");
}

#[test]
fn removed_layers_are_no_longer_hit_tested() {
    let mut bridge = map_with(marker("a", false));
    bridge
        .call("style#removeLayer", json!({"layerId": "dots"}))
        .unwrap();
    bridge.controller.on_map_click(ScreenCoordinate::new(100.0, 100.0));
    let events = bridge.events();
    assert_eq!(events[0].method(), "map#onMapClick");
}

#[test]
fn draggable_feature_emits_start_drag_end() {
    let mut bridge = map_with(marker("a", true));
    assert!(bridge.controller.on_move_begin(at(100.0, 100.0)));
    bridge.settle();
    assert!(bridge.controller.drag_state().is_active());

    assert!(!bridge.controller.on_move(at(150.0, 100.0)));
    assert!(!bridge.controller.on_move(at(150.0, 80.0)));
    bridge.controller.on_move_end(at(150.0, 80.0));
    assert!(!bridge.controller.drag_state().is_active());

    let events = bridge.events();
    let phases: Vec<_> = events
        .iter()
        .map(|event| match event {
            MapEvent::FeatureDrag { phase, .. } => *phase,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        phases,
        vec![DragPhase::Start, DragPhase::Drag, DragPhase::Drag, DragPhase::End]
    );

    let MapEvent::FeatureDrag {
        feature_id,
        origin,
        current,
        delta,
        ..
    } = &events[2]
    else {
        unreachable!()
    };
    assert_eq!(feature_id, &Some(FeatureId::from("a")));
    assert_eq!(origin.latitude, 0.0 + (300.0 - 100.0) / (256.0 / 360.0));
    assert!(current.latitude > origin.latitude);
    assert_eq!(delta.longitude, 0.0);
    assert!(delta.latitude > 0.0);
    assert_eq!(events[1].arguments()["eventType"], json!("drag"));
}

#[test]
fn non_draggable_feature_never_starts_a_drag() {
    let mut bridge = map_with(marker("b", false));
    assert!(bridge.controller.on_move_begin(at(100.0, 100.0)));
    bridge.settle();
    assert!(!bridge.controller.on_move(at(120.0, 100.0)));
    bridge.controller.on_move_end(at(120.0, 100.0));
    assert!(bridge.events().is_empty());
}

#[test]
fn draggable_must_be_literally_true() {
    let feature = Feature::from_value(json!({
        "type": "Feature",
        "id": "c",
        "properties": {"draggable": "true"}
    }))
    .unwrap();
    let mut bridge = map_with(feature);
    bridge.controller.on_move_begin(at(100.0, 100.0));
    bridge.settle();
    assert!(!bridge.controller.drag_state().is_active());
}

#[test]
fn second_pointer_ends_the_drag() {
    let mut bridge = map_with(marker("a", true));
    bridge.controller.on_move_begin(at(100.0, 100.0));
    bridge.settle();

    let two_fingers = MoveGesture {
        pointer_count: 2,
        ..at(120.0, 100.0)
    };
    assert!(bridge.controller.on_move(two_fingers));
    assert!(!bridge.controller.drag_state().is_active());
    bridge.controller.on_move_end(at(120.0, 100.0));

    let events = bridge.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].arguments()["eventType"], json!("end"));
}

#[test]
fn release_before_the_hit_test_completes_starts_no_drag() {
    let mut bridge = map_with(marker("a", true));
    assert!(bridge.controller.on_move_begin(at(100.0, 100.0)));
    bridge.controller.on_move_end(at(100.0, 100.0));
    bridge.settle();
    assert!(!bridge.controller.drag_state().is_active());

    assert!(!bridge.controller.on_move(at(150.0, 150.0)));
    assert!(bridge.events().is_empty());
}

#[test]
fn second_pointer_before_the_hit_test_cancels_it() {
    let mut bridge = map_with(marker("a", true));
    bridge.controller.on_move_begin(at(100.0, 100.0));
    let two_fingers = MoveGesture {
        pointer_count: 2,
        ..at(110.0, 100.0)
    };
    assert!(!bridge.controller.on_move(two_fingers));
    bridge.settle();
    assert!(!bridge.controller.drag_state().is_active());
    assert!(bridge.events().is_empty());
}

#[test]
fn only_the_latest_gesture_can_start_a_drag() {
    let mut bridge = map_with(marker("a", true));
    bridge.controller.on_move_begin(at(100.0, 100.0));
    bridge.controller.on_move_begin(at(100.0, 100.0));
    bridge.settle();

    let events = bridge.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].arguments()["eventType"], json!("start"));
}

#[test]
fn disabled_drag_ignores_move_gestures() {
    let mut bridge = map_with(marker("a", true));
    bridge
        .call("map#update", json!({"options": {"dragEnabled": false}}))
        .unwrap();
    assert!(!bridge.controller.on_move_begin(at(100.0, 100.0)));

    let multi_touch_start = MoveGesture {
        began_with_touch_down: false,
        ..at(100.0, 100.0)
    };
    bridge
        .call("map#update", json!({"options": {"dragEnabled": true}}))
        .unwrap();
    assert!(!bridge.controller.on_move_begin(multi_touch_start));
    assert!(bridge.events().is_empty());
}
