use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use map_bridge::{BridgeConfig, HeadlessEngine, MapCommand, MapController, MethodCall};
use serde_json::{json, Map, Value as JsonValue};

fn arguments(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

fn feature_collection(count: usize) -> String {
    let features: Vec<JsonValue> = (0..count)
        .map(|index| {
            json!({
                "type": "Feature",
                "id": format!("f{index}"),
                "geometry": {"type": "Point", "coordinates": [index as f64 * 0.01, 45.0]},
                "properties": {"draggable": index % 2 == 0}
            })
        })
        .collect();
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_decode");

    let options = arguments(json!({
        "options": {
            "compassEnabled": true,
            "cameraTargetBounds": [[[1.0, 2.0], [3.0, 4.0]]],
            "minMaxZoomPreference": [2.0, 18.0],
            "trackCameraPosition": true,
            "compassViewPosition": 1,
            "compassViewMargins": [12.0, 24.0],
            "attributionButtonMargins": [8.0, 8.0]
        }
    }));
    group.bench_function("map_update", |b| {
        b.iter(|| MapCommand::decode("map#update", black_box(&options), 2.0))
    });

    let camera = arguments(json!({
        "cameraUpdate": ["newCameraPosition", {"bearing": 10.0, "target": [12.9, 77.6], "tilt": 30.0, "zoom": 14.0}]
    }));
    group.bench_function("camera_move", |b| {
        b.iter(|| MapCommand::decode("camera#move", black_box(&camera), 2.0))
    });

    for count in [10usize, 100, 1000] {
        let geojson = arguments(json!({"sourceId": "pts", "geojson": feature_collection(count)}));
        group.bench_with_input(BenchmarkId::new("add_geojson", count), &geojson, |b, args| {
            b.iter(|| MapCommand::decode("source#addGeoJson", black_box(args), 1.0))
        });
    }

    group.finish();
}

fn bench_set_feature(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_feature");

    for count in [100usize, 1000] {
        group.bench_with_input(BenchmarkId::new("republish", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let (mut controller, channels) =
                        MapController::new(HeadlessEngine::default(), BridgeConfig::default());
                    controller.on_map_ready();
                    controller.on_style_loaded();
                    controller.handle(MethodCall::new(
                        "source#addGeoJson",
                        arguments(json!({"sourceId": "pts", "geojson": feature_collection(count)})),
                    ));
                    (controller, channels)
                },
                |(mut controller, channels)| {
                    controller.handle(MethodCall::new(
                        "source#setFeature",
                        arguments(json!({
                            "sourceId": "pts",
                            "geojsonFeature": r#"{"type":"Feature","id":"f1","geometry":null,"properties":{"draggable":true}}"#
                        })),
                    ));
                    black_box(channels.replies.try_recv().ok());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(convert_benches, bench_decode, bench_set_feature);
criterion_main!(convert_benches);
