#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use map_bridge::{
    collect_replies, load_bridge_config_from_env, BridgeChannels, CommandError, HeadlessEngine,
    MapController, MapEvent, MethodCall, Reply,
};
use serde_json::Value as JsonValue;

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_bridge_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test bridge config at {}",
            config_path.display()
        );

        std::env::set_var(map_bridge::config::BRIDGE_CONFIG_ENV, &config_path);
    });
}

/// A controller over the headless engine plus the host ends of its channels.
pub struct Bridge {
    pub controller: MapController<HeadlessEngine>,
    pub channels: BridgeChannels,
    next_id: u64,
}

impl Bridge {
    /// Map not yet ready, no style.
    pub fn new() -> Self {
        ensure_test_config();
        let (config, _) = load_bridge_config_from_env();
        let (controller, channels) = MapController::new(HeadlessEngine::new(800.0, 600.0), config);
        Self {
            controller,
            channels,
            next_id: 1,
        }
    }

    /// Map ready with the fixture style loaded. The engine's call log starts
    /// empty.
    pub fn ready() -> Self {
        let mut bridge = Self::new();
        bridge.controller.on_map_ready();
        bridge.controller.on_style_loaded();
        bridge.engine().take_call_log();
        bridge.events();
        bridge
    }

    pub fn engine(&mut self) -> &mut HeadlessEngine {
        self.controller.engine_mut()
    }

    /// Sends a call and returns its correlation id.
    pub fn send(&mut self, method: &str, arguments: JsonValue) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let call = MethodCall::from_parts(method, arguments)
            .expect("test arguments must be a mapping")
            .with_id(id);
        self.controller.handle(call);
        id
    }

    /// Sends a call, settles the engine and returns the call's reply.
    pub fn call(&mut self, method: &str, arguments: JsonValue) -> Result<JsonValue, CommandError> {
        let id = self.send(method, arguments);
        self.engine().settle();
        self.take_reply(id)
            .unwrap_or_else(|| panic!("no reply for {method}"))
            .result
    }

    pub fn settle(&mut self) -> usize {
        self.engine().settle()
    }

    /// Removes the reply for `id` from the queue, dropping any others.
    pub fn take_reply(&self, id: u64) -> Option<Reply> {
        collect_replies(&self.channels.replies)
            .into_iter()
            .find(|reply| reply.correlation_id == Some(id))
    }

    pub fn replies(&self) -> Vec<Reply> {
        collect_replies(&self.channels.replies)
    }

    pub fn events(&self) -> Vec<MapEvent> {
        self.channels.events.try_iter().collect()
    }
}

pub fn feature_collection(features: &[(&str, bool)]) -> String {
    let features: Vec<JsonValue> = features
        .iter()
        .map(|(id, draggable)| {
            serde_json::json!({
                "type": "Feature",
                "id": id,
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"draggable": draggable}
            })
        })
        .collect();
    serde_json::json!({"type": "FeatureCollection", "features": features}).to_string()
}
