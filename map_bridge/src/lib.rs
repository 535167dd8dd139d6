//! Command bridge between a host UI toolkit and a native map engine.
//!
//! Method calls arrive as a method name plus a loosely typed argument
//! mapping. The bridge decodes them into [`MapCommand`] values, runs them
//! against a [`MapEngine`] and answers each call with exactly one [`Reply`].
//! Map interactions flow back to the host as [`MapEvent`]s.

pub use map_schema::*;

pub mod camera;
pub mod commands;
pub mod config;
mod controller;
pub mod convert;
pub mod engine;
mod error;
pub mod events;
pub mod gestures;
pub mod headless;
pub mod layers;
pub mod options;
mod registry;
mod reply;
pub mod sources;

use serde_json::Value as JsonValue;

pub use camera::{CameraOptions, CameraUpdate};
pub use commands::MapCommand;
pub use config::{
    bridge_config_schema, load_bridge_config, load_bridge_config_from_env, BridgeConfig,
    BridgeConfigMetadata, ConfigError,
};
pub use controller::{BridgeChannels, MapController};
pub use convert::{ArgumentsExt, JsonMap};
pub use engine::{AnimationOutcome, Completion, MapEngine, QueryGeometry, StyleSource};
pub use error::{CommandError, DecodeError, EngineFailure};
pub use events::{DragPhase, EventSink, MapEvent};
pub use gestures::{DragState, MoveGesture};
pub use headless::HeadlessEngine;
pub use options::{MapOptions, MapOptionsSink, MapViewSettings};
pub use registry::{FeatureCollectionRegistry, FeatureUpdate, InteractiveLayerSet};
pub use reply::{collect_replies, Reply, Responder};

/// One inbound method call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: JsonMap,
    pub correlation_id: Option<u64>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: JsonMap) -> Self {
        Self {
            method: method.into(),
            arguments,
            correlation_id: None,
        }
    }

    pub fn with_id(mut self, correlation_id: u64) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Builds a call from a method name and an argument value that must be a
    /// mapping or null.
    pub fn from_parts(
        method: impl Into<String>,
        arguments: JsonValue,
    ) -> Result<Self, DecodeError> {
        let arguments = match arguments {
            JsonValue::Null => JsonMap::new(),
            JsonValue::Object(map) => map,
            other => {
                return Err(DecodeError::mismatch(
                    "arguments",
                    "mapping",
                    convert::value_kind(&other),
                ))
            }
        };
        Ok(Self::new(method, arguments))
    }

    /// Decodes the `{"id", "method", "arguments"}` envelope. `id` and
    /// `arguments` may be absent.
    pub fn from_json(value: JsonValue) -> Result<Self, DecodeError> {
        let mut envelope = match value {
            JsonValue::Object(envelope) => envelope,
            other => {
                return Err(DecodeError::mismatch(
                    "method call",
                    "mapping",
                    convert::value_kind(&other),
                ))
            }
        };
        let method = envelope.required_str("method")?.to_string();
        let correlation_id = match envelope.optional("id") {
            Some(id) => Some(id.as_u64().ok_or_else(|| {
                DecodeError::mismatch("id", "unsigned integer", id.to_string())
            })?),
            None => None,
        };
        let arguments = envelope.remove("arguments").unwrap_or(JsonValue::Null);
        let mut call = Self::from_parts(method, arguments)?;
        call.correlation_id = correlation_id;
        Ok(call)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DecodeError> {
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|err| DecodeError::mismatch("method call", "JSON text", err.to_string()))?;
        Self::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_decodes_id_and_arguments() {
        let call = MethodCall::from_json(json!({
            "id": 7,
            "method": "map#toLatLng",
            "arguments": {"x": 1.0, "y": 2.0}
        }))
        .unwrap();
        assert_eq!(call.correlation_id, Some(7));
        assert_eq!(call.method, "map#toLatLng");
        assert_eq!(call.arguments.len(), 2);
    }

    #[test]
    fn null_arguments_become_an_empty_mapping() {
        let call = MethodCall::from_json_str(r#"{"method": "map#waitForMap", "arguments": null}"#)
            .unwrap();
        assert!(call.arguments.is_empty());
        assert_eq!(call.correlation_id, None);
    }

    #[test]
    fn list_arguments_are_rejected() {
        let err = MethodCall::from_json(json!({"method": "map#update", "arguments": [1]}))
            .unwrap_err();
        assert_eq!(err.code(), "TYPE_MISMATCH");
    }

    #[test]
    fn missing_method_is_reported() {
        let err = MethodCall::from_json(json!({"id": 1})).unwrap_err();
        assert_eq!(err, DecodeError::MissingArgument("method".to_string()));
    }
}
