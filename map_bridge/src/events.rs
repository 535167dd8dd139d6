use crossbeam_channel::Sender;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::convert::encode_camera_position;
use crate::{CameraPosition, FeatureId, LatLng, ScreenCoordinate, UserLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Start,
    Drag,
    End,
}

impl DragPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DragPhase::Start => "start",
            DragPhase::Drag => "drag",
            DragPhase::End => "end",
        }
    }
}

/// Unsolicited notification sent from the map to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    StyleLoaded,
    CameraIdle {
        position: Option<CameraPosition>,
    },
    CameraMove {
        position: CameraPosition,
    },
    /// Short tap; `feature_id` is set when an interactive feature was hit.
    Tap {
        point: ScreenCoordinate,
        coordinate: LatLng,
        feature_id: Option<FeatureId>,
    },
    LongTap {
        point: ScreenCoordinate,
        coordinate: LatLng,
        feature_id: Option<FeatureId>,
    },
    FeatureDrag {
        feature_id: Option<FeatureId>,
        point: ScreenCoordinate,
        origin: LatLng,
        current: LatLng,
        /// Movement since the previous drag event.
        delta: LatLng,
        phase: DragPhase,
    },
    UserLocationUpdated(UserLocation),
}

impl MapEvent {
    pub fn method(&self) -> &'static str {
        match self {
            MapEvent::StyleLoaded => "map#onStyleLoaded",
            MapEvent::CameraIdle { .. } => "camera#onIdle",
            MapEvent::CameraMove { .. } => "camera#onMove",
            MapEvent::Tap {
                feature_id: Some(_),
                ..
            } => "feature#onTap",
            MapEvent::Tap { .. } => "map#onMapClick",
            MapEvent::LongTap {
                feature_id: Some(_),
                ..
            } => "feature#onLongTap",
            MapEvent::LongTap { .. } => "map#onMapLongClick",
            MapEvent::FeatureDrag { .. } => "feature#onDrag",
            MapEvent::UserLocationUpdated(_) => "map#onUserLocationUpdated",
        }
    }

    pub fn arguments(&self) -> JsonValue {
        match self {
            MapEvent::StyleLoaded => JsonValue::Null,
            MapEvent::CameraIdle { position } => {
                let mut arguments = Map::new();
                if let Some(position) = position {
                    arguments.insert("position".into(), encode_camera_position(Some(position)));
                }
                JsonValue::Object(arguments)
            }
            MapEvent::CameraMove { position } => {
                json!({ "position": encode_camera_position(Some(position)) })
            }
            MapEvent::Tap {
                point,
                coordinate,
                feature_id,
            }
            | MapEvent::LongTap {
                point,
                coordinate,
                feature_id,
            } => {
                let mut arguments = json!({
                    "x": point.x,
                    "y": point.y,
                    "lng": coordinate.longitude,
                    "lat": coordinate.latitude,
                });
                if let (Some(id), Some(map)) = (feature_id, arguments.as_object_mut()) {
                    map.insert("id".into(), json!(id));
                }
                arguments
            }
            MapEvent::FeatureDrag {
                feature_id,
                point,
                origin,
                current,
                delta,
                phase,
            } => json!({
                "id": feature_id,
                "x": point.x,
                "y": point.y,
                "originLng": origin.longitude,
                "originLat": origin.latitude,
                "currentLng": current.longitude,
                "currentLat": current.latitude,
                "eventType": phase.as_str(),
                "deltaLng": delta.longitude,
                "deltaLat": delta.latitude,
            }),
            MapEvent::UserLocationUpdated(location) => {
                let mut user_location = json!({
                    "position": location.position.to_pair(),
                    "speed": location.speed,
                    "altitude": location.altitude,
                    "bearing": location.bearing,
                    "horizontalAccuracy": location.horizontal_accuracy,
                    "timestamp": location.timestamp_ms,
                });
                if let (Some(vertical), Some(map)) =
                    (location.vertical_accuracy, user_location.as_object_mut())
                {
                    map.insert("verticalAccuracy".into(), json!(vertical));
                }
                json!({ "userLocation": user_location })
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "method": self.method(),
            "arguments": self.arguments(),
        })
    }
}

/// Sending half of the host's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<MapEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<MapEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: MapEvent) {
        debug!(
            target: "map_bridge::dispatch",
            method = event.method(),
            "event.emitted"
        );
        if self.tx.send(event).is_err() {
            warn!(target: "map_bridge::dispatch", "event.undeliverable=receiver_closed");
        }
    }
}
