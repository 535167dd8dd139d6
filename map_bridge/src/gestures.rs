use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{DragPhase, MapEvent};
use crate::{Feature, FeatureId, LatLng, ScreenCoordinate};

/// Snapshot of a move gesture as delivered by the host's recognizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveGesture {
    pub focal_point: ScreenCoordinate,
    pub pointer_count: u32,
    /// The gesture's previous event was the initial touch-down.
    pub began_with_touch_down: bool,
}

impl MoveGesture {
    pub fn single(focal_point: ScreenCoordinate) -> Self {
        Self {
            focal_point,
            pointer_count: 1,
            began_with_touch_down: true,
        }
    }
}

/// Transient state of a feature drag. Empty when no drag is in progress.
///
/// A gesture start arms a numbered hit-test. Only the completion holding the
/// current number may begin a drag; ending the gesture disarms it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragState {
    feature_id: Option<FeatureId>,
    origin: Option<LatLng>,
    previous: Option<LatLng>,
    generation: u64,
    pending: Option<u64>,
}

/// Drag state shared with hit-test completions, which may run on another
/// thread.
pub type SharedDragState = Arc<Mutex<DragState>>;

impl DragState {
    /// Starts a drag when `feature` is marked draggable. Returns whether a
    /// drag started.
    pub fn begin(&mut self, feature: &Feature, origin: LatLng) -> bool {
        if !feature.is_draggable() {
            return false;
        }
        self.feature_id = feature.id.clone();
        self.origin = Some(origin);
        self.previous = Some(origin);
        true
    }

    pub fn is_active(&self) -> bool {
        self.origin.is_some()
    }

    /// A hit-test for a new gesture is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Records that a gesture started a hit-test and returns its number.
    /// Any drag from an earlier gesture is dropped.
    pub fn arm(&mut self) -> u64 {
        self.clear();
        self.pending = Some(self.generation);
        self.generation
    }

    /// Consumes the armed hit-test. `false` when `generation` is stale.
    pub fn take_pending(&mut self, generation: u64) -> bool {
        if self.pending != Some(generation) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Builds the drag event for `current` and records it as the previous
    /// position. `None` when no drag is active.
    pub fn advance(
        &mut self,
        point: ScreenCoordinate,
        current: LatLng,
        phase: DragPhase,
    ) -> Option<MapEvent> {
        let origin = self.origin?;
        let previous = self.previous.unwrap_or(origin);
        self.previous = Some(current);
        Some(MapEvent::FeatureDrag {
            feature_id: self.feature_id.clone(),
            point,
            origin,
            current,
            delta: LatLng::new(
                current.latitude - previous.latitude,
                current.longitude - previous.longitude,
            ),
            phase,
        })
    }

    /// Ends any drag and disarms a pending hit-test.
    pub fn clear(&mut self) {
        self.feature_id = None;
        self.origin = None;
        self.previous = None;
        self.pending = None;
        self.generation = self.generation.wrapping_add(1);
    }
}
