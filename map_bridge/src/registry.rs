use std::collections::{BTreeSet, HashMap};

use crate::{Feature, FeatureCollection};

/// Last full feature collection pushed to each GeoJSON source.
///
/// Single-feature updates need the full collection, since the engine only
/// accepts whole-collection replacement.
#[derive(Debug, Default)]
pub struct FeatureCollectionRegistry {
    collections: HashMap<String, FeatureCollection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureUpdate {
    /// The source's collection with the feature swapped in.
    Replaced(FeatureCollection),
    /// No feature in the collection carries the id.
    NoMatch,
    /// Nothing is registered for the source.
    UnknownSource,
}

impl FeatureCollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: &str, collection: FeatureCollection) {
        self.collections.insert(source_id.to_string(), collection);
    }

    pub fn get(&self, source_id: &str) -> Option<&FeatureCollection> {
        self.collections.get(source_id)
    }

    pub fn remove(&mut self, source_id: &str) -> Option<FeatureCollection> {
        self.collections.remove(source_id)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Copies the source's collection with the feature sharing `feature`'s
    /// id replaced. The stored copy is untouched until the caller inserts the
    /// result. Never adds a feature.
    pub fn with_feature(&self, source_id: &str, feature: Feature) -> FeatureUpdate {
        let Some(stored) = self.collections.get(source_id) else {
            return FeatureUpdate::UnknownSource;
        };
        let mut collection = stored.clone();
        if collection.replace_feature(feature) {
            FeatureUpdate::Replaced(collection)
        } else {
            FeatureUpdate::NoMatch
        }
    }
}

/// Layer ids eligible for hit-testing.
#[derive(Debug, Default, Clone)]
pub struct InteractiveLayerSet {
    layers: BTreeSet<String>,
}

impl InteractiveLayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer_id: &str) -> bool {
        self.layers.insert(layer_id.to_string())
    }

    pub fn remove(&mut self, layer_id: &str) -> bool {
        self.layers.remove(layer_id)
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains(layer_id)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Interactive layers in hit-test order: the reverse of the style's
    /// paint order, so the topmost rendered layer comes first. Layers the
    /// style no longer has are left out.
    pub fn hit_test_order(&self, paint_order: &[String]) -> Vec<String> {
        paint_order
            .iter()
            .rev()
            .filter(|layer_id| self.layers.contains(layer_id.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value as JsonValue};

    fn feature(id: &str, draggable: bool) -> Feature {
        let mut properties = Map::new();
        properties.insert("draggable".into(), json!(draggable));
        Feature::new(Some(id.into()), JsonValue::Null, properties)
    }

    #[test]
    fn update_replaces_only_the_matching_feature() {
        let mut registry = FeatureCollectionRegistry::new();
        registry.insert(
            "pts",
            FeatureCollection::new(vec![feature("a", false), feature("b", false)]),
        );

        let FeatureUpdate::Replaced(updated) = registry.with_feature("pts", feature("b", true))
        else {
            panic!("expected a replacement");
        };
        assert!(!updated.features[0].is_draggable());
        assert!(updated.features[1].is_draggable());
        assert!(!registry.get("pts").unwrap().features[1].is_draggable());

        assert_eq!(
            registry.with_feature("pts", feature("c", true)),
            FeatureUpdate::NoMatch
        );
        assert_eq!(registry.get("pts").unwrap().len(), 2);
        assert_eq!(
            registry.with_feature("missing", feature("a", true)),
            FeatureUpdate::UnknownSource
        );
    }

    #[test]
    fn hit_test_order_is_reverse_paint_order() {
        let mut layers = InteractiveLayerSet::new();
        layers.insert("pois");
        layers.insert("roads");
        let paint_order: Vec<String> = ["background", "roads", "labels", "pois"]
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(layers.hit_test_order(&paint_order), vec!["pois", "roads"]);
        layers.remove("pois");
        assert_eq!(layers.hit_test_order(&paint_order), vec!["roads"]);
    }
}
