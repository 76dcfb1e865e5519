// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{CompositionLayer, LayerId};

/// Owns every composition layer known to a renderer.
///
/// The most recently registered layer comes first.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: Vec<Box<dyn CompositionLayer>>,
    next_id: u64,
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a layer and assigns its id.
    pub fn register(&mut self, mut layer: Box<dyn CompositionLayer>) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);
        let kind = layer.kind();
        layer.core_mut().assign_id(id, kind);
        log::debug!("Registered layer '{}'", layer.core().label());
        self.layers.insert(0, layer);
        id
    }

    /// Removes a layer, handing it back to the caller for cleanup.
    pub fn unregister(&mut self, id: LayerId) -> Option<Box<dyn CompositionLayer>> {
        let index = self.position(id)?;
        Some(self.layers.remove(index))
    }

    /// Looks up a layer.
    pub fn get(&self, id: LayerId) -> Option<&dyn CompositionLayer> {
        self.layers
            .iter()
            .find(|layer| layer.core().id() == Some(id))
            .map(|layer| &**layer)
    }

    /// Looks up a layer, mutably.
    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut dyn CompositionLayer> {
        match self.position(id) {
            Some(index) => Some(&mut *self.layers[index]),
            None => None,
        }
    }

    /// `true` if `id` is registered.
    pub fn contains(&self, id: LayerId) -> bool {
        self.position(id).is_some()
    }

    /// Ids in registry order.
    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().filter_map(|layer| layer.core().id()).collect()
    }

    /// Iterates in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn CompositionLayer> {
        self.layers
            .iter()
            .map(|layer| -> &dyn CompositionLayer { &**layer })
    }

    /// Iterates mutably in registry order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn CompositionLayer>> {
        self.layers.iter_mut()
    }

    /// Number of registered layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn position(&self, id: LayerId) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.core().id() == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{QuadLayer, QuadLayerOptions};

    #[test]
    fn test_newest_layer_comes_first() {
        let mut registry = LayerRegistry::new();
        let a = registry.register(Box::new(QuadLayer::new(QuadLayerOptions::default())));
        let b = registry.register(Box::new(QuadLayer::new(QuadLayerOptions::default())));
        assert_eq!(registry.ids(), vec![b, a]);
    }

    #[test]
    fn test_unregister_returns_the_layer() {
        let mut registry = LayerRegistry::new();
        let id = registry.register(Box::new(QuadLayer::new(QuadLayerOptions::default())));
        let layer = registry.unregister(id).expect("registered");
        assert_eq!(layer.core().id(), Some(id));
        assert!(registry.is_empty());
        assert!(registry.unregister(id).is_none());
    }
}
