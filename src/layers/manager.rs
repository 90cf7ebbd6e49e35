use crate::{core::viewport::Viewport, layers::base::LayerTrait, prelude::HashMap, Result};

/// Manages layers for the map, handling ordering by z-index
pub struct LayerManager {
    /// All layers indexed by ID
    layers: HashMap<String, Box<dyn LayerTrait>>,
    /// Ordered list of layer IDs (sorted by z-index, insertion order within a z-index)
    render_order: Vec<String>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self {
            layers: HashMap::default(),
            render_order: Vec::new(),
        }
    }

    /// Adds a layer to the manager, replacing any layer with the same ID
    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Result<()> {
        let layer_id = layer.id().to_string();
        let z_index = layer.z_index();

        if self.layers.contains_key(&layer_id) {
            self.render_order.retain(|id| id != &layer_id);
        }
        self.layers.insert(layer_id.clone(), layer);

        // Insert in sorted order by z-index
        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.layers
                    .get(id)
                    .map(|l| l.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id);
        Ok(())
    }

    /// Removes a layer from the manager
    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Box<dyn LayerTrait>> {
        self.render_order.retain(|id| id != layer_id);
        self.layers.remove(layer_id)
    }

    /// Removes every layer, returning them in order
    pub fn drain(&mut self) -> Vec<Box<dyn LayerTrait>> {
        let order = std::mem::take(&mut self.render_order);
        order
            .into_iter()
            .filter_map(|id| self.layers.remove(&id))
            .collect()
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    /// Gets a reference to a layer by ID
    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layers.get(layer_id).map(|l| l.as_ref())
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layers.get_mut(layer_id).map(|layer| f(layer.as_mut()))
    }

    /// Lists all layer IDs in z-order
    pub fn list_layers(&self) -> Vec<String> {
        self.render_order.clone()
    }

    /// Gets all layers in z-order
    pub fn layers(&self) -> Vec<&dyn LayerTrait> {
        self.render_order
            .iter()
            .filter_map(|id| self.layers.get(id).map(|l| l.as_ref()))
            .collect()
    }

    /// Notifies every visible layer of a camera change
    pub fn notify_view_changed(&mut self, viewport: &Viewport) -> Result<()> {
        for layer_id in &self.render_order {
            if let Some(layer) = self.layers.get_mut(layer_id) {
                if layer.is_visible() {
                    layer.on_view_changed(viewport)?;
                }
            }
        }
        Ok(())
    }

    /// Updates the render order based on current z-indices
    pub fn update_render_order(&mut self) {
        let layers = &self.layers;
        self.render_order.sort_by_key(|id| layers.get(id).map(|l| l.z_index()).unwrap_or(0));
    }

    /// Gets the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Checks if the manager is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::base::{LayerProperties, LayerType};

    struct StubLayer {
        properties: LayerProperties,
        view_changes: usize,
    }

    impl StubLayer {
        fn boxed(id: &str, z_index: i32) -> Box<dyn LayerTrait> {
            Box::new(Self {
                properties: LayerProperties::new(id.to_string(), id.to_string(), LayerType::Tile)
                    .with_z_index(z_index),
                view_changes: 0,
            })
        }
    }

    impl LayerTrait for StubLayer {
        crate::impl_layer_trait!(StubLayer, properties);

        fn on_view_changed(&mut self, _viewport: &Viewport) -> Result<()> {
            self.view_changes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_z_order() {
        let mut manager = LayerManager::new();
        manager.add_layer(StubLayer::boxed("overlay", 2)).unwrap();
        manager.add_layer(StubLayer::boxed("base", 1)).unwrap();
        manager.add_layer(StubLayer::boxed("markers", 10)).unwrap();
        assert_eq!(manager.list_layers(), vec!["base", "overlay", "markers"]);

        manager.with_layer_mut("base", |l| l.set_z_index(20));
        manager.update_render_order();
        assert_eq!(manager.list_layers(), vec!["overlay", "markers", "base"]);
    }

    #[test]
    fn test_remove_and_drain() {
        let mut manager = LayerManager::new();
        manager.add_layer(StubLayer::boxed("a", 0)).unwrap();
        manager.add_layer(StubLayer::boxed("b", 0)).unwrap();
        assert!(manager.remove_layer("a").is_some());
        assert!(manager.remove_layer("a").is_none());
        assert_eq!(manager.drain().len(), 1);
        assert!(manager.is_empty());
        assert!(manager.list_layers().is_empty());
    }

    #[test]
    fn test_hidden_layers_skip_view_changes() {
        let mut manager = LayerManager::new();
        manager.add_layer(StubLayer::boxed("a", 0)).unwrap();
        manager.add_layer(StubLayer::boxed("b", 0)).unwrap();
        manager.with_layer_mut("b", |l| l.set_visible(false));

        let viewport = Viewport::new(Default::default(), 1.0, crate::core::geo::Point::new(10.0, 10.0));
        manager.notify_view_changed(&viewport).unwrap();

        let count = |manager: &LayerManager, id: &str| {
            manager
                .get_layer(id)
                .and_then(|l| l.as_any().downcast_ref::<StubLayer>())
                .map(|l| l.view_changes)
        };
        assert_eq!(count(&manager, "a"), Some(1));
        assert_eq!(count(&manager, "b"), Some(0));
    }
}
