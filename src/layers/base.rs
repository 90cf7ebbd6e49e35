use crate::{
    core::{geo::LatLngBounds, viewport::Viewport},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Tile,
    MarkerGroup,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Tile => write!(f, "tile"),
            LayerType::MarkerGroup => write!(f, "marker_group"),
        }
    }
}

/// State every layer carries; see [`impl_layer_trait!`](crate::impl_layer_trait)
#[derive(Debug, Clone)]
pub struct LayerProperties {
    pub id: String,
    pub name: String,
    pub layer_type: LayerType,
    pub z_index: i32,
    pub visible: bool,
}

impl LayerProperties {
    pub fn new(id: String, name: String, layer_type: LayerType) -> Self {
        Self {
            id,
            name,
            layer_type,
            z_index: 0,
            visible: true,
        }
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }
}

/// Something attached to a [`Map`](crate::core::map::Map): tiles or a
/// marker group
pub trait LayerTrait: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn layer_type(&self) -> LayerType;

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Higher draws on top
    fn z_index(&self) -> i32;

    fn set_z_index(&mut self, z_index: i32);

    /// Called once the layer is attached, with the map's current viewport
    fn on_add(&mut self, _viewport: &Viewport) -> Result<()> {
        Ok(())
    }

    /// Called once the layer is detached
    fn on_remove(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after every settled camera change
    fn on_view_changed(&mut self, _viewport: &Viewport) -> Result<()> {
        Ok(())
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        None
    }

    /// Layer settings as JSON, for debugging and tools
    fn options(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn set_options(&mut self, _options: serde_json::Value) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_properties() {
        let props = LayerProperties::new(
            "valley-iv:base".to_string(),
            "valley-iv tiles".to_string(),
            LayerType::Tile,
        )
        .with_z_index(1);

        assert_eq!(props.id, "valley-iv:base");
        assert_eq!(props.layer_type, LayerType::Tile);
        assert_eq!(props.z_index, 1);
        assert!(props.visible);
    }

    #[test]
    fn test_layer_type_display() {
        assert_eq!(LayerType::Tile.to_string(), "tile");
        assert_eq!(LayerType::MarkerGroup.to_string(), "marker_group");
    }
}
