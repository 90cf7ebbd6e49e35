pub mod base;
pub mod group;
pub mod icon;
pub mod macros;
pub mod manager;
pub mod marker;
pub mod marker_layer;
pub mod tile;

pub use base::{LayerProperties, LayerTrait, LayerType};
pub use group::{GroupItem, GroupMode, MarkerGroup};
pub use icon::{IconCache, IconFetcher, ResolvedIcon};
pub use manager::LayerManager;
pub use marker::{MapMarker, MarkerIcon, PopupContent};
pub use marker_layer::{MarkerLayer, ToggleCollectedFn};
pub use tile::{TileLayer, TileLayerOptions};
