//! # talos-map
//!
//! Interactive region map core for a game companion overlay.
//!
//! The crate bundles a small headless, Leaflet-style map engine (viewport,
//! layers, tile loading) and, on top of it, the region map subsystem: the
//! region registry, the marker index, spatial clustering of resource nodes,
//! persisted viewport/filter/collection state, the region-switching map core
//! and the filterable marker layer.

pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod session;
pub mod spatial;
pub mod store;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::MapConfig,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::Map,
    map_core::{LayerKind, MapCore, MapView},
    viewport::Viewport,
};

pub use data::{
    index::MarkerIndex,
    marker::{MarkerData, MarkerType},
    region::{Region, RegionRegistry},
};

pub use layers::{base::LayerTrait, marker_layer::MarkerLayer, tile::TileLayer};

pub use input::{events::InputEvent, events::MapEvent, handler::InputHandler};

pub use spatial::clustering::cluster_markers_by_distance;

pub use store::{
    collection::CollectionStore, filter::FilterStore, viewport::ViewStateStore, FileStore,
    KeyValueStore, MemoryStore,
};

pub use session::MapSession;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Region config not found for: {0}")]
    RegionNotFound(String),

    #[error("Invalid region config for: {region}. Missing {missing}")]
    InvalidRegionConfig { region: String, missing: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Resource node not found on map: {0}")]
    NodeNotFound(String),
}

/// Error type alias for convenience
pub type Error = MapError;
