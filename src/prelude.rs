//! Prelude module for common talos-map types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use talos_map::prelude::*;`

pub use crate::core::{
    config::{ClusterGroupOptions, MapConfig, StorageKeys, TileLoadingConfig},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::{Map, MapOptions},
    map_core::{LayerKind, MapCore, MapView, ViewStateDelegate},
    viewport::Viewport,
};

pub use crate::data::{
    bundled::Dataset,
    index::MarkerIndex,
    marker::{MarkerCategory, MarkerData, MarkerType, MarkerTypeTable},
    region::{Region, RegionRegistry},
    resources::{NodeLocation, ResourceCatalog, ResourceRecord},
};

pub use crate::layers::{
    base::LayerTrait,
    group::{GroupMode, MarkerGroup},
    icon::{IconCache, IconFetcher},
    manager::LayerManager,
    marker::{MapMarker, PopupContent},
    marker_layer::{MarkerLayer, ToggleCollectedFn},
    tile::TileLayer,
};

pub use crate::input::{
    events::{InputEvent, MapEvent},
    handler::{Action, EventManager, InputHandler},
};

pub use crate::spatial::{
    clustering::{cluster_markers_by_distance, cluster_markers_with, Cluster, Clustering},
    index::{SpatialIndex, SpatialItem},
};

pub use crate::store::{
    collection::{CollectedMarker, CollectionStore},
    filter::{FilterState, FilterStore},
    viewport::ViewStateStore,
    FileStore, KeyValueStore, MemoryStore,
};

pub use crate::tiles::{
    cache::TileCache,
    loader::{HttpTileFetcher, TileFetcher, TileLoader, TileResult},
    source::{RegionTileSource, TileSource},
};

pub use crate::session::MapSession;

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
