//! Static map data: regions, marker types, markers and resource nodes

pub mod bundled;
pub mod index;
pub mod marker;
pub mod region;
pub mod resources;

pub use bundled::Dataset;
pub use index::MarkerIndex;
pub use marker::{MarkerCategory, MarkerData, MarkerType, MarkerTypeTable};
pub use region::{Region, RegionGeometry, RegionRegistry};
pub use resources::{locate_node, NodeLocation, ResourceCatalog, ResourceRecord};
