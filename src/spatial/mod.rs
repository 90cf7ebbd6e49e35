pub mod clustering;
pub mod index;

pub use clustering::{cluster_markers, cluster_markers_by_distance, cluster_markers_with, Cluster, Clustering};
pub use index::{SpatialIndex, SpatialItem};
