//! Configuration for the region map
//!
//! Everything tunable lives here: tile endpoints, the resource-node clustering
//! constants, marker group behaviour, tile loading and the storage keys used for
//! persisted state. A configuration can be built from a preset, from defaults,
//! or read from a JSON file; missing fields fall back to the defaults.

use crate::core::constants;
use crate::prelude::HashMap;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Base URL of the remote asset server
    pub base_url: String,
    /// File extension of tile images
    pub tile_extension: String,
    /// Markers closer than this are one resource node
    pub cluster_threshold: f64,
    /// Same-row tolerance when ordering resource-node clusters
    pub row_tolerance: f64,
    /// Marker sub-categories rendered through cluster groups
    pub clusterable_categories: Vec<String>,
    /// Per-category marker colors
    pub category_colors: HashMap<String, String>,
    pub cluster_groups: ClusterGroupOptions,
    pub tile_loader: TileLoadingConfig,
    /// Base tile brightness while an overlay layer is shown
    pub overlay_brightness: f32,
    /// Container size of the map in pixels
    pub viewport_size: (f64, f64),
    pub storage: StorageKeys,
}

impl Default for MapConfig {
    fn default() -> Self {
        let category_colors = [
            ("collection", "#4CAF50"),
            ("natural", "#8BC34A"),
            ("valuable", "#FFC107"),
            ("combat", "#F44336"),
            ("npc", "#2196F3"),
            ("facility", "#9C27B0"),
            ("mob", "#FF5722"),
            ("boss", "#E91E63"),
        ]
        .into_iter()
        .map(|(category, color)| (category.to_string(), color.to_string()))
        .collect();

        Self {
            base_url: "https://assets.talos-companion.app".to_string(),
            tile_extension: "webp".to_string(),
            cluster_threshold: constants::NODE_CLUSTER_THRESHOLD,
            row_tolerance: constants::NODE_ROW_TOLERANCE,
            clusterable_categories: vec![
                "natural".to_string(),
                "valuable".to_string(),
                "mob".to_string(),
            ],
            category_colors,
            cluster_groups: ClusterGroupOptions::default(),
            tile_loader: TileLoadingConfig::default(),
            overlay_brightness: constants::OVERLAY_DIM_BRIGHTNESS,
            viewport_size: (1280.0, 720.0),
            storage: StorageKeys::default(),
        }
    }
}

impl MapConfig {
    /// Configuration pointing at local asset folders, handy when debugging tiles
    pub fn local(asset_root: &str) -> Self {
        Self {
            base_url: asset_root.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Tile URL template for a region path segment
    pub fn tile_url_template(&self, region_segment: &str) -> String {
        format!(
            "{}/map-tiles/{}/{{z}}/{{x}}_{{y}}.{}",
            self.base_url, region_segment, self.tile_extension
        )
    }

    /// Remote icon URL for a marker type
    pub fn icon_url(&self, marker_type: &str) -> String {
        format!("{}/map-icon/{}.webp", self.base_url, marker_type)
    }

    pub fn category_color(&self, category: &str) -> &str {
        self.category_colors
            .get(category)
            .map(String::as_str)
            .unwrap_or(constants::DEFAULT_CATEGORY_COLOR)
    }

    pub fn is_clusterable(&self, category: &str) -> bool {
        self.clusterable_categories.iter().any(|c| c == category)
    }
}

/// Behaviour of per-type marker cluster groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterGroupOptions {
    /// Markers within this many screen pixels are drawn as one bubble
    pub max_cluster_radius: f64,
    /// At or above this zoom every marker is drawn individually
    pub disable_clustering_at_zoom: f64,
    /// Number of markers added per batch
    pub chunk_size: usize,
}

impl Default for ClusterGroupOptions {
    fn default() -> Self {
        Self {
            max_cluster_radius: 40.0,
            disable_clustering_at_zoom: 4.0,
            chunk_size: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoadingConfig {
    pub cache_size: usize,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        Self {
            cache_size: 1024,
            max_concurrent: 6,
            max_retries: 1,
            retry_delay_ms: 250,
            request_timeout_ms: 15_000,
        }
    }
}

/// Keys under which map state is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Prefix for per-region viewport entries
    pub view_state_prefix: String,
    /// Key of the filter state entry
    pub filter_key: String,
    /// Prefix for per-marker collection records
    pub collection_prefix: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            view_state_prefix: "talos.map.viewState.".to_string(),
            filter_key: "talos.map.markers".to_string(),
            collection_prefix: "map-collected-markers/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.cluster_threshold, 20.0);
        assert_eq!(config.row_tolerance, 5.0);
        assert!(config.is_clusterable("mob"));
        assert!(!config.is_clusterable("npc"));
        assert_eq!(config.category_color("boss"), "#E91E63");
        assert_eq!(config.category_color("unknown"), "#666666");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            MapConfig::from_json_str(r#"{ "cluster_threshold": 12.5, "tile_extension": "png" }"#)
                .unwrap();
        assert_eq!(config.cluster_threshold, 12.5);
        assert_eq!(config.tile_extension, "png");
        assert_eq!(config.row_tolerance, 5.0);
        assert_eq!(config.cluster_groups.disable_clustering_at_zoom, 4.0);
    }

    #[test]
    fn test_templates() {
        let config = MapConfig::local("../assets/");
        assert_eq!(
            config.tile_url_template("wuling_b1"),
            "../assets/map-tiles/wuling_b1/{z}/{x}_{y}.webp"
        );
        assert_eq!(
            config.icon_url("ferrium_spot"),
            "../assets/map-icon/ferrium_spot.webp"
        );
    }
}
