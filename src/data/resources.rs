//! Mapping between resource-tracker nodes and map markers.
//!
//! A tracked resource node only knows its display name, map name and region
//! name. The map finds it by turning the name into a marker type, the region
//! into a subregion, and the node's rank among same-named nodes into a cluster
//! index (see [`cluster_markers_with`]).

use crate::{
    core::{config::MapConfig, geo::LatLng},
    data::{index::MarkerIndex, marker::MarkerData, marker::MarkerTypeTable},
    spatial::clustering::{centroid, cluster_markers_with},
    MapError, Result,
};
use serde::{Deserialize, Serialize};

/// Names that do not follow the `lowercase_underscored + "_spot"` rule
const NAME_TO_TYPE_OVERRIDES: &[(&str, &str)] = &[("Igeosite", "igneosite_spot")];

const MAP_NAME_TO_REGION_ID: &[(&str, &str)] = &[
    ("Valley IV", "valley-iv"),
    ("Wuling", "wuling"),
    ("Dijiang", "dijiang"),
];

const REGION_NAME_TO_SUBREGION_ID: &[(&str, &str)] = &[
    ("The Hub", "VL_1"),
    ("Valley Pass", "VL_2"),
    ("Aburrey Quarry", "VL_3"),
    ("Originium Science Park", "VL_5"),
    ("Origin Lodespring", "VL_6"),
    ("Power Plateau", "VL_7"),
    ("Jingyu Valley", "WL_1"),
    ("Wuling City", "WL_2"),
];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Marker type key for a resource name, `None` when no such type exists
pub fn resource_name_to_marker_type(name: &str, types: &MarkerTypeTable) -> Option<String> {
    let key = match lookup(NAME_TO_TYPE_OVERRIDES, name) {
        Some(key) => key.to_string(),
        None => format!("{}_spot", name.to_lowercase().replace(' ', "_")),
    };
    types.contains(&key).then_some(key)
}

pub fn map_name_to_region_id(map_name: &str) -> Option<&'static str> {
    lookup(MAP_NAME_TO_REGION_ID, map_name)
}

pub fn region_name_to_subregion_id(region_name: &str) -> Option<&'static str> {
    lookup(REGION_NAME_TO_SUBREGION_ID, region_name)
}

/// One tracked resource node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub name: String,
    pub map: String,
    pub region: String,
    pub order: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCatalog {
    pub resources: Vec<ResourceRecord>,
}

impl ResourceCatalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, node_id: &str) -> Option<&ResourceRecord> {
        self.resources.iter().find(|r| r.id == node_id)
    }

    /// 0-based rank of a node among nodes sharing its name and region,
    /// ordered by `order`. Unknown ids rank 0.
    // TODO: ranks shift silently when nodes are added to or removed from the
    // catalog; store an explicit marker cluster id per node instead.
    pub fn get_node_index_in_region(&self, node_id: &str, node_name: &str, node_region: &str) -> usize {
        let mut same_group: Vec<&ResourceRecord> = self
            .resources
            .iter()
            .filter(|r| r.name == node_name && r.region == node_region)
            .collect();
        same_group.sort_by_key(|r| r.order);

        same_group
            .iter()
            .position(|r| r.id == node_id)
            .unwrap_or(0)
    }
}

/// Where a resource node sits on the map
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLocation {
    pub marker_type: String,
    pub region_id: String,
    pub subregion_id: String,
    pub cluster_index: usize,
    /// Markers making up the node
    pub markers: Vec<MarkerData>,
    pub center: LatLng,
}

impl NodeLocation {
    pub fn marker_ids(&self) -> Vec<&str> {
        self.markers.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Resolve a tracked node to its marker cluster.
///
/// The node's rank among same-named nodes in its region picks the cluster of
/// that rank among the subregion's markers of the matching type.
pub fn locate_node(
    index: &MarkerIndex,
    catalog: &ResourceCatalog,
    config: &MapConfig,
    node_name: &str,
    map_name: &str,
    region_name: &str,
    node_id: &str,
) -> Result<NodeLocation> {
    let not_found = |what: &str| MapError::NodeNotFound(format!("{} ({})", node_id, what));

    let marker_type = resource_name_to_marker_type(node_name, index.marker_types())
        .ok_or_else(|| not_found(&format!("no marker type for {}", node_name)))?;
    let region_id = map_name_to_region_id(map_name)
        .ok_or_else(|| not_found(&format!("unknown map {}", map_name)))?;
    let subregion_id = region_name_to_subregion_id(region_name)
        .ok_or_else(|| not_found(&format!("unknown region {}", region_name)))?;

    let markers = index.get_markers_for_subregion_and_type(subregion_id, &marker_type);
    let clusters = cluster_markers_with(&markers, config.cluster_threshold, config.row_tolerance);
    let cluster_index = catalog.get_node_index_in_region(node_id, node_name, region_name);

    let cluster = clusters.get(cluster_index).ok_or_else(|| {
        not_found(&format!(
            "cluster {} of {} in {}, only {} found",
            cluster_index,
            marker_type,
            subregion_id,
            clusters.len()
        ))
    })?;
    let center = centroid(cluster).ok_or_else(|| not_found("empty cluster"))?;

    log::debug!(
        "node {} -> {} cluster {} in {} ({} markers)",
        node_id,
        marker_type,
        cluster_index,
        subregion_id,
        cluster.len()
    );

    Ok(NodeLocation {
        marker_type,
        region_id: region_id.to_string(),
        subregion_id: subregion_id.to_string(),
        cluster_index,
        markers: cluster.iter().map(|m| (*m).clone()).collect(),
        center,
    })
}
