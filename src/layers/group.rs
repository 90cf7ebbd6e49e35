//! Marker groups attached to the map as layers
//!
//! A clustered group draws nearby markers as one bubble below the
//! configured zoom; a plain group draws every member on its own.

use crate::{
    core::{
        bounds::Bounds,
        config::ClusterGroupOptions,
        constants::CLUSTER_ICON_SIZE,
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    layers::base::{LayerProperties, LayerTrait, LayerType},
    spatial::{clustering::Cluster, clustering::Clustering, index::SpatialItem},
    Result,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum GroupMode {
    Clustered(ClusterGroupOptions),
    Plain,
}

/// Bubble drawn for a multi-marker cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterIcon {
    pub count: usize,
    pub icon_url: String,
    pub color: String,
    pub size: (u32, u32),
}

/// One thing to draw: a lone marker or a cluster bubble
#[derive(Debug, Clone)]
pub enum GroupItem {
    Marker { id: String, position: LatLng },
    Cluster { position: LatLng, marker_ids: Vec<String>, icon: ClusterIcon },
}

pub struct MarkerGroup {
    properties: LayerProperties,
    mode: GroupMode,
    members: Clustering<()>,
    icon_url: String,
    color: String,
    visible_items: Vec<GroupItem>,
}

impl MarkerGroup {
    /// Group clustering the markers of one type, drawn with that type's icon
    pub fn clustered(id: String, options: ClusterGroupOptions, icon_url: String, color: String) -> Self {
        Self {
            properties: LayerProperties::new(id.clone(), id, LayerType::MarkerGroup).with_z_index(10),
            members: Clustering::new(options.clone()),
            mode: GroupMode::Clustered(options),
            icon_url,
            color,
            visible_items: Vec::new(),
        }
    }

    pub fn plain(id: String) -> Self {
        Self {
            properties: LayerProperties::new(id.clone(), id, LayerType::MarkerGroup).with_z_index(10),
            mode: GroupMode::Plain,
            members: Clustering::default(),
            icon_url: String::new(),
            color: String::new(),
            visible_items: Vec::new(),
        }
    }

    pub fn mode(&self) -> &GroupMode {
        &self.mode
    }

    pub fn has_marker(&self, marker_id: &str) -> bool {
        self.members.contains(marker_id)
    }

    pub fn add_marker(&mut self, marker_id: &str, position: LatLng) {
        self.members
            .add_item(SpatialItem::from_lat_lng(marker_id.to_string(), position, ()));
    }

    /// Add markers in batches of `chunk_size`
    pub fn add_markers<'a, I>(&mut self, markers: I, chunk_size: usize)
    where
        I: IntoIterator<Item = (&'a str, LatLng)>,
    {
        let items: Vec<_> = markers
            .into_iter()
            .map(|(id, position)| SpatialItem::from_lat_lng(id.to_string(), position, ()))
            .collect();
        for chunk in items.chunks(chunk_size.max(1)) {
            self.members.add_items(chunk.iter().cloned());
        }
    }

    pub fn remove_marker(&mut self, marker_id: &str) -> bool {
        self.members.remove_item(marker_id).is_some()
    }

    pub fn clear_markers(&mut self) {
        self.members.clear();
        self.visible_items.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn marker_ids(&self) -> Vec<&str> {
        self.members.all_items().into_iter().map(|item| item.id.as_str()).collect()
    }

    pub fn cluster_icon(&self, count: usize) -> ClusterIcon {
        ClusterIcon {
            count,
            icon_url: self.icon_url.clone(),
            color: self.color.clone(),
            size: CLUSTER_ICON_SIZE,
        }
    }

    /// What the group draws inside `viewport`
    pub fn items_in_view(&mut self, viewport: &Viewport) -> Vec<GroupItem> {
        let bounds = view_bounds(&viewport.bounds());
        let clusters: Vec<Cluster<()>> = match self.mode {
            GroupMode::Clustered(_) => self.members.get_clusters(&bounds, viewport.zoom),
            // plain groups never merge, whatever the zoom
            GroupMode::Plain => self.members.get_clusters(&bounds, f64::INFINITY),
        };

        clusters
            .into_iter()
            .map(|cluster| {
                if cluster.is_single() {
                    GroupItem::Marker {
                        id: cluster.id.clone(),
                        position: cluster.lat_lng(),
                    }
                } else {
                    GroupItem::Cluster {
                        position: cluster.lat_lng(),
                        icon: self.cluster_icon(cluster.count()),
                        marker_ids: cluster.ids().into_iter().map(str::to_string).collect(),
                    }
                }
            })
            .collect()
    }

    /// Items computed at the last camera change
    pub fn visible_items(&self) -> &[GroupItem] {
        &self.visible_items
    }
}

fn view_bounds(bounds: &LatLngBounds) -> Bounds {
    Bounds::new(
        Point::new(bounds.south_west.lng, -bounds.north_east.lat),
        Point::new(bounds.north_east.lng, -bounds.south_west.lat),
    )
}

impl LayerTrait for MarkerGroup {
    crate::impl_layer_trait!(MarkerGroup, properties);

    fn on_add(&mut self, viewport: &Viewport) -> Result<()> {
        self.visible_items = self.items_in_view(viewport);
        Ok(())
    }

    fn on_remove(&mut self) -> Result<()> {
        self.visible_items.clear();
        Ok(())
    }

    fn on_view_changed(&mut self, viewport: &Viewport) -> Result<()> {
        if self.properties.visible {
            self.visible_items = self.items_in_view(viewport);
        }
        Ok(())
    }

    fn options(&self) -> serde_json::Value {
        let (clustered, options) = match &self.mode {
            GroupMode::Clustered(options) => (true, Some(options)),
            GroupMode::Plain => (false, None),
        };
        serde_json::json!({
            "clustered": clustered,
            "cluster_options": options,
            "markers": self.len(),
        })
    }

    fn set_options(&mut self, options: serde_json::Value) -> Result<()> {
        if let GroupMode::Clustered(current) = &mut self.mode {
            if let Some(value) = options.get("cluster_options") {
                let updated: ClusterGroupOptions = serde_json::from_value(value.clone())?;
                *current = updated.clone();
                self.members.set_options(updated);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(zoom: f64) -> Viewport {
        viewport_at(LatLng::new(-100.0, 100.0), zoom)
    }

    fn viewport_at(center: LatLng, zoom: f64) -> Viewport {
        Viewport::new(center, zoom, Point::new(800.0, 800.0))
    }

    fn crab_group() -> MarkerGroup {
        let mut group = MarkerGroup::clustered(
            "markers:blight_crab".to_string(),
            ClusterGroupOptions::default(),
            "icons/blight_crab.webp".to_string(),
            "#FF5722".to_string(),
        );
        group.add_markers(
            [
                ("a", LatLng::new(-100.0, 100.0)),
                ("b", LatLng::new(-101.0, 101.0)),
                ("c", LatLng::new(-150.0, 180.0)),
            ],
            2,
        );
        group
    }

    #[test]
    fn test_membership() {
        let mut group = crab_group();
        assert_eq!(group.len(), 3);
        assert!(group.has_marker("b"));
        assert!(group.remove_marker("b"));
        assert!(!group.remove_marker("b"));
        assert_eq!(group.len(), 2);
        group.clear_markers();
        assert!(group.is_empty());
    }

    #[test]
    fn test_clusters_merge_at_low_zoom() {
        let mut group = crab_group();
        let items = group.items_in_view(&viewport(0.0));
        let bubble = items.iter().find_map(|item| match item {
            GroupItem::Cluster { marker_ids, icon, .. } => Some((marker_ids.clone(), icon.clone())),
            _ => None,
        });
        let (ids, icon) = bubble.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(icon.count, 2);
        assert_eq!(icon.color, "#FF5722");
    }

    #[test]
    fn test_plain_group_never_merges() {
        let mut group = MarkerGroup::plain("markers:unclustered".to_string());
        group.add_marker("a", LatLng::new(-100.0, 100.0));
        group.add_marker("b", LatLng::new(-100.5, 100.5));
        let items = group.items_in_view(&viewport(0.0));
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| matches!(item, GroupItem::Marker { .. })));
    }

    #[test]
    fn test_view_change_refreshes_items() {
        let mut group = crab_group();
        group.on_add(&viewport(0.0)).unwrap();
        assert_eq!(group.visible_items().len(), 2);

        // 100 units across at zoom 3, only "c" is in view
        group
            .on_view_changed(&viewport_at(LatLng::new(-150.0, 180.0), 3.0))
            .unwrap();
        assert!(matches!(
            group.visible_items(),
            [GroupItem::Marker { id, .. }] if id == "c"
        ));
        assert_eq!(group.options()["markers"], 3);
    }
}
