//! Filterable marker layer for the current region
//!
//! Markers of clusterable categories go into one clustered [`MarkerGroup`] per
//! type; everything else shares a single plain group. Visibility is group
//! membership: a filtered-out marker is removed from its group and added back
//! when it passes again.
//!
//! The layer never owns filter or collection state. The session pushes
//! snapshots through [`MarkerLayer::set_active_types`],
//! [`MarkerLayer::set_collected_ids`] and [`MarkerLayer::set_hide_collected`],
//! and collection toggles go out through a rebindable callback.

use crate::{
    core::{config::MapConfig, geo::LatLng, map::Map},
    data::{index::MarkerIndex, marker::MarkerData},
    input::MapEvent,
    layers::{
        base::LayerTrait,
        group::MarkerGroup,
        icon::IconCache,
        marker::{MapMarker, PopupContent},
    },
    prelude::{Arc, HashMap, HashSet},
    MapError, Result,
};
use std::collections::BTreeMap;

/// Invoked with a marker id when its popup's collect button is pressed
pub type ToggleCollectedFn = Arc<dyn Fn(&str) + Send + Sync>;

pub const UNCLUSTERED_GROUP_ID: &str = "markers:unclustered";

fn cluster_group_id(marker_type: &str) -> String {
    format!("markers:{}", marker_type)
}

pub struct MarkerLayer {
    index: Arc<MarkerIndex>,
    config: Arc<MapConfig>,
    icons: Option<Arc<IconCache>>,
    markers: Vec<MapMarker>,
    by_id: HashMap<String, usize>,
    /// Group layer id -> indices into `markers`
    groups: BTreeMap<String, Vec<usize>>,
    active_types: HashSet<String>,
    collected_ids: HashSet<String>,
    hide_collected: bool,
    current_region: Option<String>,
    on_toggle_collected: Option<ToggleCollectedFn>,
}

impl MarkerLayer {
    pub fn new(index: Arc<MarkerIndex>, config: Arc<MapConfig>) -> Self {
        Self {
            index,
            config,
            icons: None,
            markers: Vec::new(),
            by_id: HashMap::default(),
            groups: BTreeMap::new(),
            active_types: HashSet::default(),
            collected_ids: HashSet::default(),
            hide_collected: false,
            current_region: None,
            on_toggle_collected: None,
        }
    }

    /// Draw markers with images from `icons` when already fetched
    pub fn with_icons(mut self, icons: Arc<IconCache>) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Replace the collect-button callback
    pub fn set_toggle_callback(&mut self, callback: ToggleCollectedFn) {
        self.on_toggle_collected = Some(callback);
    }

    /// Replace every marker with those of `region_id`, then filter.
    ///
    /// Returns the number of markers created.
    pub fn load_region(&mut self, map: &mut Map, region_id: &str) -> Result<usize> {
        if self.index.regions().get_region(region_id).is_none() {
            return Err(MapError::RegionNotFound(region_id.to_string()));
        }

        self.clear_markers(map)?;

        let mut clustered: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut plain = Vec::new();

        let index = self.index.clone();
        for data in index.get_markers_for_region(region_id) {
            let marker_type = index.marker_type(&data.marker_type);
            let collected = self.collected_ids.contains(&data.id);
            let mut marker = MapMarker::new(data.clone(), marker_type, &self.config, collected);
            if let Some(icons) = &self.icons {
                marker.set_icon_image(icons.cached(&data.marker_type).and_then(|icon| icon.data));
            }

            let slot = self.markers.len();
            self.by_id.insert(data.id.clone(), slot);
            self.markers.push(marker);

            let category = marker_type.map(|t| t.category.sub.as_str()).unwrap_or_default();
            if self.config.is_clusterable(category) {
                clustered.entry(data.marker_type.clone()).or_default().push(slot);
            } else {
                plain.push(slot);
            }
        }

        let chunk_size = self.config.cluster_groups.chunk_size;

        for (marker_type, slots) in clustered {
            let category = self
                .index
                .marker_type(&marker_type)
                .map(|t| t.category.sub.clone())
                .unwrap_or_default();
            let mut group = MarkerGroup::clustered(
                cluster_group_id(&marker_type),
                self.config.cluster_groups.clone(),
                self.config.icon_url(&marker_type),
                self.config.category_color(&category).to_string(),
            );
            group.add_markers(self.members(&slots), chunk_size);
            self.attach(map, group, slots)?;
        }

        if !plain.is_empty() {
            let mut group = MarkerGroup::plain(UNCLUSTERED_GROUP_ID.to_string());
            group.add_markers(self.members(&plain), chunk_size);
            self.attach(map, group, plain)?;
        }

        self.current_region = Some(region_id.to_string());
        self.apply_filters(map)?;

        log::info!(
            "loaded {} markers for {} in {} groups",
            self.markers.len(),
            region_id,
            self.groups.len()
        );
        Ok(self.markers.len())
    }

    fn members<'a>(&'a self, slots: &'a [usize]) -> impl Iterator<Item = (&'a str, LatLng)> + 'a {
        slots.iter().map(|&slot| {
            let marker = &self.markers[slot];
            (marker.id(), marker.position())
        })
    }

    fn attach(&mut self, map: &mut Map, group: MarkerGroup, slots: Vec<usize>) -> Result<()> {
        let group_id = group.id().to_string();
        map.add_layer(Box::new(group))?;
        self.groups.insert(group_id, slots);
        Ok(())
    }

    /// Detach every marker group and forget the markers
    pub fn clear_markers(&mut self, map: &mut Map) -> Result<()> {
        for group_id in std::mem::take(&mut self.groups).into_keys() {
            map.remove_layer(&group_id)?;
        }
        self.markers.clear();
        self.by_id.clear();
        Ok(())
    }

    pub fn set_active_types<I>(&mut self, map: &mut Map, types: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        self.active_types = types.into_iter().collect();
        self.apply_filters(map)
    }

    /// New collected set; only re-filters when collected markers are hidden
    pub fn set_collected_ids<I>(&mut self, map: &mut Map, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        self.collected_ids = ids.into_iter().collect();
        self.update_collected_styles();
        if self.hide_collected {
            self.apply_filters(map)?;
        }
        Ok(())
    }

    pub fn set_hide_collected(&mut self, map: &mut Map, hide: bool) -> Result<()> {
        self.hide_collected = hide;
        self.apply_filters(map)
    }

    fn passes_filters(&self, marker: &MapMarker) -> bool {
        self.active_types.contains(marker.marker_type())
            && !(self.hide_collected && self.collected_ids.contains(marker.id()))
    }

    /// Sync group membership with the filters; repeated calls change nothing
    pub fn apply_filters(&mut self, map: &mut Map) -> Result<()> {
        let viewport = map.viewport().clone();
        let mut shown = 0;

        for (group_id, slots) in &self.groups {
            let markers = &self.markers;
            let visible: Vec<bool> = slots
                .iter()
                .map(|&slot| self.passes_filters(&markers[slot]))
                .collect();
            shown += visible.iter().filter(|v| **v).count();

            let synced = map.with_layer_as::<MarkerGroup, _, _>(group_id, |group| {
                for (&slot, show) in slots.iter().zip(visible) {
                    let marker = &markers[slot];
                    let present = group.has_marker(marker.id());
                    if show && !present {
                        group.add_marker(marker.id(), marker.position());
                    } else if !show && present {
                        group.remove_marker(marker.id());
                    }
                }
                group.on_view_changed(&viewport)
            });

            match synced {
                Some(result) => result?,
                None => log::warn!("marker group {} is no longer on the map", group_id),
            }
        }

        log::debug!("{} of {} markers pass the filters", shown, self.markers.len());
        Ok(())
    }

    /// Redraw collected badges and rebuild open popups; membership is untouched
    pub fn update_collected_styles(&mut self) {
        let collected_ids = &self.collected_ids;
        for marker in &mut self.markers {
            marker.set_collected(collected_ids.contains(marker.id()));
        }
    }

    /// Center on a marker at the current zoom and open its tooltip
    pub fn focus_marker(&mut self, map: &mut Map, marker_id: &str) -> Result<bool> {
        let Some(&slot) = self.by_id.get(marker_id) else {
            return Ok(false);
        };
        let marker = &mut self.markers[slot];
        map.set_view(marker.position(), map.zoom())?;
        marker.open_tooltip();
        Ok(true)
    }

    pub fn get_marker(&self, marker_id: &str) -> Option<&MapMarker> {
        self.by_id.get(marker_id).map(|&slot| &self.markers[slot])
    }

    fn get_marker_mut(&mut self, marker_id: &str) -> Option<&mut MapMarker> {
        self.by_id.get(marker_id).map(|&slot| &mut self.markers[slot])
    }

    pub fn markers(&self) -> &[MapMarker] {
        &self.markers
    }

    /// Markers loaded for the current region, shown or not
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Markers currently held by the groups on the map
    pub fn visible_marker_count(&self, map: &Map) -> usize {
        self.groups
            .keys()
            .filter_map(|id| map.layer_as::<MarkerGroup>(id))
            .map(MarkerGroup::len)
            .sum()
    }

    pub fn group_ids(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn current_region(&self) -> Option<&str> {
        self.current_region.as_deref()
    }

    pub fn active_types(&self) -> &HashSet<String> {
        &self.active_types
    }

    pub fn open_popup(&mut self, map: &mut Map, marker_id: &str) -> Option<PopupContent> {
        let popup = self.get_marker_mut(marker_id)?.open_popup().clone();
        map.emit(MapEvent::PopupOpen {
            marker_id: marker_id.to_string(),
        });
        Some(popup)
    }

    pub fn close_popup(&mut self, marker_id: &str) {
        if let Some(marker) = self.get_marker_mut(marker_id) {
            marker.close_popup();
        }
    }

    /// Click on a marker: open its popup and queue a `MarkerClick` event
    pub fn click_marker(&mut self, map: &mut Map, marker_id: &str) -> Option<MarkerData> {
        self.open_popup(map, marker_id)?;
        map.emit(MapEvent::MarkerClick {
            marker_id: marker_id.to_string(),
        });
        self.get_marker(marker_id).map(|m| m.data().clone())
    }

    /// The popup's collect button; the state change itself belongs to the caller
    pub fn toggle_collected_from_popup(&self, marker_id: &str) -> bool {
        match (&self.on_toggle_collected, self.get_marker(marker_id)) {
            (Some(callback), Some(_)) => {
                callback(marker_id);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Point;
    use crate::data::bundled::Dataset;
    use std::sync::Mutex;

    fn setup() -> (Map, MarkerLayer) {
        let index = Arc::new(MarkerIndex::new(Arc::new(Dataset::bundled().unwrap())));
        let map = Map::new(LatLng::new(-100.0, 100.0), 0.0, Point::new(1280.0, 720.0));
        let layer = MarkerLayer::new(index, Arc::new(MapConfig::default()));
        (map, layer)
    }

    fn all_types(layer: &MarkerLayer) -> Vec<String> {
        layer.index.marker_types().keys()
    }

    #[test]
    fn test_load_region_groups_by_category() {
        let (mut map, mut layer) = setup();
        let expected = layer.index.get_markers_for_region("valley-iv").len();
        assert_eq!(layer.load_region(&mut map, "valley-iv").unwrap(), expected);
        assert_eq!(layer.current_region(), Some("valley-iv"));

        let groups = layer.group_ids();
        assert!(groups.contains(&"markers:pink_bolete_spot"));
        assert!(groups.contains(&UNCLUSTERED_GROUP_ID));
        assert!(!groups.contains(&"markers:teleport_point"));

        // nothing passes an empty type filter
        assert_eq!(layer.visible_marker_count(&map), 0);
        let types = all_types(&layer);
        layer.set_active_types(&mut map, types).unwrap();
        assert_eq!(layer.visible_marker_count(&map), expected);
    }

    #[test]
    fn test_unknown_region_keeps_current_markers() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        let count = layer.marker_count();
        assert!(matches!(
            layer.load_region(&mut map, "atlantis"),
            Err(MapError::RegionNotFound(_))
        ));
        assert_eq!(layer.marker_count(), count);
        assert_eq!(layer.current_region(), Some("valley-iv"));
    }

    #[test]
    fn test_switching_regions_replaces_groups() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        layer.load_region(&mut map, "dijiang").unwrap();
        assert_eq!(
            layer.marker_count(),
            layer.index.get_markers_for_region("dijiang").len()
        );
        assert!(layer.get_marker("VL_1_001").is_none());
        assert_eq!(map.list_layers().len(), layer.group_ids().len());

        layer.clear_markers(&mut map).unwrap();
        assert!(map.list_layers().is_empty());
        assert_eq!(layer.marker_count(), 0);
    }

    #[test]
    fn test_hide_collected() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        let types = all_types(&layer);
        layer.set_active_types(&mut map, types).unwrap();
        let all = layer.visible_marker_count(&map);

        let collected = vec!["VL_1_001".to_string(), "VL_1_002".to_string()];
        layer.set_collected_ids(&mut map, collected.clone()).unwrap();
        assert_eq!(layer.visible_marker_count(&map), all);
        assert!(layer.get_marker("VL_1_001").unwrap().is_collected());

        layer.set_hide_collected(&mut map, true).unwrap();
        assert_eq!(layer.visible_marker_count(&map), all - 2);
        layer.apply_filters(&mut map).unwrap();
        assert_eq!(layer.visible_marker_count(&map), all - 2);

        layer.set_collected_ids(&mut map, Vec::new()).unwrap();
        assert_eq!(layer.visible_marker_count(&map), all);
    }

    #[test]
    fn test_type_filter() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        layer
            .set_active_types(&mut map, ["pink_bolete_spot".to_string()])
            .unwrap();
        let boletes = layer
            .index
            .get_marker_ids_for_region_and_type("valley-iv", "pink_bolete_spot")
            .len();
        assert_eq!(layer.visible_marker_count(&map), boletes);
    }

    #[test]
    fn test_popup_and_focus() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        map.process_events();

        let popup = layer.open_popup(&mut map, "VL_1_001").unwrap();
        assert_eq!(popup.button_label, "Collected");
        layer
            .set_collected_ids(&mut map, ["VL_1_001".to_string()])
            .unwrap();
        let reopened = layer.get_marker("VL_1_001").and_then(|m| m.popup()).unwrap();
        assert_eq!(reopened.button_label, "Unmark");

        let zoom = map.zoom();
        assert!(layer.focus_marker(&mut map, "VL_1_001").unwrap());
        assert_eq!(map.center(), layer.get_marker("VL_1_001").unwrap().position());
        assert_eq!(map.zoom(), zoom);
        assert!(layer.get_marker("VL_1_001").unwrap().is_tooltip_open());
        assert!(!layer.focus_marker(&mut map, "missing").unwrap());
    }

    #[test]
    fn test_click_and_rebindable_toggle() {
        let (mut map, mut layer) = setup();
        layer.load_region(&mut map, "valley-iv").unwrap();
        map.process_events();

        let clicked = layer.click_marker(&mut map, "VL_1_007").unwrap();
        assert_eq!(clicked.marker_type, "teleport_point");
        let kinds: Vec<_> = map.process_events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["popupopen", "markerclick"]);

        assert!(!layer.toggle_collected_from_popup("VL_1_007"));

        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = first.clone();
        layer.set_toggle_callback(Arc::new(move |id: &str| sink.lock().unwrap().push(id.to_string())));
        assert!(layer.toggle_collected_from_popup("VL_1_007"));

        let sink = second.clone();
        layer.set_toggle_callback(Arc::new(move |id: &str| sink.lock().unwrap().push(id.to_string())));
        assert!(layer.toggle_collected_from_popup("VL_1_007"));
        assert!(!layer.toggle_collected_from_popup("missing"));

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }
}
