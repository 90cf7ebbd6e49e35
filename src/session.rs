//! One map view wired to its state
//!
//! The session owns the [`MapCore`], the [`MarkerLayer`] and the three
//! stores. Every store mutation is followed by pushing the new snapshot into
//! the marker layer, so the layer always draws what the stores hold.

use crate::{
    core::{
        config::MapConfig,
        map::Map,
        map_core::{LayerKind, MapCore, MapView, ViewStateDelegate},
    },
    data::{
        bundled::Dataset,
        index::MarkerIndex,
        marker::MarkerData,
        resources::{locate_node, NodeLocation},
    },
    input::{InputEvent, MapEvent},
    layers::{
        icon::IconCache,
        marker::PopupContent,
        marker_layer::{MarkerLayer, ToggleCollectedFn},
    },
    prelude::Arc,
    store::{
        collection::CollectionStore, filter::FilterStore, viewport::ViewStateStore, KeyValueStore,
    },
    tiles::loader::TileLoader,
    Result,
};
use std::sync::{Mutex, PoisonError};

/// Called with the map once a region is ready
pub type MapReadyFn = Arc<dyn Fn(&Map) + Send + Sync>;

/// Called with the data of a clicked marker
pub type MarkerClickFn = Arc<dyn Fn(&MarkerData) + Send + Sync>;

pub struct MapSession {
    dataset: Arc<Dataset>,
    config: Arc<MapConfig>,
    index: Arc<MarkerIndex>,
    core: MapCore,
    markers: MarkerLayer,
    views: Arc<ViewStateStore>,
    filters: FilterStore,
    collection: CollectionStore,
    icons: Arc<IconCache>,
    preload_icons: bool,
    /// Marker ids queued by the default collect-button callback
    pending_toggles: Arc<Mutex<Vec<String>>>,
    on_map_ready: Option<MapReadyFn>,
    on_marker_click: Option<MarkerClickFn>,
    highlighted: Vec<String>,
}

impl MapSession {
    /// Session fetching tiles and icons over HTTP
    pub fn new(dataset: Arc<Dataset>, config: Arc<MapConfig>, backend: Arc<dyn KeyValueStore>) -> Self {
        let loader = TileLoader::http(config.tile_loader.clone());
        let icons = Arc::new(IconCache::http(config.clone()));
        Self::with_parts(dataset, config, backend, loader, icons)
    }

    pub fn with_parts(
        dataset: Arc<Dataset>,
        config: Arc<MapConfig>,
        backend: Arc<dyn KeyValueStore>,
        loader: TileLoader,
        icons: Arc<IconCache>,
    ) -> Self {
        let index = Arc::new(MarkerIndex::new(dataset.clone()));
        let storage = &config.storage;

        let views = Arc::new(ViewStateStore::new(
            backend.clone(),
            &storage.view_state_prefix,
            dataset.regions.region_ids(),
        ));
        let filters = FilterStore::new(backend.clone(), &storage.filter_key, dataset.marker_types.clone());
        let collection = CollectionStore::new(backend, &storage.collection_prefix);

        let mut core = MapCore::with_loader(dataset.clone(), config.clone(), loader);
        core.set_delegate(Some(views.clone() as Arc<dyn ViewStateDelegate>));

        let pending_toggles = Arc::new(Mutex::new(Vec::new()));
        let mut markers = MarkerLayer::new(index.clone(), config.clone()).with_icons(icons.clone());
        let queue = pending_toggles.clone();
        markers.set_toggle_callback(Arc::new(move |marker_id: &str| {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(marker_id.to_string());
        }));

        Self {
            dataset,
            config,
            index,
            core,
            markers,
            views,
            filters,
            collection,
            icons,
            preload_icons: true,
            pending_toggles,
            on_map_ready: None,
            on_marker_click: None,
            highlighted: Vec::new(),
        }
    }

    pub fn on_map_ready(&mut self, callback: MapReadyFn) {
        self.on_map_ready = Some(callback);
    }

    pub fn on_marker_click(&mut self, callback: MarkerClickFn) {
        self.on_marker_click = Some(callback);
    }

    /// Rebind the collect button; replaces the session's own handling
    pub fn set_toggle_callback(&mut self, callback: ToggleCollectedFn) {
        self.markers.set_toggle_callback(callback);
    }

    /// Fetch marker icons before drawing a region
    pub fn set_icon_preload(&mut self, preload: bool) {
        self.preload_icons = preload;
    }

    /// Show a region with its markers, filtered by the stored state
    pub async fn select_region(&mut self, region_id: &str) -> Result<()> {
        self.core.switch_region(region_id).await?;
        self.highlighted.clear();

        if self.preload_icons {
            let types = self.index.get_marker_counts_for_region(region_id).into_keys();
            self.icons.preload(types).await;
        }

        let map = self.core.map_mut();
        // the old groups went with the old region's layers
        self.markers.clear_markers(map)?;
        self.markers.set_hide_collected(map, self.filters.hide_collected())?;
        self.markers
            .set_collected_ids(map, self.collection.collected_set().iter().cloned())?;
        self.markers
            .set_active_types(map, self.filters.active_types().iter().cloned())?;
        self.markers.load_region(map, region_id)?;

        if let Some(callback) = &self.on_map_ready {
            callback(self.core.map());
        }
        Ok(())
    }

    pub async fn switch_layer(&mut self, kind: LayerKind) -> Result<()> {
        self.core.switch_layer(kind).await
    }

    // --- filters -------------------------------------------------------------------------------

    fn push_filters(&mut self) -> Result<()> {
        let map = self.core.map_mut();
        self.markers
            .set_hide_collected(map, self.filters.hide_collected())?;
        self.markers
            .set_active_types(map, self.filters.active_types().iter().cloned())
    }

    pub fn toggle_type(&mut self, marker_type: &str) -> Result<()> {
        self.filters.toggle_type(marker_type);
        self.push_filters()
    }

    pub fn select_category(&mut self, sub_category: &str) -> Result<()> {
        self.filters.select_category(sub_category);
        self.push_filters()
    }

    pub fn deselect_category(&mut self, sub_category: &str) -> Result<()> {
        self.filters.deselect_category(sub_category);
        self.push_filters()
    }

    pub fn select_all_types(&mut self) -> Result<()> {
        self.filters.select_all();
        self.push_filters()
    }

    pub fn clear_all_types(&mut self) -> Result<()> {
        self.filters.clear_all();
        self.push_filters()
    }

    pub fn set_hide_collected(&mut self, hide: bool) -> Result<()> {
        self.filters.set_hide_collected(hide);
        self.push_filters()
    }

    // --- collection ----------------------------------------------------------------------------

    fn push_collection(&mut self) -> Result<()> {
        let ids = self.collection.collected_set().iter().cloned();
        self.markers.set_collected_ids(self.core.map_mut(), ids)
    }

    pub fn set_collected(&mut self, marker_id: &str, collected: bool) -> Result<()> {
        self.collection.set_collected(marker_id, collected);
        self.push_collection()
    }

    pub fn toggle_collected(&mut self, marker_id: &str) -> Result<bool> {
        let collected = self.collection.toggle_collected(marker_id);
        self.push_collection()?;
        Ok(collected)
    }

    pub fn clear_collection(&mut self) -> Result<()> {
        self.collection.clear_all();
        self.push_collection()
    }

    pub fn export_collection(&self) -> Result<String> {
        self.collection.export_to_json()
    }

    pub fn import_collection(&mut self, json: &str) -> Result<usize> {
        let count = self.collection.import_from_json(json)?;
        self.push_collection()?;
        Ok(count)
    }

    // --- markers -------------------------------------------------------------------------------

    pub fn focus_marker(&mut self, marker_id: &str) -> Result<bool> {
        self.markers.focus_marker(self.core.map_mut(), marker_id)
    }

    pub fn open_popup(&mut self, marker_id: &str) -> Option<PopupContent> {
        self.markers.open_popup(self.core.map_mut(), marker_id)
    }

    /// A click on a marker; `on_marker_click` runs in the next `process_events`
    pub fn click_marker(&mut self, marker_id: &str) -> bool {
        self.markers
            .click_marker(self.core.map_mut(), marker_id)
            .is_some()
    }

    pub fn toggle_collected_from_popup(&self, marker_id: &str) -> bool {
        self.markers.toggle_collected_from_popup(marker_id)
    }

    /// Find a tracked resource node and center the map on it.
    ///
    /// Switches region when needed. The jump is programmatic, so it does not
    /// overwrite the saved camera.
    pub async fn show_node_on_map(
        &mut self,
        node_name: &str,
        map_name: &str,
        region_name: &str,
        node_id: &str,
    ) -> Result<NodeLocation> {
        let location = locate_node(
            &self.index,
            &self.dataset.resources,
            &self.config,
            node_name,
            map_name,
            region_name,
            node_id,
        )?;

        if self.core.current_region() != Some(location.region_id.as_str()) {
            self.select_region(&location.region_id).await?;
        }

        // let earlier moves settle before jumping
        for event in self.core.process_events() {
            self.dispatch(&event);
        }

        let (_, geometry) = self.dataset.regions.resolve(&location.region_id)?;
        self.core.set_map_view(MapView {
            lat: location.center.lat,
            lng: location.center.lng,
            zoom: geometry.max_zoom as f64,
        })?;

        self.highlighted = location.markers.iter().map(|m| m.id.clone()).collect();
        log::info!(
            "showing node {} as {} markers in {}",
            node_id,
            self.highlighted.len(),
            location.subregion_id
        );
        Ok(location)
    }

    /// Markers of the last node shown with [`MapSession::show_node_on_map`]
    pub fn highlighted_markers(&self) -> &[String] {
        &self.highlighted
    }

    // --- event loop ----------------------------------------------------------------------------

    fn dispatch(&self, event: &MapEvent) {
        if let MapEvent::MarkerClick { marker_id } = event {
            match (&self.on_marker_click, self.markers.get_marker(marker_id)) {
                (Some(callback), Some(marker)) => callback(marker.data()),
                (None, _) => {}
                (_, None) => log::debug!("click on unloaded marker {}", marker_id),
            }
        }
    }

    /// Apply queued collect-button presses, then drain map events: the
    /// camera is persisted on settled user moves and marker clicks reach
    /// `on_marker_click`
    pub fn process_events(&mut self) -> Result<Vec<MapEvent>> {
        let toggles = std::mem::take(
            &mut *self
                .pending_toggles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !toggles.is_empty() {
            for marker_id in &toggles {
                self.collection.toggle_collected(marker_id);
            }
            self.push_collection()?;
        }

        let events = self.core.process_events();
        for event in &events {
            self.dispatch(event);
        }
        Ok(events)
    }

    pub fn handle_input(&mut self, input: InputEvent) -> Result<()> {
        self.core.handle_input(input)
    }

    /// Hand arrived tiles to their layers
    pub fn update(&mut self) -> usize {
        self.core.update()
    }

    /// Tear the map down and drop cached icons
    pub fn shutdown(&mut self) -> Result<()> {
        self.markers.clear_markers(self.core.map_mut())?;
        let removed = self.core.map_mut().remove_all_layers()?;
        self.icons.clear();
        log::info!("map session closed, {} layers removed", removed);
        Ok(())
    }

    pub fn core(&self) -> &MapCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut MapCore {
        &mut self.core
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn index(&self) -> &Arc<MarkerIndex> {
        &self.index
    }

    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.collection
    }

    pub fn views(&self) -> &Arc<ViewStateStore> {
        &self.views
    }

    pub fn icons(&self) -> &Arc<IconCache> {
        &self.icons
    }
}
