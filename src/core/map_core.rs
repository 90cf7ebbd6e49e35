//! Region-aware driver of the [`Map`]
//!
//! `MapCore` owns the map. It switches regions (tear down, reconcile zoom
//! and bounds, restore the camera, attach the base tiles), toggles overlay
//! tile layers, and persists the camera whenever a move or zoom settles.
//!
//! Programmatic jumps go through [`MapCore::set_map_view`], which marks the
//! core as transforming until both `MoveEnd` and `ZoomEnd` of that jump have
//! been seen, so they are never persisted.

use crate::{
    core::{
        config::MapConfig,
        constants::OVER_ZOOM_LEVELS,
        geo::{LatLng, LatLngBounds, Point},
        map::{Map, MapOptions},
        viewport::Viewport,
    },
    data::bundled::Dataset,
    input::{InputEvent, MapEvent},
    layers::tile::{TileLayer, TileLayerOptions},
    prelude::Arc,
    tiles::{loader::TileLoader, source::RegionTileSource},
    MapError, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Saved camera of a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
}

impl MapView {
    pub fn center(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.zoom.is_finite()
    }
}

/// Source and sink of saved cameras
pub trait ViewStateDelegate: Send + Sync {
    fn get_view_state(&self, region_id: &str) -> Option<MapView>;

    fn save_view_state(&self, region_id: &str, view: MapView);
}

/// Tile layer of a region: the main map or one of its floors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayerKind {
    #[default]
    M,
    L1,
    L2,
    L3,
    B1,
    B2,
    B3,
    B4,
}

impl LayerKind {
    pub const ALL: [LayerKind; 8] = [
        LayerKind::M,
        LayerKind::L1,
        LayerKind::L2,
        LayerKind::L3,
        LayerKind::B1,
        LayerKind::B2,
        LayerKind::B3,
        LayerKind::B4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::M => "M",
            LayerKind::L1 => "L1",
            LayerKind::L2 => "L2",
            LayerKind::L3 => "L3",
            LayerKind::B1 => "B1",
            LayerKind::B2 => "B2",
            LayerKind::B3 => "B3",
            LayerKind::B4 => "B4",
        }
    }

    pub fn is_base(&self) -> bool {
        *self == LayerKind::M
    }

    /// Suffix of the overlay's tile path segment, `None` for the base layer
    pub fn suffix(&self) -> Option<String> {
        (!self.is_base()).then(|| format!("_{}", self.as_str().to_lowercase()))
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        LayerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MapError::Layer(format!("unknown layer kind {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Transform {
    moved: bool,
    zoomed: bool,
}

pub struct MapCore {
    map: Map,
    dataset: Arc<Dataset>,
    config: Arc<MapConfig>,
    delegate: Option<Arc<dyn ViewStateDelegate>>,
    current_region: Option<String>,
    current_layer: LayerKind,
    transform: Option<Transform>,
    /// Events drained early by `set_map_view`, handed out by the next `process_events`
    backlog: Vec<MapEvent>,
}

impl MapCore {
    /// Core fetching tiles over HTTP
    pub fn new(dataset: Arc<Dataset>, config: Arc<MapConfig>) -> Self {
        let loader = TileLoader::http(config.tile_loader.clone());
        Self::with_loader(dataset, config, loader)
    }

    pub fn with_loader(dataset: Arc<Dataset>, config: Arc<MapConfig>, loader: TileLoader) -> Self {
        let (width, height) = config.viewport_size;
        let viewport = Viewport::new(LatLng::default(), 0.0, Point::new(width, height));
        let map = Map::with_loader(viewport, MapOptions::default(), loader);
        Self {
            map,
            dataset,
            config,
            delegate: None,
            current_region: None,
            current_layer: LayerKind::M,
            transform: None,
            backlog: Vec::new(),
        }
    }

    pub fn set_delegate(&mut self, delegate: Option<Arc<dyn ViewStateDelegate>>) {
        self.delegate = delegate;
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub fn current_region(&self) -> Option<&str> {
        self.current_region.as_deref()
    }

    pub fn current_layer(&self) -> LayerKind {
        self.current_layer
    }

    pub fn is_ready(&self) -> bool {
        self.current_region.is_some()
    }

    pub fn is_transforming(&self) -> bool {
        self.transform.is_some()
    }

    fn base_layer_id(region_id: &str) -> String {
        format!("{}:base", region_id)
    }

    fn overlay_layer_id(region_id: &str, kind: LayerKind) -> String {
        format!("{}:{}", region_id, kind.as_str().to_lowercase())
    }

    /// Id of the base tile layer of the current region
    pub fn base_layer_id_current(&self) -> Option<String> {
        self.current_region.as_deref().map(Self::base_layer_id)
    }

    /// Id of the overlay tile layer, when one is shown
    pub fn overlay_layer_id_current(&self) -> Option<String> {
        match (&self.current_region, self.current_layer) {
            (Some(region), kind) if !kind.is_base() => Some(Self::overlay_layer_id(region, kind)),
            _ => None,
        }
    }

    /// Show a region, replacing whatever was on the map.
    ///
    /// Fails with a configuration error when the region is unknown or lacks
    /// camera fields; the map is left untouched in that case.
    pub async fn switch_region(&mut self, region_id: &str) -> Result<()> {
        let dataset = self.dataset.clone();
        let (_, geometry) = dataset.regions.resolve(region_id)?;

        // queued user moves still belong to the region being left
        let pending = self.drain_map_events();
        self.backlog.extend(pending);

        self.map.remove_all_layers()?;
        self.transform = None;

        let native_zoom = geometry.max_zoom as f64;
        let max_zoom = native_zoom + OVER_ZOOM_LEVELS;
        self.map.set_max_zoom(max_zoom);
        // drop stale bounds before placing the camera in the new region
        self.map.set_max_bounds(None);

        let (center, zoom) = match self.saved_view(region_id) {
            Some(view) => (view.center(), view.zoom.min(max_zoom)),
            None => (
                self.map.unproject(&geometry.default_center_pixel(), native_zoom),
                geometry.initial_zoom.min(max_zoom),
            ),
        };
        self.current_region = Some(region_id.to_string());
        self.current_layer = LayerKind::M;
        self.map.set_view(center, zoom)?;

        let bounds = LatLngBounds::new(
            self.map.unproject(&Point::new(0.0, geometry.height), native_zoom),
            self.map.unproject(&Point::new(geometry.width, 0.0), native_zoom),
        );
        self.map.set_max_bounds(Some(bounds.clone()));

        let layer = TileLayer::new(
            Self::base_layer_id(region_id),
            format!("{} tiles", region_id),
            Arc::new(RegionTileSource::new(
                self.config.tile_url_template(region_id),
                geometry.tile_size,
            )),
            TileLayerOptions {
                tile_size: geometry.tile_size,
                max_native_zoom: geometry.max_zoom,
                max_zoom,
                bounds: Some(bounds),
                ..TileLayerOptions::default()
            },
            self.map.tile_loader().clone(),
        );
        let signal = layer.load_signal();
        self.map.add_layer(Box::new(layer))?;

        let loaded = signal.settled().await;
        log::info!(
            "switched to {} at zoom {} ({})",
            region_id,
            self.map.zoom(),
            if loaded { "tiles loaded" } else { "tiles pending" }
        );
        Ok(())
    }

    fn saved_view(&self, region_id: &str) -> Option<MapView> {
        let view = self.delegate.as_ref()?.get_view_state(region_id)?;
        view.is_valid().then_some(view)
    }

    /// Programmatic camera jump that is not persisted.
    ///
    /// Ignored while a previous jump has not settled or when the view is not
    /// finite; returns whether the jump was applied.
    pub fn set_map_view(&mut self, view: MapView) -> Result<bool> {
        if self.transform.is_some() {
            log::debug!("camera still settling, ignoring jump to {:?}", view);
            return Ok(false);
        }
        if !view.is_valid() {
            log::warn!("ignoring jump to invalid view {:?}", view);
            return Ok(false);
        }

        // settle what is already queued so it is not mistaken for this jump
        let pending = self.drain_map_events();
        self.backlog.extend(pending);

        self.transform = Some(Transform::default());
        self.map.set_view(view.center(), view.zoom)?;
        Ok(true)
    }

    /// Show an overlay tile layer, or go back to the base layer with `M`.
    ///
    /// The base layer is dimmed while an overlay is shown.
    pub async fn switch_layer(&mut self, kind: LayerKind) -> Result<()> {
        if kind == self.current_layer {
            return Ok(());
        }
        let Some(region_id) = self.current_region.clone() else {
            log::debug!("no region loaded, ignoring switch to layer {}", kind);
            return Ok(());
        };
        let (_, geometry) = self.dataset.regions.resolve(&region_id)?;

        if let Some(previous) = self.overlay_layer_id_current() {
            self.map.remove_layer(&previous)?;
        }

        let base_id = Self::base_layer_id(&region_id);
        let Some(suffix) = kind.suffix() else {
            self.map
                .with_layer_as::<TileLayer, _, _>(&base_id, |base| base.set_brightness(1.0));
            self.current_layer = LayerKind::M;
            return Ok(());
        };

        let brightness = self.config.overlay_brightness;
        self.map
            .with_layer_as::<TileLayer, _, _>(&base_id, |base| base.set_brightness(brightness));

        let segment = format!("{}{}", region_id, suffix);
        let layer = TileLayer::new(
            Self::overlay_layer_id(&region_id, kind),
            format!("{} tiles", segment),
            Arc::new(RegionTileSource::new(
                self.config.tile_url_template(&segment),
                geometry.tile_size,
            )),
            TileLayerOptions {
                tile_size: geometry.tile_size,
                max_native_zoom: geometry.max_zoom,
                max_zoom: geometry.max_zoom as f64 + OVER_ZOOM_LEVELS,
                bounds: self.map.max_bounds().cloned(),
                z_index: 2,
                ..TileLayerOptions::default()
            },
            self.map.tile_loader().clone(),
        );
        let signal = layer.load_signal();
        self.map.add_layer(Box::new(layer))?;
        self.current_layer = kind;

        signal.settled().await;
        log::debug!("layer {} shown for {}", kind, region_id);
        Ok(())
    }

    fn drain_map_events(&mut self) -> Vec<MapEvent> {
        let events = self.map.process_events();
        for event in &events {
            self.observe(event);
        }
        events
    }

    fn observe(&mut self, event: &MapEvent) {
        let settled = match event {
            MapEvent::MoveEnd { .. } => {
                if let Some(transform) = &mut self.transform {
                    transform.moved = true;
                }
                true
            }
            MapEvent::ZoomEnd { .. } => {
                if let Some(transform) = &mut self.transform {
                    transform.zoomed = true;
                }
                true
            }
            _ => false,
        };
        if !settled {
            return;
        }

        match self.transform {
            Some(Transform { moved: true, zoomed: true }) => self.transform = None,
            Some(_) => {}
            None => self.persist_view(),
        }
    }

    fn persist_view(&self) {
        if let (Some(region_id), Some(delegate)) = (&self.current_region, &self.delegate) {
            let center = self.map.center();
            delegate.save_view_state(
                region_id,
                MapView {
                    lat: center.lat,
                    lng: center.lng,
                    zoom: self.map.zoom(),
                },
            );
        }
    }

    /// Deliver queued map events, persisting the camera on every settled
    /// user move or zoom
    pub fn process_events(&mut self) -> Vec<MapEvent> {
        let mut events = std::mem::take(&mut self.backlog);
        events.extend(self.drain_map_events());
        events
    }

    pub fn handle_input(&mut self, input: InputEvent) -> Result<()> {
        self.map.handle_input(input)
    }

    /// Hand arrived tiles to their layers
    pub fn update(&mut self) -> usize {
        self.map.update()
    }

    /// Camera of the map right now
    pub fn view(&self) -> MapView {
        let center = self.map.center();
        MapView {
            lat: center.lat,
            lng: center.lng,
            zoom: self.map.zoom(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{viewport::ViewStateStore, MemoryStore};
    use crate::tiles::loader::TileFetcher;
    use async_trait::async_trait;

    struct BlankFetcher;

    #[async_trait]
    impl TileFetcher for BlankFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(vec![0u8; 4])
        }
    }

    fn core() -> (MapCore, Arc<ViewStateStore>) {
        let dataset = Arc::new(Dataset::bundled().unwrap());
        let config = Arc::new(MapConfig::default());
        let loader = TileLoader::new(Arc::new(BlankFetcher), config.tile_loader.clone());
        let mut core = MapCore::with_loader(dataset.clone(), config, loader);
        let views = Arc::new(ViewStateStore::new(
            Arc::new(MemoryStore::new()),
            "talos.map.viewState.",
            dataset.regions.region_ids(),
        ));
        core.set_delegate(Some(views.clone()));
        (core, views)
    }

    fn tile_layers(core: &MapCore) -> Vec<String> {
        core.map()
            .list_layers()
            .into_iter()
            .filter(|id| core.map().layer_as::<TileLayer>(id).is_some())
            .collect()
    }

    #[test]
    fn test_layer_kind() {
        assert_eq!(LayerKind::M.suffix(), None);
        assert_eq!(LayerKind::B2.suffix().as_deref(), Some("_b2"));
        assert_eq!("l1".parse::<LayerKind>().unwrap(), LayerKind::L1);
        assert!("x9".parse::<LayerKind>().is_err());
    }

    #[tokio::test]
    async fn test_switch_region_reconciles_zoom_and_bounds() {
        let (mut core, _) = core();
        core.switch_region("valley-iv").await.unwrap();

        let layers = tile_layers(&core);
        assert_eq!(layers, vec!["valley-iv:base".to_string()]);
        let base = core.map().layer_as::<TileLayer>("valley-iv:base").unwrap();
        assert_eq!(base.tile_options().max_native_zoom, 4);
        assert_eq!(base.tile_options().max_zoom, 5.0);
        assert_eq!(core.map().max_zoom(), 5.0);
        assert_eq!(core.map().zoom(), 1.5);

        let bounds = core.map().max_bounds().unwrap();
        assert_eq!(bounds.south_west, LatLng::new(-625.0, 0.0));
        assert_eq!(bounds.north_east, LatLng::new(0.0, 750.0));
    }

    #[tokio::test]
    async fn test_default_center_uses_offset() {
        let (mut core, _) = core();
        core.switch_region("wuling").await.unwrap();
        // (4000 - 400, 4000 + 250) at zoom 3
        let expected = core.map().unproject(&Point::new(3600.0, 4250.0), 3.0);
        assert_eq!(core.map().center(), expected);
        assert_eq!(core.map().zoom(), 1.5);
    }

    #[tokio::test]
    async fn test_unknown_region_is_fatal_and_keeps_map() {
        let (mut core, _) = core();
        core.switch_region("dijiang").await.unwrap();
        let err = core.switch_region("atlantis").await.unwrap_err();
        assert!(matches!(err, MapError::RegionNotFound(_)));
        assert_eq!(core.current_region(), Some("dijiang"));
        assert_eq!(tile_layers(&core).len(), 1);
    }

    #[tokio::test]
    async fn test_only_one_region_attached() {
        let (mut core, _) = core();
        core.switch_region("valley-iv").await.unwrap();
        core.switch_layer(LayerKind::L1).await.unwrap();
        core.switch_region("dijiang").await.unwrap();
        assert_eq!(tile_layers(&core), vec!["dijiang:base".to_string()]);
        assert_eq!(core.current_layer(), LayerKind::M);
    }

    #[tokio::test]
    async fn test_saved_view_is_restored_and_clamped() {
        let (mut core, views) = core();
        views.save_view_state(
            "dijiang",
            MapView {
                lat: -100.0,
                lng: 120.0,
                zoom: 9.0,
            },
        );
        core.switch_region("dijiang").await.unwrap();
        assert_eq!(core.map().center(), LatLng::new(-100.0, 120.0));
        assert_eq!(core.map().zoom(), 3.0);
    }

    #[tokio::test]
    async fn test_user_moves_are_persisted() {
        let (mut core, views) = core();
        core.switch_region("valley-iv").await.unwrap();
        core.process_events();
        let first = views.get_view_state("valley-iv").unwrap();
        assert_eq!(first, core.view());

        core.handle_input(InputEvent::DragStart {
            position: Point::new(0.0, 0.0),
        })
        .unwrap();
        core.handle_input(InputEvent::Drag {
            delta: Point::new(-30.0, 0.0),
        })
        .unwrap();
        core.handle_input(InputEvent::DragEnd).unwrap();
        core.process_events();

        let saved = views.get_view_state("valley-iv").unwrap();
        assert_eq!(saved, core.view());
        assert_ne!(saved, first);
    }

    #[tokio::test]
    async fn test_programmatic_view_is_not_persisted() {
        let (mut core, views) = core();
        core.switch_region("valley-iv").await.unwrap();
        core.process_events();
        let saved = views.get_view_state("valley-iv").unwrap();

        let jump = MapView {
            lat: -300.0,
            lng: 400.0,
            zoom: 2.0,
        };
        assert!(core.set_map_view(jump).unwrap());
        assert!(core.is_transforming());
        // a second jump before the first settles is ignored
        assert!(!core.set_map_view(MapView { zoom: 3.0, ..jump }).unwrap());

        let kinds: Vec<_> = core.process_events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["moveend", "zoomend"]);
        assert!(!core.is_transforming());
        assert_eq!(core.view(), jump);
        assert_eq!(views.get_view_state("valley-iv"), Some(saved));

        // the next user zoom is saved again
        core.map_mut().zoom_in().unwrap();
        core.process_events();
        assert_eq!(views.get_view_state("valley-iv"), Some(core.view()));
    }

    #[tokio::test]
    async fn test_switch_layer_dims_base() {
        let (mut core, _) = core();
        core.switch_layer(LayerKind::L1).await.unwrap();
        assert_eq!(core.current_layer(), LayerKind::M);

        core.switch_region("wuling").await.unwrap();
        core.switch_layer(LayerKind::B1).await.unwrap();
        assert_eq!(core.current_layer(), LayerKind::B1);
        let overlay = core.map().layer_as::<TileLayer>("wuling:b1").unwrap();
        assert!(overlay.tile_source().template().contains("/wuling_b1/"));
        let base = core.map().layer_as::<TileLayer>("wuling:base").unwrap();
        assert_eq!(base.brightness(), 0.5);

        core.switch_layer(LayerKind::L2).await.unwrap();
        assert!(!core.map().has_layer("wuling:b1"));
        assert!(core.map().has_layer("wuling:l2"));

        core.switch_layer(LayerKind::M).await.unwrap();
        assert_eq!(tile_layers(&core), vec!["wuling:base".to_string()]);
        let base = core.map().layer_as::<TileLayer>("wuling:base").unwrap();
        assert_eq!(base.brightness(), 1.0);
    }

    #[tokio::test]
    async fn test_queued_drag_is_saved_to_the_region_left() {
        let (mut core, views) = core();
        core.switch_region("valley-iv").await.unwrap();
        core.process_events();
        let before = views.get_view_state("valley-iv").unwrap();

        core.handle_input(InputEvent::DragStart {
            position: Point::new(0.0, 0.0),
        })
        .unwrap();
        core.handle_input(InputEvent::Drag {
            delta: Point::new(-60.0, 0.0),
        })
        .unwrap();
        core.handle_input(InputEvent::DragEnd).unwrap();
        let dragged = core.view();
        assert_ne!(dragged, before);

        // the drag's events are still queued when the switch starts
        core.switch_region("wuling").await.unwrap();
        let kinds: Vec<_> = core.process_events().iter().map(|e| e.kind()).collect();
        assert!(kinds.contains(&"moveend"));

        assert_eq!(views.get_view_state("valley-iv"), Some(dragged));
        assert_eq!(views.get_view_state("wuling"), Some(core.view()));
    }

    #[tokio::test]
    async fn test_non_finite_jump_is_ignored() {
        let (mut core, _) = core();
        core.switch_region("dijiang").await.unwrap();
        core.process_events();
        let before = core.view();

        let bad = MapView {
            lat: f64::NAN,
            lng: 10.0,
            zoom: 2.0,
        };
        assert!(!core.set_map_view(bad).unwrap());
        assert!(!core.set_map_view(MapView { zoom: f64::INFINITY, ..before }).unwrap());
        assert!(!core.is_transforming());
        assert_eq!(core.view(), before);
    }
}
