use crate::{
    core::{
        config::TileLoadingConfig,
        constants,
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    input::{Action, EventManager, InputEvent, InputHandler, ListenerId, MapEvent},
    layers::{base::LayerTrait, manager::LayerManager, tile::TileLayer},
    tiles::loader::TileLoader,
    Result,
};

#[derive(Debug, Clone)]
pub struct MapOptions {
    pub dragging: bool,
    pub scroll_wheel_zoom: bool,
    pub double_click_zoom: bool,
    pub max_bounds: Option<LatLngBounds>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    /// Zoom levels are rounded to multiples of this, 0 disables snapping
    pub zoom_snap: f64,
    pub zoom_delta: f64,
    pub wheel_px_per_zoom_level: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            dragging: true,
            scroll_wheel_zoom: true,
            double_click_zoom: true,
            max_bounds: None,
            min_zoom: Some(0.0),
            max_zoom: None,
            zoom_snap: constants::DEFAULT_ZOOM_SNAP,
            zoom_delta: constants::DEFAULT_ZOOM_DELTA,
            wheel_px_per_zoom_level: constants::WHEEL_PX_PER_ZOOM_LEVEL,
        }
    }
}

/// Headless map: camera, layers, events and the shared tile loader.
///
/// Every settled camera change (programmatic or user-driven) notifies the
/// visible layers and queues `MoveEnd` followed by `ZoomEnd`. Queued events
/// reach listeners in [`Map::process_events`].
pub struct Map {
    pub viewport: Viewport,
    layer_manager: LayerManager,
    event_manager: EventManager,
    options: MapOptions,
    input_handler: InputHandler,
    tile_loader: TileLoader,
}

impl Map {
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        let viewport = Viewport::new(center, zoom, size);
        Self::with_options(viewport, MapOptions::default())
    }

    /// Map fetching tiles over HTTP with the default loader settings
    pub fn with_options(viewport: Viewport, options: MapOptions) -> Self {
        Self::with_loader(viewport, options, TileLoader::http(TileLoadingConfig::default()))
    }

    pub fn with_loader(viewport: Viewport, options: MapOptions, tile_loader: TileLoader) -> Self {
        let mut input_handler = InputHandler::new();
        input_handler.pan_on_drag = options.dragging;
        input_handler.zoom_on_wheel = options.scroll_wheel_zoom;
        input_handler.zoom_on_double_click = options.double_click_zoom;
        input_handler.zoom_delta = options.zoom_delta;
        input_handler.wheel_px_per_zoom_level = options.wheel_px_per_zoom_level;

        let mut map = Self {
            viewport,
            layer_manager: LayerManager::new(),
            event_manager: EventManager::new(),
            options,
            input_handler,
            tile_loader,
        };

        let min = map.options.min_zoom.unwrap_or(map.viewport.min_zoom);
        let max = map.options.max_zoom.unwrap_or(map.viewport.max_zoom);
        map.viewport.set_zoom_limits(min, max);
        map.viewport.set_max_bounds(map.options.max_bounds.clone());

        map
    }

    fn snap_zoom(&self, zoom: f64) -> f64 {
        let snap = self.options.zoom_snap;
        let snapped = if snap > 0.0 {
            (zoom / snap).round() * snap
        } else {
            zoom
        };
        snapped.clamp(self.viewport.min_zoom, self.viewport.max_zoom)
    }

    /// Jump the camera without animation
    pub fn set_view(&mut self, center: LatLng, zoom: f64) -> Result<()> {
        let zoom = self.snap_zoom(zoom);
        self.viewport.set_zoom(zoom);
        self.viewport.set_center(center);
        self.view_settled()
    }

    /// Zoom keeping `focus_point` (container pixels) in place
    pub fn zoom_to(&mut self, zoom: f64, focus_point: Option<Point>) -> Result<()> {
        let zoom = self.snap_zoom(zoom);
        self.viewport.zoom_to(zoom, focus_point);
        self.view_settled()
    }

    pub fn zoom_in(&mut self) -> Result<()> {
        self.zoom_to(self.viewport.zoom + self.options.zoom_delta, None)
    }

    pub fn zoom_out(&mut self) -> Result<()> {
        self.zoom_to(self.viewport.zoom - self.options.zoom_delta, None)
    }

    fn view_settled(&mut self) -> Result<()> {
        self.layer_manager.notify_view_changed(&self.viewport)?;
        self.event_manager.emit(MapEvent::MoveEnd {
            center: self.viewport.center,
        });
        self.event_manager.emit(MapEvent::ZoomEnd {
            zoom: self.viewport.zoom,
        });
        Ok(())
    }

    pub fn center(&self) -> LatLng {
        self.viewport.center
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.viewport.max_zoom
    }

    /// Zoom ceiling; the current zoom is pulled down when above it
    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        self.options.max_zoom = Some(max_zoom);
        self.viewport.set_max_zoom(max_zoom);
    }

    /// Restrict panning so the center stays inside `bounds`
    pub fn set_max_bounds(&mut self, bounds: Option<LatLngBounds>) {
        self.options.max_bounds = bounds.clone();
        self.viewport.set_max_bounds(bounds);
    }

    pub fn max_bounds(&self) -> Option<&LatLngBounds> {
        self.viewport.max_bounds()
    }

    pub fn project(&self, lat_lng: &LatLng, zoom: f64) -> Point {
        self.viewport.project(lat_lng, Some(zoom))
    }

    pub fn unproject(&self, pixel: &Point, zoom: f64) -> LatLng {
        self.viewport.unproject(pixel, Some(zoom))
    }

    /// Attach a layer; it receives the current viewport before anything else
    pub fn add_layer(&mut self, mut layer: Box<dyn LayerTrait>) -> Result<()> {
        layer.on_add(&self.viewport)?;
        let layer_id = layer.id().to_string();
        self.layer_manager.add_layer(layer)?;
        self.event_manager.emit(MapEvent::LayerAdd { layer_id });
        Ok(())
    }

    /// Detach a layer; false when no such layer was attached
    pub fn remove_layer(&mut self, layer_id: &str) -> Result<bool> {
        match self.layer_manager.remove_layer(layer_id) {
            Some(mut layer) => {
                layer.on_remove()?;
                self.event_manager.emit(MapEvent::LayerRemove {
                    layer_id: layer_id.to_string(),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Detach every layer, returns how many were removed
    pub fn remove_all_layers(&mut self) -> Result<usize> {
        let layers = self.layer_manager.drain();
        let count = layers.len();
        for mut layer in layers {
            layer.on_remove()?;
            self.event_manager.emit(MapEvent::LayerRemove {
                layer_id: layer.id().to_string(),
            });
        }
        Ok(count)
    }

    pub fn has_layer(&self, layer_id: &str) -> bool {
        self.layer_manager.contains(layer_id)
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layer_manager.get_layer(layer_id)
    }

    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layer_manager.with_layer_mut(layer_id, f)
    }

    /// Borrow a layer as its concrete type
    pub fn layer_as<T: 'static>(&self, layer_id: &str) -> Option<&T> {
        self.get_layer(layer_id)
            .and_then(|layer| layer.as_any().downcast_ref::<T>())
    }

    /// Mutably borrow a layer as its concrete type
    pub fn with_layer_as<T, F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        T: 'static,
        F: FnOnce(&mut T) -> R,
    {
        self.layer_manager
            .with_layer_mut(layer_id, |layer| layer.as_any_mut().downcast_mut::<T>().map(f))
            .flatten()
    }

    pub fn list_layers(&self) -> Vec<String> {
        self.layer_manager.list_layers()
    }

    pub fn on<F>(&mut self, kind: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.event_manager.on(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.event_manager.off(id)
    }

    pub fn emit(&mut self, event: MapEvent) {
        self.event_manager.emit(event);
    }

    pub fn process_events(&mut self) -> Vec<MapEvent> {
        self.event_manager.process_events()
    }

    /// Feed user input; drags end and wheel zooms settle the camera
    pub fn handle_input(&mut self, input: InputEvent) -> Result<()> {
        let actions = self.input_handler.handle_event(input, self.viewport.zoom);

        for action in actions {
            match action {
                Action::StartDrag => self.event_manager.emit(MapEvent::MoveStart {
                    center: self.viewport.center,
                }),
                Action::Pan { delta } => self.viewport.pan(delta),
                Action::EndDrag => {
                    self.layer_manager.notify_view_changed(&self.viewport)?;
                    self.event_manager.emit(MapEvent::MoveEnd {
                        center: self.viewport.center,
                    });
                }
                Action::Zoom { level, focus_point } => self.zoom_to(level, focus_point)?,
                Action::Click { position } => {
                    let lat_lng = self.viewport.pixel_to_lat_lng(&position);
                    self.event_manager.emit(MapEvent::Click {
                        lat_lng,
                        pixel: position,
                    });
                }
                Action::Resize { size } => {
                    self.viewport.set_size(size);
                    self.layer_manager.notify_view_changed(&self.viewport)?;
                }
            }
        }

        Ok(())
    }

    /// Hand finished tiles to their layers.
    ///
    /// Tiles of layers that were removed in the meantime are dropped. Returns
    /// the number of tiles delivered.
    pub fn update(&mut self) -> usize {
        let mut delivered = 0;
        for result in self.tile_loader.try_recv_results() {
            let layer_id = result.layer_id.clone();
            let coord = result.coord;
            let placeholder = result.placeholder;
            let accepted = self
                .with_layer_as::<TileLayer, _, _>(&layer_id, |layer| layer.receive_tile(result))
                .is_some();

            if accepted {
                delivered += 1;
                self.event_manager.emit(MapEvent::TileLoad {
                    layer_id,
                    coord,
                    placeholder,
                });
            } else {
                log::debug!("dropping tile {:?} of detached layer {}", coord, layer_id);
            }
        }
        delivered
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Loader shared by the tile layers of this map
    pub fn tile_loader(&self) -> &TileLoader {
        &self.tile_loader
    }
}
