//! Tile layer over a region tile pyramid
//!
//! The layer works out which tiles cover the viewport (Leaflet's
//! `_getTiledPixelBounds` / `_pxBoundsToTileRange`), asks the shared
//! [`TileLoader`] for the ones it does not hold yet and stores what arrives.
//! Above `max_native_zoom` the native tiles are reused and scaled.

use crate::{
    core::{
        constants::{PLACEHOLDER_TILE_URL, TILE_SIZE},
        geo::{LatLngBounds, Point, TileCoord},
        viewport::Viewport,
    },
    layers::base::{LayerProperties, LayerTrait, LayerType},
    prelude::{Arc, HashMap, HashSet},
    tiles::{
        loader::{LoadSignal, TileBatch, TileLoader, TileResult},
        source::TileSource,
    },
    Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayerOptions {
    pub tile_size: u32,
    pub min_zoom: u8,
    /// Highest zoom with real tiles
    pub max_native_zoom: u8,
    /// Highest zoom the layer is shown at
    pub max_zoom: f64,
    /// Tiles outside these bounds are never requested
    pub bounds: Option<LatLngBounds>,
    /// Served in place of tiles that fail to load
    pub error_tile_url: String,
    pub no_wrap: bool,
    pub z_index: i32,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            min_zoom: 0,
            max_native_zoom: 3,
            max_zoom: 4.0,
            bounds: None,
            error_tile_url: PLACEHOLDER_TILE_URL.to_string(),
            no_wrap: true,
            z_index: 1,
        }
    }
}

/// A tile held by the layer
#[derive(Debug, Clone)]
pub struct LoadedTile {
    pub data: Arc<Vec<u8>>,
    pub placeholder: bool,
}

pub struct TileLayer {
    properties: LayerProperties,
    source: Arc<dyn TileSource>,
    options: TileLayerOptions,
    loader: TileLoader,
    tiles: HashMap<TileCoord, LoadedTile>,
    requested: HashSet<TileCoord>,
    signal: LoadSignal,
    brightness: f32,
}

impl TileLayer {
    pub fn new(
        id: String,
        name: String,
        source: Arc<dyn TileSource>,
        options: TileLayerOptions,
        loader: TileLoader,
    ) -> Self {
        let properties =
            LayerProperties::new(id, name, LayerType::Tile).with_z_index(options.z_index);
        Self {
            properties,
            source,
            options,
            loader,
            tiles: HashMap::default(),
            requested: HashSet::default(),
            signal: LoadSignal::new(),
            brightness: 1.0,
        }
    }

    pub fn tile_options(&self) -> &TileLayerOptions {
        &self.options
    }

    pub fn tile_source(&self) -> &dyn TileSource {
        self.source.as_ref()
    }

    /// Fires each time a batch of requested tiles has arrived
    pub fn load_signal(&self) -> LoadSignal {
        self.signal.clone()
    }

    /// Visual brightness multiplier, 1.0 is unchanged
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.max(0.0);
    }

    pub fn tile(&self, coord: &TileCoord) -> Option<&LoadedTile> {
        self.tiles.get(coord)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn placeholder_count(&self) -> usize {
        self.tiles.values().filter(|t| t.placeholder).count()
    }

    /// Tile zoom used for a map zoom, capped at the native zoom
    pub fn tile_zoom(&self, map_zoom: f64) -> u8 {
        let rounded = map_zoom.round().max(0.0) as u8;
        rounded.clamp(self.options.min_zoom, self.options.max_native_zoom)
    }

    /// Pixel bounds of the viewport at the tile zoom
    pub fn tiled_pixel_bounds(&self, viewport: &Viewport, zoom: u8) -> (Point, Point) {
        let scale = Viewport::scale(viewport.zoom - zoom as f64);
        let pixel_center = viewport.project(&viewport.center, Some(zoom as f64));
        let half_size = Point::new(viewport.size.x / (scale * 2.0), viewport.size.y / (scale * 2.0));
        (
            pixel_center.subtract(&half_size),
            pixel_center.add(&half_size),
        )
    }

    /// Tiles covering the viewport, restricted to the layer bounds
    pub fn visible_tiles(&self, viewport: &Viewport) -> Vec<TileCoord> {
        if viewport.zoom > self.options.max_zoom {
            return Vec::new();
        }

        let zoom = self.tile_zoom(viewport.zoom);
        let (min, max) = self.tiled_pixel_bounds(viewport, zoom);
        let tile_size = self.options.tile_size as f64;

        let mut min_x = (min.x / tile_size).floor();
        let mut min_y = (min.y / tile_size).floor();
        let mut max_x = (max.x / tile_size).ceil() - 1.0;
        let mut max_y = (max.y / tile_size).ceil() - 1.0;

        if let Some(bounds) = &self.options.bounds {
            let a = viewport.project(&bounds.south_west, Some(zoom as f64));
            let b = viewport.project(&bounds.north_east, Some(zoom as f64));
            min_x = min_x.max((a.x.min(b.x) / tile_size).floor());
            min_y = min_y.max((a.y.min(b.y) / tile_size).floor());
            max_x = max_x.min((a.x.max(b.x) / tile_size).ceil() - 1.0);
            max_y = max_y.min((a.y.max(b.y) / tile_size).ceil() - 1.0);
        }

        let min_x = min_x.max(0.0);
        let min_y = min_y.max(0.0);
        if max_x < min_x || max_y < min_y {
            return Vec::new();
        }

        let mut coords = Vec::new();
        for y in (min_y as u32)..=(max_y as u32) {
            for x in (min_x as u32)..=(max_x as u32) {
                coords.push(TileCoord::new(x, y, zoom));
            }
        }
        coords
    }

    /// Request every visible tile not held or in flight
    fn request_tiles(&mut self, viewport: &Viewport) -> usize {
        let missing: Vec<TileCoord> = self
            .visible_tiles(viewport)
            .into_iter()
            .filter(|coord| !self.tiles.contains_key(coord) && !self.requested.contains(coord))
            .collect();
        if missing.is_empty() {
            return 0;
        }

        for coord in &missing {
            self.requested.insert(*coord);
        }
        let count = missing.len();
        self.loader.load_batch(TileBatch {
            layer_id: self.properties.id.clone(),
            source: self.source.clone(),
            coords: missing,
            signal: self.signal.clone(),
        });
        count
    }

    /// Store a tile delivered by the loader
    pub fn receive_tile(&mut self, result: TileResult) {
        self.requested.remove(&result.coord);
        self.tiles.insert(
            result.coord,
            LoadedTile {
                data: result.data,
                placeholder: result.placeholder,
            },
        );
    }
}

impl LayerTrait for TileLayer {
    crate::impl_layer_trait!(TileLayer, properties);

    fn on_add(&mut self, viewport: &Viewport) -> Result<()> {
        let requested = self.request_tiles(viewport);
        log::debug!(
            "tile layer {} added, {} tiles requested",
            self.properties.id,
            requested
        );
        Ok(())
    }

    fn on_remove(&mut self) -> Result<()> {
        self.tiles.clear();
        self.requested.clear();
        Ok(())
    }

    fn on_view_changed(&mut self, viewport: &Viewport) -> Result<()> {
        self.request_tiles(viewport);
        Ok(())
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.options.bounds.clone()
    }

    fn options(&self) -> serde_json::Value {
        serde_json::json!({
            "template": self.source.template(),
            "tile_size": self.options.tile_size,
            "max_native_zoom": self.options.max_native_zoom,
            "max_zoom": self.options.max_zoom,
            "brightness": self.brightness,
        })
    }

    fn set_options(&mut self, options: serde_json::Value) -> Result<()> {
        if let Some(brightness) = options.get("brightness").and_then(|v| v.as_f64()) {
            self.set_brightness(brightness as f32);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::tiles::{loader::TileFetcher, source::RegionTileSource};
    use async_trait::async_trait;

    struct NoFetch;

    #[async_trait]
    impl TileFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Ok(url.as_bytes().to_vec())
        }
    }

    fn valley_layer() -> TileLayer {
        let options = TileLayerOptions {
            max_native_zoom: 4,
            max_zoom: 5.0,
            bounds: Some(LatLngBounds::new(
                LatLng::new(-625.0, 0.0),
                LatLng::new(0.0, 750.0),
            )),
            ..TileLayerOptions::default()
        };
        TileLayer::new(
            "base".to_string(),
            "Valley IV".to_string(),
            Arc::new(RegionTileSource::new("t/{z}/{x}_{y}", 256)),
            options,
            TileLoader::new(Arc::new(NoFetch), Default::default()),
        )
    }

    #[test]
    fn test_tile_zoom_caps_at_native() {
        let layer = valley_layer();
        assert_eq!(layer.tile_zoom(5.0), 4);
        assert_eq!(layer.tile_zoom(1.5), 2);
        assert_eq!(layer.tile_zoom(1.25), 1);
    }

    #[test]
    fn test_visible_tiles_clipped_to_bounds() {
        let layer = valley_layer();
        // whole region in view at zoom 0: 750x625 px -> 3x3 tiles
        let viewport = Viewport::new(LatLng::new(-312.5, 375.0), 0.0, Point::new(2000.0, 2000.0));
        let tiles = layer.visible_tiles(&viewport);
        assert_eq!(tiles.len(), 9);
        assert!(tiles.iter().all(|t| t.z == 0 && t.x <= 2 && t.y <= 2));
    }

    #[test]
    fn test_corner_viewport() {
        let layer = valley_layer();
        // top-left corner at zoom 2: only tiles with non-negative indices
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));
        let tiles = layer.visible_tiles(&viewport);
        assert_eq!(tiles, vec![TileCoord::new(0, 0, 2)]);
    }

    #[test]
    fn test_receive_and_brightness() {
        let mut layer = valley_layer();
        layer.receive_tile(TileResult {
            layer_id: "base".to_string(),
            coord: TileCoord::new(0, 0, 2),
            data: Arc::new(vec![1]),
            placeholder: true,
        });
        assert_eq!(layer.tile_count(), 1);
        assert_eq!(layer.placeholder_count(), 1);

        layer.set_brightness(0.5);
        assert_eq!(layer.options()["brightness"], 0.5);
    }
}
