use crate::core::{constants::TILE_SIZE, geo::TileCoord};

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;

    /// Template the URLs are built from, used as the cache namespace
    fn template(&self) -> &str;

    fn tile_size(&self) -> u32 {
        TILE_SIZE
    }
}

/// Tiles of one region layer, `{base}/map-tiles/{segment}/{z}/{x}_{y}.{ext}`
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTileSource {
    template: String,
    tile_size: u32,
}

impl RegionTileSource {
    pub fn new(template: impl Into<String>, tile_size: u32) -> Self {
        Self {
            template: template.into(),
            tile_size,
        }
    }
}

impl TileSource for RegionTileSource {
    fn url(&self, coord: TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    fn template(&self) -> &str {
        &self.template
    }

    fn tile_size(&self) -> u32 {
        self.tile_size
    }
}
