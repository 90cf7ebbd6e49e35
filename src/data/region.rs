//! Static per-region map configuration

use crate::{
    core::{constants::TILE_SIZE, geo::Point},
    prelude::HashMap,
    MapError, Result,
};
use serde::{Deserialize, Serialize};

/// Pixel offset of the map origin from the region's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// A region record as stored in the bundled table.
///
/// Camera fields are optional here because the table is data: a record
/// missing any of them is rejected by [`Region::geometry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub id: String,
    /// Width and height of the region at its native zoom
    pub dimensions: Option<[f64; 2]>,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Highest zoom with native tiles
    pub max_zoom: Option<u8>,
    pub initial_zoom: Option<f64>,
    pub initial_offset: Option<Offset>,
    #[serde(default)]
    pub subregions: Vec<String>,
}

fn default_tile_size() -> u32 {
    TILE_SIZE
}

/// The validated camera-relevant part of a [`Region`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionGeometry {
    pub width: f64,
    pub height: f64,
    pub tile_size: u32,
    pub max_zoom: u8,
    pub initial_zoom: f64,
    pub initial_offset: Offset,
}

impl RegionGeometry {
    /// Pixel at the native zoom the default camera looks at
    pub fn default_center_pixel(&self) -> Point {
        Point::new(
            self.width / 2.0 + self.initial_offset.x,
            self.height / 2.0 + self.initial_offset.y,
        )
    }
}

impl Region {
    /// Checks the camera fields, failing on the first missing one
    pub fn geometry(&self) -> Result<RegionGeometry> {
        let missing = |field: &str| MapError::InvalidRegionConfig {
            region: self.id.clone(),
            missing: field.to_string(),
        };

        let max_zoom = self.max_zoom.ok_or_else(|| missing("maxZoom"))?;
        let [width, height] = self.dimensions.ok_or_else(|| missing("dimensions"))?;
        let initial_offset = self.initial_offset.ok_or_else(|| missing("initialOffset"))?;
        let initial_zoom = self.initial_zoom.ok_or_else(|| missing("initialZoom"))?;

        Ok(RegionGeometry {
            width,
            height,
            tile_size: self.tile_size,
            max_zoom,
            initial_zoom,
            initial_offset,
        })
    }
}

/// Table of every known region, loaded once and never mutated
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    regions: HashMap<String, Region>,
    order: Vec<String>,
}

impl RegionRegistry {
    pub fn new(regions: Vec<Region>) -> Self {
        let order = regions.iter().map(|r| r.id.clone()).collect();
        let regions = regions.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { regions, order }
    }

    /// Parse a JSON object keyed by region id
    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: std::collections::BTreeMap<String, Region> = serde_json::from_str(json)?;
        let regions = table
            .into_iter()
            .map(|(id, mut region)| {
                region.id = id;
                region
            })
            .collect();
        Ok(Self::new(regions))
    }

    pub fn get_region(&self, region_id: &str) -> Option<&Region> {
        self.regions.get(region_id)
    }

    /// Region and validated geometry; both missing records and missing
    /// fields are errors
    pub fn resolve(&self, region_id: &str) -> Result<(&Region, RegionGeometry)> {
        let region = self
            .get_region(region_id)
            .ok_or_else(|| MapError::RegionNotFound(region_id.to_string()))?;
        Ok((region, region.geometry()?))
    }

    /// Region ids in table order
    pub fn region_ids(&self) -> &[String] {
        &self.order
    }

    /// Region that lists `subregion_id`
    pub fn region_of_subregion(&self, subregion_id: &str) -> Option<&Region> {
        self.order
            .iter()
            .filter_map(|id| self.regions.get(id))
            .find(|r| r.subregions.iter().any(|s| s == subregion_id))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
