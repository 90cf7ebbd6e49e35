//! The static dataset shipped with the crate

use crate::{
    data::{
        marker::{MarkerData, MarkerTypeTable},
        region::RegionRegistry,
        resources::ResourceCatalog,
    },
    prelude::HashMap,
    Result,
};
use std::path::Path;

const REGIONS_JSON: &str = include_str!("../../data/regions.json");
const MARKER_TYPES_JSON: &str = include_str!("../../data/marker_types.json");
const RESOURCES_JSON: &str = include_str!("../../data/resources.json");

const SUBREGION_MARKERS_JSON: &[(&str, &str)] = &[
    ("DJ_1", include_str!("../../data/markers/DJ_1.json")),
    ("VL_1", include_str!("../../data/markers/VL_1.json")),
    ("VL_2", include_str!("../../data/markers/VL_2.json")),
    ("VL_3", include_str!("../../data/markers/VL_3.json")),
    ("VL_5", include_str!("../../data/markers/VL_5.json")),
    ("VL_6", include_str!("../../data/markers/VL_6.json")),
    ("VL_7", include_str!("../../data/markers/VL_7.json")),
    ("WL_1", include_str!("../../data/markers/WL_1.json")),
    ("WL_2", include_str!("../../data/markers/WL_2.json")),
];

/// Regions, marker types, per-subregion markers and tracked resource nodes
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub regions: RegionRegistry,
    pub marker_types: MarkerTypeTable,
    pub subregion_markers: HashMap<String, Vec<MarkerData>>,
    pub resources: ResourceCatalog,
}

impl Dataset {
    /// Parse the dataset compiled into the crate
    pub fn bundled() -> Result<Self> {
        let mut subregion_markers = HashMap::default();
        for (subregion, json) in SUBREGION_MARKERS_JSON {
            let markers: Vec<MarkerData> = serde_json::from_str(json)?;
            subregion_markers.insert(subregion.to_string(), markers);
        }

        Ok(Self {
            regions: RegionRegistry::from_json_str(REGIONS_JSON)?,
            marker_types: MarkerTypeTable::from_json_str(MARKER_TYPES_JSON)?,
            subregion_markers,
            resources: ResourceCatalog::from_json_str(RESOURCES_JSON)?,
        })
    }

    /// Load a dataset laid out like the bundled one:
    /// `regions.json`, `marker_types.json`, `resources.json` and
    /// `markers/<subregion>.json`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |name: &str| std::fs::read_to_string(dir.join(name));

        let regions = RegionRegistry::from_json_str(&read("regions.json")?)?;
        let marker_types = MarkerTypeTable::from_json_str(&read("marker_types.json")?)?;
        let resources = match read("resources.json") {
            Ok(json) => ResourceCatalog::from_json_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ResourceCatalog::default(),
            Err(e) => return Err(e.into()),
        };

        let mut subregion_markers = HashMap::default();
        for region_id in regions.region_ids() {
            let Some(region) = regions.get_region(region_id) else {
                continue;
            };
            for subregion in &region.subregions {
                let path = dir.join("markers").join(format!("{}.json", subregion));
                match std::fs::read_to_string(&path) {
                    Ok(json) => {
                        let markers: Vec<MarkerData> = serde_json::from_str(&json)?;
                        subregion_markers.insert(subregion.clone(), markers);
                    }
                    Err(e) => log::warn!("no markers for {}: {}", subregion, e),
                }
            }
        }

        log::info!(
            "loaded {} regions and {} marker types from {}",
            regions.len(),
            marker_types.len(),
            dir.display()
        );

        Ok(Self {
            regions,
            marker_types,
            subregion_markers,
            resources,
        })
    }

    pub fn marker_count(&self) -> usize {
        self.subregion_markers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_regions_are_complete() {
        let dataset = Dataset::bundled().unwrap();
        assert_eq!(dataset.regions.len(), 3);
        for id in dataset.regions.region_ids() {
            let (region, _) = dataset.regions.resolve(id).unwrap();
            assert!(region.dimensions.is_some());
            assert!(region.max_zoom.is_some());
            assert!(region.initial_offset.is_some());
            assert!(region.initial_zoom.is_some());
        }
    }

    #[test]
    fn test_every_marker_has_a_known_type() {
        let dataset = Dataset::bundled().unwrap();
        assert!(dataset.marker_count() > 0);
        for (subregion, markers) in &dataset.subregion_markers {
            for marker in markers {
                assert_eq!(&marker.subregion_id, subregion);
                assert!(
                    dataset.marker_types.contains(&marker.marker_type),
                    "{} has unknown type {}",
                    marker.id,
                    marker.marker_type
                );
            }
        }
    }
}
