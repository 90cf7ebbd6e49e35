use crate::{
    data::{
        bundled::Dataset,
        marker::{MarkerData, MarkerType, MarkerTypeTable},
        region::RegionRegistry,
    },
    prelude::{Arc, HashMap, HashSet},
};
use once_cell::sync::OnceCell;

pub type TypeCounts = HashMap<String, usize>;

/// Read-only queries over the bundled marker data.
///
/// Region aggregates are built lazily and kept for the life of the index;
/// the data underneath never changes.
pub struct MarkerIndex {
    dataset: Arc<Dataset>,
    subregion_counts: OnceCell<HashMap<String, TypeCounts>>,
    region_counts: HashMap<String, OnceCell<TypeCounts>>,
}

impl MarkerIndex {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let region_counts = dataset
            .regions
            .region_ids()
            .iter()
            .map(|id| (id.clone(), OnceCell::new()))
            .collect();
        Self {
            dataset,
            subregion_counts: OnceCell::new(),
            region_counts,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn regions(&self) -> &RegionRegistry {
        &self.dataset.regions
    }

    pub fn marker_types(&self) -> &MarkerTypeTable {
        &self.dataset.marker_types
    }

    pub fn marker_type(&self, key: &str) -> Option<&MarkerType> {
        self.dataset.marker_types.get(key)
    }

    pub fn get_markers_for_subregion(&self, subregion_id: &str) -> &[MarkerData] {
        self.dataset
            .subregion_markers
            .get(subregion_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Markers of every subregion of the region, in subregion order.
    /// Unknown regions have no markers.
    pub fn get_markers_for_region(&self, region_id: &str) -> Vec<&MarkerData> {
        let Some(region) = self.dataset.regions.get_region(region_id) else {
            return Vec::new();
        };
        region
            .subregions
            .iter()
            .flat_map(|s| self.get_markers_for_subregion(s))
            .collect()
    }

    /// Markers whose type is in `types`; an empty set means no filter
    pub fn get_filtered_markers_for_region(
        &self,
        region_id: &str,
        types: &HashSet<String>,
    ) -> Vec<&MarkerData> {
        let markers = self.get_markers_for_region(region_id);
        if types.is_empty() {
            return markers;
        }
        markers
            .into_iter()
            .filter(|m| types.contains(&m.marker_type))
            .collect()
    }

    pub fn get_marker_counts_for_region(&self, region_id: &str) -> TypeCounts {
        match self.region_counts.get(region_id) {
            Some(cell) => cell
                .get_or_init(|| {
                    let mut counts = TypeCounts::default();
                    if let Some(region) = self.dataset.regions.get_region(region_id) {
                        for subregion in &region.subregions {
                            for (t, n) in self.get_subregion_type_counts(subregion) {
                                *counts.entry(t).or_default() += n;
                            }
                        }
                    }
                    counts
                })
                .clone(),
            None => TypeCounts::default(),
        }
    }

    pub fn get_subregion_type_counts(&self, subregion_id: &str) -> TypeCounts {
        self.subregion_counts
            .get_or_init(|| {
                self.dataset
                    .subregion_markers
                    .iter()
                    .map(|(subregion, markers)| {
                        let mut counts = TypeCounts::default();
                        for marker in markers {
                            *counts.entry(marker.marker_type.clone()).or_default() += 1;
                        }
                        (subregion.clone(), counts)
                    })
                    .collect()
            })
            .get(subregion_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_marker_ids_for_region_and_type(&self, region_id: &str, marker_type: &str) -> Vec<String> {
        self.get_markers_for_region(region_id)
            .into_iter()
            .filter(|m| m.marker_type == marker_type)
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn get_markers_for_subregion_and_type(&self, subregion_id: &str, marker_type: &str) -> Vec<&MarkerData> {
        self.get_markers_for_subregion(subregion_id)
            .iter()
            .filter(|m| m.marker_type == marker_type)
            .collect()
    }

    /// Look a marker up by id across every subregion
    pub fn get_marker(&self, marker_id: &str) -> Option<&MarkerData> {
        self.dataset
            .subregion_markers
            .values()
            .flat_map(|markers| markers.iter())
            .find(|m| m.id == marker_id)
    }

    pub fn marker_type_tree(&self) -> Vec<(String, Vec<&MarkerType>)> {
        self.dataset.marker_types.type_tree()
    }
}
