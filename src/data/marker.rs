use crate::{core::geo::LatLng, prelude::HashMap, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sub-categories in the order filter panels list them
pub const DEFAULT_SUBCATEGORY_ORDER: [&str; 8] = [
    "collection",
    "natural",
    "valuable",
    "combat",
    "npc",
    "facility",
    "mob",
    "boss",
];

/// One point of interest.
///
/// `position` is `[lat, lng]` in the region's flat map space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    pub id: String,
    pub position: [f64; 2],
    pub subregion_id: String,
    #[serde(rename = "type")]
    pub marker_type: String,
}

impl MarkerData {
    pub fn lat_lng(&self) -> LatLng {
        LatLng::from(self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerCategory {
    pub main: String,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerType {
    pub key: String,
    pub name: String,
    pub category: MarkerCategory,
    /// Icon is drawn without the round frame
    #[serde(default)]
    pub no_frame: bool,
    #[serde(default)]
    pub sub_icon: Option<String>,
}

/// Every marker type, keyed by type key
#[derive(Debug, Clone, Default)]
pub struct MarkerTypeTable {
    types: BTreeMap<String, MarkerType>,
}

impl MarkerTypeTable {
    pub fn new(types: impl IntoIterator<Item = MarkerType>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.key.clone(), t)).collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let types: BTreeMap<String, MarkerType> = serde_json::from_str(json)?;
        Ok(Self { types })
    }

    pub fn get(&self, key: &str) -> Option<&MarkerType> {
        self.types.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    /// All type keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Keys of every type whose sub-category is `sub_category`
    pub fn keys_in_category(&self, sub_category: &str) -> Vec<String> {
        self.types
            .values()
            .filter(|t| t.category.sub == sub_category)
            .map(|t| t.key.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkerType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types grouped by sub-category.
    ///
    /// Known sub-categories come first in [`DEFAULT_SUBCATEGORY_ORDER`], any
    /// others follow alphabetically. Empty groups are left out.
    pub fn type_tree(&self) -> Vec<(String, Vec<&MarkerType>)> {
        let mut groups: HashMap<&str, Vec<&MarkerType>> = HashMap::default();
        for marker_type in self.types.values() {
            groups
                .entry(marker_type.category.sub.as_str())
                .or_default()
                .push(marker_type);
        }

        let mut tree = Vec::with_capacity(groups.len());
        for category in DEFAULT_SUBCATEGORY_ORDER {
            if let Some(types) = groups.remove(category) {
                tree.push((category.to_string(), types));
            }
        }

        let mut rest: Vec<_> = groups.into_iter().collect();
        rest.sort_by(|a, b| a.0.cmp(b.0));
        tree.extend(rest.into_iter().map(|(c, types)| (c.to_string(), types)));
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MarkerTypeTable {
        MarkerTypeTable::from_json_str(
            r#"{
                "blight_crab": { "key": "blight_crab", "name": "Blight Crab", "category": { "main": "enemy", "sub": "mob" } },
                "teleport_point": { "key": "teleport_point", "name": "Teleport Point", "noFrame": true, "category": { "main": "poi", "sub": "facility" } },
                "pink_bolete_spot": { "key": "pink_bolete_spot", "name": "Pink Bolete", "category": { "main": "resource", "sub": "natural" } },
                "odd": { "key": "odd", "name": "Odd", "category": { "main": "misc", "sub": "event" } }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_marker_data_json() {
        let marker: MarkerData = serde_json::from_str(
            r#"{ "id": "VL_1_001", "position": [-100.0, 100.0], "subregionId": "VL_1", "type": "pink_bolete_spot" }"#,
        )
        .unwrap();
        assert_eq!(marker.marker_type, "pink_bolete_spot");
        assert_eq!(marker.lat_lng(), LatLng::new(-100.0, 100.0));
    }

    #[test]
    fn test_type_table() {
        let table = table();
        assert_eq!(table.len(), 4);
        assert!(table.get("teleport_point").map(|t| t.no_frame).unwrap_or(false));
        assert_eq!(table.keys_in_category("mob"), vec!["blight_crab"]);
    }

    #[test]
    fn test_type_tree_order() {
        let table = table();
        let categories: Vec<_> = table.type_tree().into_iter().map(|(c, _)| c).collect();
        assert_eq!(categories, vec!["natural", "facility", "mob", "event"]);
    }
}
