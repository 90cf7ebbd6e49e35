use crate::{
    core::{
        config::MapConfig,
        constants::{MARKER_ICON_ANCHOR, MARKER_ICON_SIZE},
        geo::LatLng,
    },
    data::marker::{MarkerData, MarkerType},
    prelude::Arc,
};
use serde::Serialize;

const UNKNOWN_CATEGORY: &str = "unknown";

/// How a marker icon is drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerIcon {
    pub url: String,
    pub collected: bool,
    pub no_frame: bool,
    pub size: (u32, u32),
    pub anchor: (u32, u32),
    /// Fetched image; without it the icon is drawn from `url`
    #[serde(skip)]
    pub image: Option<Arc<Vec<u8>>>,
}

impl MarkerIcon {
    /// Style classes of the icon element
    pub fn class_name(&self) -> String {
        let mut class = String::from("map-marker");
        if self.collected {
            class.push_str(" collected");
        }
        if self.no_frame {
            class.push_str(" no-frame");
        }
        class
    }
}

/// Content of a marker's detail popup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupContent {
    pub marker_id: String,
    pub category: String,
    pub category_color: String,
    pub title: String,
    pub icon_url: String,
    /// Subregion id with underscores shown as spaces
    pub subregion: String,
    pub collected: bool,
    /// "Unmark" for collected markers, "Collected" otherwise
    pub button_label: String,
}

/// A marker placed on the map
#[derive(Debug, Clone)]
pub struct MapMarker {
    data: MarkerData,
    position: LatLng,
    type_name: String,
    category: String,
    category_color: String,
    icon: MarkerIcon,
    popup: Option<PopupContent>,
    tooltip_open: bool,
}

impl MapMarker {
    pub fn new(data: MarkerData, marker_type: Option<&MarkerType>, config: &MapConfig, collected: bool) -> Self {
        let type_name = marker_type
            .map(|t| t.name.clone())
            .unwrap_or_else(|| data.marker_type.clone());
        let category = marker_type
            .map(|t| t.category.sub.clone())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        let category_color = config.category_color(&category).to_string();
        let icon = MarkerIcon {
            url: config.icon_url(&data.marker_type),
            collected,
            no_frame: marker_type.map(|t| t.no_frame).unwrap_or(false),
            size: MARKER_ICON_SIZE,
            anchor: MARKER_ICON_ANCHOR,
            image: None,
        };

        Self {
            position: data.lat_lng(),
            data,
            type_name,
            category,
            category_color,
            icon,
            popup: None,
            tooltip_open: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn data(&self) -> &MarkerData {
        &self.data
    }

    pub fn marker_type(&self) -> &str {
        &self.data.marker_type
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Tooltip text: the type's display name, or its key when unknown
    pub fn tooltip(&self) -> &str {
        &self.type_name
    }

    pub fn icon(&self) -> &MarkerIcon {
        &self.icon
    }

    pub fn set_icon_image(&mut self, image: Option<Arc<Vec<u8>>>) {
        self.icon.image = image;
    }

    pub fn is_collected(&self) -> bool {
        self.icon.collected
    }

    /// Redraw the icon for a collection state; an open popup is rebuilt too
    pub fn set_collected(&mut self, collected: bool) {
        self.icon.collected = collected;
        if self.popup.is_some() {
            self.popup = Some(self.popup_content());
        }
    }

    pub fn popup_content(&self) -> PopupContent {
        let collected = self.icon.collected;
        PopupContent {
            marker_id: self.data.id.clone(),
            category: self.category.clone(),
            category_color: self.category_color.clone(),
            title: self.type_name.clone(),
            icon_url: self.icon.url.clone(),
            subregion: self.data.subregion_id.replace('_', " "),
            collected,
            button_label: if collected { "Unmark" } else { "Collected" }.to_string(),
        }
    }

    /// Open the popup with freshly built content
    pub fn open_popup(&mut self) -> &PopupContent {
        self.popup.insert(self.popup_content())
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    pub fn popup(&self) -> Option<&PopupContent> {
        self.popup.as_ref()
    }

    pub fn is_popup_open(&self) -> bool {
        self.popup.is_some()
    }

    pub fn open_tooltip(&mut self) {
        self.tooltip_open = true;
    }

    pub fn close_tooltip(&mut self) {
        self.tooltip_open = false;
    }

    pub fn is_tooltip_open(&self) -> bool {
        self.tooltip_open
    }
}
