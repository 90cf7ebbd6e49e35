use crate::core::geo::{LatLng, Point, TileCoord};
use serde::{Deserialize, Serialize};

/// Raw user input fed to the map by the hosting UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Single click/tap
    Click { position: Point },
    /// Double click/tap
    DoubleClick { position: Point },
    /// Start of drag operation
    DragStart { position: Point },
    /// Drag in progress
    Drag { delta: Point },
    /// End of drag operation
    DragEnd,
    /// Scroll wheel, positive delta scrolls towards the user (zoom out)
    Scroll { delta: f64, position: Point },
    /// Viewport/window resize
    Resize { size: Point },
}

impl InputEvent {
    /// Gets the primary position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::Click { position }
            | InputEvent::DoubleClick { position }
            | InputEvent::DragStart { position }
            | InputEvent::Scroll { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Checks if this event can move the camera
    pub fn moves_camera(&self) -> bool {
        matches!(
            self,
            InputEvent::Drag { .. }
                | InputEvent::DragEnd
                | InputEvent::Scroll { .. }
                | InputEvent::DoubleClick { .. }
        )
    }
}

/// Map event types that can be emitted by the map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Click on the map background
    Click { lat_lng: LatLng, pixel: Point },
    /// Pan started
    MoveStart { center: LatLng },
    /// Pan ended
    MoveEnd { center: LatLng },
    /// Zoom ended
    ZoomEnd { zoom: f64 },
    /// Layer was added to the map
    LayerAdd { layer_id: String },
    /// Layer was removed from the map
    LayerRemove { layer_id: String },
    /// A tile arrived for a layer; `placeholder` is set when the fetch failed
    TileLoad {
        layer_id: String,
        coord: TileCoord,
        placeholder: bool,
    },
    /// A marker was clicked
    MarkerClick { marker_id: String },
    /// A marker popup was opened
    PopupOpen { marker_id: String },
}

impl MapEvent {
    /// Event name used for listener registration
    pub fn kind(&self) -> &'static str {
        match self {
            MapEvent::Click { .. } => "click",
            MapEvent::MoveStart { .. } => "movestart",
            MapEvent::MoveEnd { .. } => "moveend",
            MapEvent::ZoomEnd { .. } => "zoomend",
            MapEvent::LayerAdd { .. } => "layeradd",
            MapEvent::LayerRemove { .. } => "layerremove",
            MapEvent::TileLoad { .. } => "tileload",
            MapEvent::MarkerClick { .. } => "markerclick",
            MapEvent::PopupOpen { .. } => "popupopen",
        }
    }
}
