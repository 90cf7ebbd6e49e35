//! Core constants for the region map engine.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Zoom levels allowed past a region's native tile zoom.
pub const OVER_ZOOM_LEVELS: f64 = 1.0;

/// Snap zoom levels to these quanta (quarter steps).
pub const DEFAULT_ZOOM_SNAP: f64 = 0.25;

/// Programmatic +/- zoom step.
pub const DEFAULT_ZOOM_DELTA: f64 = 0.25;

/// Wheel delta (in pixels) that amounts to one full zoom level.
pub const WHEEL_PX_PER_ZOOM_LEVEL: f64 = 50.0;

/// Markers closer than this (lat/lng units) belong to the same resource node.
pub const NODE_CLUSTER_THRESHOLD: f64 = 20.0;

/// Centroid latitude difference under which two clusters share a row.
pub const NODE_ROW_TOLERANCE: f64 = 5.0;

/// Brightness of the base tiles while an overlay layer is shown.
pub const OVERLAY_DIM_BRIGHTNESS: f32 = 0.5;

/// 1x1 transparent webp served in place of tiles that fail to load.
pub const PLACEHOLDER_TILE_URL: &str =
    "data:image/webp;base64,UklGRhYAAABXRUJQVlA4TAoAAAAvAAAAAP8B/wE=";

/// Raw bytes of [`PLACEHOLDER_TILE_URL`].
pub const PLACEHOLDER_TILE: &[u8] = &[
    0x52, 0x49, 0x46, 0x46, 0x16, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50, 0x56, 0x50, 0x38,
    0x4c, 0x0a, 0x00, 0x00, 0x00, 0x2f, 0x00, 0x00, 0x00, 0x00, 0xff, 0x01, 0xff, 0x01,
];

/// Fallback color for categories without a dedicated one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#666666";

/// Marker icon size in pixels.
pub const MARKER_ICON_SIZE: (u32, u32) = (32, 32);

/// Anchor inside the marker icon (hot-spot) in pixel coords.
pub const MARKER_ICON_ANCHOR: (u32, u32) = (16, 16);

/// Cluster bubble size in pixels.
pub const CLUSTER_ICON_SIZE: (u32, u32) = (40, 40);
