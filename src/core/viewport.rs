use crate::core::{
    bounds::Bounds,
    geo::{LatLng, LatLngBounds, Point},
};
use serde::{Deserialize, Serialize};

/// Manages the current view of the map: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in map coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
    /// Panning is restricted so the center stays inside these bounds
    max_bounds: Option<LatLngBounds>,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 3.0),
            size,
            min_zoom: 0.0,
            max_zoom: 3.0,
            max_bounds: None,
        }
    }

    /// Sets the maximum bounds for the map and pulls the center back inside
    pub fn set_max_bounds(&mut self, bounds: Option<LatLngBounds>) {
        self.max_bounds = bounds;
        self.center = self.clamp_center(self.center);
    }

    pub fn max_bounds(&self) -> Option<&LatLngBounds> {
        self.max_bounds.as_ref()
    }

    /// Sets the center of the viewport with bounds checking
    pub fn set_center(&mut self, center: LatLng) {
        self.center = self.clamp_center(center);
    }

    /// Sets the zoom level, clamping to valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the viewport size
    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    /// Sets the zoom limits
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Changes only the zoom ceiling
    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        self.set_zoom_limits(self.min_zoom, max_zoom);
    }

    fn clamp_center(&self, center: LatLng) -> LatLng {
        match &self.max_bounds {
            Some(bounds) => bounds.clamp(&center),
            None => center,
        }
    }

    /// Gets the scale factor for a zoom level
    pub fn scale(zoom: f64) -> f64 {
        2_f64.powf(zoom)
    }

    /// Projects a coordinate to world pixel coordinates at the given zoom level
    ///
    /// Flat reference system: one lat/lng unit is one pixel at zoom 0 and the
    /// y axis points down, so `lat` is negated.
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let scale = Self::scale(zoom.unwrap_or(self.zoom));
        Point::new(lat_lng.lng * scale, -lat_lng.lat * scale)
    }

    /// Unprojects world pixel coordinates back to a coordinate at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let scale = Self::scale(zoom.unwrap_or(self.zoom));
        LatLng::new(-pixel.y / scale, pixel.x / scale)
    }

    /// The visible area in world pixels at the current zoom
    pub fn pixel_bounds(&self) -> Bounds {
        let center = self.project(&self.center, None);
        Bounds::from_center_and_size(center, self.size.x, self.size.y)
    }

    /// The visible area in map coordinates
    pub fn bounds(&self) -> LatLngBounds {
        let pixels = self.pixel_bounds();
        LatLngBounds::new(
            self.unproject(&pixels.min, None),
            self.unproject(&pixels.max, None),
        )
    }

    /// Converts a map coordinate to container pixel coordinates
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        let origin = self.pixel_bounds().min;
        self.project(lat_lng, None).subtract(&origin)
    }

    /// Converts container pixel coordinates back to a map coordinate
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let origin = self.pixel_bounds().min;
        self.unproject(&pixel.add(&origin), None)
    }

    /// Pans the viewport by the given pixel offset with bounds checking
    pub fn pan(&mut self, delta: Point) {
        let center = self.project(&self.center, None).subtract(&delta);
        let new_center = self.unproject(&center, None);
        self.set_center(new_center);
    }

    /// Zooms the viewport, keeping `focus_point` (container pixels) stationary when given
    pub fn zoom_to(&mut self, zoom: f64, focus_point: Option<Point>) {
        let new_zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < 0.001 {
            return;
        }

        match focus_point {
            Some(focus) => {
                let focus_lat_lng = self.pixel_to_lat_lng(&focus);
                self.zoom = new_zoom;
                let drift = self.lat_lng_to_pixel(&focus_lat_lng).subtract(&focus);
                self.pan(drift.multiply(-1.0));
            }
            None => self.zoom = new_zoom,
        }
    }
}
