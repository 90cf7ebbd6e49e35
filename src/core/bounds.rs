use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in projected pixels, `min` is the top-left corner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Box of `width` x `height` pixels around `center`, e.g. the visible
    /// part of the map
    pub fn from_center_and_size(center: Point, width: f64, height: f64) -> Self {
        let half = Point::new(width / 2.0, height / 2.0);
        Self::new(center.subtract(&half), center.add(&half))
    }

    /// Inclusive on every edge
    pub fn contains(&self, point: &Point) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }

    /// Grow to cover `point`
    pub fn extend(&mut self, point: &Point) {
        self.min = Point::new(self.min.x.min(point.x), self.min.y.min(point.y));
        self.max = Point::new(self.max.x.max(point.x), self.max.y.max(point.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_box_and_extend() {
        let mut bounds = Bounds::from_center_and_size(Point::new(100.0, 50.0), 20.0, 10.0);
        assert_eq!(bounds, Bounds::from_coords(90.0, 45.0, 110.0, 55.0));
        assert!(bounds.contains(&Point::new(110.0, 45.0)));
        assert!(!bounds.contains(&Point::new(110.5, 45.0)));

        bounds.extend(&Point::new(0.0, 60.0));
        assert_eq!(bounds, Bounds::from_coords(0.0, 45.0, 110.0, 60.0));
    }
}
