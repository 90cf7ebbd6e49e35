use crate::{
    core::{
        bounds::Bounds,
        geo::{LatLng, Point},
    },
    prelude::HashMap,
};

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A point item indexed in an R-tree.
///
/// Positions are zoom-0 projected pixels (`x = lng`, `y = -lat`), so scaling
/// by `2^zoom` gives pixels at any zoom.
#[derive(Debug, Clone)]
pub struct SpatialItem<T> {
    pub id: String,
    pub point: Point,
    pub data: T,
}

impl<T> SpatialItem<T> {
    pub fn new(id: String, point: Point, data: T) -> Self {
        Self { id, point, data }
    }

    pub fn from_lat_lng(id: String, lat_lng: LatLng, data: T) -> Self {
        Self::new(id, Point::new(lat_lng.lng, -lat_lng.lat), data)
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(-self.point.y, self.point.x)
    }
}

impl<T> PartialEq for SpatialItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for SpatialItem<T> {}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for SpatialItem<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x, self.point.y])
    }
}

impl<T> PointDistance for SpatialItem<T> {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point.x - point[0];
        let dy = self.point.y - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree over point items with lookup by id
pub struct SpatialIndex<T> {
    rtree: RTree<SpatialItem<T>>,
    positions: HashMap<String, Point>,
}

impl<T: Clone> SpatialIndex<T> {
    pub fn new() -> Self {
        Self {
            rtree: RTree::new(),
            positions: HashMap::default(),
        }
    }

    /// Insert an item, replacing any item with the same id
    pub fn insert(&mut self, item: SpatialItem<T>) {
        self.remove(&item.id);
        self.positions.insert(item.id.clone(), item.point);
        self.rtree.insert(item);
    }

    /// Bulk-load items into an empty index
    pub fn bulk_load(items: Vec<SpatialItem<T>>) -> Self {
        let positions = items
            .iter()
            .map(|item| (item.id.clone(), item.point))
            .collect();
        Self {
            rtree: RTree::bulk_load(items),
            positions,
        }
    }

    /// Items inside `bounds` (zoom-0 pixels)
    pub fn query(&self, bounds: &Bounds) -> Vec<&SpatialItem<T>> {
        let envelope =
            AABB::from_corners([bounds.min.x, bounds.min.y], [bounds.max.x, bounds.max.y]);
        self.rtree.locate_in_envelope(&envelope).collect()
    }

    pub fn query_radius(&self, center: &Point, radius: f64) -> Vec<&SpatialItem<T>> {
        self.rtree
            .locate_within_distance([center.x, center.y], radius * radius)
            .collect()
    }

    pub fn remove(&mut self, id: &str) -> Option<SpatialItem<T>> {
        let point = self.positions.remove(id)?;
        let found = self
            .rtree
            .locate_all_at_point(&[point.x, point.y])
            .find(|item| item.id == id)
            .cloned()?;
        self.rtree.remove(&found)
    }

    pub fn get(&self, id: &str) -> Option<&SpatialItem<T>> {
        let point = self.positions.get(id)?;
        self.rtree
            .locate_all_at_point(&[point.x, point.y])
            .find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn all_items(&self) -> Vec<&SpatialItem<T>> {
        self.rtree.iter().collect()
    }

    /// Bounds of every indexed point
    pub fn bounds(&self) -> Option<Bounds> {
        if self.rtree.size() == 0 {
            return None;
        }
        let envelope = self.rtree.root().envelope();
        Some(Bounds::from_coords(
            envelope.lower()[0],
            envelope.lower()[1],
            envelope.upper()[0],
            envelope.upper()[1],
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn clear(&mut self) {
        self.rtree = RTree::new();
        self.positions.clear();
    }
}

impl<T: Clone> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
