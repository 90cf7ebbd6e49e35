use crate::prelude::HashMap;
use crate::{
    core::{
        bounds::Bounds,
        config::ClusterGroupOptions,
        constants::{NODE_CLUSTER_THRESHOLD, NODE_ROW_TOLERANCE},
        geo::{LatLng, Point},
        viewport::Viewport,
    },
    data::marker::MarkerData,
    spatial::index::{SpatialIndex, SpatialItem},
};
use std::cmp::Ordering;
use std::collections::VecDeque;

// --- resource node clusters --------------------------------------------------------------------

/// Group markers into connected components.
///
/// Two markers are linked when their straight-line distance in lat/lng
/// space is strictly below `threshold`. Clusters come back in reading order
/// (see [`cluster_markers_with`]).
pub fn cluster_markers_by_distance<'a>(
    markers: &[&'a MarkerData],
    threshold: f64,
) -> Vec<Vec<&'a MarkerData>> {
    cluster_markers_with(markers, threshold, NODE_ROW_TOLERANCE)
}

/// Clusters with the default 20 unit link distance
pub fn cluster_markers<'a>(markers: &[&'a MarkerData]) -> Vec<Vec<&'a MarkerData>> {
    cluster_markers_by_distance(markers, NODE_CLUSTER_THRESHOLD)
}

/// Connected components by breadth-first flood fill, sorted top to bottom
/// then left to right.
///
/// Centroids whose latitudes differ by at most `row_tolerance` share a row and
/// are ordered by longitude. Ordering depends only on the set of markers, not
/// on their input order.
pub fn cluster_markers_with<'a>(
    markers: &[&'a MarkerData],
    threshold: f64,
    row_tolerance: f64,
) -> Vec<Vec<&'a MarkerData>> {
    if markers.is_empty() {
        return Vec::new();
    }

    let mut assigned = vec![false; markers.len()];
    let mut clusters = Vec::new();

    for start in 0..markers.len() {
        if assigned[start] {
            continue;
        }

        let mut cluster = Vec::new();
        let mut queue = VecDeque::from([start]);
        assigned[start] = true;

        while let Some(current) = queue.pop_front() {
            cluster.push(markers[current]);
            for (next, marker) in markers.iter().enumerate() {
                if !assigned[next] && distance(markers[current], marker) < threshold {
                    assigned[next] = true;
                    queue.push_back(next);
                }
            }
        }

        clusters.push(cluster);
    }

    sort_reading_order(clusters, row_tolerance)
}

fn distance(a: &MarkerData, b: &MarkerData) -> f64 {
    let d_lat = a.position[0] - b.position[0];
    let d_lng = a.position[1] - b.position[1];
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}

/// Mean position of a set of markers, `None` when empty
pub fn centroid(markers: &[&MarkerData]) -> Option<LatLng> {
    if markers.is_empty() {
        return None;
    }
    let (lat, lng) = markers
        .iter()
        .fold((0.0, 0.0), |(lat, lng), m| (lat + m.position[0], lng + m.position[1]));
    let n = markers.len() as f64;
    Some(LatLng::new(lat / n, lng / n))
}

fn sort_reading_order<'a>(
    clusters: Vec<Vec<&'a MarkerData>>,
    row_tolerance: f64,
) -> Vec<Vec<&'a MarkerData>> {
    let mut keyed: Vec<(LatLng, Vec<&'a MarkerData>)> = clusters
        .into_iter()
        .filter_map(|cluster| centroid(&cluster).map(|c| (c, cluster)))
        .collect();

    // a total order first so the tolerance pass sees the same input every time
    keyed.sort_by(|(a, _), (b, _)| a.lat.total_cmp(&b.lat).then(a.lng.total_cmp(&b.lng)));

    // the row comparison is not transitive, so use a stable insertion sort
    for i in 1..keyed.len() {
        let mut j = i;
        while j > 0 && row_order(&keyed[j].0, &keyed[j - 1].0, row_tolerance) == Ordering::Less {
            keyed.swap(j, j - 1);
            j -= 1;
        }
    }

    keyed.into_iter().map(|(_, cluster)| cluster).collect()
}

fn row_order(a: &LatLng, b: &LatLng, row_tolerance: f64) -> Ordering {
    let d_lat = a.lat - b.lat;
    if d_lat.abs() > row_tolerance {
        a.lat.total_cmp(&b.lat)
    } else {
        a.lng.total_cmp(&b.lng)
    }
}

// --- on-screen marker clustering ---------------------------------------------------------------

/// A group of markers drawn as one bubble
#[derive(Debug, Clone)]
pub struct Cluster<T> {
    pub id: String,
    /// Mean position in zoom-0 pixels
    pub center: Point,
    pub bounds: Bounds,
    pub items: Vec<SpatialItem<T>>,
    pub zoom_level: f64,
}

impl<T> Cluster<T> {
    pub fn new(id: String, items: Vec<SpatialItem<T>>, zoom_level: f64) -> Self {
        let bounds = Self::calculate_bounds(&items);
        let n = items.len().max(1) as f64;
        let (x, y) = items
            .iter()
            .fold((0.0, 0.0), |(x, y), item| (x + item.point.x, y + item.point.y));

        Self {
            id,
            center: Point::new(x / n, y / n),
            bounds,
            items,
            zoom_level,
        }
    }

    fn calculate_bounds(items: &[SpatialItem<T>]) -> Bounds {
        let mut iter = items.iter();
        let Some(first) = iter.next() else {
            return Bounds::default();
        };
        let mut bounds = Bounds::new(first.point, first.point);
        for item in iter {
            bounds.extend(&item.point);
        }
        bounds
    }

    /// Cluster center as a map coordinate
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(-self.center.y, self.center.x)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_single(&self) -> bool {
        self.items.len() == 1
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

/// Grid clustering of point items in screen space.
///
/// Items are bucketed into square cells of `max_cluster_radius` pixels at the
/// requested zoom. At or above `disable_clustering_at_zoom` each item is its
/// own cluster.
pub struct Clustering<T> {
    options: ClusterGroupOptions,
    spatial_index: SpatialIndex<T>,
    /// Clusters from the last call, keyed by the zoom and bounds they were built for
    cached: Option<(f64, Bounds, Vec<Cluster<T>>)>,
}

impl<T: Clone> Clustering<T> {
    pub fn new(options: ClusterGroupOptions) -> Self {
        Self {
            options,
            spatial_index: SpatialIndex::new(),
            cached: None,
        }
    }

    pub fn add_item(&mut self, item: SpatialItem<T>) {
        self.spatial_index.insert(item);
        self.cached = None;
    }

    /// Add many items at once, invalidating the cache once
    pub fn add_items<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = SpatialItem<T>>,
    {
        for item in items {
            self.spatial_index.insert(item);
        }
        self.cached = None;
    }

    pub fn remove_item(&mut self, id: &str) -> Option<SpatialItem<T>> {
        let removed = self.spatial_index.remove(id);
        if removed.is_some() {
            self.cached = None;
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.spatial_index.contains(id)
    }

    pub fn clear(&mut self) {
        self.spatial_index.clear();
        self.cached = None;
    }

    /// Clusters of every item inside `bounds` (zoom-0 pixels) at `zoom`
    pub fn get_clusters(&mut self, bounds: &Bounds, zoom: f64) -> Vec<Cluster<T>> {
        if let Some((cached_zoom, cached_bounds, clusters)) = &self.cached {
            if (cached_zoom - zoom).abs() < 0.01 && cached_bounds == bounds {
                return clusters.clone();
            }
        }

        let items: Vec<SpatialItem<T>> = self
            .spatial_index
            .query(bounds)
            .into_iter()
            .cloned()
            .collect();

        let clusters = if zoom >= self.options.disable_clustering_at_zoom {
            items
                .into_iter()
                .map(|item| Cluster::new(item.id.clone(), vec![item], zoom))
                .collect()
        } else {
            self.grid_cluster(items, zoom)
        };

        self.cached = Some((zoom, bounds.clone(), clusters.clone()));
        clusters
    }

    fn grid_cluster(&self, items: Vec<SpatialItem<T>>, zoom: f64) -> Vec<Cluster<T>> {
        let cell = self.options.max_cluster_radius.max(1.0) / Viewport::scale(zoom);
        let mut grid: HashMap<(i64, i64), Vec<SpatialItem<T>>> = HashMap::default();

        for item in items {
            let gx = (item.point.x / cell).floor() as i64;
            let gy = (item.point.y / cell).floor() as i64;
            grid.entry((gx, gy)).or_default().push(item);
        }

        let mut cells: Vec<_> = grid.into_iter().collect();
        cells.sort_by_key(|(key, _)| *key);

        cells
            .into_iter()
            .map(|((gx, gy), cell_items)| {
                let id = if cell_items.len() == 1 {
                    cell_items[0].id.clone()
                } else {
                    format!("cluster_{}_{}", gx, gy)
                };
                Cluster::new(id, cell_items, zoom)
            })
            .collect()
    }

    pub fn all_items(&self) -> Vec<&SpatialItem<T>> {
        self.spatial_index.all_items()
    }

    pub fn len(&self) -> usize {
        self.spatial_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spatial_index.is_empty()
    }

    pub fn set_options(&mut self, options: ClusterGroupOptions) {
        self.options = options;
        self.cached = None;
    }

    pub fn options(&self) -> &ClusterGroupOptions {
        &self.options
    }
}

impl<T: Clone> Default for Clustering<T> {
    fn default() -> Self {
        Self::new(ClusterGroupOptions::default())
    }
}
