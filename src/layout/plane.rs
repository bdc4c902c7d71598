//! A spatial index for layout objects.
//!
//! A set-like structure for objects placed on a plane that can
//! efficiently find members inside a rectangular area. Members are bucketed
//! into a uniform grid (default cell size 50 user-space units); queries
//! visit only the cells their rectangle touches.
//!
//! Keys are caller-chosen ids (typically indices into a side table); the
//! plane stores each key's bounding box so removal can find its cells.

use std::collections::{HashMap, HashSet};

use crate::geometry::Bounds;

/// Uniform-grid spatial index.
#[derive(Debug)]
pub struct Plane<K> {
    grid: HashMap<(i64, i64), Vec<K>>,
    bboxes: HashMap<K, Bounds>,
    order: Vec<K>,
    gridsize: i64,
}

impl<K: Copy + Eq + std::hash::Hash> Default for Plane<K> {
    fn default() -> Self {
        Self::new(50)
    }
}

impl<K: Copy + Eq + std::hash::Hash> Plane<K> {
    /// Create a plane with the given grid cell size.
    pub fn new(gridsize: i64) -> Self {
        Self {
            grid: HashMap::new(),
            bboxes: HashMap::new(),
            order: Vec::new(),
            gridsize,
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    /// Whether the plane has no members.
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    /// Whether `key` is currently placed.
    pub fn contains(&self, key: &K) -> bool {
        self.bboxes.contains_key(key)
    }

    /// Live members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.order.iter().copied().filter(|k| self.bboxes.contains_key(k))
    }

    /// Grid cells covered by an area.
    ///
    /// The upper bound is `(v1 + gridsize) / gridsize` so that every box,
    /// however small, lands in at least one cell.
    fn cells(&self, area: &Bounds) -> Vec<(i64, i64)> {
        let d = self.gridsize;
        let x_range = (area.x0 as i64).div_euclid(d)..((area.x1 + d as f32) as i64).div_euclid(d);
        let y0 = (area.y0 as i64).div_euclid(d);
        let y1 = ((area.y1 + d as f32) as i64).div_euclid(d);
        let mut out = Vec::new();
        for y in y0..y1 {
            for x in x_range.clone() {
                out.push((x, y));
            }
        }
        out
    }

    /// Place an object.
    pub fn add(&mut self, key: K, bbox: Bounds) {
        for cell in self.cells(&bbox) {
            self.grid.entry(cell).or_default().push(key);
        }
        self.bboxes.insert(key, bbox);
        self.order.push(key);
    }

    /// Displace an object.
    pub fn remove(&mut self, key: &K) {
        let Some(bbox) = self.bboxes.remove(key) else {
            return;
        };
        for cell in self.cells(&bbox) {
            if let Some(members) = self.grid.get_mut(&cell) {
                members.retain(|k| k != key);
            }
        }
    }

    /// Find the objects strictly intersecting an area.
    ///
    /// Objects that merely touch the query edge are not reported.
    pub fn find(&self, area: &Bounds) -> Vec<K> {
        let mut done = HashSet::new();
        let mut out = Vec::new();
        for cell in self.cells(area) {
            let Some(members) = self.grid.get(&cell) else {
                continue;
            };
            for key in members {
                if !done.insert(*key) {
                    continue;
                }
                let bbox = &self.bboxes[key];
                if bbox.x1 <= area.x0
                    || area.x1 <= bbox.x0
                    || bbox.y1 <= area.y0
                    || area.y1 <= bbox.y0
                {
                    continue;
                }
                out.push(*key);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_find_remove() {
        let mut plane = Plane::default();
        plane.add(1usize, Bounds::new(0.0, 0.0, 10.0, 10.0));
        plane.add(2usize, Bounds::new(100.0, 100.0, 110.0, 110.0));
        assert_eq!(plane.find(&Bounds::new(-5.0, -5.0, 50.0, 50.0)), vec![1]);
        plane.remove(&1);
        assert!(plane.find(&Bounds::new(-5.0, -5.0, 50.0, 50.0)).is_empty());
        assert_eq!(plane.len(), 1);
    }

    #[test]
    fn test_small_elements_get_grid_placement() {
        // Elements whose truncated corners coincide (int(x0) == int(x1))
        // must still land on a grid cell and be findable.
        let mut plane = Plane::default();
        plane.add(7usize, Bounds::new(50.01, 42.0, 50.02, 44.0));
        assert_eq!(plane.find(&Bounds::new(0.0, 0.0, 50.5, 50.0)), vec![7]);
    }

    #[test]
    fn test_query_spanning_cells() {
        let mut plane = Plane::default();
        plane.add(1usize, Bounds::new(10.0, 10.0, 20.0, 20.0));
        plane.add(2usize, Bounds::new(210.0, 10.0, 220.0, 20.0));
        plane.add(3usize, Bounds::new(10.0, 210.0, 20.0, 220.0));
        let mut found = plane.find(&Bounds::new(0.0, 0.0, 300.0, 300.0));
        found.sort();
        assert_eq!(found, vec![1, 2, 3]);
    }

    #[test]
    fn test_touching_edge_excluded() {
        let mut plane = Plane::default();
        plane.add(1usize, Bounds::new(10.0, 10.0, 20.0, 20.0));
        assert!(plane.find(&Bounds::new(20.0, 10.0, 30.0, 20.0)).is_empty());
    }

    #[test]
    fn test_negative_coordinates() {
        let mut plane = Plane::default();
        plane.add(1usize, Bounds::new(-60.0, -60.0, -40.0, -40.0));
        assert_eq!(plane.find(&Bounds::new(-100.0, -100.0, 0.0, 0.0)), vec![1]);
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut plane = Plane::default();
        plane.add(1usize, Bounds::new(0.0, 0.0, 1.0, 1.0));
        plane.add(2usize, Bounds::new(2.0, 2.0, 3.0, 3.0));
        plane.remove(&1);
        assert_eq!(plane.iter().collect::<Vec<_>>(), vec![2]);
    }
}
