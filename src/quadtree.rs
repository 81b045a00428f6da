/*
 * Quadtree Module
 *
 * This module defines the QuadTree used for neighbour discovery. It replaces
 * pairwise distance checks with a partition of world space that is rebuilt
 * from scratch every tick, since every boid moves every tick.
 *
 * Layout:
 * - Sections live in a flat arena and refer to each other by index, so a
 *   reset is a single clear of the arena
 * - The four children of a section are stored contiguously (SW, SE, NW, NE)
 * - A section holds either items (leaf) or four children, never both
 *
 * Queries:
 * - get_neighbours returns the items of the leaf containing a point. This is a
 *   leaf-local approximation: an item just across a partition edge from the
 *   point lives in a sibling leaf and is not returned
 * - query_radius visits every leaf the query circle can reach and returns the
 *   items actually inside the radius
 */

use std::collections::HashSet;
use std::hash::Hash;

use glam::Vec2;

use crate::error::{FlockError, Result};

/// Depth at which leaves stop splitting and accept items beyond capacity.
pub const MAX_DEPTH: u32 = 32;

/// Axis-aligned rectangle given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle of the given size centred on the origin.
    pub fn centered(width: f32, height: f32) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self::new(-half, half)
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    // Index of the quadrant a point routes to. Points on a midline go east/north,
    // points outside the rectangle go to the nearest quadrant.
    #[inline]
    pub fn quadrant_index(&self, point: Vec2) -> usize {
        let mid = self.center();
        (point.x >= mid.x) as usize | (((point.y >= mid.y) as usize) << 1)
    }

    pub fn quadrant(&self, index: usize) -> Rect {
        let mid = self.center();
        let (min_x, max_x) = if index & 1 == 0 { (self.min.x, mid.x) } else { (mid.x, self.max.x) };
        let (min_y, max_y) = if index & 2 == 0 { (self.min.y, mid.y) } else { (mid.y, self.max.y) };
        Rect::new(Vec2::new(min_x, min_y), Vec2::new(max_x, max_y))
    }

    fn touches_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest = center.clamp(self.min, self.max);
        nearest.distance_squared(center) <= radius * radius
    }

    fn is_valid(&self) -> bool {
        let size = self.size();
        self.min.is_finite() && self.max.is_finite() && size.x > 0.0 && size.y > 0.0
    }
}

/// A node of the tree.
#[derive(Debug, Clone)]
pub struct Section<T> {
    bounds: Rect,
    depth: u32,
    first_child: Option<usize>,
    items: Vec<T>,
    positions: Vec<Vec2>,
}

impl<T> Section<T> {
    fn leaf(bounds: Rect, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            first_child: None,
            items: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Arena indices of the four children, if this section was split.
    pub fn children(&self) -> Option<[usize; 4]> {
        self.first_child.map(|first| [first, first + 1, first + 2, first + 3])
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }
}

/// Region quadtree over point items.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    sections: Vec<Section<T>>,
    bounds: Rect,
    capacity: usize,
    members: HashSet<T>,
}

impl<T: Copy + Eq + Hash> QuadTree<T> {
    /// Creates an empty tree spanning `bounds` whose leaves hold `capacity` items.
    pub fn new(bounds: Rect, capacity: usize) -> Result<Self> {
        let mut tree = Self {
            sections: Vec::new(),
            bounds,
            capacity,
            members: HashSet::new(),
        };
        tree.create(bounds, capacity)?;
        Ok(tree)
    }

    /// Discards every section and item and starts over with a single empty root.
    /// The arena keeps its allocation, so per-tick rebuilds do not churn memory.
    pub fn create(&mut self, bounds: Rect, capacity: usize) -> Result<()> {
        if !bounds.is_valid() {
            return Err(FlockError::config(format!(
                "quadtree bounds must be finite with positive size, got {bounds:?}"
            )));
        }
        if capacity == 0 {
            return Err(FlockError::config("quadtree leaf capacity must be > 0"));
        }

        self.sections.clear();
        self.members.clear();
        self.bounds = bounds;
        self.capacity = capacity;
        self.sections.push(Section::leaf(bounds, 0));
        Ok(())
    }

    /// Empties the tree, keeping its bounds and capacity.
    pub fn clear(&mut self) {
        self.sections.clear();
        self.members.clear();
        self.sections.push(Section::leaf(self.bounds, 0));
    }

    /// Inserts `item` at `position`. Returns false when the item is already stored.
    pub fn add(&mut self, item: T, position: Vec2) -> bool {
        if !self.members.insert(item) {
            return false;
        }

        let mut index = 0;
        loop {
            let section = &self.sections[index];
            if let Some(first) = section.first_child {
                index = first + section.bounds.quadrant_index(position);
                continue;
            }

            let has_room = section.items.len() < self.capacity;
            let cannot_separate = section.depth >= MAX_DEPTH
                || section.positions.iter().all(|&stored| stored == position);

            if has_room || cannot_separate {
                let section = &mut self.sections[index];
                section.items.push(item);
                section.positions.push(position);
                return true;
            }

            self.split(index);
        }
    }

    // Turns a full leaf into an internal section with four children and
    // moves its items down by point containment.
    fn split(&mut self, index: usize) {
        let first = self.sections.len();
        let bounds = self.sections[index].bounds;
        let depth = self.sections[index].depth + 1;

        for quadrant in 0..4 {
            self.sections.push(Section::leaf(bounds.quadrant(quadrant), depth));
        }

        let section = &mut self.sections[index];
        section.first_child = Some(first);
        let items = std::mem::take(&mut section.items);
        let positions = std::mem::take(&mut section.positions);

        for (item, position) in items.into_iter().zip(positions) {
            let child = &mut self.sections[first + bounds.quadrant_index(position)];
            child.items.push(item);
            child.positions.push(position);
        }
    }

    /// Arena index of the leaf a point routes to.
    pub fn leaf_of(&self, point: Vec2) -> usize {
        let mut index = 0;
        while let Some(first) = self.sections[index].first_child {
            index = first + self.sections[index].bounds.quadrant_index(point);
        }
        index
    }

    /// Items stored in the leaf containing `point` (leaf-local approximation).
    pub fn get_neighbours(&self, point: Vec2) -> &[T] {
        &self.sections[self.leaf_of(point)].items
    }

    /// Appends to `out` every item within `radius` of `center`.
    pub fn query_radius(&self, center: Vec2, radius: f32, out: &mut Vec<T>) {
        let radius_sq = radius * radius;
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let section = &self.sections[index];
            if !self.reach(section.bounds).touches_circle(center, radius) {
                continue;
            }

            match section.children() {
                Some(children) => stack.extend(children),
                None => {
                    for (item, position) in section.items.iter().zip(&section.positions) {
                        if position.distance_squared(center) <= radius_sq {
                            out.push(*item);
                        }
                    }
                }
            }
        }
    }

    // Items outside the root bounds are routed to the sections along its edges,
    // so those sections reach out to infinity for pruning purposes.
    fn reach(&self, bounds: Rect) -> Rect {
        let mut reach = bounds;
        if bounds.min.x <= self.bounds.min.x {
            reach.min.x = f32::NEG_INFINITY;
        }
        if bounds.min.y <= self.bounds.min.y {
            reach.min.y = f32::NEG_INFINITY;
        }
        if bounds.max.x >= self.bounds.max.x {
            reach.max.x = f32::INFINITY;
        }
        if bounds.max.y >= self.bounds.max.y {
            reach.max.y = f32::INFINITY;
        }
        reach
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Section<T>> + '_ {
        self.sections.iter().filter(|section| section.is_leaf())
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Deepest level reached by any section (root is 0).
    pub fn depth(&self) -> u32 {
        self.sections.iter().map(|section| section.depth).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}
