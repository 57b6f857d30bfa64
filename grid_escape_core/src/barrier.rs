use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Cell, WorldPos, map::CoordinateMapper};

/// Answers whether a barrier separates two adjacent cells.
///
/// Crossing a barrier sends the agent back to the level start with the key
/// latch cleared. Pairs that are not adjacent never report a barrier.
pub trait BarrierQuery {
    fn has_barrier(&self, from: Cell, to: Cell) -> bool;
}

/// A board without any barriers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBarriers;

impl BarrierQuery for NoBarriers {
    fn has_barrier(&self, _from: Cell, _to: Cell) -> bool {
        false
    }
}

/// Explicit list of blocked cell edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeBarriers {
    edges: HashSet<(Cell, Cell)>,
}

impl EdgeBarriers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the edge between `a` and `b`. Returns `false` if the cells are
    /// not adjacent, in which case nothing is recorded.
    pub fn insert(&mut self, a: Cell, b: Cell) -> bool {
        if !a.is_adjacent(b) {
            return false;
        }
        self.edges.insert(Self::key(a, b));
        true
    }

    // Edges are unordered: (a, b) and (b, a) are the same wall.
    fn key(a: Cell, b: Cell) -> (Cell, Cell) {
        if (a.row, a.col) <= (b.row, b.col) {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl FromIterator<(Cell, Cell)> for EdgeBarriers {
    fn from_iter<I: IntoIterator<Item = (Cell, Cell)>>(iter: I) -> Self {
        let mut barriers = EdgeBarriers::new();
        for (a, b) in iter {
            barriers.insert(a, b);
        }
        barriers
    }
}

impl BarrierQuery for EdgeBarriers {
    fn has_barrier(&self, from: Cell, to: Cell) -> bool {
        from.is_adjacent(to) && self.edges.contains(&Self::key(from, to))
    }
}

/// Axis-aligned obstacle rectangle in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub min: WorldPos,
    pub max: WorldPos,
}

impl Obstacle {
    /// Builds a rectangle from any two opposite corners.
    pub fn from_corners(a: WorldPos, b: WorldPos) -> Self {
        Obstacle {
            min: WorldPos::new(a.x.min(b.x), a.y.min(b.y)),
            max: WorldPos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// A thin wall on the shared edge of two adjacent cells.
    ///
    /// The wall is `thickness` deep across the edge and 90% of a cell long,
    /// so it never reaches the probe segments of neighbouring edges.
    /// Returns `None` when the cells are not adjacent.
    pub fn between(mapper: &CoordinateMapper, a: Cell, b: Cell, thickness: f32) -> Option<Self> {
        if !a.is_adjacent(b) {
            return None;
        }
        let pa = mapper.cell_to_world(a);
        let pb = mapper.cell_to_world(b);
        let mid = WorldPos::new((pa.x + pb.x) * 0.5, (pa.y + pb.y) * 0.5);
        let half_len = mapper.cell_size() * 0.45;
        let half_thick = thickness * 0.5;

        let (hx, hy) = if a.row == b.row {
            // Horizontal neighbours: vertical wall.
            (half_thick, half_len)
        } else {
            (half_len, half_thick)
        };
        Some(Obstacle {
            min: WorldPos::new(mid.x - hx, mid.y - hy),
            max: WorldPos::new(mid.x + hx, mid.y + hy),
        })
    }

    /// Segment/rectangle overlap test (slab method). Touching counts.
    pub fn intersects_segment(&self, start: WorldPos, end: WorldPos) -> bool {
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for (s, e, lo, hi) in [
            (start.x, end.x, self.min.x, self.max.x),
            (start.y, end.y, self.min.y, self.max.y),
        ] {
            let d = e - s;
            if d.abs() <= f32::EPSILON {
                if s < lo || s > hi {
                    return false;
                }
                continue;
            }
            let mut t0 = (lo - s) / d;
            let mut t1 = (hi - s) / d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Static obstacle geometry probed along the line between two cell centres.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleLayer {
    mapper: CoordinateMapper,
    obstacles: Vec<Obstacle>,
}

impl ObstacleLayer {
    pub fn new(mapper: CoordinateMapper, obstacles: Vec<Obstacle>) -> Self {
        ObstacleLayer { mapper, obstacles }
    }

    /// Convenience constructor placing a thin wall on each listed edge.
    /// Non-adjacent pairs are skipped.
    pub fn from_walls<I>(mapper: CoordinateMapper, walls: I, thickness: f32) -> Self
    where
        I: IntoIterator<Item = (Cell, Cell)>,
    {
        let obstacles = walls
            .into_iter()
            .filter_map(|(a, b)| Obstacle::between(&mapper, a, b, thickness))
            .collect();
        ObstacleLayer { mapper, obstacles }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }
}

impl BarrierQuery for ObstacleLayer {
    fn has_barrier(&self, from: Cell, to: Cell) -> bool {
        if !from.is_adjacent(to) {
            return false;
        }
        let start = self.mapper.cell_to_world(from);
        let end = self.mapper.cell_to_world(to);
        self.obstacles
            .iter()
            .any(|obstacle| obstacle.intersects_segment(start, end))
    }
}
