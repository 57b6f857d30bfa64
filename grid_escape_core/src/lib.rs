use serde::{Deserialize, Serialize};

pub mod agent;
pub mod barrier;
pub mod input;
pub mod levels;
pub mod map;
pub mod sequencer;
pub mod visual;

/// Integer address of a grid cell.
///
/// Row 0 is the top of the grid; increasing `row` moves down the board.
/// Coordinates are signed so a step off the top or left edge is representable
/// (and then rejected by the bounds check) instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Cell { col, row }
    }

    /// Returns the neighbouring cell one step in `direction`.
    pub fn offset(self, direction: Direction) -> Cell {
        let (dc, dr) = direction.delta();
        Cell {
            col: self.col + dc,
            row: self.row + dr,
        }
    }

    /// Returns the Manhattan distance between two cells.
    pub fn manhattan(self, other: Cell) -> u32 {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }

    #[inline]
    pub fn is_adjacent(self, other: Cell) -> bool {
        self.manhattan(other) == 1
    }
}

/// One of the four discrete move requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// `(d_col, d_row)` in grid space. Up decreases the row.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Continuous world-space position (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32) -> Self {
        WorldPos { x, y }
    }
}

/// 8-bit RGBA color applied to the agent sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    u8::MAX
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const YELLOW: Rgba = Rgba::rgb(255, 235, 4);
    pub const RED: Rgba = Rgba::rgb(255, 0, 0);
    pub const GREEN: Rgba = Rgba::rgb(0, 255, 0);
    pub const CYAN: Rgba = Rgba::rgb(0, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::WHITE
    }
}

/// Progress display state shown for each level's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndicatorState {
    #[default]
    Closed,
    Lit,
    Open,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_row_down_convention() {
        let c = Cell::new(2, 2);
        assert_eq!(c.offset(Direction::Up), Cell::new(2, 1));
        assert_eq!(c.offset(Direction::Down), Cell::new(2, 3));
        assert_eq!(c.offset(Direction::Left), Cell::new(1, 2));
        assert_eq!(c.offset(Direction::Right), Cell::new(3, 2));
    }

    #[test]
    fn adjacency_is_manhattan_one() {
        let c = Cell::new(0, 0);
        for dir in Direction::ALL {
            assert!(c.is_adjacent(c.offset(dir)));
        }
        assert!(!c.is_adjacent(c));
        assert!(!c.is_adjacent(Cell::new(1, 1)));
        assert_eq!(Cell::new(-1, 3).manhattan(Cell::new(2, 0)), 6);
    }
}
