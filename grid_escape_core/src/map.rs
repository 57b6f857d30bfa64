use crate::{Cell, WorldPos};

/// Represents errors that can occur when describing the grid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("Grid size ({cols}, {rows}) must be at least 1x1")]
    ZeroSized { cols: u32, rows: u32 },
    #[error("Grid size ({cols}, {rows}) exceeds the largest addressable cell")]
    TooLarge { cols: u32, rows: u32 },
    #[error("Cell size {0} must be a positive, finite number")]
    InvalidCellSize(f32),
    #[error("Cell ({col}, {row}) is out of bounds for grid size ({cols}, {rows})")]
    OutOfBounds {
        col: i32,
        row: i32,
        cols: u32,
        rows: u32,
    },
}

/// Fixed grid dimensions: valid cells are `[0, cols) x [0, rows)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    cols: u32,
    rows: u32,
}

impl GridBounds {
    /// Creates bounds `cols` wide and `rows` tall.
    pub fn new(cols: u32, rows: u32) -> Result<Self, GridError> {
        if cols == 0 || rows == 0 {
            return Err(GridError::ZeroSized { cols, rows });
        }
        // Cells use signed coordinates; every index must fit in an i32.
        if cols > i32::MAX as u32 || rows > i32::MAX as u32 {
            return Err(GridError::TooLarge { cols, rows });
        }
        Ok(GridBounds { cols, rows })
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Checks if the given cell is within the grid boundaries.
    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.col >= 0
            && (cell.col as u32) < self.cols
            && cell.row >= 0
            && (cell.row as u32) < self.rows
    }

    /// Like [`contains`](Self::contains) but reports the offending cell.
    pub fn check(&self, cell: Cell) -> Result<Cell, GridError> {
        if self.contains(cell) {
            Ok(cell)
        } else {
            Err(GridError::OutOfBounds {
                col: cell.col,
                row: cell.row,
                cols: self.cols,
                rows: self.rows,
            })
        }
    }

    /// Returns an iterator over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + use<> {
        let (cols, rows) = (self.cols as i32, self.rows as i32);
        (0..rows).flat_map(move |row| (0..cols).map(move |col| Cell::new(col, row)))
    }
}

/// Stateless mapping between grid cells and world positions.
///
/// Cell `(0, 0)` sits at `origin`; columns grow along +x and rows grow
/// along -y, each step being `cell_size` world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    bounds: GridBounds,
    origin: WorldPos,
    cell_size: f32,
}

impl CoordinateMapper {
    pub fn new(bounds: GridBounds, origin: WorldPos, cell_size: f32) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        Ok(CoordinateMapper {
            bounds,
            origin,
            cell_size,
        })
    }

    #[inline]
    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    #[inline]
    pub fn origin(&self) -> WorldPos {
        self.origin
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        self.bounds.contains(cell)
    }

    /// World position of the centre of `cell`.
    pub fn cell_to_world(&self, cell: Cell) -> WorldPos {
        WorldPos {
            x: self.origin.x + cell.col as f32 * self.cell_size,
            y: self.origin.y - cell.row as f32 * self.cell_size,
        }
    }

    /// Nearest cell to `position`, saturated into the grid.
    ///
    /// Debug aid only: positions outside the board clamp to the closest edge
    /// cell instead of failing.
    pub fn world_to_cell(&self, position: WorldPos) -> Cell {
        let dx = (position.x - self.origin.x) / self.cell_size;
        let dy = (self.origin.y - position.y) / self.cell_size;

        let col = (dx.round() as i32).clamp(0, self.bounds.cols as i32 - 1);
        let row = (dy.round() as i32).clamp(0, self.bounds.rows as i32 - 1);
        Cell::new(col, row)
    }
}
