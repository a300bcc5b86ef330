use std::cmp::min;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Identifier of a cell within a [`Geometry`]: `row * width + col`.
pub type CellId = u32;

/// A cell coordinate as `(row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Chebyshev distance; two distinct cells are adjacent iff this is 1.
    pub fn chebyshev(self, other: Self) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Board dimensions plus a precomputed 8-neighbourhood table.
///
/// Built once per board size and passed by shared handle into every
/// component that needs adjacency lookups; there is no process-wide cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    width: usize,
    height: usize,
    neighbours: Vec<SmallVec<[CellId; 8]>>,
}

impl Geometry {
    pub fn new(width: usize, height: usize) -> Rc<Self> {
        let mut neighbours = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let mut adjacent = SmallVec::new();
                for r in row.saturating_sub(1)..=min(row + 1, height - 1) {
                    for c in col.saturating_sub(1)..=min(col + 1, width - 1) {
                        if r == row && c == col {
                            continue;
                        }
                        adjacent.push((r * width + c) as CellId);
                    }
                }
                neighbours.push(adjacent);
            }
        }
        Rc::new(Self {
            width,
            height,
            neighbours,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_cells(&self) -> usize {
        self.width * self.height
    }

    pub fn index(&self, cell: Coord) -> CellId {
        debug_assert!(cell.row < self.height && cell.col < self.width);
        (cell.row * self.width + cell.col) as CellId
    }

    pub fn coord(&self, id: CellId) -> Coord {
        Coord::new(id as usize / self.width, id as usize % self.width)
    }

    pub fn neighbours(&self, id: CellId) -> &[CellId] {
        &self.neighbours[id as usize]
    }

    pub fn are_adjacent(&self, a: CellId, b: CellId) -> bool {
        a != b && self.coord(a).chebyshev(self.coord(b)) == 1
    }

    /// Iterate all cell ids in row-major (lexicographic) order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> {
        0..self.num_cells() as CellId
    }

    pub fn contains(&self, cell: Coord) -> bool {
        cell.row < self.height && cell.col < self.width
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn corner_cells_have_three_neighbours() {
        let geometry = Geometry::new(4, 3);
        let corner = geometry.index(Coord::new(0, 0));
        assert_eq!(geometry.neighbours(corner).len(), 3);
        let far = geometry.index(Coord::new(2, 3));
        assert_eq!(geometry.neighbours(far).len(), 3);
    }

    #[test]
    fn interior_cells_have_eight_neighbours() {
        let geometry = Geometry::new(5, 5);
        let middle = geometry.index(Coord::new(2, 2));
        let adjacent = geometry.neighbours(middle);
        assert_eq!(adjacent.len(), 8);
        for &n in adjacent {
            assert!(geometry.are_adjacent(middle, n));
        }
    }

    #[test]
    fn index_and_coord_roundtrip() {
        let geometry = Geometry::new(7, 4);
        for id in geometry.cells() {
            assert_eq!(geometry.index(geometry.coord(id)), id);
        }
    }
}
