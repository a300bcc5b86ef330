use crate::board::{BoardView, CellState};
use crate::geometry::Coord;

/// Simple in-memory game snapshot parsed from ASCII art (no game logic!).
///
/// Used by the demo binary and the test-suite to drive the solver without a
/// live game attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiBoard {
    cells: Vec<CellState>,
    width: usize,
    height: usize,
    total_mines: usize,
}

impl AsciiBoard {
    /// Create a board snapshot from an ASCII-encoded description, where:
    /// - `*` is a flagged cell (the flag is taken at face value here; the
    ///   solver decides for itself whether to trust it)
    /// - `x` is a hidden cell
    /// - `0`-`8` is a revealed cell with that many adjacent mines
    /// - `.` can be used in place of `0`
    /// - Trailing or leading whitespace is ignored
    ///
    /// # Errors
    ///
    /// If the board is not rectangular, or has a width or height of 0, an
    /// error is returned.
    pub fn parse(encoded: &str, total_mines: usize) -> Result<Self, String> {
        let lines = encoded.trim().lines().map(|l| l.trim()).collect::<Vec<_>>();
        let height = lines.len();
        if height == 0 {
            return Err("Board must have at least one row".to_string());
        }
        let width = lines[0].len();
        if width == 0 {
            return Err("Board must have at least one column".to_string());
        }
        if let Some(line) = lines.iter().find(|l| l.len() != width) {
            return Err(format!(
                "Board must be rectangular (found line with length {}, expected length {})",
                line.len(),
                width,
            ));
        }
        let mut cells = Vec::with_capacity(width * height);
        for (row, line) in lines.into_iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                cells.push(match c {
                    '*' => CellState::Flag,
                    'x' => CellState::Hidden,
                    '.' => CellState::Revealed(0),
                    n @ '0'..='8' => CellState::Revealed(
                        n.to_digit(10)
                            .expect("n has been validated to be a decimal digit")
                            as u8,
                    ),
                    _ => {
                        return Err(format!("Invalid character '{c}' at ({row}, {col})"));
                    },
                });
            }
        }
        Ok(Self {
            cells,
            width,
            height,
            total_mines,
        })
    }

    /// Replace a single cell, e.g. to script a sequence of turns in tests.
    pub fn set(&mut self, cell: Coord, state: CellState) {
        self.cells[cell.row * self.width + cell.col] = state;
    }
}

impl BoardView for AsciiBoard {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn total_mines(&self) -> usize {
        self.total_mines
    }

    fn query(&self, cell: Coord) -> CellState {
        self.cells[cell.row * self.width + cell.col]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_all_cell_kinds() {
        let board = AsciiBoard::parse(
            "
            .1x
            2**
            ",
            2,
        )
        .unwrap();
        assert_eq!(board.width(), 3);
        assert_eq!(board.height(), 2);
        assert_eq!(board.query(Coord::new(0, 0)), CellState::Revealed(0));
        assert_eq!(board.query(Coord::new(0, 1)), CellState::Revealed(1));
        assert_eq!(board.query(Coord::new(0, 2)), CellState::Hidden);
        assert_eq!(board.query(Coord::new(1, 0)), CellState::Revealed(2));
        assert_eq!(board.query(Coord::new(1, 1)), CellState::Flag);
    }

    #[test]
    fn rejects_ragged_boards() {
        assert!(AsciiBoard::parse("xx\nxxx", 1).is_err());
        assert!(AsciiBoard::parse("", 0).is_err());
        assert!(AsciiBoard::parse("x?x", 1).is_err());
    }
}
