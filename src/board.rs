use std::rc::Rc;

use crate::error::SolverError;
use crate::geometry::{CellId, Coord, Geometry};

/// What the game reports for a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellState {
    /// Not yet revealed, no flag on it.
    Hidden,
    /// Carries a flag placed in the game. The flag may be wrong.
    Flag,
    /// Revealed, showing the number of adjacent mines (0..=8).
    Revealed(u8),
}

/// Read-only snapshot of the live game, supplied by an external collaborator.
///
/// The solver never mutates this state; it maintains its own derived mirror
/// ([`BoardMirror`]) instead.
pub trait BoardView {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn total_mines(&self) -> usize;
    fn query(&self, cell: Coord) -> CellState;
}

/// The solver's belief about the board, rebuilt from a [`BoardView`] each
/// turn.
///
/// A cell is exactly one of revealed / confirmed-flag / hidden-unconfirmed.
/// Confirmed flags are mines the solver has *proven*; they persist and
/// accumulate across turns, independently of whatever flags the player has
/// placed in the game (which may be wrong).
#[derive(Debug, Clone)]
pub struct BoardMirror {
    geometry: Rc<Geometry>,
    total_mines: usize,
    revealed: Vec<Option<u8>>,
    confirmed_flag: Vec<bool>,
    flag_on_board: Vec<bool>,
    adjacent_confirmed: Vec<u8>,
    adjacent_board_flags: Vec<u8>,
    adjacent_unrevealed: Vec<u8>,
}

impl BoardMirror {
    pub fn new(geometry: Rc<Geometry>, total_mines: usize) -> Self {
        let n = geometry.num_cells();
        Self {
            geometry,
            total_mines,
            revealed: vec![None; n],
            confirmed_flag: vec![false; n],
            flag_on_board: vec![false; n],
            adjacent_confirmed: vec![0; n],
            adjacent_board_flags: vec![0; n],
            adjacent_unrevealed: vec![0; n],
        }
    }

    /// Rebuild the mirror from the live view, re-deriving every per-cell
    /// counter. Confirmed flags survive the rebuild: a flag once proven
    /// never becomes unproven.
    pub fn sync(&mut self, view: &impl BoardView) -> Result<(), SolverError> {
        if view.width() != self.geometry.width() || view.height() != self.geometry.height() {
            return Err(SolverError::Internal(
                "board view dimensions do not match solver geometry",
            ));
        }
        self.total_mines = view.total_mines();
        for id in self.geometry.cells() {
            let state = view.query(self.geometry.coord(id));
            let idx = id as usize;
            match state {
                CellState::Hidden => {
                    self.revealed[idx] = None;
                    self.flag_on_board[idx] = false;
                },
                CellState::Flag => {
                    self.revealed[idx] = None;
                    self.flag_on_board[idx] = true;
                },
                CellState::Revealed(count) => {
                    if count > 8 {
                        return Err(SolverError::InvalidBoard(
                            "revealed count greater than 8",
                        ));
                    }
                    if self.confirmed_flag[idx] {
                        // We proved a mine here and the game revealed it as
                        // safe; our model and the game disagree.
                        return Err(SolverError::InvalidBoard(
                            "a proven mine was revealed as clear",
                        ));
                    }
                    self.revealed[idx] = Some(count);
                    self.flag_on_board[idx] = false;
                },
            }
        }
        self.rederive_counters();
        Ok(())
    }

    fn rederive_counters(&mut self) {
        for id in self.geometry.cells() {
            let mut confirmed = 0;
            let mut board_flags = 0;
            let mut unrevealed = 0;
            for &n in self.geometry.neighbours(id) {
                let nx = n as usize;
                if self.confirmed_flag[nx] {
                    confirmed += 1;
                }
                if self.flag_on_board[nx] {
                    board_flags += 1;
                }
                if self.revealed[nx].is_none() && !self.confirmed_flag[nx] {
                    unrevealed += 1;
                }
            }
            let idx = id as usize;
            self.adjacent_confirmed[idx] = confirmed;
            self.adjacent_board_flags[idx] = board_flags;
            self.adjacent_unrevealed[idx] = unrevealed;
        }
    }

    /// Record a proven mine. Updates the derived counters incrementally.
    pub fn confirm_flag(&mut self, id: CellId) {
        let idx = id as usize;
        if self.confirmed_flag[idx] {
            return;
        }
        self.confirmed_flag[idx] = true;
        for &n in self.geometry.neighbours(id) {
            let nx = n as usize;
            self.adjacent_confirmed[nx] += 1;
            self.adjacent_unrevealed[nx] -= 1;
        }
    }

    pub fn geometry(&self) -> &Rc<Geometry> {
        &self.geometry
    }

    pub fn total_mines(&self) -> usize {
        self.total_mines
    }

    pub fn is_revealed(&self, id: CellId) -> bool {
        self.revealed[id as usize].is_some()
    }

    pub fn is_confirmed_flag(&self, id: CellId) -> bool {
        self.confirmed_flag[id as usize]
    }

    pub fn has_board_flag(&self, id: CellId) -> bool {
        self.flag_on_board[id as usize]
    }

    /// Hidden and not proven to be a mine.
    pub fn is_hidden_unconfirmed(&self, id: CellId) -> bool {
        self.revealed[id as usize].is_none() && !self.confirmed_flag[id as usize]
    }

    /// The revealed count of a cell. Asking for the value of a still-hidden
    /// cell is a modelling bug, not a board condition.
    pub fn value(&self, id: CellId) -> Result<u8, SolverError> {
        self.revealed[id as usize]
            .ok_or(SolverError::Internal("queried revealed value of a hidden cell"))
    }

    pub fn adjacent_confirmed_flags(&self, id: CellId) -> u8 {
        self.adjacent_confirmed[id as usize]
    }

    pub fn adjacent_board_flags(&self, id: CellId) -> u8 {
        self.adjacent_board_flags[id as usize]
    }

    pub fn adjacent_unrevealed(&self, id: CellId) -> u8 {
        self.adjacent_unrevealed[id as usize]
    }

    pub fn confirmed_flag_count(&self) -> usize {
        self.confirmed_flag.iter().filter(|&&f| f).count()
    }

    /// Mines not yet accounted for by confirmed flags.
    pub fn mines_left(&self) -> Result<usize, SolverError> {
        let confirmed = self.confirmed_flag_count();
        if confirmed > self.total_mines {
            return Err(SolverError::InvalidBoard(
                "more proven mines than the board claims to contain",
            ));
        }
        Ok(self.total_mines - confirmed)
    }

    /// All hidden-unconfirmed cells in lexicographic order.
    pub fn hidden_unconfirmed(&self) -> impl Iterator<Item = CellId> + '_ {
        self.geometry
            .cells()
            .filter(move |&id| self.is_hidden_unconfirmed(id))
    }
}
