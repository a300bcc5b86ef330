use std::collections::HashMap;

use frozenset::FrozenSet;
use num_bigint::BigUint;

use crate::board::BoardMirror;
use crate::error::SolverError;
use crate::geometry::CellId;
use crate::internal_util::binomial;

pub type WitnessId = usize;
pub type SquareId = usize;
pub type BoxId = usize;

/// A revealed numbered cell with unresolved adjacent mines.
///
/// `required` is the count still unaccounted for after subtracting proven
/// flags. Witnesses whose adjacent hidden squares coincide exactly are
/// merged; their counts must agree or the board is impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub cell: CellId,
    pub required: usize,
    pub squares: Vec<SquareId>,
    pub boxes: Vec<BoxId>,
}

/// A hidden cell on the frontier, adjacent to at least one witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Square {
    pub cell: CellId,
    pub witnesses: Vec<WitnessId>,
    pub box_id: BoxId,
}

/// An equivalence class of squares sharing an identical witness set.
///
/// All member squares are combinatorially interchangeable and always carry
/// identical probability, so probability is computed once per box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineBox {
    pub squares: Vec<SquareId>,
    pub witnesses: Vec<WitnessId>,
    pub min_mines: usize,
    pub max_mines: usize,
}

impl MineBox {
    pub fn size(&self) -> usize {
        self.squares.len()
    }
}

/// The deduplicated bipartite witness/square graph plus its box
/// decomposition.
///
/// Entities are stored in arenas and reference each other by small integer
/// ids, so equality and hashing are trivial and there are no ownership
/// cycles.
#[derive(Debug, Clone)]
pub struct WitnessWeb {
    pub witnesses: Vec<Witness>,
    pub squares: Vec<Square>,
    pub boxes: Vec<MineBox>,
    square_of_cell: HashMap<CellId, SquareId>,
}

impl WitnessWeb {
    /// Build the web from the solver's current belief state.
    ///
    /// Fails with [`SolverError::InvalidBoard`] when any witness demands an
    /// impossible count, or when two merged witnesses disagree.
    pub fn build(mirror: &BoardMirror) -> Result<Self, SolverError> {
        let geometry = mirror.geometry();

        // Gather raw witnesses, deduplicating by their hidden-neighbour set.
        let mut dedup: HashMap<FrozenSet<CellId>, (usize, CellId)> = HashMap::new();
        for id in geometry.cells() {
            if !mirror.is_revealed(id) || mirror.adjacent_unrevealed(id) == 0 {
                continue;
            }
            let value = mirror.value(id)? as usize;
            let confirmed = mirror.adjacent_confirmed_flags(id) as usize;
            if value < confirmed {
                return Err(SolverError::InvalidBoard(
                    "witness count below adjacent proven flags",
                ));
            }
            let required = value - confirmed;
            let hidden: FrozenSet<CellId> = geometry
                .neighbours(id)
                .iter()
                .copied()
                .filter(|&n| mirror.is_hidden_unconfirmed(n))
                .collect();
            if required > hidden.len() {
                return Err(SolverError::InvalidBoard(
                    "witness demands more mines than it has hidden neighbours",
                ));
            }
            match dedup.get(&hidden) {
                Some(&(existing, _)) if existing != required => {
                    return Err(SolverError::InvalidBoard(
                        "equivalent witnesses disagree on their mine count",
                    ));
                },
                Some(_) => {},
                None => {
                    dedup.insert(hidden, (required, id));
                },
            }
        }

        // Sort retained witnesses by priority: fewest squares first, then
        // position. Fewer squares means fewer permutations to branch over.
        let mut raw: Vec<(Vec<CellId>, usize, CellId)> = dedup
            .into_iter()
            .map(|(squares, (required, cell))| {
                let mut cells: Vec<CellId> = squares.iter().copied().collect();
                cells.sort_unstable();
                (cells, required, cell)
            })
            .collect();
        raw.sort_unstable_by(|a, b| {
            (a.0.len(), a.2).cmp(&(b.0.len(), b.2))
        });

        // Intern the frontier squares.
        let mut square_of_cell: HashMap<CellId, SquareId> = HashMap::new();
        let mut square_cells: Vec<CellId> = raw
            .iter()
            .flat_map(|(cells, _, _)| cells.iter().copied())
            .collect();
        square_cells.sort_unstable();
        square_cells.dedup();
        let mut squares: Vec<Square> = square_cells
            .into_iter()
            .map(|cell| {
                square_of_cell.insert(cell, square_of_cell.len());
                Square {
                    cell,
                    witnesses: Vec::new(),
                    box_id: 0,
                }
            })
            .collect();

        let mut witnesses = Vec::with_capacity(raw.len());
        for (wid, (cells, required, cell)) in raw.into_iter().enumerate() {
            let member_squares: Vec<SquareId> =
                cells.into_iter().map(|c| square_of_cell[&c]).collect();
            for &sq in &member_squares {
                squares[sq].witnesses.push(wid);
            }
            witnesses.push(Witness {
                cell,
                required,
                squares: member_squares,
                boxes: Vec::new(),
            });
        }

        // Box decomposition: squares appearing in exactly the same witnesses
        // are interchangeable.
        let mut box_of_key: HashMap<FrozenSet<WitnessId>, BoxId> = HashMap::new();
        let mut boxes: Vec<MineBox> = Vec::new();
        for sq in 0..squares.len() {
            let key: FrozenSet<WitnessId> =
                squares[sq].witnesses.iter().copied().collect();
            let box_id = *box_of_key.entry(key).or_insert_with(|| {
                boxes.push(MineBox {
                    squares: Vec::new(),
                    witnesses: squares[sq].witnesses.clone(),
                    min_mines: 0,
                    max_mines: 0,
                });
                boxes.len() - 1
            });
            boxes[box_id].squares.push(sq);
            squares[sq].box_id = box_id;
        }
        for (bid, mine_box) in boxes.iter().enumerate() {
            for &wid in &mine_box.witnesses {
                witnesses[wid].boxes.push(bid);
            }
        }

        // Box mine bounds, used to prune the distribution recursion:
        // at most `size` mines and no more than any bounding witness still
        // needs; at least `size` minus the summed slack of the bounding
        // witnesses.
        for mine_box in &mut boxes {
            let size = mine_box.squares.len();
            let mut max_remaining = size;
            let mut slack_sum = 0_usize;
            for &wid in &mine_box.witnesses {
                let w = &witnesses[wid];
                max_remaining = max_remaining.min(w.required);
                slack_sum += w.squares.len() - w.required;
            }
            mine_box.max_mines = max_remaining.min(size);
            mine_box.min_mines = size.saturating_sub(slack_sum);
        }

        Ok(Self {
            witnesses,
            squares,
            boxes,
            square_of_cell,
        })
    }

    pub fn square_for_cell(&self, cell: CellId) -> Option<SquareId> {
        self.square_of_cell.get(&cell).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.witnesses.is_empty()
    }

    /// Estimated number of literal placements a brute-force enumeration over
    /// `hidden_cells` cells and `mines` mines would have to consider.
    pub fn iterations(&self, hidden_cells: usize, mines: usize) -> BigUint {
        binomial(hidden_cells, mines)
    }

    /// Connected components of the witness graph: witnesses belong to the
    /// same component iff they are linked through shared boxes.
    pub fn components(&self) -> Vec<Vec<WitnessId>> {
        let mut seen = vec![false; self.witnesses.len()];
        let mut components = Vec::new();
        for start in 0..self.witnesses.len() {
            if seen[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = vec![start];
            seen[start] = true;
            while let Some(wid) = queue.pop() {
                component.push(wid);
                for &bid in &self.witnesses[wid].boxes {
                    for &other in &self.boxes[bid].witnesses {
                        if !seen[other] {
                            seen[other] = true;
                            queue.push(other);
                        }
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}
