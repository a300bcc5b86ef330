use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::board::BoardMirror;
use crate::config::SolverConfig;
use crate::error::SolverError;
use crate::geometry::CellId;
use crate::web::WitnessWeb;

/// Sentinel value marking a mine in a stored solution.
pub const MINE: u8 = 0xFF;

/// Exhaustive census of every consistent mine placement over the hidden
/// cells, produced when the search space is small enough.
#[derive(Debug)]
pub struct BruteForceResult {
    /// Hidden cells in enumeration order; all stored solutions index into
    /// this.
    pub cells: Vec<CellId>,
    /// Stored placements, one byte per cell: the value the cell would show
    /// if revealed, or [`MINE`]. Truncated when `too_many` is set.
    pub solutions: Vec<Box<[u8]>>,
    /// How many of the counted placements put a mine on each cell. Always
    /// complete, even when the stored solutions are truncated.
    pub mine_counts: Vec<u64>,
    /// Number of consistent placements found.
    pub total: u64,
    /// The store cap was hit: `solutions` is a prefix, not a census.
    pub too_many: bool,
}

impl BruteForceResult {
    /// Exact probability that a hidden cell is clear.
    pub fn safety(&self, cell: CellId) -> Option<f64> {
        let index = self.cells.iter().position(|&c| c == cell)?;
        if self.total == 0 {
            return None;
        }
        Some(1.0 - self.mine_counts[index] as f64 / self.total as f64)
    }

    pub fn certain_clears(&self) -> Vec<CellId> {
        self.cells
            .iter()
            .zip(&self.mine_counts)
            .filter(|&(_, &mines)| mines == 0)
            .map(|(&cell, _)| cell)
            .collect()
    }

    pub fn certain_mines(&self) -> Vec<CellId> {
        self.cells
            .iter()
            .zip(&self.mine_counts)
            .filter(|&(_, &mines)| mines == self.total)
            .map(|(&cell, _)| cell)
            .collect()
    }
}

#[derive(Debug, Default)]
struct SolutionStore {
    solutions: Vec<Box<[u8]>>,
    mine_counts: Vec<u64>,
    total: u64,
    too_many: bool,
}

impl SolutionStore {
    fn new(num_cells: usize) -> Self {
        Self {
            mine_counts: vec![0; num_cells],
            ..Self::default()
        }
    }

    fn record(&mut self, solution: Box<[u8]>, cap: usize) {
        self.total += 1;
        for (count, &value) in self.mine_counts.iter_mut().zip(solution.iter()) {
            if value == MINE {
                *count += 1;
            }
        }
        if self.solutions.len() < cap {
            self.solutions.push(solution);
        } else {
            self.too_many = true;
        }
    }
}

struct Witness {
    required: u8,
    members: Vec<usize>,
}

/// The shared, read-only description of the search. Plain owned data so it
/// can be borrowed from every worker thread.
struct Search {
    cells: Vec<CellId>,
    witnesses: Vec<Witness>,
    /// Witnesses watching each cell position.
    watchers: Vec<Vec<usize>>,
    /// Confirmed flags already adjacent to each cell.
    flags: Vec<u8>,
    /// Positions of each cell's hidden neighbours.
    neighbours: Vec<Vec<usize>>,
    mines: usize,
    cap: usize,
}

/// Run the brute force when the placement count fits the budget. Returns
/// `None` when the search space is too large.
pub fn run(
    mirror: &BoardMirror,
    web: &WitnessWeb,
    config: &SolverConfig,
) -> Result<Option<BruteForceResult>, SolverError> {
    let mines = mirror.mines_left()?;
    let hidden: Vec<CellId> = mirror.hidden_unconfirmed().collect();
    let room = web.iterations(hidden.len(), mines);
    if room > BigUint::from(config.max_brute_force_iterations) {
        return Ok(None);
    }
    debug!(
        "brute force: {} cells, {} mines, {} placements to check",
        hidden.len(),
        mines,
        room.to_u64().map_or_else(|| "many".to_string(), |n| n.to_string()),
    );

    // Enumeration order: the first witness's squares lead so that its local
    // placements can partition the search, then the rest of the frontier,
    // then unseen cells.
    let mut cells: Vec<CellId> = Vec::with_capacity(hidden.len());
    if let Some(first) = web.witnesses.first() {
        for &sq in &first.squares {
            cells.push(web.squares[sq].cell);
        }
    }
    for square in &web.squares {
        if !cells.contains(&square.cell) {
            cells.push(square.cell);
        }
    }
    for &cell in &hidden {
        if web.square_for_cell(cell).is_none() {
            cells.push(cell);
        }
    }
    debug_assert_eq!(cells.len(), hidden.len());

    let position: HashMap<CellId, usize> = cells
        .iter()
        .enumerate()
        .map(|(i, &cell)| (cell, i))
        .collect();
    let witnesses: Vec<Witness> = web
        .witnesses
        .iter()
        .map(|w| Witness {
            required: w.required as u8,
            members: w
                .squares
                .iter()
                .map(|&sq| position[&web.squares[sq].cell])
                .collect(),
        })
        .collect();
    let mut watchers = vec![Vec::new(); cells.len()];
    for (wid, witness) in witnesses.iter().enumerate() {
        for &p in &witness.members {
            watchers[p].push(wid);
        }
    }
    let geometry = mirror.geometry();
    let flags = cells
        .iter()
        .map(|&cell| mirror.adjacent_confirmed_flags(cell))
        .collect();
    let neighbours = cells
        .iter()
        .map(|&cell| {
            geometry
                .neighbours(cell)
                .iter()
                .filter_map(|n| position.get(n).copied())
                .collect()
        })
        .collect();

    let search = Search {
        cells,
        witnesses,
        watchers,
        flags,
        neighbours,
        mines,
        cap: config.max_solutions,
    };
    let store = Mutex::new(SolutionStore::new(search.cells.len()));

    let partitions = search.partitions();
    let task = |partition: &Partition| {
        let mut state = State::fresh(&search);
        if state.apply(&search, partition) {
            state.descend(&search, partition.depth(), &store);
        }
    };
    if config.single_threaded {
        partitions.iter().for_each(task);
    } else {
        partitions.par_iter().for_each(task);
    }

    let store = store
        .into_inner()
        .map_err(|_| SolverError::Internal("a brute force worker panicked"))?;
    if store.total == 0 {
        return Err(SolverError::InvalidBoard(
            "no mine placement satisfies the visible numbers",
        ));
    }
    Ok(Some(BruteForceResult {
        cells: search.cells,
        solutions: store.solutions,
        mine_counts: store.mine_counts,
        total: store.total,
        too_many: store.too_many,
    }))
}

/// A fixed assignment of the leading cells, used to split the search into
/// independent parallel tasks.
struct Partition {
    leading: Vec<bool>,
}

impl Partition {
    fn depth(&self) -> usize {
        self.leading.len()
    }
}

impl Search {
    /// All placements of the first witness's requirement over its own
    /// squares. With no witnesses there is a single empty partition and the
    /// whole search runs as one task.
    fn partitions(&self) -> Vec<Partition> {
        let Some(first) = self.witnesses.first() else {
            return vec![Partition { leading: Vec::new() }];
        };
        let span = first.members.len();
        let mut out = Vec::new();
        let mut leading = vec![false; span];
        subsets(&mut leading, 0, first.required as usize, &mut out);
        out
    }
}

fn subsets(leading: &mut Vec<bool>, from: usize, left: usize, out: &mut Vec<Partition>) {
    if left == 0 {
        out.push(Partition {
            leading: leading.clone(),
        });
        return;
    }
    if leading.len() - from < left {
        return;
    }
    leading[from] = true;
    subsets(leading, from + 1, left - 1, out);
    leading[from] = false;
    subsets(leading, from + 1, left, out);
}

/// Per-task mutable search state.
struct State {
    assignment: Vec<bool>,
    placed_per_witness: Vec<u8>,
    open_per_witness: Vec<u8>,
    mines_used: usize,
}

impl State {
    fn fresh(search: &Search) -> Self {
        Self {
            assignment: vec![false; search.cells.len()],
            placed_per_witness: vec![0; search.witnesses.len()],
            open_per_witness: search
                .witnesses
                .iter()
                .map(|w| w.members.len() as u8)
                .collect(),
            mines_used: 0,
        }
    }

    /// Apply a partition's fixed prefix; false if it is already
    /// inconsistent.
    fn apply(&mut self, search: &Search, partition: &Partition) -> bool {
        for (p, &mine) in partition.leading.iter().enumerate() {
            if !self.assign(search, p, mine) {
                return false;
            }
        }
        true
    }

    /// Set one cell and update witness tallies; false kills the branch.
    /// Always applies the full update so that `retract` undoes it exactly.
    fn assign(&mut self, search: &Search, p: usize, mine: bool) -> bool {
        self.assignment[p] = mine;
        let mut viable = true;
        if mine {
            self.mines_used += 1;
            viable &= self.mines_used <= search.mines;
        }
        for &wid in &search.watchers[p] {
            self.open_per_witness[wid] -= 1;
            if mine {
                self.placed_per_witness[wid] += 1;
            }
            let witness = &search.witnesses[wid];
            viable &= self.placed_per_witness[wid] <= witness.required
                && witness.required - self.placed_per_witness[wid] <= self.open_per_witness[wid];
        }
        viable
    }

    fn retract(&mut self, search: &Search, p: usize) {
        if self.assignment[p] {
            self.mines_used -= 1;
        }
        for &wid in &search.watchers[p] {
            self.open_per_witness[wid] += 1;
            if self.assignment[p] {
                self.placed_per_witness[wid] -= 1;
            }
        }
        self.assignment[p] = false;
    }

    fn descend(&mut self, search: &Search, p: usize, store: &Mutex<SolutionStore>) {
        if p == search.cells.len() {
            if self.mines_used == search.mines && self.validate(search) {
                let solution = self.snapshot(search);
                if let Ok(mut store) = store.lock() {
                    store.record(solution, search.cap);
                }
            }
            return;
        }
        let remaining = search.cells.len() - p - 1;
        for mine in [true, false] {
            if mine && self.mines_used == search.mines {
                continue;
            }
            if !mine && search.mines - self.mines_used > remaining {
                continue;
            }
            if self.assign(search, p, mine) {
                self.descend(search, p + 1, store);
            }
            self.retract(search, p);
        }
    }

    /// Full check of every witness at a leaf. The incremental pruning
    /// should make this redundant; it guards the census anyway.
    fn validate(&self, search: &Search) -> bool {
        search.witnesses.iter().all(|witness| {
            let placed = witness
                .members
                .iter()
                .filter(|&&p| self.assignment[p])
                .count();
            placed == witness.required as usize
        })
    }

    /// Encode the placement as the values each cell would show.
    fn snapshot(&self, search: &Search) -> Box<[u8]> {
        (0..search.cells.len())
            .map(|p| {
                if self.assignment[p] {
                    return MINE;
                }
                let nearby = search.neighbours[p]
                    .iter()
                    .filter(|&&q| self.assignment[q])
                    .count();
                search.flags[p] + nearby as u8
            })
            .collect()
    }
}
