use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::error::SolverError;
use crate::geometry::CellId;
use crate::internal_util::{big_ratio, binomial, SMALL_COMBINATIONS};
use crate::web::{BoxId, WitnessId, WitnessWeb};

/// Allocation sentinel: the box has not been touched by any processed
/// witness yet.
const UNTOUCHED: i8 = -1;
/// Allocation sentinel: lines with differing allocations for this (closed)
/// box have been merged, so no single count applies any more.
const MIXED: i8 = -2;

/// One mine-count bucket of consistent placements during incremental
/// counting.
///
/// `solution_count` is the number of literal placements this line stands
/// for; `mine_box_count[b]` is the number of mines in box `b` summed over
/// all of those placements (mines x solutions, not mines alone).
/// `hash_count[b]` is the signed variant (+count when the box holds mines,
/// -count when empty) used to spot boxes that are always simultaneously
/// full or empty.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProbabilityLine {
    pub mine_count: usize,
    pub solution_count: BigUint,
    pub allocated: Vec<i8>,
    pub mine_box_count: Vec<BigUint>,
    pub hash_count: Vec<BigInt>,
}

impl ProbabilityLine {
    fn unit(num_boxes: usize) -> Self {
        Self {
            mine_count: 0,
            solution_count: BigUint::one(),
            allocated: vec![UNTOUCHED; num_boxes],
            mine_box_count: vec![BigUint::zero(); num_boxes],
            hash_count: vec![BigInt::zero(); num_boxes],
        }
    }

    /// Return a new line extended by placing `mines` mines into box `b` of
    /// `size` squares. Never mutates `self`; branching clones instead.
    fn extend(&self, b: BoxId, mines: usize, size: usize) -> Self {
        debug_assert!(size <= 8 && mines <= size);
        let factor = BigUint::from(SMALL_COMBINATIONS[size][mines]);
        let mut next = self.clone();
        next.mine_count += mines;
        next.solution_count = &self.solution_count * &factor;
        for count in &mut next.mine_box_count {
            *count *= &factor;
        }
        for hash in &mut next.hash_count {
            *hash *= BigInt::from(factor.clone());
        }
        next.mine_box_count[b] = &next.solution_count * BigUint::from(mines);
        next.hash_count[b] = if mines > 0 {
            BigInt::from(next.solution_count.clone())
        } else {
            -BigInt::from(next.solution_count.clone())
        };
        next.allocated[b] = mines as i8;
        next
    }

    /// Fold `other` into `self`; both lines must describe the same bucket.
    fn absorb(&mut self, other: &Self) {
        debug_assert_eq!(self.mine_count, other.mine_count);
        self.solution_count += &other.solution_count;
        for (mine, o) in self.mine_box_count.iter_mut().zip(&other.mine_box_count) {
            *mine += o;
        }
        for (hash, o) in self.hash_count.iter_mut().zip(&other.hash_count) {
            *hash += o;
        }
        for (alloc, &o) in self.allocated.iter_mut().zip(&other.allocated) {
            if *alloc != o {
                *alloc = MIXED;
            }
        }
    }

    /// Cross-multiply two lines from independent components (disjoint box
    /// domains).
    fn cross(&self, other: &Self) -> Self {
        let solution_count = &self.solution_count * &other.solution_count;
        let mine_box_count = self
            .mine_box_count
            .iter()
            .zip(&other.mine_box_count)
            .map(|(a, b)| a * &other.solution_count + b * &self.solution_count)
            .collect();
        let hash_count = self
            .hash_count
            .iter()
            .zip(&other.hash_count)
            .map(|(a, b)| {
                a * BigInt::from(other.solution_count.clone())
                    + b * BigInt::from(self.solution_count.clone())
            })
            .collect();
        let allocated = self
            .allocated
            .iter()
            .zip(&other.allocated)
            .map(|(&a, &b)| if a == UNTOUCHED { b } else { a })
            .collect();
        Self {
            mine_count: self.mine_count + other.mine_count,
            solution_count,
            allocated,
            mine_box_count,
            hash_count,
        }
    }
}

/// One mine-count bucket of the final tally, before the off-frontier
/// complement is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineBucket {
    /// Total mines on the frontier in this bucket.
    pub mines: usize,
    /// Number of frontier placements with that many mines.
    pub count: BigUint,
    /// Per-box weighted mine tallies (mines x placements).
    pub box_mines: Vec<BigUint>,
}

/// Final output of the exact counting engine.
#[derive(Debug, Clone)]
pub struct EngineResult {
    /// Grand total of consistent placements, off-frontier complement
    /// included.
    pub total_solutions: BigUint,
    /// Per-box weighted mine tally after off-frontier expansion.
    pub box_tally: Vec<BigUint>,
    /// Per-box probability that a member square is clear.
    pub box_safety: Vec<f64>,
    /// Probability that a hidden cell away from the frontier is clear.
    pub off_frontier_safety: f64,
    /// Expected number of mines among off-frontier cells.
    pub expected_off_frontier_mines: f64,
    /// Pairs of single-square boxes that are always simultaneously
    /// mine/clear.
    pub linked_pairs: Vec<(BoxId, BoxId)>,
    /// Raw per-mine-count buckets (frontier only), for audits and tests.
    pub buckets: Vec<EngineBucket>,
    /// Clear probability per frontier cell.
    pub cell_safety: HashMap<CellId, f64>,
    /// Boxes proven mine-free.
    pub certain_clear_boxes: Vec<BoxId>,
    /// Boxes proven full of mines.
    pub certain_mine_boxes: Vec<BoxId>,
    /// Member cells of the proven boxes, ready to act on.
    pub certain_clear_cells: Vec<CellId>,
    /// Member cells of the boxes proven full.
    pub certain_mine_cells: Vec<CellId>,
}

impl EngineResult {
    pub fn safety(&self, cell: CellId) -> Option<f64> {
        self.cell_safety.get(&cell).copied()
    }
}

/// The exact counting engine.
///
/// Processes witnesses in connectivity order, growing a working set of
/// probability lines per independent component and merging finished
/// components combinatorially instead of by cross-product enumeration of
/// raw placements. Single-threaded by design; its state is mutated
/// sequentially per witness.
pub struct ProbabilityEngine<'a> {
    web: &'a WitnessWeb,
    mines_left: usize,
    off_frontier: usize,
    working: Vec<ProbabilityLine>,
    held: Vec<ProbabilityLine>,
    witness_done: Vec<bool>,
    touched: Vec<bool>,
    component_started: bool,
}

impl<'a> ProbabilityEngine<'a> {
    pub fn new(web: &'a WitnessWeb, mines_left: usize, off_frontier: usize) -> Self {
        let num_boxes = web.boxes.len();
        Self {
            web,
            mines_left,
            off_frontier,
            working: vec![ProbabilityLine::unit(num_boxes)],
            held: vec![ProbabilityLine::unit(num_boxes)],
            witness_done: vec![false; web.witnesses.len()],
            touched: vec![false; num_boxes],
            component_started: false,
        }
    }

    /// Run the full pipeline and derive per-box probabilities.
    pub fn run(
        web: &'a WitnessWeb,
        mines_left: usize,
        off_frontier: usize,
    ) -> Result<EngineResult, SolverError> {
        let mut engine = Self::new(web, mines_left, off_frontier);
        while let Some((witness, fresh)) = engine.next_witness() {
            if fresh {
                engine.close_component()?;
            }
            engine.process_witness(witness)?;
        }
        engine.close_component()?;
        engine.finalise()
    }

    /// Pick the next unprocessed witness, preferring one that borders an
    /// already-touched box (keeps the branching factor low). Returns
    /// `(witness, fresh)` where `fresh` marks an independent-component
    /// boundary.
    fn next_witness(&self) -> Option<(WitnessId, bool)> {
        let mut fresh = None;
        for wid in 0..self.web.witnesses.len() {
            if self.witness_done[wid] {
                continue;
            }
            if self.web.witnesses[wid]
                .boxes
                .iter()
                .any(|&b| self.touched[b])
            {
                return Some((wid, false));
            }
            if fresh.is_none() {
                fresh = Some(wid);
            }
        }
        fresh.map(|wid| (wid, true))
    }

    fn process_witness(&mut self, wid: WitnessId) -> Result<(), SolverError> {
        let witness = &self.web.witnesses[wid];
        let mut extended: Vec<ProbabilityLine> = Vec::new();
        for line in &self.working {
            let mut already = 0_usize;
            let mut new_boxes: Vec<BoxId> = Vec::new();
            for &b in &witness.boxes {
                match line.allocated[b] {
                    UNTOUCHED => new_boxes.push(b),
                    MIXED => {
                        return Err(SolverError::Internal(
                            "compressed allocation consulted while its box was still open",
                        ));
                    },
                    count => already += count as usize,
                }
            }
            if witness.required < already {
                continue; // over-filled by earlier allocations
            }
            let missing = witness.required - already;
            if line.mine_count + missing > self.mines_left {
                continue;
            }
            self.distribute(line, missing, &new_boxes, 0, &mut extended);
        }
        self.witness_done[wid] = true;
        for &b in &witness.boxes {
            self.touched[b] = true;
        }
        self.component_started = true;

        if extended.is_empty() {
            return Err(SolverError::InvalidBoard(
                "a witness admits no consistent mine placement",
            ));
        }

        self.working = self.compress(extended);
        Ok(())
    }

    /// Recursively distribute `missing` mines over the newly-introduced
    /// boxes of the current witness, bounded by each box's min/max.
    fn distribute(
        &self,
        line: &ProbabilityLine,
        missing: usize,
        new_boxes: &[BoxId],
        index: usize,
        out: &mut Vec<ProbabilityLine>,
    ) {
        if index == new_boxes.len() {
            if missing == 0 {
                out.push(line.clone());
            }
            return;
        }
        let b = new_boxes[index];
        let mine_box = &self.web.boxes[b];
        let later_capacity: usize = new_boxes[index + 1..]
            .iter()
            .map(|&x| self.web.boxes[x].max_mines)
            .sum();
        let hi = mine_box.max_mines.min(missing);
        let lo = mine_box
            .min_mines
            .max(missing.saturating_sub(later_capacity));
        for mines in lo..=hi {
            if line.mine_count + mines > self.mines_left {
                break;
            }
            let child = line.extend(b, mines, mine_box.size());
            self.distribute(&child, missing - mines, new_boxes, index + 1, out);
        }
    }

    /// Merge lines that agree on mine count and on the allocation of every
    /// box still bordered by an unprocessed witness. Closed boxes' detail
    /// has already been folded into the weighted accumulators.
    fn compress(&self, lines: Vec<ProbabilityLine>) -> Vec<ProbabilityLine> {
        let open: Vec<BoxId> = (0..self.web.boxes.len())
            .filter(|&b| {
                self.web.boxes[b]
                    .witnesses
                    .iter()
                    .any(|&w| !self.witness_done[w])
            })
            .collect();
        let mut merged: HashMap<(usize, Vec<i8>), ProbabilityLine> = HashMap::new();
        for line in lines {
            let key = (
                line.mine_count,
                open.iter().map(|&b| line.allocated[b]).collect::<Vec<_>>(),
            );
            match merged.get_mut(&key) {
                Some(existing) => existing.absorb(&line),
                None => {
                    merged.insert(key, line);
                },
            }
        }
        let mut result: Vec<ProbabilityLine> = merged.into_values().collect();
        result.sort_by_key(|line| line.mine_count);
        result
    }

    /// An independent component boundary: cross-multiply the finished
    /// working set against everything completed so far, bucketed by total
    /// mine count and capped at the global mine budget.
    fn close_component(&mut self) -> Result<(), SolverError> {
        if !self.component_started {
            return Ok(());
        }
        let mut merged: HashMap<usize, ProbabilityLine> = HashMap::new();
        for (held, finished) in self.held.iter().cartesian_product(&self.working) {
            let total = held.mine_count + finished.mine_count;
            if total > self.mines_left {
                continue;
            }
            let crossed = held.cross(finished);
            match merged.get_mut(&total) {
                Some(existing) => existing.absorb(&crossed),
                None => {
                    merged.insert(total, crossed);
                },
            }
        }
        if merged.is_empty() {
            return Err(SolverError::InvalidBoard(
                "component merge exceeded the global mine budget",
            ));
        }
        let mut held: Vec<ProbabilityLine> = merged.into_values().collect();
        held.sort_by_key(|line| line.mine_count);
        self.held = held;
        self.working = vec![ProbabilityLine::unit(self.web.boxes.len())];
        self.component_started = false;
        Ok(())
    }

    /// Expand each bucket by the off-frontier complement and derive the
    /// per-box probabilities.
    fn finalise(self) -> Result<EngineResult, SolverError> {
        let num_boxes = self.web.boxes.len();
        let floor = self.mines_left.saturating_sub(self.off_frontier);

        let mut total = BigUint::zero();
        let mut box_tally = vec![BigUint::zero(); num_boxes];
        let mut hash_tally = vec![BigInt::zero(); num_boxes];
        let mut off_mines = BigUint::zero();
        let mut buckets = Vec::with_capacity(self.held.len());

        for line in &self.held {
            buckets.push(EngineBucket {
                mines: line.mine_count,
                count: line.solution_count.clone(),
                box_mines: line.mine_box_count.clone(),
            });
            if line.mine_count < floor || line.mine_count > self.mines_left {
                continue;
            }
            let weight = binomial(self.off_frontier, self.mines_left - line.mine_count);
            if weight.is_zero() {
                continue;
            }
            total += &weight * &line.solution_count;
            for b in 0..num_boxes {
                box_tally[b] += &weight * &line.mine_box_count[b];
                hash_tally[b] += BigInt::from(weight.clone()) * &line.hash_count[b];
            }
            off_mines += &weight
                * &line.solution_count
                * BigUint::from(self.mines_left - line.mine_count);
        }

        if total.is_zero() {
            return Err(SolverError::InvalidBoard(
                "the witnesses admit no consistent mine placement",
            ));
        }

        let mut box_safety = Vec::with_capacity(num_boxes);
        let mut certain_clear_boxes = Vec::new();
        let mut certain_mine_boxes = Vec::new();
        for (b, tally) in box_tally.iter().enumerate() {
            let size = self.web.boxes[b].size();
            let full = &total * BigUint::from(size);
            let safety = if tally.is_zero() {
                certain_clear_boxes.push(b);
                1.0
            } else if *tally == full {
                certain_mine_boxes.push(b);
                0.0
            } else {
                (1.0 - big_ratio(tally, &full)).clamp(0.0, 1.0)
            };
            box_safety.push(safety);
        }

        let expected_off_frontier_mines = big_ratio(&off_mines, &total);
        let off_frontier_safety = if self.off_frontier == 0 {
            1.0
        } else {
            (1.0 - expected_off_frontier_mines / self.off_frontier as f64).clamp(0.0, 1.0)
        };

        // Single-square boxes whose signed hash sums coincide are forced to
        // be mines (or clear) in exactly the same placements.
        let mut linked_pairs = Vec::new();
        for a in 0..num_boxes {
            if self.web.boxes[a].size() != 1 || box_safety[a] == 0.0 || box_safety[a] == 1.0 {
                continue;
            }
            for b in (a + 1)..num_boxes {
                if self.web.boxes[b].size() == 1 && hash_tally[a] == hash_tally[b] {
                    linked_pairs.push((a, b));
                }
            }
        }

        let mut cell_safety = HashMap::with_capacity(self.web.squares.len());
        let mut certain_clear_cells = Vec::new();
        let mut certain_mine_cells = Vec::new();
        for square in &self.web.squares {
            cell_safety.insert(square.cell, box_safety[square.box_id]);
            if box_safety[square.box_id] == 1.0 {
                certain_clear_cells.push(square.cell);
            } else if box_safety[square.box_id] == 0.0 {
                certain_mine_cells.push(square.cell);
            }
        }

        debug!(
            "probability engine: {} buckets, {} boxes, {} linked pairs",
            buckets.len(),
            num_boxes,
            linked_pairs.len()
        );

        Ok(EngineResult {
            total_solutions: total,
            box_tally,
            box_safety,
            off_frontier_safety,
            expected_off_frontier_mines,
            linked_pairs,
            buckets,
            cell_safety,
            certain_clear_boxes,
            certain_mine_boxes,
            certain_clear_cells,
            certain_mine_cells,
        })
    }
}
