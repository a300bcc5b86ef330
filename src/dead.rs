use std::collections::{HashMap, HashSet};

use log::debug;

use crate::board::BoardMirror;
use crate::config::SolverConfig;
use crate::geometry::CellId;
use crate::web::{BoxId, SquareId, WitnessId, WitnessWeb};

/// Outcome of dead-cell analysis.
///
/// A cell is *dead* when revealing it (given it is clear) cannot teach us
/// anything: its value is the same in every consistent placement, so it can
/// only be the last guess worth making. The analysis is conservative:
/// `truncated` reports that some region was too large to enumerate within
/// budget, in which case its cells are simply left alive.
#[derive(Debug, Default)]
pub struct DeadCellAnalysis {
    dead: HashSet<CellId>,
    truncated: bool,
}

impl DeadCellAnalysis {
    pub fn is_dead(&self, cell: CellId) -> bool {
        self.dead.contains(&cell)
    }

    pub fn dead_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.dead.iter().copied()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    #[cfg(test)]
    pub(crate) fn with_dead(cells: impl IntoIterator<Item = CellId>) -> Self {
        Self {
            dead: cells.into_iter().collect(),
            truncated: false,
        }
    }
}

/// Find all provably dead frontier cells.
pub fn analyse(
    web: &WitnessWeb,
    mirror: &BoardMirror,
    mines_left: usize,
    config: &SolverConfig,
) -> DeadCellAnalysis {
    let mut analysis = DeadCellAnalysis::default();
    for component in web.components() {
        let candidates = candidates_in(web, mirror, &component);
        if candidates.is_empty() {
            continue;
        }
        match enumerate_component(web, &component, mines_left, config.max_zone_iterations) {
            Some(lines) => {
                for square in candidates {
                    if candidate_is_dead(web, mirror, square, &lines) {
                        analysis.dead.insert(web.squares[square].cell);
                    }
                }
            },
            None => analysis.truncated = true,
        }
    }
    debug!(
        "dead-cell analysis: {} dead, truncated: {}",
        analysis.dead.len(),
        analysis.truncated
    );
    analysis
}

/// Squares whose every hidden neighbour is a frontier square of the same
/// component. A hidden neighbour outside the web (or in another component)
/// carries information the component's placements cannot pin down, so such
/// squares can never be proven dead here.
fn candidates_in(web: &WitnessWeb, mirror: &BoardMirror, component: &[WitnessId]) -> Vec<SquareId> {
    let boxes: HashSet<BoxId> = component
        .iter()
        .flat_map(|&w| web.witnesses[w].boxes.iter().copied())
        .collect();
    let geometry = mirror.geometry();
    let mut out = Vec::new();
    for &b in &boxes {
        for &sq in &web.boxes[b].squares {
            let cell = web.squares[sq].cell;
            let surrounded = geometry.neighbours(cell).iter().all(|&n| {
                if !mirror.is_hidden_unconfirmed(n) {
                    return true;
                }
                web.square_for_cell(n)
                    .map_or(false, |other| boxes.contains(&web.squares[other].box_id))
            });
            if surrounded {
                out.push(sq);
            }
        }
    }
    out
}

/// Enumerate every consistent per-box allocation for one component, without
/// any merging. Returns `None` when the budget runs out. The allocation
/// vectors are indexed by global box id; boxes outside the component stay
/// at -1.
fn enumerate_component(
    web: &WitnessWeb,
    component: &[WitnessId],
    mines_left: usize,
    budget: u64,
) -> Option<Vec<Vec<i8>>> {
    let mut lines: Vec<Vec<i8>> = vec![vec![-1; web.boxes.len()]];
    let mut used: u64 = 0;
    for &wid in component {
        let witness = &web.witnesses[wid];
        let mut extended = Vec::new();
        for line in &lines {
            let mut already = 0_usize;
            let mut new_boxes: Vec<BoxId> = Vec::new();
            let mut placed = 0_usize;
            for (b, &alloc) in line.iter().enumerate() {
                if alloc >= 0 {
                    placed += alloc as usize;
                }
                if witness.boxes.contains(&b) {
                    if alloc < 0 {
                        new_boxes.push(b);
                    } else {
                        already += alloc as usize;
                    }
                }
            }
            if witness.required < already {
                continue;
            }
            let missing = witness.required - already;
            if placed + missing > mines_left {
                continue;
            }
            distribute(web, line, missing, &new_boxes, 0, &mut extended, &mut used);
            if used > budget || extended.len() as u64 > budget {
                return None;
            }
        }
        lines = extended;
    }
    Some(lines)
}

fn distribute(
    web: &WitnessWeb,
    line: &[i8],
    missing: usize,
    new_boxes: &[BoxId],
    index: usize,
    out: &mut Vec<Vec<i8>>,
    used: &mut u64,
) {
    *used += 1;
    if index == new_boxes.len() {
        if missing == 0 {
            out.push(line.to_vec());
        }
        return;
    }
    let b = new_boxes[index];
    let later_capacity: usize = new_boxes[index + 1..]
        .iter()
        .map(|&x| web.boxes[x].max_mines)
        .sum();
    let hi = web.boxes[b].max_mines.min(missing);
    let lo = web.boxes[b]
        .min_mines
        .max(missing.saturating_sub(later_capacity));
    for mines in lo..=hi {
        let mut child = line.to_vec();
        child[b] = mines as i8;
        distribute(web, &child, missing - mines, new_boxes, index + 1, out, used);
    }
}

/// Check one candidate against every enumerated allocation.
///
/// The candidate's clear-value is the number of adjacent confirmed flags
/// plus the mines its neighbouring boxes put next to it. That count is
/// pinned down by a line only when:
/// - every *good* box (all squares adjacent to the candidate) just
///   contributes its allocation,
/// - every *bad* box (partially adjacent) is either empty or completely
///   full, so the adjacent share is forced either way,
/// - the candidate's own box, when partially filled, has all of its other
///   squares adjacent (the mines land next to the candidate no matter how
///   they fall).
///
/// Lines where the own box is completely full have the candidate as a mine
/// and say nothing about its clear-value.
fn candidate_is_dead(
    web: &WitnessWeb,
    mirror: &BoardMirror,
    square: SquareId,
    lines: &[Vec<i8>],
) -> bool {
    let cell = web.squares[square].cell;
    let own_box = web.squares[square].box_id;
    let geometry = mirror.geometry();

    // Adjacent boxes, classified once: (box, adjacent square count, good).
    let mut adjacent: HashMap<BoxId, (usize, bool)> = HashMap::new();
    for &n in geometry.neighbours(cell) {
        if !mirror.is_hidden_unconfirmed(n) {
            continue;
        }
        let Some(other) = web.square_for_cell(n) else {
            return false;
        };
        let b = web.squares[other].box_id;
        adjacent.entry(b).or_insert_with(|| {
            let total = web.boxes[b].squares.len();
            let near = web.boxes[b]
                .squares
                .iter()
                .filter(|&&sq| sq != square)
                .filter(|&&sq| geometry.are_adjacent(cell, web.squares[sq].cell))
                .count();
            let relevant = if b == own_box { total - 1 } else { total };
            (near, near == relevant)
        });
    }

    let mut clear_value: Option<usize> = None;
    let mut seen_clear_line = false;
    for line in lines {
        let own_alloc = line[own_box];
        debug_assert!(own_alloc >= 0);
        if own_alloc as usize == web.boxes[own_box].size() {
            continue; // candidate is a mine throughout this line
        }
        let mut total = mirror.adjacent_confirmed_flags(cell) as usize;
        let mut determined = true;
        for (&b, &(near, good)) in &adjacent {
            let alloc = line[b] as usize;
            if b == own_box {
                if alloc == 0 {
                    continue;
                }
                if !good {
                    determined = false;
                    break;
                }
                total += alloc;
            } else if good {
                total += alloc;
            } else if alloc == 0 {
                // nothing lands nearby
            } else if alloc == web.boxes[b].size() {
                total += near;
            } else {
                determined = false;
                break;
            }
        }
        if !determined {
            return false;
        }
        seen_clear_line = true;
        match clear_value {
            None => clear_value = Some(total),
            Some(v) if v != total => return false,
            Some(_) => {},
        }
    }
    // A candidate that is a mine in every line is certain, not dead.
    seen_clear_line
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::{Coord, Geometry};
    use crate::util::AsciiBoard;

    fn analysis_for(
        encoded: &str,
        width: usize,
        height: usize,
        mines: usize,
    ) -> (Rc<Geometry>, DeadCellAnalysis) {
        let board = AsciiBoard::parse(encoded, mines).unwrap();
        let geometry = Geometry::new(width, height);
        let mut mirror = BoardMirror::new(Rc::clone(&geometry), mines);
        mirror.sync(&board).unwrap();
        let web = WitnessWeb::build(&mirror).unwrap();
        let mines_left = mirror.mines_left().unwrap();
        let config = SolverConfig::default();
        let dead = analyse(&web, &mirror, mines_left, &config);
        (geometry, dead)
    }

    #[test]
    fn symmetric_coin_flip_cells_are_dead() {
        // Classic edge 50/50: one mine in one of two cells along the top
        // edge. Whichever one is clear will always read "1", so both are
        // dead.
        let (geometry, dead) = analysis_for(
            "
            xx
            11
            ",
            2,
            2,
            1,
        );
        assert!(dead.is_dead(geometry.index(Coord::new(0, 0))));
        assert!(dead.is_dead(geometry.index(Coord::new(0, 1))));
        assert!(!dead.truncated());
    }

    #[test]
    fn informative_cells_stay_alive() {
        // An open frontier: the hidden row borders unseen territory, so
        // clearing any of it can reveal something new.
        let (geometry, dead) = analysis_for(
            "
            111
            xxx
            xxx
            ",
            3,
            3,
            2,
        );
        for col in 0..3 {
            assert!(!dead.is_dead(geometry.index(Coord::new(1, col))));
        }
    }

    #[test]
    fn constant_value_in_closed_region_is_dead() {
        // Two placements exist ({0,3} and {1,4} along the top row) and every
        // hidden cell reads "1" whenever it is clear: the whole corridor is
        // dead.
        let (geometry, dead) = analysis_for(
            "
            xxxxx
            11111
            ",
            5,
            2,
            2,
        );
        for col in 0..5 {
            assert!(dead.is_dead(geometry.index(Coord::new(0, col))), "col {col}");
        }
        assert!(!dead.truncated());
    }

    #[test]
    fn budget_exhaustion_defers_instead_of_guessing() {
        let board = AsciiBoard::parse("xxxxx\n11111", 2).unwrap();
        let geometry = Geometry::new(5, 2);
        let mut mirror = BoardMirror::new(Rc::clone(&geometry), 2);
        mirror.sync(&board).unwrap();
        let web = WitnessWeb::build(&mirror).unwrap();
        let config = SolverConfig {
            max_zone_iterations: 0,
            ..SolverConfig::default()
        };
        let dead = analyse(&web, &mirror, 2, &config);
        assert!(dead.truncated());
        assert_eq!(dead.dead_cells().count(), 0);
    }
}
